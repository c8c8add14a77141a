// Position interpolation and lyric line synchronization.
// Both run on the fast tick and never touch the network or disk.

mod estimator;
mod synchronizer;

pub use estimator::PlaybackPositionEstimator;
pub use synchronizer::{LinePosition, LyricSynchronizer};
