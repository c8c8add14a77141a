use std::time::Duration;

use crate::error::SourceError;
use crate::player::{Capabilities, Confidence, TrackSnapshot};

/// A platform or service adapter producing now-playing snapshots.
///
/// Adapters do blocking IO and are owned by the source worker thread, so
/// they only need to be `Send`.
pub trait TrackSnapshotSource: Send {
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    /// The arbiter never polls faster than this; zero means every cycle.
    fn min_poll_interval(&self) -> Duration {
        Duration::ZERO
    }

    fn confidence(&self) -> Confidence {
        Confidence::Full
    }

    /// Probes the backend once. A failure demotes the source until it is
    /// re-initialized.
    fn initialize(&mut self) -> Result<(), SourceError>;

    /// Current track, or `None` when nothing is playing here.
    fn poll(&mut self) -> Result<Option<TrackSnapshot>, SourceError>;

    fn play(&mut self) -> Result<(), SourceError> {
        Err(SourceError::Unsupported)
    }

    fn pause(&mut self) -> Result<(), SourceError> {
        Err(SourceError::Unsupported)
    }

    fn next(&mut self) -> Result<(), SourceError> {
        Err(SourceError::Unsupported)
    }

    fn previous(&mut self) -> Result<(), SourceError> {
        Err(SourceError::Unsupported)
    }

    fn seek(&mut self, _position_ms: u64) -> Result<(), SourceError> {
        Err(SourceError::Unsupported)
    }

    fn set_shuffle(&mut self, _enabled: bool) -> Result<(), SourceError> {
        Err(SourceError::Unsupported)
    }

    fn set_repeat(&mut self, _enabled: bool) -> Result<(), SourceError> {
        Err(SourceError::Unsupported)
    }
}

/// A playback control request routed to the authoritative source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOp {
    Play,
    Pause,
    Next,
    Previous,
    Seek(u64),
    SetShuffle(bool),
    SetRepeat(bool),
}

impl ControlOp {
    pub fn is_supported_by(&self, caps: &Capabilities) -> bool {
        match self {
            ControlOp::Play => caps.can_play,
            ControlOp::Pause => caps.can_pause,
            ControlOp::Next => caps.can_next,
            ControlOp::Previous => caps.can_previous,
            ControlOp::Seek(_) => caps.can_seek,
            ControlOp::SetShuffle(_) => caps.can_shuffle,
            ControlOp::SetRepeat(_) => caps.can_repeat,
        }
    }

    pub(crate) fn apply(&self, source: &mut dyn TrackSnapshotSource) -> Result<(), SourceError> {
        match *self {
            ControlOp::Play => source.play(),
            ControlOp::Pause => source.pause(),
            ControlOp::Next => source.next(),
            ControlOp::Previous => source.previous(),
            ControlOp::Seek(ms) => source.seek(ms),
            ControlOp::SetShuffle(on) => source.set_shuffle(on),
            ControlOp::SetRepeat(on) => source.set_repeat(on),
        }
    }
}
