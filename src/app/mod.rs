mod control;
mod core;
mod session;

pub use control::{ControlCommand, ControlRequest, ParseCommandError, PlaybackController};
pub use self::core::App;
pub use session::{FetchRequest, FetchResult, PlaybackSession, SharedPlayback, TickReport};
