// Presentation of the unified playback state

mod manager;
mod renderer;

pub use manager::DisplayManager;
pub use renderer::{presenter_for, JsonPrinter, LinePrinter, Presenter};
