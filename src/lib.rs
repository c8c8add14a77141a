// Now-playing arbitration and synchronized lyrics

pub mod app;
pub mod config;
pub mod display;
pub mod error;
pub mod lyrics;
pub mod player;
pub mod sync;
pub mod utils;
