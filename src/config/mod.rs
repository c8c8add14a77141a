// Configuration model and loading

mod loader;

pub use loader::*;
