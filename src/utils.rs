// Shared helpers

mod string;

pub use string::*;
