pub mod error;
pub mod loader;
pub mod matching;
pub mod synthetic;
