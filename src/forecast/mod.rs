pub mod cache;
pub mod error;
pub mod fallback;
pub mod fitter;
pub mod report;
pub mod seasonal;
