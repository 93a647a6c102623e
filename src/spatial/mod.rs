pub mod distance;
pub mod error;
pub mod interpolator;
pub mod location_table;
