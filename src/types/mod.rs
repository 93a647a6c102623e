pub mod date_range;
pub mod forecast_point;
pub mod location;
pub mod observation;
pub mod weather_condition;
