use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Position of the first location candidate returned by the search endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// One day of the forecast window, with the pictogram already resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub weather_description: String,
    pub temperature_instant: f64,
    pub temperature_min: f64,
    pub temperature_max: f64,
    pub precipitation: f64,
    pub precipitation_probability: f64,
    pub windspeed_mean: f64,
}

/// Normalized forecast handed back to the model as the tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastReport {
    /// Provider metadata (resolved name, coordinates, timezone) passed through as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Unit names for the numeric fields, passed through as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<Value>,
    pub days: Vec<DailyForecast>,
}
