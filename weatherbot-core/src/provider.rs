use crate::{ForecastReport, error::FetchError};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod meteoblue;

pub use meteoblue::{MeteoblueSettings, WeatherLookupPipeline};

/// Resolves free-text locations to a normalized forecast.
#[async_trait]
pub trait ForecastSource: Send + Sync + Debug {
    async fn fetch_forecast(&self, location_text: &str) -> Result<ForecastReport, FetchError>;
}
