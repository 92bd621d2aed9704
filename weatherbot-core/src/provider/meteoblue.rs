use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{
    Config,
    config::ServiceId,
    error::FetchError,
    model::{Coordinates, DailyForecast, ForecastReport},
    pictogram::PictogramTable,
};

use super::ForecastSource;

const LOCATION: &str = "location";
const FORECAST: &str = "forecast";

/// Fixed forecast window: the 7-day daily basic package as JSON.
const FORECAST_WINDOW: [(&str, &str); 2] = [("format", "json"), ("forecast_days", "7")];

/// Per-day arrays that must accompany `pictocode` in `data_day`.
const DAY_FIELDS: [&str; 7] = [
    "time",
    "temperature_instant",
    "temperature_min",
    "temperature_max",
    "precipitation",
    "precipitation_probability",
    "windspeed_mean",
];

/// Endpoints and credentials for the two-stage lookup.
#[derive(Debug, Clone)]
pub struct MeteoblueSettings {
    pub api_key: String,
    pub location_url: String,
    pub forecast_url: String,
    pub timeout: Duration,
}

impl MeteoblueSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.require_api_key(ServiceId::Meteoblue)?;
        let mb = &config.meteoblue;

        Ok(Self {
            api_key: api_key.to_owned(),
            location_url: mb.location_url.clone(),
            forecast_url: mb.forecast_url.clone(),
            timeout: Duration::from_secs(mb.timeout_secs),
        })
    }
}

/// Location search followed by a forecast request, then pictogram resolution.
#[derive(Debug, Clone)]
pub struct WeatherLookupPipeline {
    settings: MeteoblueSettings,
    pictograms: PictogramTable,
    http: Client,
}

impl WeatherLookupPipeline {
    pub fn new(settings: MeteoblueSettings, pictograms: PictogramTable) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.timeout)
            .build()
            .context("Failed to build HTTP client for Meteoblue")?;

        Ok(Self { settings, pictograms, http })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(MeteoblueSettings::from_config(config)?, PictogramTable::meteoblue())
    }

    /// First search candidate for `location_text`.
    pub async fn resolve_location(&self, location_text: &str) -> Result<Coordinates, FetchError> {
        let query = [("query", location_text), ("key", self.settings.api_key.as_str())];
        let body = self.get_body(LOCATION, &self.settings.location_url, &query).await?;

        let parsed: Value = serde_json::from_str(&body).map_err(|e| malformed(LOCATION, e))?;

        let latitude = parsed
            .pointer("/results/0/lat")
            .and_then(Value::as_f64)
            .ok_or_else(|| FetchError::missing_location("results[0].lat"))?;
        let longitude = parsed
            .pointer("/results/0/lon")
            .and_then(Value::as_f64)
            .ok_or_else(|| FetchError::missing_location("results[0].lon"))?;

        debug!(latitude, longitude, "Resolved location");
        Ok(Coordinates { latitude, longitude })
    }

    /// Forecast for already resolved coordinates.
    pub async fn forecast_at(&self, coords: Coordinates) -> Result<ForecastReport, FetchError> {
        let lat = coords.latitude.to_string();
        let lon = coords.longitude.to_string();

        let mut query: Vec<(&str, &str)> = FORECAST_WINDOW.to_vec();
        query.extend([
            ("lat", lat.as_str()),
            ("lon", lon.as_str()),
            ("apikey", self.settings.api_key.as_str()),
        ]);

        let body = self.get_body(FORECAST, &self.settings.forecast_url, &query).await?;
        if body.trim().is_empty() {
            return Err(FetchError::EmptyForecast);
        }

        let parsed: Value = serde_json::from_str(&body).map_err(|e| malformed(FORECAST, e))?;
        transform_forecast(parsed, &self.pictograms)
    }

    async fn get_body(
        &self,
        endpoint: &'static str,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<String, FetchError> {
        debug!(endpoint, url, "Sending Meteoblue request");

        let res = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| classify(endpoint, e))?;

        let status = res.status();
        let body = res.text().await.map_err(|e| classify(endpoint, e))?;

        if !status.is_success() {
            return Err(FetchError::Status { endpoint, status, body: truncate_body(&body) });
        }

        Ok(body)
    }
}

#[async_trait]
impl ForecastSource for WeatherLookupPipeline {
    async fn fetch_forecast(&self, location_text: &str) -> Result<ForecastReport, FetchError> {
        info!(location = location_text, "Fetching forecast");

        let coords = self.resolve_location(location_text).await.inspect_err(|e| {
            warn!(error = %e, "Location lookup failed");
        })?;

        self.forecast_at(coords).await.inspect_err(|e| {
            warn!(error = %e, "Forecast lookup failed");
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawDataDay {
    time: Vec<String>,
    pictocode: Vec<i64>,
    temperature_instant: Vec<f64>,
    temperature_min: Vec<f64>,
    temperature_max: Vec<f64>,
    precipitation: Vec<f64>,
    precipitation_probability: Vec<f64>,
    windspeed_mean: Vec<f64>,
}

impl RawDataDay {
    fn column_lengths(&self) -> [(&'static str, usize); 8] {
        [
            ("time", self.time.len()),
            ("pictocode", self.pictocode.len()),
            ("temperature_instant", self.temperature_instant.len()),
            ("temperature_min", self.temperature_min.len()),
            ("temperature_max", self.temperature_max.len()),
            ("precipitation", self.precipitation.len()),
            ("precipitation_probability", self.precipitation_probability.len()),
            ("windspeed_mean", self.windspeed_mean.len()),
        ]
    }
}

/// Turns the raw `basic-day` payload into day rows with readable weather descriptions.
pub(crate) fn transform_forecast(
    mut raw: Value,
    pictograms: &PictogramTable,
) -> Result<ForecastReport, FetchError> {
    if raw.is_null() {
        return Err(FetchError::EmptyForecast);
    }

    let data_day = raw
        .get_mut("data_day")
        .map(Value::take)
        .filter(|v| !v.is_null())
        .ok_or_else(|| FetchError::missing_weather("data_day"))?;

    if data_day.get("pictocode").is_none() {
        return Err(FetchError::missing_weather("data_day.pictocode"));
    }
    if let Some(field) = DAY_FIELDS.iter().find(|f| data_day.get(**f).is_none()) {
        return Err(FetchError::missing_weather(format!("data_day.{field}")));
    }

    let days: RawDataDay = serde_json::from_value(data_day).map_err(|e| malformed(FORECAST, e))?;

    let expected = days.time.len();
    if let Some((field, len)) = days.column_lengths().into_iter().find(|(_, len)| *len != expected) {
        return Err(FetchError::MalformedResponse {
            endpoint: FORECAST,
            detail: format!("data_day.{field} has {len} entries, expected {expected}"),
        });
    }
    if expected == 0 {
        return Err(FetchError::EmptyForecast);
    }

    let mut rows = Vec::with_capacity(expected);
    for i in 0..expected {
        let date = NaiveDate::parse_from_str(&days.time[i], "%Y-%m-%d").map_err(|e| {
            FetchError::MalformedResponse {
                endpoint: FORECAST,
                detail: format!("invalid date '{}': {e}", days.time[i]),
            }
        })?;

        rows.push(DailyForecast {
            date,
            weather_description: pictograms.describe(days.pictocode[i])?.to_string(),
            temperature_instant: days.temperature_instant[i],
            temperature_min: days.temperature_min[i],
            temperature_max: days.temperature_max[i],
            precipitation: days.precipitation[i],
            precipitation_probability: days.precipitation_probability[i],
            windspeed_mean: days.windspeed_mean[i],
        });
    }

    Ok(ForecastReport {
        metadata: raw.get_mut("metadata").map(Value::take),
        units: raw.get_mut("units").map(Value::take),
        days: rows,
    })
}

fn classify(endpoint: &'static str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout { endpoint }
    } else {
        FetchError::Transport { endpoint, source: err }
    }
}

fn malformed(endpoint: &'static str, err: serde_json::Error) -> FetchError {
    FetchError::MalformedResponse { endpoint, detail: err.to_string() }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn location_body() -> Value {
        json!({
            "query": "Bern",
            "results": [
                {"name": "Bern", "country": "Switzerland", "lat": 46.948, "lon": 7.447},
                {"name": "Bern", "country": "United States", "lat": 35.1, "lon": -77.04}
            ]
        })
    }

    fn forecast_body() -> Value {
        json!({
            "metadata": {"name": "Bern", "latitude": 46.948, "longitude": 7.447, "timezone_abbrevation": "CEST"},
            "units": {"temperature": "C", "precipitation": "mm", "windspeed": "ms-1"},
            "data_day": {
                "time": ["2024-09-20", "2024-09-21", "2024-09-22", "2024-09-23", "2024-09-24", "2024-09-25", "2024-09-26"],
                "pictocode": [1, 2, 3, 4, 6, 16, 17],
                "temperature_instant": [15.2, 14.1, 13.0, 12.5, 11.9, 10.0, 9.5],
                "temperature_min": [9.1, 8.3, 7.7, 7.0, 6.2, 5.0, 4.1],
                "temperature_max": [21.0, 19.4, 17.2, 16.8, 15.0, 13.3, 12.1],
                "precipitation": [0.0, 0.0, 0.2, 1.4, 6.5, 2.0, 0.8],
                "precipitation_probability": [0, 5, 20, 45, 90, 60, 35],
                "windspeed_mean": [2.1, 2.4, 3.0, 3.3, 4.8, 3.9, 2.2]
            }
        })
    }

    fn pipeline_for(server: &MockServer, timeout: Duration) -> WeatherLookupPipeline {
        WeatherLookupPipeline::new(
            MeteoblueSettings {
                api_key: "MB_KEY".into(),
                location_url: server.url("/en/server/search/query3"),
                forecast_url: server.url("/packages/basic-day"),
                timeout,
            },
            PictogramTable::meteoblue(),
        )
        .unwrap()
    }

    #[test]
    fn settings_require_api_key() {
        let err = MeteoblueSettings::from_config(&Config::default()).unwrap_err();
        assert!(err.to_string().contains("weatherbot configure meteoblue"));
    }

    #[tokio::test]
    async fn resolves_location_then_fetches_forecast() {
        let server = MockServer::start_async().await;

        let location = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/en/server/search/query3")
                    .query_param("query", "Bern")
                    .query_param("key", "MB_KEY");
                then.status(200).json_body(location_body());
            })
            .await;
        let forecast = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/packages/basic-day")
                    .query_param("format", "json")
                    .query_param("forecast_days", "7")
                    .query_param("lat", "46.948")
                    .query_param("lon", "7.447")
                    .query_param("apikey", "MB_KEY");
                then.status(200).json_body(forecast_body());
            })
            .await;

        let report = pipeline_for(&server, Duration::from_secs(5))
            .fetch_forecast("Bern")
            .await
            .unwrap();

        location.assert_async().await;
        forecast.assert_async().await;

        assert_eq!(report.days.len(), 7);
        assert_eq!(report.days[0].date, NaiveDate::from_ymd_opt(2024, 9, 20).unwrap());
        assert_eq!(report.days[0].weather_description, "Sunny, cloudless sky");
        assert_eq!(report.days[4].weather_description, "Overcast with rain");
        assert_eq!(report.days[4].precipitation_probability, 90.0);
        assert_eq!(report.days[6].temperature_max, 12.1);
        assert_eq!(report.units.as_ref().unwrap()["temperature"], "C");
    }

    #[tokio::test]
    async fn report_has_descriptions_instead_of_pictocodes() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/en/server/search/query3");
                then.status(200).json_body(location_body());
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/packages/basic-day");
                then.status(200).json_body(forecast_body());
            })
            .await;

        let report = pipeline_for(&server, Duration::from_secs(5)).fetch_forecast("Bern").await.unwrap();
        let serialized = serde_json::to_string(&report).unwrap();

        assert!(!serialized.contains("pictocode"));
        assert!(serialized.contains("weather_description"));
    }

    #[tokio::test]
    async fn same_query_twice_gives_identical_reports() {
        let server = MockServer::start_async().await;
        let location = server
            .mock_async(|when, then| {
                when.method(GET).path("/en/server/search/query3");
                then.status(200).json_body(location_body());
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/packages/basic-day");
                then.status(200).json_body(forecast_body());
            })
            .await;

        let pipeline = pipeline_for(&server, Duration::from_secs(5));
        let first = pipeline.fetch_forecast("Bern").await.unwrap();
        let second = pipeline.fetch_forecast("Bern").await.unwrap();

        assert_eq!(location.hits_async().await, 2);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn empty_results_never_reach_forecast_endpoint() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/en/server/search/query3");
                then.status(200).json_body(json!({"query": "Atlantis", "results": []}));
            })
            .await;
        let forecast = server
            .mock_async(|when, then| {
                when.method(GET).path("/packages/basic-day");
                then.status(200).json_body(forecast_body());
            })
            .await;

        let err = pipeline_for(&server, Duration::from_secs(5))
            .fetch_forecast("Atlantis")
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::MissingField { .. }), "{err:?}");
        assert!(!err.is_fatal());
        assert_eq!(forecast.hits_async().await, 0);
    }

    #[tokio::test]
    async fn invalid_forecast_json_is_malformed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/en/server/search/query3");
                then.status(200).json_body(location_body());
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/packages/basic-day");
                then.status(200).body("{\"data_day\": {\"pictocode\": [1, 2,");
            })
            .await;

        let err = pipeline_for(&server, Duration::from_secs(5))
            .fetch_forecast("Bern")
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::MalformedResponse { endpoint: FORECAST, .. }), "{err:?}");
    }

    #[tokio::test]
    async fn invalid_location_json_is_malformed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/en/server/search/query3");
                then.status(200).body("<html>maintenance</html>");
            })
            .await;

        let err = pipeline_for(&server, Duration::from_secs(5))
            .fetch_forecast("Bern")
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::MalformedResponse { endpoint: LOCATION, .. }), "{err:?}");
    }

    #[tokio::test]
    async fn http_error_status_is_fatal() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/en/server/search/query3");
                then.status(401).body("invalid api key");
            })
            .await;

        let err = pipeline_for(&server, Duration::from_secs(5))
            .fetch_forecast("Bern")
            .await
            .unwrap_err();

        assert!(err.is_fatal());
        let msg = err.to_string();
        assert!(msg.contains("401"), "{msg}");
        assert!(msg.contains("invalid api key"), "{msg}");
    }

    #[tokio::test]
    async fn slow_endpoint_is_transient() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/en/server/search/query3");
                then.status(200).delay(Duration::from_secs(2)).json_body(location_body());
            })
            .await;

        let err = pipeline_for(&server, Duration::from_millis(200))
            .fetch_forecast("Bern")
            .await
            .unwrap_err();

        assert!(err.is_transient(), "{err:?}");
        assert!(err.to_string().contains("Please try again"));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_fatal() {
        let pipeline = WeatherLookupPipeline::new(
            MeteoblueSettings {
                api_key: "MB_KEY".into(),
                location_url: "http://127.0.0.1:1/query3".into(),
                forecast_url: "http://127.0.0.1:1/basic-day".into(),
                timeout: Duration::from_secs(2),
            },
            PictogramTable::meteoblue(),
        )
        .unwrap();

        let err = pipeline.fetch_forecast("Bern").await.unwrap_err();
        assert!(matches!(err, FetchError::Transport { endpoint: LOCATION, .. }), "{err:?}");
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn empty_forecast_body_is_terminal_for_request() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/en/server/search/query3");
                then.status(200).json_body(location_body());
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/packages/basic-day");
                then.status(200).body("");
            })
            .await;

        let err = pipeline_for(&server, Duration::from_secs(5))
            .fetch_forecast("Bern")
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::EmptyForecast));
        assert!(!err.is_fatal());
    }

    #[test]
    fn unknown_pictocode_is_missing_field() {
        let mut body = forecast_body();
        body["data_day"]["pictocode"][3] = json!(42);

        let err = transform_forecast(body, &PictogramTable::meteoblue()).unwrap_err();
        assert!(matches!(err, FetchError::MissingField { .. }));
        assert!(err.to_string().contains("code 42"));
    }

    #[test]
    fn missing_day_columns_are_missing_fields() {
        let mut body = forecast_body();
        body["data_day"].as_object_mut().unwrap().remove("windspeed_mean");
        let err = transform_forecast(body, &PictogramTable::meteoblue()).unwrap_err();
        assert!(err.to_string().contains("data_day.windspeed_mean"));

        let err = transform_forecast(json!({"metadata": {}}), &PictogramTable::meteoblue()).unwrap_err();
        assert!(matches!(err, FetchError::MissingField { .. }));
        assert!(err.to_string().contains("data_day"));
    }

    #[test]
    fn ragged_columns_are_malformed() {
        let mut body = forecast_body();
        body["data_day"]["temperature_min"].as_array_mut().unwrap().pop();

        let err = transform_forecast(body, &PictogramTable::meteoblue()).unwrap_err();
        assert!(matches!(err, FetchError::MalformedResponse { .. }));
        assert!(err.to_string().contains("temperature_min has 6 entries, expected 7"));
    }

    #[test]
    fn null_payload_is_empty_forecast() {
        let err = transform_forecast(Value::Null, &PictogramTable::meteoblue()).unwrap_err();
        assert!(matches!(err, FetchError::EmptyForecast));
    }
}
