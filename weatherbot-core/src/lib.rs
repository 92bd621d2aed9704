//! Core library for the `weatherbot` console assistant.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The Meteoblue lookup pipeline (location search, forecast, pictogram resolution)
//! - Chat-completions wire types and client
//! - Finish-reason validation and the conversation orchestrator
//!
//! It is used by `weatherbot-cli`, but the orchestrator only depends on the
//! [`ChatBackend`], [`ForecastSource`] and [`Console`] traits, so other front ends can reuse it.

pub mod chat;
pub mod config;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod pictogram;
pub mod provider;
pub mod tools;
pub mod validator;

pub use chat::{ChatBackend, Message, OpenAiClient};
pub use config::{Config, ServiceId};
pub use error::{FetchError, SessionError, ToolError, ValidationError};
pub use model::{Coordinates, DailyForecast, ForecastReport};
pub use orchestrator::{Console, ConversationHistory, ConversationOrchestrator};
pub use pictogram::PictogramTable;
pub use provider::{ForecastSource, MeteoblueSettings, WeatherLookupPipeline};
