//! Meteoblue daily pictogram codes and their descriptions.

use std::collections::BTreeMap;

use crate::error::FetchError;

const METEOBLUE_DAY_PICTOGRAMS: [(i64, &str); 17] = [
    (1, "Sunny, cloudless sky"),
    (2, "Sunny and few clouds"),
    (3, "Partly cloudy"),
    (4, "Overcast"),
    (5, "Fog"),
    (6, "Overcast with rain"),
    (7, "Mixed with showers"),
    (8, "Showers, thunderstorms likely"),
    (9, "Overcast with snow"),
    (10, "Mixed with snow showers"),
    (11, "Mostly cloudy with a mixture of snow and rain"),
    (12, "Overcast with light rain"),
    (13, "Overcast with light snow"),
    (14, "Mostly cloudy with rain"),
    (15, "Mostly cloudy with snow"),
    (16, "Mostly cloudy with light rain"),
    (17, "Mostly cloudy with light snow"),
];

/// Code -> description lookup used to make forecasts readable for the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PictogramTable {
    entries: BTreeMap<i64, String>,
}

impl PictogramTable {
    /// The exhaustive table for Meteoblue's `basic-day` package (codes 1..=17).
    pub fn meteoblue() -> Self {
        Self::from_entries(METEOBLUE_DAY_PICTOGRAMS.iter().map(|(code, text)| (*code, *text)))
    }

    pub fn from_entries<'a>(entries: impl IntoIterator<Item = (i64, &'a str)>) -> Self {
        Self {
            entries: entries.into_iter().map(|(code, text)| (code, text.to_string())).collect(),
        }
    }

    /// Resolves a code; codes outside the table are never guessed.
    pub fn describe(&self, code: i64) -> Result<&str, FetchError> {
        self.entries
            .get(&code)
            .map(String::as_str)
            .ok_or_else(|| FetchError::missing_weather(format!("pictogram table (code {code})")))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PictogramTable {
    fn default() -> Self {
        Self::meteoblue()
    }
}
