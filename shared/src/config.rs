//! Runtime settings handed to the core by the shell.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::geo::EtaModel;
use crate::polling::PollChannel;
use crate::{
    AppError, ErrorKind, DEFAULT_CHAT_POLL_MS, DEFAULT_DASHBOARD_POLL_MS,
    DEFAULT_GEOCODE_CACHE_CAPACITY, DEFAULT_LIVE_MAP_POLL_MS, DEFAULT_NOTIFIER_POLL_MS,
    DEFAULT_UTC_OFFSET_MINUTES, MAX_POLL_INTERVAL_MS,
    MIN_POLL_INTERVAL_MS,
};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api/";

/// Offsets outside UTC-12:00..UTC+14:00 do not exist.
const MIN_UTC_OFFSET_MINUTES: i32 = -12 * 60;
const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("api_base_url '{0}' is not a valid http(s) URL")]
    InvalidBaseUrl(String),
    #[error("eta model needs a positive speed and non-negative overhead")]
    InvalidEtaModel,
    #[error("utc_offset_minutes {0} is out of range")]
    InvalidUtcOffset(i32),
    #[error("config is not valid JSON: {0}")]
    Parse(String),
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::new(ErrorKind::Validation, e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollIntervals {
    pub notifier_ms: u64,
    pub dashboard_ms: u64,
    pub live_map_ms: u64,
    pub chat_ms: u64,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            notifier_ms: DEFAULT_NOTIFIER_POLL_MS,
            dashboard_ms: DEFAULT_DASHBOARD_POLL_MS,
            live_map_ms: DEFAULT_LIVE_MAP_POLL_MS,
            chat_ms: DEFAULT_CHAT_POLL_MS,
        }
    }
}

impl PollIntervals {
    /// Clamped into the supported 3 s to 15 s band.
    #[must_use]
    pub fn for_channel(&self, channel: PollChannel) -> u64 {
        let raw = match channel {
            PollChannel::Notifier => self.notifier_ms,
            PollChannel::Dashboard => self.dashboard_ms,
            PollChannel::LiveMap => self.live_map_ms,
            PollChannel::Chat => self.chat_ms,
        };
        raw.clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub api_base_url: String,
    pub poll: PollIntervals,
    pub eta: EtaModel,
    /// Fixed offset used to turn "now" into a local time of day for
    /// checkpoint schedules.
    pub utc_offset_minutes: i32,
    pub geocode_cache_capacity: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            poll: PollIntervals::default(),
            eta: EtaModel::default(),
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
            geocode_cache_capacity: DEFAULT_GEOCODE_CACHE_CAPACITY,
        }
    }
}

impl DashboardConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()
    }

    /// Checks every field and normalizes the base URL so relative endpoint
    /// paths join under it.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        self.api_base_url = normalize_base_url(&self.api_base_url)?.to_string();

        if !self.eta.is_valid() {
            return Err(ConfigError::InvalidEtaModel);
        }
        if !(MIN_UTC_OFFSET_MINUTES..=MAX_UTC_OFFSET_MINUTES).contains(&self.utc_offset_minutes) {
            return Err(ConfigError::InvalidUtcOffset(self.utc_offset_minutes));
        }
        self.geocode_cache_capacity = self.geocode_cache_capacity.max(1);
        Ok(self)
    }

    pub fn base_url(&self) -> Result<Url, ConfigError> {
        normalize_base_url(&self.api_base_url)
    }
}

fn normalize_base_url(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&with_slash).map_err(|_| ConfigError::InvalidBaseUrl(raw.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(ConfigError::InvalidBaseUrl(raw.to_string()));
    }
    Ok(url)
}
