//! Application core for the police-office incident dashboard.
//!
//! The shell renders [`ViewModel`] and executes the effects requested through
//! [`Capabilities`]; everything else (session lifecycle, token refresh,
//! polling, new-report detection, chat reconciliation, checkpoint schedules,
//! distance and ETA estimates) lives here.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod api;
pub mod app;
pub mod capabilities;
pub mod chat;
pub mod config;
pub mod domain;
pub mod event;
pub mod geo;
pub mod mappers;
pub mod model;
pub mod polling;
pub mod schedule;
pub mod session;
pub mod view;
pub mod wire;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use config::DashboardConfig;
pub use event::Event;
pub use model::Model;
pub use view::ViewModel;

use capabilities::{HttpError, KvError};

pub const MIN_POLL_INTERVAL_MS: u64 = 3_000;
pub const MAX_POLL_INTERVAL_MS: u64 = 15_000;
pub const DEFAULT_NOTIFIER_POLL_MS: u64 = 10_000;
pub const DEFAULT_DASHBOARD_POLL_MS: u64 = 15_000;
pub const DEFAULT_LIVE_MAP_POLL_MS: u64 = 5_000;
pub const DEFAULT_CHAT_POLL_MS: u64 = 3_000;
pub const MAX_IMAGES_PER_REPORT: usize = 3;
pub const MAX_VIDEOS_PER_REPORT: usize = 2;
pub const MAX_MEDIA_BYTES: usize = 15 * 1024 * 1024;
pub const MAX_MESSAGE_LENGTH: usize = 2_000;
pub const DESCRIPTION_PREVIEW_LENGTH: usize = 80;
pub const DEFAULT_ANALYTICS_DAYS: u32 = 30;
pub const DEFAULT_GEOCODE_CACHE_CAPACITY: usize = 128;
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 8 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Network,
    Timeout,
    Authentication,
    Authorization,
    Validation,
    NotFound,
    Conflict,
    RateLimited,
    Storage,
    Serialization,
    Deserialization,
    InvalidState,
    Internal,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Authentication => "AUTH_ERROR",
            Self::Authorization => "FORBIDDEN",
            Self::Validation => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::RateLimited => "RATE_LIMITED",
            Self::Storage => "STORAGE_ERROR",
            Self::Serialization => "SERIALIZATION_ERROR",
            Self::Deserialization => "DESERIALIZATION_ERROR",
            Self::InvalidState => "INVALID_STATE",
            Self::Internal => "INTERNAL_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::Network | Self::Timeout | Self::RateLimited | Self::Storage | Self::Conflict => {
                ErrorSeverity::Transient
            }

            Self::Serialization | Self::Deserialization | Self::InvalidState | Self::Internal => {
                ErrorSeverity::Fatal
            }

            Self::Authentication
            | Self::Authorization
            | Self::Validation
            | Self::NotFound
            | Self::Unknown => ErrorSeverity::Permanent,
        }
    }

    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::RateLimited | Self::Storage | Self::Conflict
        )
    }

    #[must_use]
    pub const fn http_status_hint(self) -> Option<u16> {
        match self {
            Self::Authentication => Some(401),
            Self::Authorization => Some(403),
            Self::NotFound => Some(404),
            Self::Conflict => Some(409),
            Self::RateLimited => Some(429),
            Self::Validation => Some(400),
            Self::Internal => Some(500),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    pub internal_message: Option<String>,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            internal_message: None,
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable() && !matches!(self.severity, ErrorSeverity::Fatal)
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Network => {
                "Unable to reach the server. Check your connection and try again.".into()
            }
            ErrorKind::Timeout => "The server took too long to respond. Please try again.".into(),
            ErrorKind::Authentication => {
                "Your session has expired. Please sign in again.".into()
            }
            ErrorKind::Authorization => {
                "You don't have permission to perform this action.".into()
            }
            ErrorKind::Validation | ErrorKind::NotFound | ErrorKind::Conflict => {
                self.message.clone()
            }
            ErrorKind::RateLimited => "Too many requests. Please wait a moment and try again.".into(),
            ErrorKind::Storage => "Unable to access saved sign-in data.".into(),
            ErrorKind::Serialization | ErrorKind::Deserialization => {
                "The server sent data the dashboard could not read.".into()
            }
            ErrorKind::InvalidState => {
                "The dashboard is in an unexpected state. Please reload the page.".into()
            }
            ErrorKind::Internal | ErrorKind::Unknown => {
                "Something went wrong. Please try again.".into()
            }
        }
    }

    /// Maps a non-success backend response. `subject` names the resource
    /// for 404s ("Report", "Checkpoint").
    #[must_use]
    pub fn from_http_status(status: u16, body: Option<&[u8]>, subject: &str) -> Self {
        let detail = body.and_then(backend_detail);

        let (kind, message) = match status {
            400 | 422 => (
                ErrorKind::Validation,
                detail
                    .clone()
                    .unwrap_or_else(|| "The request was rejected as invalid.".to_string()),
            ),
            401 => (
                ErrorKind::Authentication,
                detail.clone().unwrap_or_else(|| "Not authenticated.".into()),
            ),
            403 => (
                ErrorKind::Authorization,
                "You don't have permission to perform this action.".to_string(),
            ),
            404 => (ErrorKind::NotFound, format!("{subject} not found.")),
            408 => (ErrorKind::Timeout, "Request timed out.".to_string()),
            409 => (
                ErrorKind::Conflict,
                detail
                    .clone()
                    .unwrap_or_else(|| "This action conflicts with a recent change.".into()),
            ),
            429 => (ErrorKind::RateLimited, "Too many requests.".to_string()),
            500..=599 => (ErrorKind::Internal, format!("Server error ({status}).")),
            _ => (ErrorKind::Unknown, format!("Unexpected response ({status}).")),
        };

        let error = Self::new(kind, message).with_context("http_status", status.to_string());
        match detail {
            Some(d) if kind == ErrorKind::Internal => error.with_internal(d),
            _ => error,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

/// Pulls a human-readable message out of a backend error body.
///
/// The backend answers with `{"detail": ...}` for most failures,
/// `{"error": ...}` from the geocoder, and DRF field errors shaped like
/// `{"field": ["msg"]}` for validation.
#[must_use]
pub fn backend_detail(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    let object = value.as_object()?;

    for key in ["detail", "error", "message"] {
        if let Some(text) = object.get(key).and_then(serde_json::Value::as_str) {
            if !text.trim().is_empty() {
                return Some(text.to_string());
            }
        }
    }

    object.iter().find_map(|(field, v)| {
        let first = match v {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Array(items) => {
                items.first().and_then(|i| i.as_str()).map(str::to_string)
            }
            _ => None,
        }?;
        if field == "non_field_errors" {
            Some(first)
        } else {
            Some(format!("{field}: {first}"))
        }
    })
}

impl From<HttpError> for AppError {
    fn from(e: HttpError) -> Self {
        let kind = match &e {
            HttpError::Connection { .. } => ErrorKind::Network,
            HttpError::InvalidResponse { .. } => ErrorKind::Deserialization,
            HttpError::Serialization { .. } => ErrorKind::Serialization,
            HttpError::InvalidUrl { .. }
            | HttpError::InvalidHeader { .. }
            | HttpError::TooManyHeaders { .. }
            | HttpError::BodyTooLarge { .. }
            | HttpError::InvalidRequest { .. } => ErrorKind::Internal,
        };
        Self::new(kind, e.to_string()).with_internal(format!("{e:?}"))
    }
}

impl From<KvError> for AppError {
    fn from(e: KvError) -> Self {
        Self::new(ErrorKind::Storage, e.to_string())
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Backend report UUID.
    ReportId
);
string_id!(CheckpointId);
string_id!(
    /// Server message id, or a `temp-` prefixed id while a send is in flight.
    MessageId
);
string_id!(MediaId);
string_id!(
    /// Police office UUID. Police logins use it as their user id.
    OfficeId
);
string_id!(UserId);

impl MessageId {
    pub const TEMP_PREFIX: &'static str = "temp-";

    #[must_use]
    pub fn temporary() -> Self {
        Self(format!("{}{}", Self::TEMP_PREFIX, uuid::Uuid::new_v4()))
    }

    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(Self::TEMP_PREFIX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct UnixTimeMs(pub u64);

impl UnixTimeMs {
    #[must_use]
    pub const fn elapsed_since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    #[must_use]
    pub const fn add_millis(self, ms: u64) -> Self {
        Self(self.0.saturating_add(ms))
    }

    #[must_use]
    pub const fn is_after(self, other: Self) -> bool {
        self.0 > other.0
    }
}

#[must_use]
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let mut preview: String = trimmed.chars().take(max_chars.saturating_sub(1)).collect();
    preview.push('…');
    preview
}
