//! Validated request building on top of `crux_http`.
//!
//! Requests are assembled and checked here, then handed to the shell through
//! [`HttpCapability`]. Whatever comes back, including 401 and 5xx, is folded
//! into an [`HttpResponse`] so the update loop sees one shape.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crux_http::Http;

use crate::event::Event;

pub type HttpCapability = Http<Event>;

pub const MAX_URL_LENGTH: usize = 2048;
pub const MAX_REQUEST_BODY_SIZE: usize = 50 * 1024 * 1024;
pub const MAX_HEADER_NAME_LENGTH: usize = 256;
pub const MAX_HEADER_VALUE_LENGTH: usize = 8192;
pub const MAX_HEADERS_COUNT: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpHeaders {
    headers: Vec<(String, String)>,
}

impl HttpHeaders {
    #[must_use]
    pub fn new() -> Self {
        Self {
            headers: Vec::new(),
        }
    }

    /// Inserts a header, replacing any existing value with the same
    /// case-insensitive name.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), HttpError> {
        let name = name.into();
        let value = value.into();

        Self::validate_header_name(&name)?;
        Self::validate_header_value(&name, &value)?;

        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));

        if self.headers.len() >= MAX_HEADERS_COUNT {
            return Err(HttpError::TooManyHeaders {
                count: self.headers.len(),
                max: MAX_HEADERS_COUNT,
            });
        }

        self.headers.push((name, value));
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    fn validate_header_name(name: &str) -> Result<(), HttpError> {
        if name.is_empty() {
            return Err(HttpError::InvalidHeader {
                name: String::new(),
                reason: "header name cannot be empty".to_string(),
            });
        }

        if name.len() > MAX_HEADER_NAME_LENGTH {
            return Err(HttpError::InvalidHeader {
                name: name.chars().take(50).collect::<String>() + "...",
                reason: format!(
                    "header name exceeds maximum length of {MAX_HEADER_NAME_LENGTH} bytes"
                ),
            });
        }

        if let Some(c) = name
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && *c != '-' && *c != '_')
        {
            return Err(HttpError::InvalidHeader {
                name: name.to_string(),
                reason: format!("invalid character '{c}' in header name"),
            });
        }

        if name.eq_ignore_ascii_case("host")
            || name.eq_ignore_ascii_case("content-length")
            || name.eq_ignore_ascii_case("transfer-encoding")
        {
            return Err(HttpError::InvalidHeader {
                name: name.to_string(),
                reason: "this header is managed by the shell".to_string(),
            });
        }

        Ok(())
    }

    fn validate_header_value(name: &str, value: &str) -> Result<(), HttpError> {
        if value.len() > MAX_HEADER_VALUE_LENGTH {
            return Err(HttpError::InvalidHeader {
                name: name.to_string(),
                reason: format!(
                    "header value exceeds maximum length of {MAX_HEADER_VALUE_LENGTH} bytes"
                ),
            });
        }

        if value.chars().any(|c| c == '\r' || c == '\n' || c == '\0') {
            return Err(HttpError::InvalidHeader {
                name: name.to_string(),
                reason: "header value contains CR, LF or NUL".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for HttpHeaders {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
}

impl HttpMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    #[must_use]
    pub const fn has_request_body(self) -> bool {
        matches!(self, Self::Post | Self::Patch)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `multipart/form-data` part.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        content_type: String,
        bytes: Vec<u8>,
    },
}

/// `multipart/form-data` body for media uploads. `crux_http` only carries
/// raw bytes, so the form is encoded here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartForm {
    boundary: String,
    parts: Vec<FormPart>,
}

impl MultipartForm {
    #[must_use]
    pub fn new() -> Self {
        Self {
            boundary: format!("----dispatch-{}", uuid::Uuid::new_v4().simple()),
            parts: Vec::new(),
        }
    }

    #[must_use]
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        self.parts.push(FormPart::File {
            name: name.into(),
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        });
        self
    }

    #[must_use]
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for part in &self.parts {
            out.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
            match part {
                FormPart::Text { name, value } => {
                    out.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                            escape_quotes(name)
                        )
                        .as_bytes(),
                    );
                    out.extend_from_slice(value.as_bytes());
                }
                FormPart::File {
                    name,
                    file_name,
                    content_type,
                    bytes,
                } => {
                    out.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                            escape_quotes(name),
                            escape_quotes(file_name),
                            content_type
                        )
                        .as_bytes(),
                    );
                    out.extend_from_slice(bytes);
                }
            }
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        out
    }
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

fn escape_quotes(value: &str) -> String {
    value.replace('"', "%22").replace(['\r', '\n'], " ")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequest {
    method: HttpMethod,
    url: String,
    headers: HttpHeaders,
    #[serde(with = "serde_bytes")]
    body: Vec<u8>,
    request_id: String,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: &Url) -> Result<Self, HttpError> {
        let raw = url.as_str();
        if raw.len() > MAX_URL_LENGTH {
            return Err(HttpError::InvalidUrl {
                url: raw.chars().take(100).collect(),
                reason: format!("URL exceeds maximum length of {MAX_URL_LENGTH} bytes"),
            });
        }
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(HttpError::InvalidUrl {
                url: raw.to_string(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(HttpError::InvalidUrl {
                url: raw.to_string(),
                reason: "credentials in URL are not allowed".to_string(),
            });
        }

        let request_id = uuid::Uuid::new_v4().to_string();
        let mut headers = HttpHeaders::new();
        headers.insert("Accept", "application/json")?;
        headers.insert("X-Request-Id", request_id.as_str())?;

        Ok(Self {
            method,
            url: raw.to_string(),
            headers,
            body: Vec::new(),
            request_id,
        })
    }

    pub fn with_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, HttpError> {
        self.headers.insert(name, value)?;
        Ok(self)
    }

    pub fn with_bearer(self, token: &str) -> Result<Self, HttpError> {
        self.with_header("Authorization", format!("Bearer {token}"))
    }

    pub fn with_json<T: Serialize>(mut self, value: &T) -> Result<Self, HttpError> {
        self.ensure_body_allowed()?;
        let body = serde_json::to_vec(value).map_err(|e| HttpError::Serialization {
            message: e.to_string(),
        })?;
        Self::ensure_body_size(body.len())?;
        self.headers.insert("Content-Type", "application/json")?;
        self.body = body;
        Ok(self)
    }

    pub fn with_multipart(mut self, form: &MultipartForm) -> Result<Self, HttpError> {
        self.ensure_body_allowed()?;
        let body = form.encode();
        Self::ensure_body_size(body.len())?;
        self.headers.insert("Content-Type", form.content_type())?;
        self.body = body;
        Ok(self)
    }

    fn ensure_body_allowed(&self) -> Result<(), HttpError> {
        if self.method.has_request_body() {
            Ok(())
        } else {
            Err(HttpError::InvalidRequest {
                reason: format!("{} requests cannot have a body", self.method),
            })
        }
    }

    fn ensure_body_size(size: usize) -> Result<(), HttpError> {
        if size > MAX_REQUEST_BODY_SIZE {
            return Err(HttpError::BodyTooLarge {
                size,
                max: MAX_REQUEST_BODY_SIZE,
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn headers(&self) -> &HttpHeaders {
        &self.headers
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Hands the request to the shell. The outcome comes back through
    /// `make_event` once the shell resolves it.
    pub fn send<F>(self, http: &HttpCapability, make_event: F)
    where
        F: FnOnce(HttpResult) -> Event + Send + 'static,
    {
        let Self {
            method,
            url,
            headers,
            body,
            ..
        } = self;

        let mut builder = match method {
            HttpMethod::Get => http.get(&url),
            HttpMethod::Post => http.post(&url),
            HttpMethod::Patch => http.patch(&url),
            HttpMethod::Delete => http.delete(&url),
        };
        // Body first: setting it would otherwise default the content type.
        if !body.is_empty() {
            builder = builder.body_bytes(body);
        }
        for (name, value) in headers.iter() {
            builder = builder.header(name, value);
        }

        builder.send(move |result| make_event(HttpResponse::from_shell(result)));
    }
}

/// Request-building and transport failures. A response with any status
/// code, including 401 and 5xx, resolves as `Ok(HttpResponse)`.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum HttpError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("too many headers: {count} exceeds maximum of {max}")]
    TooManyHeaders { count: usize, max: usize },

    #[error("request body too large: {size} bytes exceeds maximum of {max} bytes")]
    BodyTooLarge { size: usize, max: usize },

    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("serialization error: {message}")]
    Serialization { message: String },

    #[error("connection failed: {message}")]
    Connection { message: String },

    #[error("invalid response: {reason}")]
    InvalidResponse { reason: String },
}

impl HttpError {
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpResponse {
    status: u16,
    headers: HttpHeaders,
    #[serde(with = "serde_bytes")]
    body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn new(status: u16, headers: HttpHeaders, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Folds a `crux_http` outcome into a response. Depending on how the
    /// shell reports it, a non-2xx status arrives either as a response or
    /// as `HttpError::Http`; both become a plain response here.
    fn from_shell(result: crux_http::Result<crux_http::Response<Vec<u8>>>) -> HttpResult {
        match result {
            Ok(mut response) => {
                let status = u16::from(response.status());
                let mut headers = HttpHeaders::new();
                if let Some(values) = response.header("content-type") {
                    headers.insert("Content-Type", values.last().as_str())?;
                }
                let body = response.take_body().unwrap_or_default();
                Ok(Self::new(status, headers, body))
            }
            Err(crux_http::Error::Http(error)) => Ok(Self::new(
                u16::from(error.code),
                HttpHeaders::new(),
                error.body.unwrap_or_default(),
            )),
            Err(other) => Err(HttpError::Connection {
                message: other.to_string(),
            }),
        }
    }

    /// Shorthand for JSON payloads.
    pub fn json_body<T: Serialize>(status: u16, value: &T) -> Result<Self, HttpError> {
        let body = serde_json::to_vec(value).map_err(|e| HttpError::Serialization {
            message: e.to_string(),
        })?;
        let mut headers = HttpHeaders::new();
        headers.insert("Content-Type", "application/json")?;
        Ok(Self::new(status, headers, body))
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    #[must_use]
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, HttpError> {
        serde_json::from_slice(&self.body).map_err(|e| HttpError::InvalidResponse {
            reason: format!("failed to parse JSON: {e}"),
        })
    }
}

pub type HttpResult = Result<HttpResponse, HttpError>;
