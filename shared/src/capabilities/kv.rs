use crux_kv::KeyValue;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::event::Event;

pub type KvCapability = KeyValue<Event>;

pub const MAX_KEY_LENGTH: usize = 256;
pub const MAX_VALUE_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KvKey {
    namespace: KeyNamespace,
    key: String,
}

impl KvKey {
    pub fn new(namespace: KeyNamespace, key: impl Into<String>) -> Result<Self, KvError> {
        let key = key.into();
        Self::validate_key(&key)?;
        Ok(Self { namespace, key })
    }

    /// Storage key as the shell sees it, e.g. `session:access_token`.
    #[must_use]
    pub fn raw(&self) -> String {
        format!("{}:{}", self.namespace.prefix(), self.key)
    }

    #[must_use]
    pub fn namespace(&self) -> KeyNamespace {
        self.namespace
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Reads the stored value; a missing key resolves as `Ok(None)`.
    pub fn read<F>(&self, kv: &KvCapability, make_event: F)
    where
        F: FnOnce(KvReadResult) -> Event + Send + Sync + 'static,
    {
        kv.get(self.raw(), move |result| {
            make_event(result.map_err(|e| KvError::from_shell(&e)))
        });
    }

    fn validate_key(key: &str) -> Result<(), KvError> {
        if key.trim().is_empty() {
            return Err(KvError::InvalidKey {
                key: key.to_string(),
                reason: "key cannot be empty".to_string(),
            });
        }

        if key.len() > MAX_KEY_LENGTH {
            return Err(KvError::InvalidKey {
                key: key.chars().take(50).collect::<String>() + "...",
                reason: format!("key exceeds maximum length of {MAX_KEY_LENGTH} bytes"),
            });
        }

        if key.contains("..") || key.starts_with('/') || key.starts_with('\\') {
            return Err(KvError::InvalidKey {
                key: key.to_string(),
                reason: "key cannot look like a path".to_string(),
            });
        }

        if key.chars().any(char::is_control) {
            return Err(KvError::InvalidKey {
                key: key.escape_default().to_string(),
                reason: "key contains control characters".to_string(),
            });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyNamespace {
    Session,
}

impl KeyNamespace {
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Session => "session",
        }
    }
}

/// A validated write against the shell's store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvWrite {
    Set { key: KvKey, value: Vec<u8> },
    Delete { key: KvKey },
}

impl KvWrite {
    pub fn set(
        namespace: KeyNamespace,
        key: impl Into<String>,
        value: Vec<u8>,
    ) -> Result<Self, KvError> {
        if value.len() > MAX_VALUE_SIZE {
            return Err(KvError::ValueTooLarge {
                size: value.len(),
                max: MAX_VALUE_SIZE,
            });
        }
        Ok(Self::Set {
            key: KvKey::new(namespace, key)?,
            value,
        })
    }

    pub fn set_json<T: Serialize>(
        namespace: KeyNamespace,
        key: impl Into<String>,
        value: &T,
    ) -> Result<Self, KvError> {
        let data = serde_json::to_vec(value).map_err(|e| KvError::Serialization {
            message: e.to_string(),
        })?;
        Self::set(namespace, key, data)
    }

    #[must_use]
    pub fn delete(key: KvKey) -> Self {
        Self::Delete { key }
    }

    #[must_use]
    pub fn key(&self) -> &KvKey {
        match self {
            Self::Set { key, .. } | Self::Delete { key } => key,
        }
    }

    pub fn send<F>(self, kv: &KvCapability, make_event: F)
    where
        F: FnOnce(KvWriteResult) -> Event + Send + Sync + 'static,
    {
        match self {
            Self::Set { key, value } => kv.set(key.raw(), value, move |result| {
                make_event(result.map(|_| ()).map_err(|e| KvError::from_shell(&e)))
            }),
            Self::Delete { key } => kv.delete(key.raw(), move |result| {
                make_event(result.map(|_| ()).map_err(|e| KvError::from_shell(&e)))
            }),
        }
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum KvError {
    #[error("invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("value too large: {size} bytes exceeds maximum of {max} bytes")]
    ValueTooLarge { size: usize, max: usize },

    #[error("serialization error: {message}")]
    Serialization { message: String },

    #[error("storage unavailable: {message}")]
    Unavailable { message: String },
}

impl KvError {
    fn from_shell(error: &impl std::fmt::Debug) -> Self {
        Self::Unavailable {
            message: format!("{error:?}"),
        }
    }
}

pub type KvReadResult = Result<Option<Vec<u8>>, KvError>;
pub type KvWriteResult = Result<(), KvError>;

/// Decodes a stored JSON value, treating absence as `None`.
pub fn decode_json<T: DeserializeOwned>(raw: Option<&[u8]>) -> Result<Option<T>, KvError> {
    raw.map(|bytes| {
        serde_json::from_slice(bytes).map_err(|e| KvError::Serialization {
            message: e.to_string(),
        })
    })
    .transpose()
}
