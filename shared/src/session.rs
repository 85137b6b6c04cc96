//! Signed-in session and the token refresh gate.
//!
//! The session lives in exactly one place, [`crate::Model::session`], and is
//! mirrored to three key-value entries so a reload can resume it. Hydration
//! is all-or-nothing: a partial set of keys is treated as signed out.
//!
//! Every access token the session has held carries a generation. A 401 for
//! a request sent with an older generation is answered by replaying the
//! request with the current token, never by refreshing again.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::capabilities::{decode_json, KeyNamespace, KvError, KvKey, KvReadResult, KvWrite};
use crate::geo::Coordinate;
use crate::mappers::map_session_user;
use crate::wire::{LoginResponse, RefreshResponse};
use crate::{AppError, AppResult, ErrorKind, OfficeId, UserId};

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const USER_KEY: &str = "user";

/// One of the three entries a session is mirrored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoredEntry {
    AccessToken,
    RefreshToken,
    User,
}

impl StoredEntry {
    pub const ALL: [Self; 3] = [Self::AccessToken, Self::RefreshToken, Self::User];

    #[must_use]
    pub const fn key_name(self) -> &'static str {
        match self {
            Self::AccessToken => ACCESS_TOKEN_KEY,
            Self::RefreshToken => REFRESH_TOKEN_KEY,
            Self::User => USER_KEY,
        }
    }

    pub fn key(self) -> Result<KvKey, KvError> {
        KvKey::new(KeyNamespace::Session, self.key_name())
    }

    const fn slot(self) -> usize {
        match self {
            Self::AccessToken => 0,
            Self::RefreshToken => 1,
            Self::User => 2,
        }
    }
}

/// Gathers the three entry reads, which the shell may answer in any order.
#[derive(Debug, Default)]
pub struct Hydration {
    slots: [Option<Option<Vec<u8>>>; 3],
    error: Option<KvError>,
}

impl Hydration {
    /// Records one read. Once every entry has answered, returns the
    /// restored session (or `None` for an empty store).
    pub fn record(
        &mut self,
        entry: StoredEntry,
        result: KvReadResult,
    ) -> Option<Result<Option<Session>, KvError>> {
        match result {
            Ok(value) => self.slots[entry.slot()] = Some(value),
            Err(e) => {
                self.slots[entry.slot()] = Some(None);
                self.error.get_or_insert(e);
            }
        }
        if self.slots.iter().any(Option::is_none) {
            return None;
        }
        if let Some(e) = self.error.take() {
            return Some(Err(e));
        }
        let values: Vec<Option<Vec<u8>>> =
            self.slots.iter_mut().map(|slot| slot.take().flatten()).collect();
        Some(Session::hydrate(&values))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Police,
}

impl Role {
    #[must_use]
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "police" => Some(Self::Police),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Police => "police",
        }
    }
}

/// Profile of whoever is signed in. Police logins are an office account,
/// so the office id doubles as the user id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub role: Role,
    pub user_id: UserId,
    pub office_id: Option<OfficeId>,
    pub display_name: String,
    pub email: Option<String>,
    pub head_officer: Option<String>,
    pub contact_number: Option<String>,
    pub city: Option<String>,
    pub barangay: Option<String>,
    pub office_coordinate: Option<Coordinate>,
}

impl SessionUser {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

pub struct Session {
    access: SecretString,
    refresh: SecretString,
    user: SessionUser,
    token_generation: u64,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access", &"[REDACTED]")
            .field("refresh", &"[REDACTED]")
            .field("user", &self.user)
            .field("token_generation", &self.token_generation)
            .finish()
    }
}

impl Session {
    #[must_use]
    pub fn new(access: String, refresh: String, user: SessionUser) -> Self {
        Self {
            access: SecretString::new(access),
            refresh: SecretString::new(refresh),
            user,
            token_generation: 0,
        }
    }

    pub fn from_login(response: &LoginResponse) -> AppResult<Self> {
        if response.access.trim().is_empty() || response.refresh.trim().is_empty() {
            return Err(AppError::new(
                ErrorKind::Authentication,
                "Login response did not include tokens.",
            ));
        }
        let user = map_session_user(response)?;
        Ok(Self::new(
            response.access.clone(),
            response.refresh.clone(),
            user,
        ))
    }

    /// Rebuilds a session from stored values, in [`StoredEntry::ALL`]
    /// order. Missing, blank or unreadable entries yield `Ok(None)` only
    /// when every entry is absent; a partial or corrupt set is an error so
    /// the caller can clear it.
    pub fn hydrate(values: &[Option<Vec<u8>>]) -> Result<Option<Self>, KvError> {
        let [access, refresh, user] = values else {
            return Err(KvError::Serialization {
                message: format!("hydrate expected 3 values, got {}", values.len()),
            });
        };
        if access.is_none() && refresh.is_none() && user.is_none() {
            return Ok(None);
        }

        let token = |raw: &Option<Vec<u8>>, name: &str| -> Result<String, KvError> {
            raw.as_deref()
                .and_then(|bytes| std::str::from_utf8(bytes).ok())
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .ok_or_else(|| KvError::Serialization {
                    message: format!("stored {name} is missing or unreadable"),
                })
        };

        let access = token(access, ACCESS_TOKEN_KEY)?;
        let refresh = token(refresh, REFRESH_TOKEN_KEY)?;
        let user: SessionUser =
            decode_json(user.as_deref())?.ok_or_else(|| KvError::Serialization {
                message: "stored user is missing".to_string(),
            })?;

        Ok(Some(Self::new(access, refresh, user)))
    }

    pub fn persist_writes(&self) -> Result<Vec<KvWrite>, KvError> {
        Ok(vec![
            KvWrite::set(
                KeyNamespace::Session,
                ACCESS_TOKEN_KEY,
                self.access.expose_secret().as_bytes().to_vec(),
            )?,
            KvWrite::set(
                KeyNamespace::Session,
                REFRESH_TOKEN_KEY,
                self.refresh.expose_secret().as_bytes().to_vec(),
            )?,
            KvWrite::set_json(KeyNamespace::Session, USER_KEY, &self.user)?,
        ])
    }

    pub fn teardown_writes() -> Result<Vec<KvWrite>, KvError> {
        StoredEntry::ALL
            .into_iter()
            .map(|entry| entry.key().map(KvWrite::delete))
            .collect()
    }

    /// Installs a refreshed access token, and the rotated refresh token when
    /// the backend issued one. Bumps the token generation and returns the
    /// writes for the changed keys.
    pub fn apply_refresh(&mut self, response: &RefreshResponse) -> Result<Vec<KvWrite>, KvError> {
        let mut writes = vec![KvWrite::set(
            KeyNamespace::Session,
            ACCESS_TOKEN_KEY,
            response.access.as_bytes().to_vec(),
        )?];
        let rotated = response.refresh.as_ref().filter(|r| !r.trim().is_empty());
        if let Some(rotated) = rotated {
            writes.push(KvWrite::set(
                KeyNamespace::Session,
                REFRESH_TOKEN_KEY,
                rotated.as_bytes().to_vec(),
            )?);
        }

        self.access = SecretString::new(response.access.clone());
        if let Some(rotated) = rotated {
            self.refresh = SecretString::new(rotated.clone());
        }
        self.token_generation += 1;
        Ok(writes)
    }

    /// Generation of the current access token; starts at 0 and grows with
    /// every refresh.
    #[must_use]
    pub fn token_generation(&self) -> u64 {
        self.token_generation
    }

    #[must_use]
    pub fn access_token(&self) -> &str {
        self.access.expose_secret()
    }

    #[must_use]
    pub fn refresh_token(&self) -> &str {
        self.refresh.expose_secret()
    }

    #[must_use]
    pub fn user(&self) -> &SessionUser {
        &self.user
    }

    #[must_use]
    pub fn office_id(&self) -> Option<&OfficeId> {
        self.user.office_id.as_ref()
    }

    #[must_use]
    pub fn office_coordinate(&self) -> Option<Coordinate> {
        self.user.office_coordinate
    }
}

/// A call waiting on a token refresh, and whether its replay is already
/// the post-401 retry.
#[derive(Debug, Clone, PartialEq)]
pub struct Parked<C> {
    pub call: C,
    pub retried: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateAction {
    /// No refresh is running: the caller must start one.
    StartRefresh,
    /// A refresh is already running; the call will be replayed with it.
    Wait,
}

/// Coordinates token refresh across concurrent callers. At most one
/// refresh is in flight; everything that needs a fresh token parks behind
/// it and is handed back exactly once when it settles.
#[derive(Debug, Clone)]
pub struct RefreshGate<C> {
    in_flight: bool,
    parked: Vec<Parked<C>>,
}

impl<C> Default for RefreshGate<C> {
    fn default() -> Self {
        Self {
            in_flight: false,
            parked: Vec::new(),
        }
    }
}

impl<C> RefreshGate<C> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.in_flight
    }

    #[must_use]
    pub fn parked_len(&self) -> usize {
        self.parked.len()
    }

    /// A call got 401. It will be replayed once after the refresh.
    pub fn park_unauthorized(&mut self, call: C) -> GateAction {
        self.park(Parked {
            call,
            retried: true,
        })
    }

    /// A call issued while a refresh is running waits for the new token.
    /// Its retry flag is kept as-is.
    pub fn park_pending(&mut self, call: C, retried: bool) {
        self.parked.push(Parked { call, retried });
    }

    fn park(&mut self, parked: Parked<C>) -> GateAction {
        self.parked.push(parked);
        if self.in_flight {
            GateAction::Wait
        } else {
            self.in_flight = true;
            GateAction::StartRefresh
        }
    }

    /// The refresh settled, either way. Returns the parked calls for replay
    /// (on success) or disposal (on failure).
    pub fn settle(&mut self) -> Vec<Parked<C>> {
        self.in_flight = false;
        std::mem::take(&mut self.parked)
    }

    pub fn clear(&mut self) {
        self.in_flight = false;
        self.parked.clear();
    }
}
