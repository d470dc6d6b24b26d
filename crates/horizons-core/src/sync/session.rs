//! Session codes and their local persistence
//!
//! A session binds a client to one remote document. It travels as an opaque
//! code `"<provider>:<id>"` that users copy between devices. Older releases
//! handed out bare KVDB bucket names instead; [`classify`] recognizes those
//! so the engine can migrate them.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::backend::Provider;
use super::error::{SyncError, SyncResult};
use crate::storage::{get_json, set_json, KeyValueStore, SESSION_KEY, SYNC_CONFIG_KEY};

/// Shortest bare code treated as a legacy bucket name
pub const LEGACY_MIN_LEN: usize = 10;

/// A (provider, remote id) binding
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Session {
    pub provider: Provider,
    pub id: String,
}

impl Session {
    pub fn new(provider: Provider, id: impl Into<String>) -> Self {
        Self {
            provider,
            id: id.into(),
        }
    }

    /// The shareable code for this session
    pub fn code(&self) -> String {
        encode(self.provider, &self.id)
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.id)
    }
}

impl FromStr for Session {
    type Err = SyncError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        decode(code)
    }
}

/// How a legacy code was recognized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyKind {
    /// `kvdb:<bucket>`
    TaggedKvdb,
    /// Bare alphanumeric bucket name
    BareBucket,
}

/// A code from the retired KVDB generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyCode {
    pub bucket: String,
    pub kind: LegacyKind,
}

/// Result of inspecting a user-supplied code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeKind {
    /// Binds directly, no provisioning
    Current(Session),
    /// Needs one-time migration to the primary provider
    Legacy(LegacyCode),
    /// Cannot be used
    Invalid(String),
}

/// Encode a session code
pub fn encode(provider: Provider, id: &str) -> String {
    format!("{}:{}", provider, id)
}

/// Decode a tagged session code
///
/// Splits on the first `:`; the id may itself contain colons.
pub fn decode(code: &str) -> SyncResult<Session> {
    let code = code.trim();
    let (tag, id) = code
        .split_once(':')
        .ok_or_else(|| SyncError::InvalidSessionCode(code.to_string()))?;
    let provider: Provider = tag
        .parse()
        .map_err(|_| SyncError::InvalidSessionCode(code.to_string()))?;
    let id = id.trim();
    if id.is_empty() {
        return Err(SyncError::InvalidSessionCode(code.to_string()));
    }
    Ok(Session::new(provider, id))
}

/// Whether a bare code looks like an old KVDB bucket name
pub fn is_legacy_bare(code: &str) -> bool {
    code.len() >= LEGACY_MIN_LEN && code.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Decide how a user-supplied code should be handled
///
/// - `kvdb:<bucket>` and bare alphanumeric codes of at least
///   [`LEGACY_MIN_LEN`] characters are legacy
/// - `pantry:<id>` and `jsonbin:<id>` are current
/// - any other bare code is taken as a Pantry id
/// - an unknown tag or an empty id is invalid
pub fn classify(code: &str) -> CodeKind {
    let code = code.trim();
    if code.is_empty() {
        return CodeKind::Invalid(String::new());
    }

    if !code.contains(':') {
        if is_legacy_bare(code) {
            return CodeKind::Legacy(LegacyCode {
                bucket: code.to_string(),
                kind: LegacyKind::BareBucket,
            });
        }
        return CodeKind::Current(Session::new(Provider::Pantry, code));
    }

    match decode(code) {
        Ok(session) if session.provider == Provider::Kvdb => CodeKind::Legacy(LegacyCode {
            bucket: session.id,
            kind: LegacyKind::TaggedKvdb,
        }),
        Ok(session) => CodeKind::Current(session),
        Err(_) => CodeKind::Invalid(code.to_string()),
    }
}

/// Persisted auto-reconnect settings (`sync-config`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Local persistence of the session code and auto-reconnect settings
#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// The persisted session code, if any
    pub fn load_code(&self) -> SyncResult<Option<String>> {
        let code: Option<String> = get_json(self.kv.as_ref(), SESSION_KEY)?;
        Ok(code.filter(|c| !c.trim().is_empty()))
    }

    /// The code to reconnect with: `sync-session`, else `sync-config.sessionId`
    pub fn resume_code(&self) -> SyncResult<Option<String>> {
        if let Some(code) = self.load_code()? {
            return Ok(Some(code));
        }
        Ok(self
            .load_config()?
            .and_then(|config| config.session_id)
            .filter(|c| !c.trim().is_empty()))
    }

    pub fn save(&self, session: &Session) -> SyncResult<()> {
        set_json(self.kv.as_ref(), SESSION_KEY, &session.code())?;
        Ok(())
    }

    pub fn clear(&self) -> SyncResult<()> {
        self.kv.remove(SESSION_KEY)?;
        Ok(())
    }

    pub fn load_config(&self) -> SyncResult<Option<SyncConfig>> {
        Ok(get_json(self.kv.as_ref(), SYNC_CONFIG_KEY)?)
    }

    pub fn save_config(&self, config: &SyncConfig) -> SyncResult<()> {
        set_json(self.kv.as_ref(), SYNC_CONFIG_KEY, config)?;
        Ok(())
    }

    /// Point an existing `sync-config` at a new session
    ///
    /// Leaves the key untouched when it was never written.
    pub fn update_config_session(&self, session: &Session) -> SyncResult<bool> {
        if self.kv.get(SYNC_CONFIG_KEY)?.is_none() {
            return Ok(false);
        }
        let config = SyncConfig {
            enabled: true,
            session_id: Some(session.code()),
        };
        self.save_config(&config)?;
        Ok(true)
    }
}
