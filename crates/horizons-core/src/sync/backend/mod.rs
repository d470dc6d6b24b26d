//! Storage provider adapters
//!
//! Each free, keyless key-value service sits behind the same [`Backend`]
//! trait: provision a remote document, fetch it, overwrite it. The engine
//! picks an adapter by the [`Provider`] tag of the current session, so there
//! is no per-provider branching outside this module.
//!
//! - [`PantryBackend`]: first-choice provider
//! - [`JsonBinBackend`]: fallback provider
//! - [`KvdbBackend`]: retired generation, read only during migration
//! - [`MemoryBackend`]: in-process provider for tests

mod jsonbin;
mod kvdb;
mod memory;
mod pantry;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::{SyncError, SyncResult};
use super::transport::Transport;
use crate::config::SyncSettings;
use crate::models::Document;

pub use jsonbin::JsonBinBackend;
pub use kvdb::{KvdbBackend, LEGACY_KVDB_KEY};
pub use memory::MemoryBackend;
pub use pantry::PantryBackend;

/// Storage provider tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Pantry,
    JsonBin,
    Kvdb,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Pantry, Provider::JsonBin, Provider::Kvdb];

    /// Tag used in session codes
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Pantry => "pantry",
            Provider::JsonBin => "jsonbin",
            Provider::Kvdb => "kvdb",
        }
    }

    /// Whether new sessions may be created on this provider
    pub fn is_current_generation(&self) -> bool {
        !matches!(self, Provider::Kvdb)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Provider::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown provider '{}'. Valid: pantry, jsonbin, kvdb", s))
    }
}

/// Uniform capability over one storage provider
#[async_trait]
pub trait Backend: Send + Sync {
    /// Which provider this adapter talks to
    fn provider(&self) -> Provider;

    /// Provision a new remote document, initialized to an empty [`Document`]
    ///
    /// Returns the provider-specific identifier.
    async fn create_session(&self) -> SyncResult<String>;

    /// Fetch the remote document
    ///
    /// `Ok(None)` when the document does not exist (404) or its payload is
    /// malformed. Any other non-2xx status or network failure is an error.
    async fn fetch(&self, id: &str) -> SyncResult<Option<Document>>;

    /// Overwrite the remote document wholesale
    async fn save(&self, id: &str, document: &Document) -> SyncResult<()>;
}

/// Adapters keyed by provider, plus the first-choice and fallback roles
#[derive(Clone)]
pub struct BackendRegistry {
    backends: HashMap<Provider, Arc<dyn Backend>>,
    primary: Provider,
    secondary: Provider,
}

impl BackendRegistry {
    /// Create an empty registry with the given roles
    pub fn new(primary: Provider, secondary: Provider) -> Self {
        Self {
            backends: HashMap::new(),
            primary,
            secondary,
        }
    }

    /// Build the HTTP adapters described by the sync settings
    pub fn from_settings(settings: &SyncSettings) -> Self {
        let transport = Transport::new(settings.request_timeout());
        Self::new(settings.primary, settings.secondary)
            .with(Arc::new(PantryBackend::new(
                transport.clone(),
                &settings.pantry_url,
                &settings.basket,
            )))
            .with(Arc::new(JsonBinBackend::new(
                transport.clone(),
                &settings.jsonbin_url,
            )))
            .with(Arc::new(KvdbBackend::new(transport, &settings.kvdb_url)))
    }

    /// Register an adapter, replacing any previous one for its provider
    pub fn with(mut self, backend: Arc<dyn Backend>) -> Self {
        self.register(backend);
        self
    }

    pub fn register(&mut self, backend: Arc<dyn Backend>) {
        self.backends.insert(backend.provider(), backend);
    }

    pub fn get(&self, provider: Provider) -> SyncResult<Arc<dyn Backend>> {
        self.backends
            .get(&provider)
            .cloned()
            .ok_or(SyncError::BackendUnavailable(provider))
    }

    pub fn primary(&self) -> Provider {
        self.primary
    }

    pub fn secondary(&self) -> Provider {
        self.secondary
    }

    /// Registered providers, sorted by tag
    pub fn providers(&self) -> Vec<Provider> {
        let mut providers: Vec<_> = self.backends.keys().copied().collect();
        providers.sort_by_key(|p| p.as_str());
        providers
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("providers", &self.providers())
            .field("primary", &self.primary)
            .field("secondary", &self.secondary)
            .finish()
    }
}

/// Map a non-2xx response to an error
pub(crate) fn unexpected_status(provider: Provider, status: u16, url: &str) -> SyncError {
    SyncError::UnexpectedStatus {
        provider,
        status,
        url: url.to_string(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_tags() {
        assert_eq!(Provider::JsonBin.to_string(), "jsonbin");
        assert_eq!("PANTRY".parse::<Provider>().unwrap(), Provider::Pantry);
        assert_eq!("kvdb".parse::<Provider>().unwrap(), Provider::Kvdb);
        assert!("dropbox".parse::<Provider>().is_err());
        assert!(!Provider::Kvdb.is_current_generation());
    }

    #[test]
    fn test_provider_serde_uses_tags() {
        assert_eq!(
            serde_json::to_string(&Provider::JsonBin).unwrap(),
            "\"jsonbin\""
        );
        let p: Provider = serde_json::from_str("\"pantry\"").unwrap();
        assert_eq!(p, Provider::Pantry);
    }

    #[test]
    fn test_registry_lookup() {
        let registry = BackendRegistry::new(Provider::Pantry, Provider::JsonBin)
            .with(Arc::new(MemoryBackend::new(Provider::Pantry)));

        assert!(registry.get(Provider::Pantry).is_ok());
        assert!(matches!(
            registry.get(Provider::JsonBin),
            Err(SyncError::BackendUnavailable(Provider::JsonBin))
        ));
        assert_eq!(registry.providers(), vec![Provider::Pantry]);
    }

    #[test]
    fn test_registry_from_settings_has_all_adapters() {
        let registry = BackendRegistry::from_settings(&SyncSettings::default());
        assert_eq!(registry.providers().len(), 3);
        assert_eq!(registry.primary(), Provider::Pantry);
        assert_eq!(registry.secondary(), Provider::JsonBin);
    }
}
