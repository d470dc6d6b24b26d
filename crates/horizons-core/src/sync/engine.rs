//! Sync engine
//!
//! Owns backend selection, the session lifecycle (create, join, migrate),
//! the merge policy and the background poll that reports remote changes.
//!
//! The engine never keeps a [`Document`] between calls. Shells hand it their
//! local snapshot through [`SyncEngine::sync`] and get the merged snapshot
//! back; remote changes seen by the poller are delivered to callbacks
//! registered with [`SyncEngine::on_change`], and the shell decides whether
//! to adopt them.
//!
//! Failure policy: `sync` never fails. Provider outages degrade to returning
//! the local snapshot. `enable` fails only when both the primary and the
//! secondary provider are unusable, or when the code itself is malformed.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::backend::{BackendRegistry, Provider};
use super::error::{SyncError, SyncResult};
use super::merge::merge;
use super::poller::{spawn_poller, PollControl, PollHandle};
use super::session::{classify, CodeKind, LegacyCode, Session, SessionStore};
use crate::config::SyncSettings;
use crate::models::Document;
use crate::storage::KeyValueStore;

/// Default interval between background polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(12);

/// Receives remote documents whose change-stamp differs from the last seen
pub type ChangeCallback = Arc<dyn Fn(&Document) + Send + Sync>;

/// Snapshot of the engine's state, for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncStatus {
    pub enabled: bool,
    pub provider: Option<Provider>,
    pub session_id: Option<String>,
    pub last_sync: Option<DateTime<Utc>>,
    pub last_seen_stamp: Option<String>,
}

/// What `enable` was asked to do
#[derive(Debug)]
enum EnableTarget {
    Create,
    Join(Session),
    Migrate(LegacyCode),
}

impl EnableTarget {
    fn from_code(code: Option<&str>) -> SyncResult<Self> {
        let Some(code) = code.map(str::trim).filter(|c| !c.is_empty()) else {
            return Ok(EnableTarget::Create);
        };
        match classify(code) {
            CodeKind::Current(session) => Ok(EnableTarget::Join(session)),
            CodeKind::Legacy(legacy) => Ok(EnableTarget::Migrate(legacy)),
            CodeKind::Invalid(code) => Err(SyncError::InvalidSessionCode(code)),
        }
    }
}

#[derive(Debug, Default)]
struct EngineState {
    session: Option<Session>,
    enabled: bool,
    /// Change-stamp of the last document this client wrote or was told about
    last_seen: Option<String>,
    /// Bumped by every enable and disable; stale async work compares against it
    generation: u64,
    last_sync: Option<DateTime<Utc>>,
}

/// State shared with the poll task
struct EngineInner {
    registry: BackendRegistry,
    sessions: SessionStore,
    state: Mutex<EngineState>,
    callbacks: Mutex<Vec<ChangeCallback>>,
    syncs_in_flight: AtomicUsize,
}

/// Marks a `sync` as running for as long as it is alive
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Cloud sync for one local document
pub struct SyncEngine {
    inner: Arc<EngineInner>,
    poll_interval: Duration,
    poller: Mutex<Option<PollHandle>>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("registry", &self.inner.registry)
            .field("poll_interval", &self.poll_interval)
            .field("status", &self.status())
            .finish()
    }
}

impl SyncEngine {
    /// Create a disabled engine over the given adapters and local storage
    pub fn new(registry: BackendRegistry, kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                registry,
                sessions: SessionStore::new(kv),
                state: Mutex::new(EngineState::default()),
                callbacks: Mutex::new(Vec::new()),
                syncs_in_flight: AtomicUsize::new(0),
            }),
            poll_interval: DEFAULT_POLL_INTERVAL,
            poller: Mutex::new(None),
        }
    }

    /// Create an engine talking to the providers named in the settings
    pub fn from_settings(settings: &SyncSettings, kv: Arc<dyn KeyValueStore>) -> Self {
        Self::new(BackendRegistry::from_settings(settings), kv)
            .with_poll_interval(settings.poll_interval())
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Bind to a session and start polling
    ///
    /// - no code: provision a new session on the primary provider
    /// - a current code: join it without provisioning
    /// - a legacy code: copy the old document into a new primary session
    ///
    /// The bound document is then checked and seeded with an empty document
    /// when absent. If the primary provider fails anywhere along the way a
    /// fresh session is provisioned on the secondary instead.
    pub async fn enable(&self, code: Option<&str>) -> SyncResult<()> {
        let target = EnableTarget::from_code(code)?;
        self.stop_poller();

        let registry = &self.inner.registry;
        let primary = registry.primary();
        let secondary = registry.secondary();

        let mut seed = None;
        let mut migrated_from = None;
        let attempt = match target {
            EnableTarget::Create => self.inner.provision(primary, None).await,
            EnableTarget::Join(session) => match self.inner.verify(&session).await {
                Ok(()) => Ok(session),
                Err(e) if session.provider == primary => Err(e),
                Err(e) => {
                    warn!("Could not verify {} session, keeping it: {}", session.provider, e);
                    Ok(session)
                }
            },
            EnableTarget::Migrate(legacy) => {
                let document = self.inner.read_legacy(&legacy).await;
                let result = self.inner.provision(primary, Some(&document)).await;
                seed = Some(document);
                migrated_from = Some(legacy.bucket);
                result
            }
        };

        let session = match attempt {
            Ok(session) => session,
            Err(primary_err) => {
                warn!(
                    "{} unavailable, falling back to {}: {}",
                    primary, secondary, primary_err
                );
                match self.inner.provision(secondary, seed.as_ref()).await {
                    Ok(session) => session,
                    Err(secondary_err) => {
                        self.disable();
                        return Err(SyncError::Exhausted {
                            primary_provider: primary,
                            primary: Box::new(primary_err),
                            secondary_provider: secondary,
                            secondary: Box::new(secondary_err),
                        });
                    }
                }
            }
        };

        if let Some(bucket) = migrated_from {
            info!("Migrated legacy session {} to {}", bucket, session);
        }
        self.inner.bind(&session);

        {
            let mut state = self.inner.lock_state();
            state.session = Some(session.clone());
            state.enabled = true;
            state.last_seen = None;
            state.last_sync = None;
            state.generation += 1;
        }
        self.start_poller();

        info!("Cloud sync enabled on {}", session.provider);
        Ok(())
    }

    /// Reconnect with the persisted session, or provision one
    pub async fn resume(&self) -> SyncResult<()> {
        let code = match self.inner.sessions.resume_code() {
            Ok(code) => code,
            Err(e) => {
                warn!("Could not read saved session, starting fresh: {}", e);
                None
            }
        };
        self.enable(code.as_deref()).await
    }

    /// Stop polling and forget the last seen change-stamp
    ///
    /// Nothing remote is deleted and the session stays bound, so
    /// [`current_session_id`](Self::current_session_id) still reports it.
    /// A `sync` already in flight completes, but its result no longer
    /// updates the engine.
    pub fn disable(&self) {
        self.stop_poller();
        let mut state = self.inner.lock_state();
        if state.enabled {
            info!("Cloud sync disabled");
        }
        state.enabled = false;
        state.last_seen = None;
        state.generation += 1;
    }

    /// Merge `local` with the remote document and write the result back
    ///
    /// Returns the merged document, which the caller should adopt. When
    /// disabled, or when every provider fails, `local` comes back unchanged.
    pub async fn sync(&self, local: Document) -> Document {
        let Some((session, generation)) = self.inner.bound_session() else {
            return local;
        };
        let _in_flight = InFlight::enter(&self.inner.syncs_in_flight);

        let err = match self.inner.sync_once(&session, &local).await {
            Ok(merged) => {
                self.inner.record(generation, &merged);
                return merged;
            }
            Err(e) => e,
        };

        let primary = self.inner.registry.primary();
        if session.provider != primary {
            warn!("Sync with {} failed: {}", session.provider, err);
            return local;
        }

        let secondary = self.inner.registry.secondary();
        warn!("Sync with {} failed, falling back to {}: {}", primary, secondary, err);
        let fallback = match self.inner.provision(secondary, None).await {
            Ok(fallback) => fallback,
            Err(e) => {
                warn!("Fallback to {} failed: {}", secondary, e);
                return local;
            }
        };
        if !self.inner.rebind(generation, &fallback) {
            return local;
        }

        match self.inner.sync_once(&fallback, &local).await {
            Ok(merged) => {
                self.inner.record(generation, &merged);
                merged
            }
            Err(e) => {
                warn!("Sync with {} failed: {}", secondary, e);
                local
            }
        }
    }

    /// Run one poll tick now
    ///
    /// Returns whether change callbacks fired.
    pub async fn poll_now(&self) -> SyncResult<bool> {
        self.inner.tick().await
    }

    /// Register a callback for remote changes
    pub fn on_change<F>(&self, callback: F)
    where
        F: Fn(&Document) + Send + Sync + 'static,
    {
        lock(&self.inner.callbacks).push(Arc::new(callback));
    }

    /// Receive remote changes on a channel instead of a callback
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Document> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.on_change(move |document| {
            let _ = tx.send(document.clone());
        });
        rx
    }

    /// The bound session code (`"<provider>:<id>"`)
    pub fn current_session_id(&self) -> Option<String> {
        self.inner.lock_state().session.as_ref().map(Session::code)
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.lock_state().enabled
    }

    pub fn status(&self) -> SyncStatus {
        let state = self.inner.lock_state();
        SyncStatus {
            enabled: state.enabled,
            provider: state.session.as_ref().map(|s| s.provider),
            session_id: state.session.as_ref().map(Session::code),
            last_sync: state.last_sync,
            last_seen_stamp: state.last_seen.clone(),
        }
    }

    fn start_poller(&self) {
        let weak: Weak<EngineInner> = Arc::downgrade(&self.inner);
        let handle = spawn_poller(self.poll_interval, move || {
            let weak = weak.clone();
            async move {
                let Some(inner) = weak.upgrade() else {
                    return PollControl::Stop;
                };
                if let Err(e) = inner.tick().await {
                    warn!("Poll failed: {}", e);
                }
                PollControl::Continue
            }
        });
        if let Some(previous) = lock(&self.poller).replace(handle) {
            previous.stop();
        }
    }

    /// Stop background polling without disabling sync
    ///
    /// One-shot callers use this once their `sync` is done.
    pub fn stop_poller(&self) {
        if let Some(handle) = lock(&self.poller).take() {
            handle.stop();
        }
    }
}

impl EngineInner {
    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        lock(&self.state)
    }

    /// The session to sync against, when enabled
    fn bound_session(&self) -> Option<(Session, u64)> {
        let state = self.lock_state();
        if !state.enabled {
            return None;
        }
        state
            .session
            .clone()
            .map(|session| (session, state.generation))
    }

    /// Make sure the remote document exists, seeding it when absent
    async fn verify(&self, session: &Session) -> SyncResult<()> {
        let backend = self.registry.get(session.provider)?;
        if backend.fetch(&session.id).await?.is_none() {
            debug!("Seeding empty document for {}", session);
            backend.save(&session.id, &Document::empty()).await?;
        }
        Ok(())
    }

    /// Create a session on `provider`
    ///
    /// With a seed the new document is overwritten with it; otherwise the
    /// document is verified like a joined one.
    async fn provision(&self, provider: Provider, seed: Option<&Document>) -> SyncResult<Session> {
        let backend = self.registry.get(provider)?;
        let id = backend.create_session().await?;
        let session = Session::new(provider, id);
        debug!("Provisioned {}", session);

        match seed {
            Some(document) => backend.save(&session.id, document).await?,
            None => self.verify(&session).await?,
        }
        Ok(session)
    }

    /// Best-effort read of a legacy bucket; any failure yields an empty document
    async fn read_legacy(&self, legacy: &LegacyCode) -> Document {
        let backend = match self.registry.get(Provider::Kvdb) {
            Ok(backend) => backend,
            Err(e) => {
                warn!("Skipping legacy read: {}", e);
                return Document::empty();
            }
        };
        match backend.fetch(&legacy.bucket).await {
            Ok(Some(document)) => {
                info!(
                    "Read {} task(s) from legacy bucket {}",
                    document.tasks.len(),
                    legacy.bucket
                );
                document
            }
            Ok(None) => {
                debug!("Legacy bucket {} is empty", legacy.bucket);
                Document::empty()
            }
            Err(e) => {
                warn!("Could not read legacy bucket {}: {}", legacy.bucket, e);
                Document::empty()
            }
        }
    }

    /// Persist a new binding; failures are logged, never fatal
    fn bind(&self, session: &Session) {
        if let Err(e) = self.sessions.save(session) {
            warn!("Could not persist session {}: {}", session, e);
        }
        if let Err(e) = self.sessions.update_config_session(session) {
            warn!("Could not update sync config: {}", e);
        }
    }

    /// Switch the live binding after a fallback, unless enable/disable ran since
    fn rebind(&self, generation: u64, session: &Session) -> bool {
        {
            let mut state = self.lock_state();
            if !state.enabled || state.generation != generation {
                return false;
            }
            state.session = Some(session.clone());
        }
        info!("Cloud sync moved to {}", session);
        self.bind(session);
        true
    }

    /// fetch, merge, save
    async fn sync_once(&self, session: &Session, local: &Document) -> SyncResult<Document> {
        let backend = self.registry.get(session.provider)?;
        let remote = backend.fetch(&session.id).await?;
        let merged = merge(local.clone(), remote);
        backend.save(&session.id, &merged).await?;
        Ok(merged)
    }

    /// Remember a document this client just wrote so the poller skips it
    fn record(&self, generation: u64, merged: &Document) {
        let mut state = self.lock_state();
        if state.generation != generation {
            return;
        }
        state.last_seen = merged.stamp().map(str::to_string);
        state.last_sync = Some(Utc::now());
    }

    /// One poll: fetch the remote document and notify on a new change-stamp
    async fn tick(&self) -> SyncResult<bool> {
        if self.syncs_in_flight.load(Ordering::SeqCst) > 0 {
            debug!("Sync in flight, skipping poll");
            return Ok(false);
        }
        let Some((session, generation)) = self.bound_session() else {
            return Ok(false);
        };
        let synced_before = self.lock_state().last_sync;

        let backend = self.registry.get(session.provider)?;
        let Some(remote) = backend.fetch(&session.id).await? else {
            return Ok(false);
        };
        let Some(stamp) = remote.stamp() else {
            return Ok(false);
        };

        {
            let mut state = self.lock_state();
            // A sync that ran during the fetch owns last_seen
            if self.syncs_in_flight.load(Ordering::SeqCst) > 0
                || state.last_sync != synced_before
            {
                debug!("Sync ran during poll, dropping fetched snapshot");
                return Ok(false);
            }
            if !state.enabled
                || state.generation != generation
                || state.last_seen.as_deref() == Some(stamp)
            {
                return Ok(false);
            }
            state.last_seen = Some(stamp.to_string());
        }

        debug!("Remote change {} on {}", stamp, session);
        self.notify(&remote);
        Ok(true)
    }

    fn notify(&self, document: &Document) {
        let callbacks = lock(&self.callbacks).clone();
        for callback in callbacks {
            if panic::catch_unwind(AssertUnwindSafe(|| (*callback)(document))).is_err() {
                warn!("Change callback panicked");
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Horizon, Task};
    use crate::storage::{MemoryStore, SESSION_KEY};
    use crate::sync::backend::{Backend, MemoryBackend};
    use tokio::sync::oneshot;

    struct Harness {
        engine: SyncEngine,
        pantry: Arc<MemoryBackend>,
        jsonbin: Arc<MemoryBackend>,
        kvdb: Arc<MemoryBackend>,
        kv: Arc<MemoryStore>,
    }

    fn harness() -> Harness {
        let pantry = Arc::new(MemoryBackend::new(Provider::Pantry));
        let jsonbin = Arc::new(MemoryBackend::new(Provider::JsonBin));
        let kvdb = Arc::new(MemoryBackend::new(Provider::Kvdb));
        let registry = BackendRegistry::new(Provider::Pantry, Provider::JsonBin)
            .with(pantry.clone())
            .with(jsonbin.clone())
            .with(kvdb.clone());
        let kv = Arc::new(MemoryStore::new());
        let engine =
            SyncEngine::new(registry, kv.clone()).with_poll_interval(Duration::from_secs(3600));
        Harness {
            engine,
            pantry,
            jsonbin,
            kvdb,
            kv,
        }
    }

    fn stamped(stamp: &str, ids: &[&str]) -> Document {
        let mut doc = Document::unsaved();
        doc.last_saved = Some(stamp.to_string());
        doc.tasks = ids
            .iter()
            .map(|id| Task::with_id(*id, *id, Horizon::Days))
            .collect();
        doc
    }

    #[tokio::test]
    async fn test_sync_when_disabled_returns_local() {
        let h = harness();
        let local = stamped("2024-01-01T00:00:00.000Z", &["a"]);
        assert_eq!(h.engine.sync(local.clone()).await, local);
        assert_eq!(h.pantry.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_enable_without_code_provisions_primary() {
        let h = harness();
        h.engine.enable(None).await.unwrap();

        let code = h.engine.current_session_id().unwrap();
        assert_eq!(code, "pantry:pantry-1");
        assert!(h.engine.is_enabled());
        assert_eq!(
            h.kv.get(SESSION_KEY).unwrap().as_deref(),
            Some("\"pantry:pantry-1\"")
        );
    }

    #[tokio::test]
    async fn test_enable_rejects_unknown_provider_before_io() {
        let h = harness();
        let err = h.engine.enable(Some("dropbox:abc")).await.unwrap_err();

        assert!(matches!(err, SyncError::InvalidSessionCode(_)));
        assert!(!h.engine.is_enabled());
        assert_eq!(h.pantry.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_join_seeds_missing_document() {
        let h = harness();
        h.engine.enable(Some("jsonbin:shared")).await.unwrap();

        let seeded = h.jsonbin.document("shared").unwrap();
        assert!(seeded.tasks.is_empty());
        assert_eq!(h.pantry.len(), 0);
    }

    #[tokio::test]
    async fn test_join_secondary_keeps_binding_when_unreachable() {
        let h = harness();
        h.jsonbin.set_offline(true);

        h.engine.enable(Some("jsonbin:shared")).await.unwrap();
        assert_eq!(h.engine.current_session_id().as_deref(), Some("jsonbin:shared"));
        assert_eq!(h.pantry.len(), 0);
    }

    #[tokio::test]
    async fn test_enable_exhausted_when_both_fail() {
        let h = harness();
        h.pantry.set_offline(true);
        h.jsonbin.set_offline(true);

        let err = h.engine.enable(None).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::Exhausted {
                primary_provider: Provider::Pantry,
                secondary_provider: Provider::JsonBin,
                ..
            }
        ));
        assert!(!h.engine.is_enabled());
    }

    #[tokio::test]
    async fn test_sync_records_stamp_and_poll_skips_own_write() {
        let h = harness();
        h.engine.enable(None).await.unwrap();

        let local = stamped("2030-01-01T00:00:00.000Z", &["mine"]);
        let merged = h.engine.sync(local.clone()).await;
        assert_eq!(merged, local);
        assert_eq!(
            h.engine.status().last_seen_stamp.as_deref(),
            Some("2030-01-01T00:00:00.000Z")
        );
        assert!(h.engine.status().last_sync.is_some());

        assert!(!h.engine.poll_now().await.unwrap());
    }

    #[tokio::test]
    async fn test_poll_skipped_while_sync_in_flight() {
        let h = harness();
        h.engine.enable(None).await.unwrap();
        let id = h.engine.current_session_id().unwrap();
        h.pantry.insert(
            id.trim_start_matches("pantry:"),
            stamped("2031-01-01T00:00:00.000Z", &[]),
        );

        let guard = InFlight::enter(&h.engine.inner.syncs_in_flight);
        assert!(!h.engine.poll_now().await.unwrap());
        drop(guard);
        assert!(h.engine.poll_now().await.unwrap());
    }

    #[tokio::test]
    async fn test_panicking_callback_does_not_break_poll() {
        let h = harness();
        h.engine.enable(None).await.unwrap();
        h.engine.on_change(|_| panic!("boom"));
        let mut rx = h.engine.subscribe();

        let id = h.engine.current_session_id().unwrap();
        let remote = stamped("2031-01-01T00:00:00.000Z", &["r"]);
        h.pantry.insert(id.trim_start_matches("pantry:"), remote.clone());

        assert!(h.engine.poll_now().await.unwrap());
        assert_eq!(rx.try_recv().unwrap(), remote);
    }

    #[tokio::test]
    async fn test_disable_keeps_session_and_clears_stamp() {
        let h = harness();
        h.engine.enable(None).await.unwrap();
        h.engine.sync(stamped("2030-01-01T00:00:00.000Z", &[])).await;

        h.engine.disable();
        let status = h.engine.status();
        assert!(!status.enabled);
        assert_eq!(status.last_seen_stamp, None);
        assert_eq!(status.session_id.as_deref(), Some("pantry:pantry-1"));
        assert!(!h.engine.poll_now().await.unwrap());
        assert!(h.kvdb.is_empty());
    }

    /// Pantry stand-in that can hold one fetch response in transit
    struct SlowPantry {
        inner: MemoryBackend,
        parked: Mutex<Option<(oneshot::Sender<()>, oneshot::Receiver<()>)>>,
    }

    impl SlowPantry {
        fn new() -> Self {
            Self {
                inner: MemoryBackend::new(Provider::Pantry),
                parked: Mutex::new(None),
            }
        }

        /// Park the next fetch after it has read the document
        ///
        /// Returns a receiver that fires once the fetch is parked and a
        /// sender that lets it finish.
        fn park_next_fetch(&self) -> (oneshot::Receiver<()>, oneshot::Sender<()>) {
            let (entered_tx, entered_rx) = oneshot::channel();
            let (release_tx, release_rx) = oneshot::channel();
            *self.parked.lock().unwrap() = Some((entered_tx, release_rx));
            (entered_rx, release_tx)
        }
    }

    #[async_trait::async_trait]
    impl Backend for SlowPantry {
        fn provider(&self) -> Provider {
            Provider::Pantry
        }

        async fn create_session(&self) -> SyncResult<String> {
            self.inner.create_session().await
        }

        async fn fetch(&self, id: &str) -> SyncResult<Option<Document>> {
            let snapshot = self.inner.fetch(id).await;
            let parked = self.parked.lock().unwrap().take();
            if let Some((entered, release)) = parked {
                let _ = entered.send(());
                let _ = release.await;
            }
            snapshot
        }

        async fn save(&self, id: &str, document: &Document) -> SyncResult<()> {
            self.inner.save(id, document).await
        }
    }

    #[tokio::test]
    async fn test_poll_keeps_stamp_recorded_by_concurrent_sync() {
        let pantry = Arc::new(SlowPantry::new());
        let registry = BackendRegistry::new(Provider::Pantry, Provider::JsonBin)
            .with(pantry.clone())
            .with(Arc::new(MemoryBackend::new(Provider::JsonBin)));
        let engine = SyncEngine::new(registry, Arc::new(MemoryStore::new()))
            .with_poll_interval(Duration::from_secs(3600));
        engine.enable(None).await.unwrap();
        let id = engine.current_session_id().unwrap();
        pantry.inner.insert(
            id.trim_start_matches("pantry:"),
            stamped("2030-01-01T00:00:00.000Z", &["old"]),
        );

        let (entered, release) = pantry.park_next_fetch();
        let inner = engine.inner.clone();
        let poll = tokio::spawn(async move { inner.tick().await });
        entered.await.unwrap();

        engine.sync(stamped("2031-01-01T00:00:00.000Z", &["new"])).await;
        release.send(()).unwrap();

        assert!(!poll.await.unwrap().unwrap());
        assert_eq!(
            engine.status().last_seen_stamp.as_deref(),
            Some("2031-01-01T00:00:00.000Z")
        );
        engine.stop_poller();
    }
}
