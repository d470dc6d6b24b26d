//! Sync command handlers
//!
//! Every command here runs one engine for the lifetime of the process.
//! Only `sync watch` keeps the poller running; the others stop it as soon
//! as their sync is done.

use anyhow::{bail, Context, Result};
use tracing::debug;

use horizons_core::sync::{decode, SessionStore, SyncConfig};
use horizons_core::{FileStore, SyncEngine, TaskStore};

use crate::output::{Output, OutputFormat};

/// Whether the user turned sync on (`sync-config.enabled`)
pub fn sync_enabled(sessions: &SessionStore) -> bool {
    sessions
        .load_config()
        .ok()
        .flatten()
        .is_some_and(|config| config.enabled)
}

fn require_enabled(sessions: &SessionStore) -> Result<()> {
    if !sync_enabled(sessions) {
        bail!(
            "Sync is not enabled. Enable it with:\n  \
             horizons sync enable\n  \
             horizons sync enable --join <CODE>"
        );
    }
    Ok(())
}

/// Merge the local document with the remote one and adopt the result
///
/// Returns whether the local tasks changed. Fails when no provider could
/// be reached, in which case the local document is left as it was.
async fn sync_and_adopt(engine: &SyncEngine, store: &mut TaskStore) -> Result<bool> {
    let previous = engine.status().last_sync;
    let local = store.document().clone();
    let merged = engine.sync(local.clone()).await;

    let current = engine.status().last_sync;
    if current.is_none() || current == previous {
        bail!("No sync provider could be reached; tasks are kept on this device");
    }
    if merged == local {
        return Ok(false);
    }
    store.adopt(merged)?;
    Ok(true)
}

/// Sync now
pub async fn now(
    engine: &SyncEngine,
    sessions: &SessionStore,
    store: &mut TaskStore,
    output: &Output,
) -> Result<()> {
    require_enabled(sessions)?;

    output.message("Connecting to sync provider...");
    engine
        .resume()
        .await
        .context("Could not connect to a sync provider")?;

    let result = sync_and_adopt(engine, store).await;
    engine.stop_poller();

    if result? {
        output.success("Sync complete - tasks updated");
        output.message(&format!("  Tasks: {}", store.tasks().len()));
    } else {
        output.success("Sync complete - already up to date");
    }
    Ok(())
}

/// Create a session, or join one with `code`
pub async fn enable(
    engine: &SyncEngine,
    sessions: &SessionStore,
    store: &mut TaskStore,
    code: Option<String>,
    output: &Output,
) -> Result<()> {
    engine
        .enable(code.as_deref())
        .await
        .context("Failed to enable sync")?;

    let session_id = engine.current_session_id();
    sessions.save_config(&SyncConfig {
        enabled: true,
        session_id: session_id.clone(),
    })?;

    let synced = sync_and_adopt(engine, store).await;
    engine.stop_poller();
    if let Err(e) = synced {
        output.warn(&format!("Initial sync failed: {}", e));
    }

    let session_id = session_id.unwrap_or_default();
    match output.format {
        OutputFormat::Json => output.json(&serde_json::json!({
            "status": "enabled",
            "session_id": session_id,
            "tasks": store.tasks().len(),
        })),
        OutputFormat::Quiet => println!("{}", session_id),
        OutputFormat::Human => {
            output.success("Sync enabled");
            println!();
            println!("Session code: {}", session_id);
            println!();
            println!("Use this code to sync another device:");
            println!("  horizons sync enable --join {}", session_id);
        }
    }
    Ok(())
}

/// Turn sync off, keeping the session for a later `enable`
pub fn disable(sessions: &SessionStore, output: &Output) -> Result<()> {
    let mut config = sessions.load_config()?.unwrap_or_default();
    if config.session_id.is_none() {
        config.session_id = sessions.load_code()?;
    }
    config.enabled = false;
    sessions.save_config(&config)?;

    output.success("Sync disabled. Tasks stay on this device.");
    Ok(())
}

/// Show the persisted sync state (no network access)
pub fn status(
    sessions: &SessionStore,
    store: &TaskStore,
    files: &FileStore,
    output: &Output,
) -> Result<()> {
    let enabled = sync_enabled(sessions);
    let code = sessions.resume_code()?;
    let provider = code
        .as_deref()
        .and_then(|c| decode(c).ok())
        .map(|session| session.provider);
    let last_saved = store.document().stamp();

    match output.format {
        OutputFormat::Json => output.json(&serde_json::json!({
            "enabled": enabled,
            "session_id": code,
            "provider": provider,
            "last_saved": last_saved,
            "tasks": store.tasks().len(),
            "storage": {
                "location": files.dir(),
                "size": files.total_size(),
            },
        })),
        OutputFormat::Quiet => {
            if let Some(ref code) = code {
                println!("{}", code);
            }
        }
        OutputFormat::Human => {
            println!("Sync:");
            println!(
                "  Status:     {}",
                if enabled { "enabled" } else { "disabled" }
            );
            println!(
                "  Session:    {}",
                code.as_deref().unwrap_or("(none)")
            );
            if let Some(provider) = provider {
                println!("  Provider:   {}", provider);
            }
            println!();
            println!("Local:");
            println!("  Tasks:      {}", store.tasks().len());
            println!("  Last saved: {}", last_saved.unwrap_or("(never)"));
            println!("  Location:   {}", files.dir().display());
            println!("  Size:       {} bytes", files.total_size());
        }
    }
    Ok(())
}

/// Poll for remote changes and adopt accepted ones until Ctrl-C
pub async fn watch(
    engine: &SyncEngine,
    sessions: &SessionStore,
    store: &mut TaskStore,
    interval_secs: u64,
    output: &Output,
) -> Result<()> {
    require_enabled(sessions)?;
    engine
        .resume()
        .await
        .context("Could not connect to a sync provider")?;

    let mut changes = engine.subscribe();
    if let Err(e) = sync_and_adopt(engine, store).await {
        output.warn(&format!("Initial sync failed: {}", e));
    }

    output.message(&format!(
        "Watching session {} every {}s. Press Ctrl-C to stop.",
        engine.current_session_id().unwrap_or_default(),
        interval_secs
    ));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            Some(remote) = changes.recv() => {
                if store.should_accept_remote(&remote) {
                    store.adopt(remote)?;
                    output.message(&format!(
                        "Remote change adopted ({} tasks)",
                        store.tasks().len()
                    ));
                } else {
                    debug!("Ignoring remote snapshot that is not newer than local");
                }
            }
            _ = &mut ctrl_c => break,
        }
    }

    engine.stop_poller();
    output.success("Stopped watching");
    Ok(())
}

/// Sync after a local change, if the user enabled sync
///
/// Never fails the command: problems are reported as warnings and the
/// task stays saved locally.
pub async fn auto_sync(
    engine: &SyncEngine,
    sessions: &SessionStore,
    store: &mut TaskStore,
    output: &Output,
) {
    if !sync_enabled(sessions) {
        return;
    }

    if let Err(e) = engine.resume().await {
        output.warn(&format!("Sync unavailable, working locally: {}", e));
        return;
    }

    let result = sync_and_adopt(engine, store).await;
    engine.stop_poller();
    if let Err(e) = result {
        output.warn(&format!("Auto-sync failed: {}", e));
    }
}
