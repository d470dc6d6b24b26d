//! Pantry adapter
//!
//! Documents live in a named basket inside a provider-assigned pantry:
//!
//! - `POST /pantry` creates the pantry and answers with its id
//! - `PUT /pantry/{id}/basket/{basket}` writes the raw document
//! - `GET /pantry/{id}/basket/{basket}` returns it (404 when absent)

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{unexpected_status, Backend, Provider};
use crate::models::Document;
use crate::sync::error::{SyncError, SyncResult};
use crate::sync::transport::{RequestOptions, Transport};

const PANTRY_DESCRIPTION: &str = "Horizons task sync";

/// Adapter for getpantry.cloud
#[derive(Debug, Clone)]
pub struct PantryBackend {
    transport: Transport,
    base_url: String,
    basket: String,
}

impl PantryBackend {
    pub fn new(transport: Transport, base_url: &str, basket: &str) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            basket: basket.to_string(),
        }
    }

    fn create_url(&self) -> String {
        format!("{}/pantry", self.base_url)
    }

    fn basket_url(&self, pantry_id: &str) -> String {
        format!(
            "{}/pantry/{}/basket/{}",
            self.base_url, pantry_id, self.basket
        )
    }
}

/// Pull the pantry id out of a create response (`pantryId` or `id`)
fn pantry_id(data: &Value) -> Option<String> {
    ["pantryId", "id"]
        .iter()
        .filter_map(|key| data.get(key))
        .find_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

#[async_trait]
impl Backend for PantryBackend {
    fn provider(&self) -> Provider {
        Provider::Pantry
    }

    async fn create_session(&self) -> SyncResult<String> {
        let url = self.create_url();
        let res = self
            .transport
            .post(
                &url,
                &json!({ "description": PANTRY_DESCRIPTION }),
                &RequestOptions::default(),
            )
            .await?;
        if !res.is_success() {
            return Err(unexpected_status(Provider::Pantry, res.status.as_u16(), &url));
        }

        let id = pantry_id(&res.data)
            .ok_or_else(|| SyncError::provider(Provider::Pantry, "failed to create pantry"))?;
        debug!("Created pantry {}", id);

        self.save(&id, &Document::empty()).await?;
        Ok(id)
    }

    async fn fetch(&self, id: &str) -> SyncResult<Option<Document>> {
        let url = self.basket_url(id);
        let res = self.transport.get(&url, &RequestOptions::default()).await?;
        if res.is_not_found() {
            return Ok(None);
        }
        if !res.is_success() {
            return Err(unexpected_status(Provider::Pantry, res.status.as_u16(), &url));
        }
        Ok(Document::from_value(res.data))
    }

    async fn save(&self, id: &str, document: &Document) -> SyncResult<()> {
        let url = self.basket_url(id);
        let res = self
            .transport
            .put(&url, document, &RequestOptions::default())
            .await?;
        if !res.is_success() {
            return Err(unexpected_status(Provider::Pantry, res.status.as_u16(), &url));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Horizon, Task};
    use crate::sync::backend::test_server;
    use axum::extract::{Path, State};
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type Baskets = Arc<Mutex<HashMap<(String, String), Value>>>;

    /// Fake pantry service holding baskets in memory
    async fn spawn_pantry(create_response: Value) -> (String, Baskets) {
        let baskets: Baskets = Arc::default();
        let app = Router::new()
            .route(
                "/pantry",
                post(move || {
                    let body = create_response.clone();
                    async move { Json(body) }
                }),
            )
            .route(
                "/pantry/:id/basket/:basket",
                get(
                    |State(baskets): State<Baskets>, Path((id, basket)): Path<(String, String)>| async move {
                        match baskets.lock().unwrap().get(&(id, basket)) {
                            Some(doc) => (StatusCode::OK, Json(doc.clone())),
                            None => (StatusCode::NOT_FOUND, Json(Value::Null)),
                        }
                    },
                )
                .put(
                    |State(baskets): State<Baskets>,
                     Path((id, basket)): Path<(String, String)>,
                     Json(doc): Json<Value>| async move {
                        baskets.lock().unwrap().insert((id, basket), doc);
                        "Your Pantry was updated with basket"
                    },
                ),
            )
            .with_state(baskets.clone());
        (test_server::spawn(app).await, baskets)
    }

    #[test]
    fn test_pantry_id_extraction() {
        assert_eq!(pantry_id(&json!({"pantryId": "abc"})), Some("abc".into()));
        assert_eq!(pantry_id(&json!({"id": "xyz"})), Some("xyz".into()));
        assert_eq!(pantry_id(&json!({"pantryId": ""})), None);
        assert_eq!(pantry_id(&Value::Null), None);
    }

    #[tokio::test]
    async fn test_create_session_seeds_empty_basket() {
        let (base, baskets) = spawn_pantry(json!({"pantryId": "p-123"})).await;
        let backend = PantryBackend::new(Transport::default(), &base, "horizons");

        let id = backend.create_session().await.unwrap();
        assert_eq!(id, "p-123");

        let stored = baskets
            .lock()
            .unwrap()
            .get(&("p-123".to_string(), "horizons".to_string()))
            .cloned()
            .unwrap();
        assert_eq!(stored["tasks"], json!([]));
        assert!(stored["lastSaved"].is_string());

        let fetched = backend.fetch(&id).await.unwrap().unwrap();
        assert!(fetched.tasks.is_empty());
    }

    #[tokio::test]
    async fn test_create_session_without_id_fails() {
        let (base, _) = spawn_pantry(json!({"message": "nope"})).await;
        let backend = PantryBackend::new(Transport::default(), &base, "horizons");

        let err = backend.create_session().await.unwrap_err();
        assert!(matches!(err, SyncError::Provider { provider: Provider::Pantry, .. }));
    }

    #[tokio::test]
    async fn test_fetch_missing_basket_is_none() {
        let (base, _) = spawn_pantry(json!({"pantryId": "p"})).await;
        let backend = PantryBackend::new(Transport::default(), &base, "horizons");

        assert!(backend.fetch("unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_fetch_returns_document_unwrapped() {
        let (base, baskets) = spawn_pantry(json!({"pantryId": "p"})).await;
        let backend = PantryBackend::new(Transport::default(), &base, "horizons");

        let mut doc = Document::empty();
        doc.tasks.push(Task::with_id("1", "X", Horizon::Days));
        backend.save("p", &doc).await.unwrap();

        let raw = baskets
            .lock()
            .unwrap()
            .get(&("p".to_string(), "horizons".to_string()))
            .cloned()
            .unwrap();
        assert_eq!(raw["tasks"][0]["id"], "1");
        assert!(raw.get("record").is_none());

        let fetched = backend.fetch("p").await.unwrap().unwrap();
        assert_eq!(fetched, doc);
    }

    #[tokio::test]
    async fn test_server_error_is_an_error() {
        let app = Router::new().route(
            "/pantry/:id/basket/:basket",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR })
                .put(|| async { StatusCode::TOO_MANY_REQUESTS }),
        );
        let base = test_server::spawn(app).await;
        let backend = PantryBackend::new(Transport::default(), &base, "horizons");

        let err = backend.fetch("p").await.unwrap_err();
        assert!(matches!(err, SyncError::UnexpectedStatus { status: 500, .. }));

        let err = backend.save("p", &Document::empty()).await.unwrap_err();
        assert!(matches!(err, SyncError::UnexpectedStatus { status: 429, .. }));
    }

    fn foreign_basket() -> Value {
        json!({
            "version": "2.1.0",
            "lastSaved": "2031-01-01T00:00:00.000Z",
            "tasks": [
                {"id": "a", "title": "Kept", "horizon": "weeks"},
                {"id": "b", "title": null, "priority": "urgent", "cascadesTo": ["days", 5]}
            ]
        })
    }

    #[tokio::test]
    async fn test_fetch_tolerates_foreign_task_fields() {
        let (base, baskets) = spawn_pantry(json!({"pantryId": "p"})).await;
        baskets
            .lock()
            .unwrap()
            .insert(("p".to_string(), "horizons".to_string()), foreign_basket());
        let backend = PantryBackend::new(Transport::default(), &base, "horizons");

        let fetched = backend.fetch("p").await.unwrap().unwrap();
        assert_eq!(fetched.tasks.len(), 2);
        assert_eq!(fetched.stamp(), Some("2031-01-01T00:00:00.000Z"));
    }

    #[tokio::test]
    async fn test_newer_remote_with_foreign_tasks_wins_sync() {
        use crate::storage::MemoryStore;
        use crate::sync::{BackendRegistry, MemoryBackend, SyncEngine};
        use std::time::Duration;

        let (base, baskets) = spawn_pantry(json!({"pantryId": "p"})).await;
        baskets
            .lock()
            .unwrap()
            .insert(("p".to_string(), "horizons".to_string()), foreign_basket());
        let registry = BackendRegistry::new(Provider::Pantry, Provider::JsonBin)
            .with(Arc::new(PantryBackend::new(Transport::default(), &base, "horizons")))
            .with(Arc::new(MemoryBackend::new(Provider::JsonBin)));
        let engine = SyncEngine::new(registry, Arc::new(MemoryStore::new()))
            .with_poll_interval(Duration::from_secs(3600));

        engine.enable(Some("pantry:p")).await.unwrap();
        let mut local = Document::empty();
        local.last_saved = Some("2030-06-01T00:00:00.000Z".to_string());
        local.tasks.push(Task::with_id("mine", "Local only", Horizon::Days));

        let merged = engine.sync(local).await;
        engine.stop_poller();

        assert_eq!(merged.tasks.len(), 2);
        assert_eq!(merged.stamp(), Some("2031-01-01T00:00:00.000Z"));
        let stored = baskets
            .lock()
            .unwrap()
            .get(&("p".to_string(), "horizons".to_string()))
            .cloned()
            .unwrap();
        assert_eq!(stored["tasks"][1]["priority"], "urgent");
        assert_eq!(stored["lastSaved"], "2031-01-01T00:00:00.000Z");
    }
}
