//! JSONBin adapter
//!
//! The document is stored as the `record` of a bin. Reads go through
//! `/b/{id}/latest` with metadata disabled; some deployments still wrap the
//! answer in `{"record": ...}`, so both shapes are accepted.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::{unexpected_status, Backend, Provider};
use crate::models::Document;
use crate::sync::error::{SyncError, SyncResult};
use crate::sync::transport::{RequestOptions, Transport};

/// Request envelope for create and update
#[derive(Serialize)]
struct Envelope<'a> {
    record: &'a Document,
}

/// Adapter for api.jsonbin.io
#[derive(Debug, Clone)]
pub struct JsonBinBackend {
    transport: Transport,
    base_url: String,
}

impl JsonBinBackend {
    pub fn new(transport: Transport, base_url: &str) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn bin_url(&self, id: &str) -> String {
        format!("{}/b/{}", self.base_url, id)
    }

    fn read_options() -> RequestOptions {
        RequestOptions::default().header("x-bin-meta", "false")
    }
}

/// Bin id from a create response (`metadata.id` or top-level `id`)
fn bin_id(data: &Value) -> Option<String> {
    data.pointer("/metadata/id")
        .or_else(|| data.get("id"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Strip the optional `record` wrapper from a read response
fn unwrap_record(mut data: Value) -> Value {
    match data.get_mut("record") {
        Some(record) if record.is_object() => record.take(),
        _ => data,
    }
}

#[async_trait]
impl Backend for JsonBinBackend {
    fn provider(&self) -> Provider {
        Provider::JsonBin
    }

    async fn create_session(&self) -> SyncResult<String> {
        let url = format!("{}/b", self.base_url);
        let initial = Document::empty();
        let res = self
            .transport
            .post(&url, &Envelope { record: &initial }, &RequestOptions::default())
            .await?;
        if !res.is_success() {
            return Err(unexpected_status(Provider::JsonBin, res.status.as_u16(), &url));
        }

        let id = bin_id(&res.data)
            .ok_or_else(|| SyncError::provider(Provider::JsonBin, "failed to create bin"))?;
        debug!("Created bin {}", id);
        Ok(id)
    }

    async fn fetch(&self, id: &str) -> SyncResult<Option<Document>> {
        let url = format!("{}/latest", self.bin_url(id));
        let res = self.transport.get(&url, &Self::read_options()).await?;
        if res.is_not_found() {
            return Ok(None);
        }
        if !res.is_success() {
            return Err(unexpected_status(Provider::JsonBin, res.status.as_u16(), &url));
        }
        Ok(Document::from_value(unwrap_record(res.data)))
    }

    async fn save(&self, id: &str, document: &Document) -> SyncResult<()> {
        let url = self.bin_url(id);
        let res = self
            .transport
            .put(&url, &Envelope { record: document }, &RequestOptions::default())
            .await?;
        if !res.is_success() {
            return Err(unexpected_status(Provider::JsonBin, res.status.as_u16(), &url));
        }
        Ok(())
    }
}
