//! KVDB adapter
//!
//! The retired provider generation. Values are plain text, so the adapter
//! does its own JSON handling and treats an unparseable value as absent.
//! Sessions are no longer created here in normal operation, but the full
//! capability is kept so legacy buckets can be read for migration.

use async_trait::async_trait;
use tracing::debug;

use super::{unexpected_status, Backend, Provider};
use crate::models::Document;
use crate::sync::error::{SyncError, SyncResult};
use crate::sync::transport::{RequestOptions, Transport};

/// Key the legacy clients stored their document under in every bucket
pub const LEGACY_KVDB_KEY: &str = "timestripe";

/// Adapter for kvdb.io
#[derive(Debug, Clone)]
pub struct KvdbBackend {
    transport: Transport,
    base_url: String,
}

impl KvdbBackend {
    pub fn new(transport: Transport, base_url: &str) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn value_url(&self, bucket: &str) -> String {
        format!("{}/{}/{}", self.base_url, bucket, LEGACY_KVDB_KEY)
    }
}

/// Bucket id from the `Location` of a create response
///
/// The header may be absolute (`https://kvdb.io/ABC`) or a path (`/ABC`).
fn bucket_from_location(location: &str) -> Option<String> {
    let path = location.split(['?', '#']).next().unwrap_or(location);
    path.rsplit('/')
        .find(|segment| !segment.trim().is_empty())
        .map(|segment| segment.trim().to_string())
}

fn encode_document(document: &Document) -> SyncResult<String> {
    serde_json::to_string(document)
        .map_err(|e| SyncError::provider(Provider::Kvdb, format!("failed to encode document: {e}")))
}

#[async_trait]
impl Backend for KvdbBackend {
    fn provider(&self) -> Provider {
        Provider::Kvdb
    }

    async fn create_session(&self) -> SyncResult<String> {
        let url = format!("{}/", self.base_url);
        let res = self
            .transport
            .post_text(&url, String::new(), &RequestOptions::default())
            .await?;
        if !res.is_success() {
            return Err(unexpected_status(Provider::Kvdb, res.status.as_u16(), &url));
        }

        let bucket = res
            .header("location")
            .and_then(bucket_from_location)
            .or_else(|| {
                let body = res.data.trim();
                (!body.is_empty() && !body.contains(char::is_whitespace)).then(|| body.to_string())
            })
            .ok_or_else(|| SyncError::provider(Provider::Kvdb, "failed to create bucket"))?;
        debug!("Created bucket {}", bucket);

        self.save(&bucket, &Document::empty()).await?;
        Ok(bucket)
    }

    async fn fetch(&self, id: &str) -> SyncResult<Option<Document>> {
        let url = self.value_url(id);
        let res = self
            .transport
            .get_text(&url, &RequestOptions::default())
            .await?;
        if res.is_not_found() {
            return Ok(None);
        }
        if !res.is_success() {
            return Err(unexpected_status(Provider::Kvdb, res.status.as_u16(), &url));
        }
        Ok(Document::from_json_text(&res.data))
    }

    async fn save(&self, id: &str, document: &Document) -> SyncResult<()> {
        let url = self.value_url(id);
        let body = encode_document(document)?;
        let res = self
            .transport
            .put_text(&url, body, &RequestOptions::default())
            .await?;
        if !res.is_success() {
            return Err(unexpected_status(Provider::Kvdb, res.status.as_u16(), &url));
        }
        Ok(())
    }
}
