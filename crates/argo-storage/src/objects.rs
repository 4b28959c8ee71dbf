//! Bucketed blob storage in the `objects` table.
//!
//! Transcripts and attachments live here keyed by `(bucket, key)`. A bucket
//! name of `""` means the deployment never configured it.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use argo_core::error::ArgoError;
use argo_core::services::AttachmentStore;
use argo_core::types::{AttachmentRef, StoredObject};

use crate::db::{storage_err, Database, OptionalExt};

/// Raw put/get access to the `objects` table.
pub struct ObjectStore {
    db: Arc<Database>,
}

impl ObjectStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Write (or replace) an object.
    pub fn put(
        &self,
        bucket: &str,
        key: &str,
        body: &[u8],
        content_type: &str,
    ) -> Result<(), ArgoError> {
        require_bucket(bucket)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO objects (bucket, key, content_type, body, updated_at)
                 VALUES (?1, ?2, ?3, ?4, strftime('%s', 'now'))
                 ON CONFLICT (bucket, key) DO UPDATE SET
                    content_type = excluded.content_type,
                    body = excluded.body,
                    updated_at = excluded.updated_at",
                rusqlite::params![bucket, key, content_type, body],
            )
            .map_err(|e| ArgoError::Storage(format!("Failed to put object {}: {}", key, e)))?;
            Ok(())
        })?;
        debug!(bucket, key, bytes = body.len(), "object stored");
        Ok(())
    }

    /// Read an object; `None` if absent.
    pub fn get(&self, bucket: &str, key: &str) -> Result<Option<StoredObject>, ArgoError> {
        require_bucket(bucket)?;
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT body, content_type FROM objects WHERE bucket = ?1 AND key = ?2",
                rusqlite::params![bucket, key],
                |row| {
                    Ok(StoredObject {
                        body: row.get(0)?,
                        content_type: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(storage_err)
        })
    }
}

pub(crate) fn require_bucket(bucket: &str) -> Result<(), ArgoError> {
    if bucket.is_empty() {
        return Err(ArgoError::ConfigurationMissing(
            "storage bucket is not configured".to_string(),
        ));
    }
    Ok(())
}

/// Attachment bytes, stored under their ref in the attachments bucket.
pub struct AttachmentRepository {
    objects: Arc<ObjectStore>,
    bucket: String,
}

impl AttachmentRepository {
    pub fn new(objects: Arc<ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            objects,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl AttachmentStore for AttachmentRepository {
    async fn put_attachment(
        &self,
        attachment: &AttachmentRef,
        body: &[u8],
        content_type: &str,
    ) -> Result<(), ArgoError> {
        self.objects
            .put(&self.bucket, attachment.as_str(), body, content_type)
    }

    async fn get_attachment(
        &self,
        attachment: &AttachmentRef,
    ) -> Result<Option<StoredObject>, ArgoError> {
        self.objects.get(&self.bucket, attachment.as_str())
    }
}
