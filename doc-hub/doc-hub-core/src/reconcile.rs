//! Removal of objects that no document row references.
//!
//! Uploads happen before the row insert, so a crash or a cancelled request in
//! between leaves an object behind. Objects younger than the grace period are
//! skipped because their save may still be in flight.

use crate::error::SweepError;
use crate::storage::{BlobStorage, DocumentRepository};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Keys passed to a single `referenced_storage_keys` call.
const LOOKUP_BATCH: usize = 500;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub deleted: usize,
    pub failed: usize,
}

pub struct OrphanSweeper {
    repo: Arc<dyn DocumentRepository>,
    blobs: Arc<dyn BlobStorage>,
    grace: Duration,
}

impl OrphanSweeper {
    pub fn new(repo: Arc<dyn DocumentRepository>, blobs: Arc<dyn BlobStorage>, grace: Duration) -> Self {
        Self { repo, blobs, grace }
    }

    /// Delete every unreferenced object last modified before `now - grace`.
    ///
    /// Rows marked deleted still reference their object. Individual delete
    /// failures are counted and do not stop the sweep.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, SweepError> {
        let cutoff = now - self.grace;
        let entries = self.blobs.list("").await.map_err(SweepError::List)?;

        let mut report = SweepReport {
            scanned: entries.len(),
            ..Default::default()
        };

        let candidates: Vec<String> = entries
            .into_iter()
            .filter(|entry| entry.last_modified < cutoff)
            .map(|entry| entry.key)
            .collect();
        debug!(
            scanned = report.scanned,
            candidates = candidates.len(),
            "sweep listed objects"
        );

        for batch in candidates.chunks(LOOKUP_BATCH) {
            let referenced = self
                .repo
                .referenced_storage_keys(batch)
                .await
                .map_err(SweepError::Lookup)?;

            for key in batch.iter().filter(|key| !referenced.contains(*key)) {
                match self.blobs.delete(key).await {
                    Ok(()) => {
                        info!(key = %key, "deleted orphaned object");
                        report.deleted += 1;
                    }
                    Err(e) => {
                        warn!(key = %key, "failed to delete orphaned object: {}", e);
                        report.failed += 1;
                    }
                }
            }
        }

        Ok(report)
    }
}
