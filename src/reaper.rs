use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};

use crate::{
    blob::{BlobError, BlobStore},
    errors::{AppError, AppResult},
    store::{ShareStore, StoreError},
    utilities::with_store_retry,
};

/// Background sweep that moves expired shares to their terminal state and
/// reclaims their bytes. This is the only component allowed to call
/// `mark_reaped`; nothing here ever deletes a record from the store.
pub struct ExpiryReaper {
    store: Arc<dyn ShareStore>,
    blobs: Arc<dyn BlobStore>,
    interval: Duration,
}

impl ExpiryReaper {
    pub fn new(store: Arc<dyn ShareStore>, blobs: Arc<dyn BlobStore>, interval: Duration) -> Self {
        Self {
            store,
            blobs,
            interval,
        }
    }

    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            if let Err(why) = self.sweep(Utc::now()).await {
                tracing::error!("reaper sweep failed: {why:?}");
            }
        }
    }

    /// One sweep cycle. Returns the number of records reaped.
    ///
    /// Per record the order is fixed: delete the blob first, mark reaped
    /// second. A crash in between leaves "expired, not yet reaped", which
    /// the next sweep resolves; the reverse order could leak bytes forever.
    pub async fn sweep(&self, now: DateTime<Utc>) -> AppResult<u32> {
        let expired = match with_store_retry(|| self.store.list_expired(now)).await {
            Ok(expired) => expired,
            Err(StoreError::Unavailable(_)) => return Err(AppError::StorageUnavailable),
            Err(other) => return Err(other.into()),
        };

        let mut reaped = 0u32;

        for record in expired {
            match self.blobs.delete(&record.file_reference).await {
                Ok(()) => {}
                // Already gone (earlier partial sweep); still mark reaped.
                Err(BlobError::NotFound) => {}
                Err(why) => {
                    tracing::error!(token = %record.token, "failed to delete blob: {why:?}");
                    continue;
                }
            }

            if let Err(why) = self.store.mark_reaped(&record.token).await {
                tracing::error!(token = %record.token, "failed to mark share reaped: {why:?}");
                continue;
            }

            reaped += 1;
        }

        if reaped > 0 {
            tracing::info!(reaped, "reaped expired shares");
        }

        Ok(reaped)
    }
}
