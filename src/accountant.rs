use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    errors::{AppError, AppResult},
    policy::{self, PolicyError},
    store::{ShareStore, StoreError},
    utilities::with_store_retry,
};

/// What a policy-approved download gets back: enough to hand the transfer
/// off to the byte-streaming layer. Internal fields never leave the engine.
#[derive(Debug, Clone)]
pub struct DownloadGrant {
    pub file_reference: String,
    pub file_name: String,
}

/// Owns the quota-consuming state transition. The policy pre-check here is
/// optimistic and may observe stale data; the store's atomic increment is
/// the only authoritative enforcement point.
pub struct DownloadAccountant {
    store: Arc<dyn ShareStore>,
}

impl DownloadAccountant {
    pub fn new(store: Arc<dyn ShareStore>) -> Self {
        Self { store }
    }

    /// Runs the full download protocol for one request: fetch, policy
    /// pre-check, atomic quota consumption. A consumed slot is never rolled
    /// back, even if the caller disconnects before the bytes finish.
    pub async fn authorize_download(
        &self,
        token: &str,
        password_attempt: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<DownloadGrant> {
        let record = match with_store_retry(|| self.store.get(token)).await {
            Ok(record) => Some(record),
            Err(StoreError::NotFound) => None,
            Err(StoreError::Unavailable(_)) => return Err(AppError::StorageUnavailable),
            Err(other) => return Err(other.into()),
        };

        // Fail fast on requests that are invalid on the current snapshot;
        // nothing is mutated for an already-dead token.
        policy::evaluate(record.as_ref(), now, password_attempt)?;
        let record = record.ok_or(PolicyError::TokenNotFound)?;

        // Authoritative. Two concurrent requests racing on the last slot are
        // serialized here; exactly one of them gets the increment.
        match with_store_retry(|| self.store.increment_download(token)).await {
            Ok(new_count) => {
                tracing::debug!(token, downloads = new_count, "download slot consumed");
                Ok(DownloadGrant {
                    file_reference: record.file_reference,
                    file_name: record.file_name,
                })
            }
            Err(StoreError::LimitExceeded) => Err(PolicyError::DownloadLimitExceeded.into()),
            Err(StoreError::NotFound) => Err(PolicyError::TokenNotFound.into()),
            Err(StoreError::Unavailable(_)) => Err(AppError::StorageUnavailable),
            Err(other) => Err(other.into()),
        }
    }
}
