mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use memory::MemoryShareStore;
pub use postgres::PgShareStore;

use crate::models::ShareRecord;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("a record with this token already exists")]
    DuplicateToken,
    #[error("no record with this token")]
    NotFound,
    #[error("the download limit for this record is already consumed")]
    LimitExceeded,
    #[error("share store unavailable")]
    Unavailable(#[source] anyhow::Error),
}

/// Keyed storage for share records. The only mutations are `create`
/// (insert-if-absent), `increment_download` (atomic check-and-increment),
/// `revoke` and `mark_reaped`; callers never need additional locking.
#[async_trait]
pub trait ShareStore: Send + Sync {
    /// Atomic insert-if-absent. `DuplicateToken` on an existing token.
    async fn create(&self, record: ShareRecord) -> Result<(), StoreError>;

    async fn get(&self, token: &str) -> Result<ShareRecord, StoreError>;

    /// All not-yet-reaped records for an owner, newest upload first.
    /// Restartable; no cursor state is retained between calls.
    async fn list_by_owner(&self, owner: &str) -> Result<Vec<ShareRecord>, StoreError>;

    /// The single authoritative quota transition: checks the remaining
    /// download allowance and increments the count in one atomic step, so
    /// concurrent callers racing on the same token can never jointly push
    /// `current_downloads` past the limit. Returns the new count.
    async fn increment_download(&self, token: &str) -> Result<i32, StoreError>;

    /// Owner-initiated termination. The record stays until reaped.
    async fn revoke(&self, token: &str) -> Result<(), StoreError>;

    /// Terminal transition, used only by the expiry reaper after the
    /// underlying blob has been deleted.
    async fn mark_reaped(&self, token: &str) -> Result<(), StoreError>;

    /// Records whose derived expiry status is true (time, quota or
    /// revocation) and which have not been reaped yet. Reaper input.
    async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<ShareRecord>, StoreError>;
}
