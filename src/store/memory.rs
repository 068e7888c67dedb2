use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::ShareRecord;

use super::{ShareStore, StoreError};

/// In-memory share store. Serves as the reference implementation of the
/// atomic-primitive contract and as the substitute store in tests; every
/// mutation happens under a single mutex guard, which makes the
/// check-and-increment trivially atomic.
#[derive(Default)]
pub struct MemoryShareStore {
    records: Mutex<HashMap<String, ShareRecord>>,
}

impl MemoryShareStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ShareRecord>> {
        self.records.lock().expect("share store mutex poisoned")
    }
}

#[async_trait]
impl ShareStore for MemoryShareStore {
    async fn create(&self, record: ShareRecord) -> Result<(), StoreError> {
        let mut records = self.lock();
        if records.contains_key(&record.token) {
            return Err(StoreError::DuplicateToken);
        }
        records.insert(record.token.clone(), record);
        Ok(())
    }

    async fn get(&self, token: &str) -> Result<ShareRecord, StoreError> {
        self.lock().get(token).cloned().ok_or(StoreError::NotFound)
    }

    async fn list_by_owner(&self, owner: &str) -> Result<Vec<ShareRecord>, StoreError> {
        let records = self.lock();
        let mut shares: Vec<_> = records
            .values()
            .filter(|record| record.owner == owner && !record.reaped)
            .cloned()
            .collect();
        shares.sort_by(|a, b| b.upload_time.cmp(&a.upload_time));
        Ok(shares)
    }

    async fn increment_download(&self, token: &str) -> Result<i32, StoreError> {
        let mut records = self.lock();
        let record = records.get_mut(token).ok_or(StoreError::NotFound)?;

        if record.quota_exhausted() {
            return Err(StoreError::LimitExceeded);
        }

        record.current_downloads += 1;
        Ok(record.current_downloads)
    }

    async fn revoke(&self, token: &str) -> Result<(), StoreError> {
        let mut records = self.lock();
        let record = records.get_mut(token).ok_or(StoreError::NotFound)?;
        record.revoked = true;
        Ok(())
    }

    async fn mark_reaped(&self, token: &str) -> Result<(), StoreError> {
        let mut records = self.lock();
        let record = records.get_mut(token).ok_or(StoreError::NotFound)?;
        record.reaped = true;
        Ok(())
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<ShareRecord>, StoreError> {
        let records = self.lock();
        Ok(records
            .values()
            .filter(|record| !record.reaped && record.is_expired(now))
            .cloned()
            .collect())
    }
}
