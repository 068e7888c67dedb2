use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc, Mutex,
};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::{self, AsyncRead};

use crate::{
    blob::{BlobError, BlobStore},
    config::{Config, GeneralConfig, InstrumentationConfig, ReaperConfig},
    models::ShareRecord,
    store::{MemoryShareStore, ShareStore, StoreError},
    utilities::friendly_id,
};

pub fn record(token: &str, owner: &str) -> ShareRecord {
    ShareRecord {
        token: token.to_string(),
        owner: owner.to_string(),
        file_reference: format!("blob-{token}"),
        file_name: "hello_world.txt".to_string(),
        file_size_bytes: 42,
        description: None,
        password_hash: None,
        max_downloads: None,
        current_downloads: 0,
        upload_time: Utc::now(),
        expiry_time: None,
        revoked: false,
        reaped: false,
    }
}

pub fn test_config(storage_dir: String) -> Config {
    Config {
        general: GeneralConfig {
            bind_address: "127.0.0.1:0".to_string(),
            cors_origin: "http://localhost:3000".to_string(),
            base_url: "http://localhost:8080".to_string(),
            storage_dir,
            max_file_bytes: 1024 * 1024,
        },
        database: None,
        reaper: ReaperConfig { interval_secs: 60 },
        instrumentation: InstrumentationConfig { directives: vec![] },
    }
}

pub async fn temp_storage_dir() -> String {
    let dir = std::env::temp_dir().join(format!("sharevault-test-{}", friendly_id(8)));
    tokio::fs::create_dir_all(&dir).await.unwrap();
    dir.to_str().unwrap().to_string()
}

/// Share-store fake wrapping the in-memory store: injects a configurable
/// number of transient outages, and can force the atomic increment to report
/// a consumed quota no matter what the snapshot said.
#[derive(Default)]
pub struct FlakyShareStore {
    inner: MemoryShareStore,
    outages: AtomicU32,
    increment_calls: AtomicU32,
    force_limit_exceeded: bool,
}

impl FlakyShareStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_forced_limit() -> Arc<Self> {
        Arc::new(Self {
            force_limit_exceeded: true,
            ..Default::default()
        })
    }

    /// Seeds a record directly, bypassing outage injection.
    pub async fn seed(&self, record: ShareRecord) {
        self.inner.create(record).await.unwrap();
    }

    /// The next `n` store calls fail with `Unavailable`.
    pub fn fail_next(&self, n: u32) {
        self.outages.store(n, Ordering::SeqCst);
    }

    pub fn increment_calls(&self) -> u32 {
        self.increment_calls.load(Ordering::SeqCst)
    }

    fn outage(&self) -> Result<(), StoreError> {
        let had_outage = self
            .outages
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if had_outage {
            return Err(StoreError::Unavailable(anyhow!("injected outage")));
        }
        Ok(())
    }
}

#[async_trait]
impl ShareStore for FlakyShareStore {
    async fn create(&self, record: ShareRecord) -> Result<(), StoreError> {
        self.outage()?;
        self.inner.create(record).await
    }

    async fn get(&self, token: &str) -> Result<ShareRecord, StoreError> {
        self.outage()?;
        self.inner.get(token).await
    }

    async fn list_by_owner(&self, owner: &str) -> Result<Vec<ShareRecord>, StoreError> {
        self.outage()?;
        self.inner.list_by_owner(owner).await
    }

    async fn increment_download(&self, token: &str) -> Result<i32, StoreError> {
        self.outage()?;
        self.increment_calls.fetch_add(1, Ordering::SeqCst);
        if self.force_limit_exceeded {
            return Err(StoreError::LimitExceeded);
        }
        self.inner.increment_download(token).await
    }

    async fn revoke(&self, token: &str) -> Result<(), StoreError> {
        self.outage()?;
        self.inner.revoke(token).await
    }

    async fn mark_reaped(&self, token: &str) -> Result<(), StoreError> {
        self.outage()?;
        self.inner.mark_reaped(token).await
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<ShareRecord>, StoreError> {
        self.outage()?;
        self.inner.list_expired(now).await
    }
}

/// Blob-store fake that records deletions instead of touching a filesystem.
#[derive(Default)]
pub struct RecordingBlobStore {
    pub deleted: Mutex<Vec<String>>,
    pub fail_deletes: bool,
    pub missing: bool,
}

impl RecordingBlobStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlobStore for RecordingBlobStore {
    async fn put(
        &self,
        _reference: &str,
        _body: &mut (dyn AsyncRead + Send + Unpin),
        _max_bytes: Option<i64>,
    ) -> Result<i64, BlobError> {
        Ok(0)
    }

    async fn open(
        &self,
        _reference: &str,
    ) -> Result<Box<dyn AsyncRead + Send + Unpin>, BlobError> {
        Err(BlobError::NotFound)
    }

    async fn delete(&self, reference: &str) -> Result<(), BlobError> {
        if self.fail_deletes {
            return Err(BlobError::Io(io::Error::new(
                io::ErrorKind::Other,
                "injected failure",
            )));
        }
        if self.missing {
            return Err(BlobError::NotFound);
        }
        self.deleted.lock().unwrap().push(reference.to_string());
        Ok(())
    }
}
