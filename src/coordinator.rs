use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::{
    errors::{AppError, AppResult},
    models::ShareRecord,
    password,
    store::{ShareStore, StoreError},
    token::TokenGenerator,
    utilities::with_store_retry,
};

const MAX_CREATE_ATTEMPTS: u32 = 4;

/// Parameters for a new share, as captured at upload time. The blob has
/// already been stored by the collaborator; `file_reference` points at it.
#[derive(Debug)]
pub struct NewShare {
    pub file_reference: String,
    pub file_name: String,
    pub file_size_bytes: i64,
    pub description: Option<String>,
    pub password: Option<String>,
    pub max_downloads: Option<u32>,
    pub expiry_hours: Option<f64>,
    pub owner: String,
}

/// The public face of a freshly created share. Never carries internal
/// fields such as the password hash.
#[derive(Debug, Clone)]
pub struct ShareDescriptor {
    pub share_url: String,
    pub share_token: String,
    pub file_name: String,
    pub file_size_bytes: i64,
}

/// Orchestrates record creation: validates policy parameters, requests a
/// token, persists the record, returns the public descriptor.
pub struct UploadCoordinator {
    store: Arc<dyn ShareStore>,
    generator: TokenGenerator,
    base_url: String,
    max_file_bytes: i64,
}

impl UploadCoordinator {
    pub fn new(store: Arc<dyn ShareStore>, base_url: String, max_file_bytes: i64) -> Self {
        Self {
            store,
            generator: TokenGenerator::new(),
            base_url,
            max_file_bytes,
        }
    }

    pub fn max_file_bytes(&self) -> i64 {
        self.max_file_bytes
    }

    pub async fn create_share(
        &self,
        share: NewShare,
        now: DateTime<Utc>,
    ) -> AppResult<ShareDescriptor> {
        if share.file_name.is_empty() {
            return Err(AppError::InvalidFileName);
        }
        if share.file_size_bytes > self.max_file_bytes {
            return Err(AppError::FileTooLarge);
        }
        if let Some(hours) = share.expiry_hours {
            if !hours.is_finite() || hours <= 0.0 {
                return Err(AppError::Validation(
                    "expiryHours must be a positive number.".to_string(),
                ));
            }
        }

        // 0 means "no limit", same as absent.
        let max_downloads = share.max_downloads.filter(|&max| max > 0);

        let password_hash = match share.password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => Some(password::hash_password(password)?),
            None => None,
        };

        let expiry_time = share
            .expiry_hours
            .map(|hours| now + Duration::milliseconds((hours * 3_600_000.0).round() as i64));

        for _ in 0..MAX_CREATE_ATTEMPTS {
            let token = self.generator.generate(self.store.as_ref()).await?;
            let record = ShareRecord {
                token: token.clone(),
                owner: share.owner.clone(),
                file_reference: share.file_reference.clone(),
                file_name: share.file_name.clone(),
                file_size_bytes: share.file_size_bytes,
                description: share.description.clone(),
                password_hash: password_hash.clone(),
                max_downloads: max_downloads.map(|max| max as i32),
                current_downloads: 0,
                upload_time: now,
                expiry_time,
                revoked: false,
                reaped: false,
            };

            match with_store_retry(|| self.store.create(record.clone())).await {
                Ok(()) => {
                    tracing::info!(%token, owner = %share.owner, "share created");
                    return Ok(ShareDescriptor {
                        share_url: format!("{}/share/{token}", self.base_url),
                        share_token: token,
                        file_name: share.file_name,
                        file_size_bytes: share.file_size_bytes,
                    });
                }
                // Lost the probe-then-insert race; mint a fresh token.
                Err(StoreError::DuplicateToken) => continue,
                Err(StoreError::Unavailable(_)) => return Err(AppError::StorageUnavailable),
                Err(other) => return Err(other.into()),
            }
        }

        tracing::error!("share creation exhausted {MAX_CREATE_ATTEMPTS} token attempts");
        Err(AppError::TokenGeneration)
    }

    /// "My files" listing, newest first.
    pub async fn list_shares(&self, owner: &str) -> AppResult<Vec<ShareRecord>> {
        match with_store_retry(|| self.store.list_by_owner(owner)).await {
            Ok(shares) => Ok(shares),
            Err(StoreError::Unavailable(_)) => Err(AppError::StorageUnavailable),
            Err(other) => Err(other.into()),
        }
    }

    /// Owner-initiated termination. The record stays visible (revoked) until
    /// the reaper frees its bytes.
    pub async fn revoke_share(&self, token: &str, owner: &str) -> AppResult<()> {
        let record = match with_store_retry(|| self.store.get(token)).await {
            Ok(record) => record,
            Err(StoreError::Unavailable(_)) => return Err(AppError::StorageUnavailable),
            Err(other) => return Err(other.into()),
        };

        if record.owner != owner {
            return Err(AppError::NotShareOwner);
        }

        match with_store_retry(|| self.store.revoke(token)).await {
            Ok(()) => {
                tracing::info!(token, "share revoked by owner");
                Ok(())
            }
            Err(StoreError::Unavailable(_)) => Err(AppError::StorageUnavailable),
            Err(other) => Err(other.into()),
        }
    }
}
