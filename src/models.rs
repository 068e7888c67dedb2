use chrono::{DateTime, Utc};

/// A single shared file. The `token` is the only way to address it and is
/// treated as a bearer credential.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ShareRecord {
    pub token: String,
    pub owner: String,
    pub file_reference: String,
    pub file_name: String,
    pub file_size_bytes: i64,
    pub description: Option<String>,
    /// Argon2id PHC string. Present iff the uploader set a password.
    pub password_hash: Option<String>,
    /// `None` (or 0) means unlimited.
    pub max_downloads: Option<i32>,
    pub current_downloads: i32,
    pub upload_time: DateTime<Utc>,
    pub expiry_time: Option<DateTime<Utc>>,
    pub revoked: bool,
    /// Terminal state, set only by the expiry reaper once the blob is gone.
    pub reaped: bool,
}

impl ShareRecord {
    pub fn download_limit(&self) -> Option<i32> {
        match self.max_downloads {
            Some(max) if max > 0 => Some(max),
            _ => None,
        }
    }

    pub fn quota_exhausted(&self) -> bool {
        match self.download_limit() {
            Some(max) => self.current_downloads >= max,
            None => false,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        if self.revoked {
            return true;
        }
        if let Some(expiry) = self.expiry_time {
            if now >= expiry {
                return true;
            }
        }
        self.quota_exhausted()
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired(now)
    }

    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }
}
