use chrono::{DateTime, Utc};

use crate::{models::ShareRecord, password};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("We couldn't find this share token! Please re-check and try again.")]
    TokenNotFound,
    #[error("This share has been revoked by its owner.")]
    TokenRevoked,
    #[error("This share has expired and can no longer be downloaded.")]
    TokenExpired,
    #[error("This share has reached its download limit.")]
    DownloadLimitExceeded,
    #[error("This file is password protected! You need to provide the password.")]
    PasswordRequired,
    #[error("Invalid password! Please make sure you've entered the correct one.")]
    PasswordMismatch,
}

/// Side-effect-free access evaluation for a single download request.
///
/// The check order is part of the contract: existence, revocation, expiry
/// and quota are settled before anything password-related is disclosed, so a
/// caller probing tokens only learns whether a share is password protected
/// after confirming it is still usable.
pub fn evaluate(
    record: Option<&ShareRecord>,
    now: DateTime<Utc>,
    password_attempt: Option<&str>,
) -> Result<(), PolicyError> {
    let Some(record) = record else {
        return Err(PolicyError::TokenNotFound);
    };

    if record.revoked {
        return Err(PolicyError::TokenRevoked);
    }

    if let Some(expiry) = record.expiry_time {
        if now >= expiry {
            return Err(PolicyError::TokenExpired);
        }
    }

    if record.quota_exhausted() {
        return Err(PolicyError::DownloadLimitExceeded);
    }

    if let Some(stored) = &record.password_hash {
        let attempt = password_attempt.ok_or(PolicyError::PasswordRequired)?;
        if !password::verify_password(attempt, stored) {
            return Err(PolicyError::PasswordMismatch);
        }
    }

    Ok(())
}
