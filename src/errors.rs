use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tokio::io;

use crate::{policy::PolicyError, store::StoreError};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("You need to upload at least one file.")]
    EmptyUpload,
    #[error("Oops, looks like the file you tried uploading has an invalid name! Change the name and try again.")]
    InvalidFileName,
    #[error("This file is too large! Please pick something smaller and try again.")]
    FileTooLarge,
    #[error("{0}")]
    Validation(String),
    #[error("Hmm.. You don't own this share, so you can't revoke it.")]
    NotShareOwner,

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("Our storage is having a moment! Please try again later.")]
    StorageUnavailable,
    #[error("We couldn't issue a share token for this upload! Please try again later.")]
    TokenGeneration,

    #[error("Something went wrong on our side! Please try again later.")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    fn error_code(&self) -> &'static str {
        match self {
            AppError::EmptyUpload => "empty-upload",
            AppError::InvalidFileName => "invalid-file-name",
            AppError::FileTooLarge => "file-too-large",
            AppError::Validation(_) => "validation",
            AppError::NotShareOwner => "not-share-owner",
            AppError::Policy(policy) => match policy {
                PolicyError::TokenNotFound => "token-not-found",
                PolicyError::TokenRevoked => "token-revoked",
                PolicyError::TokenExpired => "token-expired",
                PolicyError::DownloadLimitExceeded => "download-limit-exceeded",
                PolicyError::PasswordRequired => "password-required",
                PolicyError::PasswordMismatch => "password-mismatch",
            },
            AppError::StorageUnavailable => "storage-unavailable",
            AppError::TokenGeneration => "token-generation",
            AppError::Other(_) => "other",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = match self {
            Self::Other(_) | Self::StorageUnavailable | Self::TokenGeneration => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        };

        if code == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("{self:?}");
        }

        let res = ErrorResponse {
            status: "error".to_string(),
            error_code: self.error_code().to_string(),
            message: self.to_string(),
        };
        (code, Json(res)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound => Self::Policy(PolicyError::TokenNotFound),
            StoreError::LimitExceeded => Self::Policy(PolicyError::DownloadLimitExceeded),
            // Duplicate tokens are handled inside the upload coordinator's
            // regeneration loop; one escaping this far means the bounded
            // attempts ran out.
            StoreError::DuplicateToken => Self::TokenGeneration,
            StoreError::Unavailable(_) => Self::StorageUnavailable,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(value: sqlx::Error) -> Self {
        Self::Other(value.into())
    }
}

impl From<io::Error> for AppError {
    fn from(value: io::Error) -> Self {
        Self::Other(value.into())
    }
}

impl From<MultipartError> for AppError {
    fn from(value: MultipartError) -> Self {
        Self::Other(value.into())
    }
}

impl From<toml::de::Error> for AppError {
    fn from(value: toml::de::Error) -> Self {
        Self::Other(value.into())
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub status: String,
    pub error_code: String,
    pub message: String,
}
