use std::error::Error;

use axum::async_trait;
use axum::extract::path::{ErrorKind, FailedToDeserializePathParams};
use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::de::DeserializeOwned;

use crate::errors::AppError;

/// Drop-in replacements for axum's `Path`/`Query` that turn extractor
/// rejections into `AppError::Validation`, so a malformed parameter renders
/// the same structured error body as every other failure instead of axum's
/// plain-text default.
pub struct Path<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for Path<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match axum::extract::Path::<T>::from_request_parts(parts, state).await {
            Ok(value) => Ok(Self(value.0)),
            Err(rejection) => {
                let res = match rejection {
                    PathRejection::FailedToDeserializePathParams(inner) => {
                        handle_path_deserialize_rejection(inner)
                    }
                    PathRejection::MissingPathParams(error) => {
                        AppError::Validation(error.to_string())
                    }
                    err => {
                        tracing::warn!("unhandled path rejection error: {err:?}");
                        AppError::Validation(String::from("unknown validation error."))
                    }
                };
                Err(res)
            }
        }
    }
}

pub struct Query<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for Query<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match axum::extract::Query::<T>::from_request_parts(parts, state).await {
            Ok(value) => Ok(Self(value.0)),
            Err(rejection) => {
                let res = match rejection {
                    QueryRejection::FailedToDeserializeQueryString(f) => {
                        if let Some(source) = f.source() {
                            return Err(AppError::Validation(format!(
                                "We couldn't read this request's query parameters: {source}."
                            )));
                        }

                        AppError::Validation(String::from("missing query parameters."))
                    }
                    err => {
                        tracing::warn!("unhandled query rejection error: {err:?}");
                        AppError::Validation(String::from("unknown validation error."))
                    }
                };
                Err(res)
            }
        }
    }
}

fn handle_path_deserialize_rejection(cause: FailedToDeserializePathParams) -> AppError {
    let message = match cause.into_kind() {
        ErrorKind::WrongNumberOfParameters { got, expected } => {
            format!("This endpoint takes {expected} path parameters, not {got}.")
        }
        ErrorKind::ParseErrorAtIndex {
            value,
            expected_type,
            ..
        } => {
            format!("Hmm.. '{value}' is not a valid {expected_type} for this endpoint.")
        }
        ErrorKind::Message(msg) => {
            format!("We couldn't read this request's path, because: {msg}")
        }
        err => {
            tracing::warn!("path deserialize rejection not implemented: {err:?}");
            err.to_string()
        }
    };

    AppError::Validation(message)
}
