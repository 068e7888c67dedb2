use axum::{extract::Multipart, http::HeaderMap, Extension, Json};
use chrono::Utc;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tokio::io;
use tokio_util::io::StreamReader;

use crate::{
    blob::BlobError,
    coordinator::NewShare,
    errors::{AppError, AppResult},
    extractors,
    routes::owner_from_headers,
    utilities::friendly_id,
    AppContext,
};

pub async fn upload_endpoint(
    ctx: Extension<AppContext>,
    extractors::Query(query): extractors::Query<UploadQuery>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    let owner = owner_from_headers(&headers);

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("file") => (),
            _ => continue,
        };

        let file_name = field
            .file_name()
            .ok_or(AppError::InvalidFileName)?
            .to_string();

        if file_name.is_empty() {
            return Err(AppError::InvalidFileName);
        }

        let body = field.map_err(|err| io::Error::new(io::ErrorKind::Other, err));
        let mut body_reader = StreamReader::new(body);

        // The byte ceiling is enforced while streaming, so an oversized
        // upload never lingers in blob storage.
        let reference = friendly_id(16);
        let file_size_bytes = match ctx
            .blobs
            .put(
                &reference,
                &mut body_reader,
                Some(ctx.coordinator.max_file_bytes()),
            )
            .await
        {
            Ok(bytes) => bytes,
            Err(BlobError::TooLarge) => return Err(AppError::FileTooLarge),
            Err(why) => return Err(AppError::Other(why.into())),
        };

        let share = NewShare {
            file_reference: reference.clone(),
            file_name,
            file_size_bytes,
            description: query.description,
            password: query.password,
            max_downloads: query.max_downloads,
            expiry_hours: query.expiry_hours,
            owner,
        };

        let descriptor = match ctx.coordinator.create_share(share, Utc::now()).await {
            Ok(descriptor) => descriptor,
            Err(why) => {
                // No record points at the blob; reclaim it now instead of
                // leaving it for a manual audit.
                if let Err(del) = ctx.blobs.delete(&reference).await {
                    tracing::warn!("failed to remove orphaned blob {reference}: {del:?}");
                }
                return Err(why);
            }
        };

        return Ok(Json(UploadResponse {
            status: "success".to_string(),
            share_url: descriptor.share_url,
            share_token: descriptor.share_token,
            file_name: descriptor.file_name,
            file_size: descriptor.file_size_bytes,
        }));
    }

    Err(AppError::EmptyUpload)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadQuery {
    pub description: Option<String>,
    pub password: Option<String>,
    pub max_downloads: Option<u32>,
    pub expiry_hours: Option<f64>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub status: String,
    pub share_url: String,
    pub share_token: String,
    pub file_name: String,
    pub file_size: i64,
}
