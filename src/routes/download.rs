use axum::{
    body::Body, http::header::CONTENT_DISPOSITION, response::IntoResponse, Extension,
};
use chrono::Utc;
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use crate::{
    errors::{AppError, AppResult},
    extractors, AppContext,
};

pub async fn download_endpoint(
    ctx: Extension<AppContext>,
    extractors::Path(token): extractors::Path<String>,
    extractors::Query(query): extractors::Query<DownloadQuery>,
) -> AppResult<impl IntoResponse> {
    let grant = ctx
        .accountant
        .authorize_download(&token, query.password.as_deref(), Utc::now())
        .await?;

    // The slot is consumed at this point; a disconnect mid-transfer does not
    // give it back.
    let reader = ctx
        .blobs
        .open(&grant.file_reference)
        .await
        .map_err(|why| AppError::Other(why.into()))?;
    let body = Body::from_stream(ReaderStream::new(reader));

    Ok((
        [(
            CONTENT_DISPOSITION,
            format!(r#"attachment; filename="{}""#, grant.file_name),
        )],
        body,
    ))
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    password: Option<String>,
}
