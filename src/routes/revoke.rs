use axum::{http::HeaderMap, http::StatusCode, Extension};

use crate::{errors::AppResult, extractors, routes::owner_from_headers, AppContext};

#[tracing::instrument(skip(ctx, headers))]
pub async fn revoke_endpoint(
    ctx: Extension<AppContext>,
    extractors::Path(token): extractors::Path<String>,
    headers: HeaderMap,
) -> AppResult<StatusCode> {
    let owner = owner_from_headers(&headers);
    ctx.coordinator.revoke_share(&token, &owner).await?;
    Ok(StatusCode::NO_CONTENT)
}
