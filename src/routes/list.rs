use axum::{http::HeaderMap, Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{errors::AppResult, models::ShareRecord, routes::owner_from_headers, AppContext};

pub async fn list_endpoint(
    ctx: Extension<AppContext>,
    headers: HeaderMap,
) -> AppResult<Json<Vec<ShareEntry>>> {
    let owner = owner_from_headers(&headers);
    let now = Utc::now();

    let shares = ctx.coordinator.list_shares(&owner).await?;
    let entries = shares
        .iter()
        .map(|record| ShareEntry::from_record(record, now))
        .collect();

    Ok(Json(entries))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareEntry {
    pub share_token: String,
    pub file_name: String,
    pub file_size: i64,
    pub description: Option<String>,
    pub upload_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_time: Option<DateTime<Utc>>,
    pub max_downloads: u32,
    pub current_downloads: u32,
    pub has_password: bool,
    pub is_active: bool,
    pub is_expired: bool,
}

impl ShareEntry {
    fn from_record(record: &ShareRecord, now: DateTime<Utc>) -> Self {
        Self {
            share_token: record.token.clone(),
            file_name: record.file_name.clone(),
            file_size: record.file_size_bytes,
            description: record.description.clone(),
            upload_time: record.upload_time,
            expiry_time: record.expiry_time,
            max_downloads: record.download_limit().unwrap_or(0) as u32,
            current_downloads: record.current_downloads.max(0) as u32,
            has_password: record.has_password(),
            is_active: record.is_active(now),
            is_expired: record.is_expired(now),
        }
    }
}
