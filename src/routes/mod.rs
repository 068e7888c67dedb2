pub mod download;
pub mod list;
pub mod revoke;
pub mod upload;

use axum::http::HeaderMap;

/// Uploader identity comes from the out-of-scope auth layer, which passes an
/// opaque reference in this header. Absent means an anonymous session.
pub const OWNER_HEADER: &str = "x-owner";

pub fn owner_from_headers(headers: &HeaderMap) -> String {
    headers
        .get(OWNER_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("anonymous")
        .to_string()
}
