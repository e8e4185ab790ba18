use axum::http::HeaderMap;
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Profile, Role, Vendor};

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Resolve the bearer token to a profile via its api_key.
pub fn require_profile(conn: &Connection, headers: &HeaderMap) -> Result<Profile, AppError> {
    let token = bearer_token(headers).ok_or(AppError::Unauthorized)?;
    queries::get_profile_by_api_key(conn, token)?.ok_or(AppError::Unauthorized)
}

/// Like [`require_profile`], but tolerates a missing header. A present but
/// unknown token is still rejected.
pub fn optional_profile(
    conn: &Connection,
    headers: &HeaderMap,
) -> Result<Option<Profile>, AppError> {
    match bearer_token(headers) {
        None => Ok(None),
        Some(token) => queries::get_profile_by_api_key(conn, token)?
            .map(Some)
            .ok_or(AppError::Unauthorized),
    }
}

/// Admin access: the configured back-office token, or a profile carrying the
/// admin role.
pub fn require_admin(
    conn: &Connection,
    headers: &HeaderMap,
    admin_token: &str,
) -> Result<(), AppError> {
    let token = bearer_token(headers).ok_or(AppError::Unauthorized)?;
    if !admin_token.is_empty() && token == admin_token {
        return Ok(());
    }
    match queries::get_profile_by_api_key(conn, token)? {
        Some(profile) if profile.role == Role::Admin => Ok(()),
        Some(_) => Err(AppError::Forbidden("admin role required".to_string())),
        None => Err(AppError::Unauthorized),
    }
}

/// Vendor access: a profile that owns a vendor row.
pub fn require_vendor(
    conn: &Connection,
    headers: &HeaderMap,
) -> Result<(Profile, Vendor), AppError> {
    let profile = require_profile(conn, headers)?;
    let vendor = queries::get_vendor_by_profile(conn, &profile.id)?
        .ok_or_else(|| AppError::Forbidden("vendor account required".to_string()))?;
    Ok((profile, vendor))
}
