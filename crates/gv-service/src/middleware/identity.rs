//! Caller identity middleware.
//!
//! The group viewing service sits behind an identity-aware proxy that
//! authenticates users and forwards the verified identity as headers:
//!
//! - `x-user-id` (required; the system author's id is refused)
//! - `x-user-name` (defaults to the user id)
//! - `x-user-role` (`student`, `instructor` or `admin`; defaults to `student`)
//!
//! The resolved [`Caller`] is stored in request extensions for handlers.

use crate::errors::GvError;
use crate::session::{Caller, Role};
use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::IntoResponse,
};
use tracing::instrument;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const USER_ROLE_HEADER: &str = "x-user-role";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Resolve the caller from identity headers.
pub fn caller_from_headers(headers: &HeaderMap) -> Result<Caller, GvError> {
    let user_id = header(headers, USER_ID_HEADER).ok_or_else(|| {
        tracing::debug!(target: "gv.middleware.identity", "Missing caller identity header");
        GvError::NotAuthorized("Missing caller identity".to_string())
    })?;
    let user_name = header(headers, USER_NAME_HEADER).unwrap_or(user_id);
    let role = match header(headers, USER_ROLE_HEADER) {
        Some(role) => role.parse::<Role>()?,
        None => Role::Student,
    };

    let caller = Caller::new(user_id, user_name, role);
    caller.ensure_not_reserved()?;
    Ok(caller)
}

/// Reject requests without a caller identity; otherwise continue with the
/// `Caller` in extensions.
#[instrument(skip_all, name = "gv.middleware.identity")]
pub async fn require_identity(
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, GvError> {
    let caller = caller_from_headers(req.headers())?;
    req.extensions_mut().insert(caller);
    Ok(next.run(req).await)
}
