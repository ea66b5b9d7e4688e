//! Custom Axum extractors.
//!
//! Authentication happens upstream; the gateway forwards the authenticated
//! user's ID in the `X-User-Id` header. Handlers that act on behalf of a user
//! take a [`CurrentUser`], handlers that merely personalise a view take an
//! `Option<CurrentUser>`.

use crate::error::AppError;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use courtside_core::types::UserId;
use uuid::Uuid;

/// Header carrying the authenticated user's ID.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// The authenticated caller.
///
/// Rejects with 401 when the header is missing or not a UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| AppError::unauthorized("Authentication required"))?;

        raw.to_str()
            .ok()
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .map(|id| Self(UserId::from_uuid(id)))
            .ok_or_else(|| AppError::unauthorized("Invalid user identity"))
    }
}
