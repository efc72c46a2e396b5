use axum::{extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::shared::state::AppState;
use crate::directory::User;
use crate::tickets::error::TicketError;

/// Header carrying the caller's user id. Token validation happens upstream.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The directory user behind the `X-User-Id` header.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = TicketError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| TicketError::Unauthorized("Missing X-User-Id header".to_string()))?;

        let user_id = raw
            .to_str()
            .ok()
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .ok_or_else(|| TicketError::Unauthorized("Malformed X-User-Id header".to_string()))?;

        let user = state
            .directory
            .get_user(user_id)
            .await?
            .ok_or_else(|| TicketError::Unauthorized(format!("Unknown user {user_id}")))?;

        Ok(Self(user))
    }
}
