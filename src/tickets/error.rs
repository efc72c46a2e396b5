use axum::{response::IntoResponse, Json};

use super::models::TicketStatus;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum TicketError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: TicketStatus,
        to: TicketStatus,
    },
    #[error("Invalid agent: {0}")]
    InvalidAgent(String),
    #[error("{}", reopen_message(.status, .elapsed_business_days, .window))]
    ReopenWindowExpired {
        status: TicketStatus,
        elapsed_business_days: Option<i64>,
        window: i64,
    },
    #[error("No agent available for assignment")]
    NoAgentAvailable,
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn reopen_message(status: &TicketStatus, elapsed: &Option<i64>, window: &i64) -> String {
    match elapsed {
        Some(days) => format!(
            "Ticket cannot be reopened: {days} business days have passed since it was closed (limit {window})"
        ),
        None => format!("Ticket cannot be reopened from status {status}"),
    }
}

impl TicketError {
    pub fn ticket_not_found(id: uuid::Uuid) -> Self {
        Self::NotFound(format!("Ticket {id} not found"))
    }
}

impl IntoResponse for TicketError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidTransition { .. }
            | Self::InvalidAgent(_)
            | Self::ReopenWindowExpired { .. }
            | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NoAgentAvailable | Self::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
            Self::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
