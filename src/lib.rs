pub mod assignment;
pub mod comments;
pub mod core;
pub mod directory;
pub mod llm;
pub mod sla;
pub mod store;
pub mod tickets;

use axum::Router;
use std::sync::Arc;

use crate::core::shared::state::AppState;

/// Every HTTP route of the service, bound to `state`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(tickets::configure_tickets_routes())
        .merge(comments::configure_comments_routes())
        .merge(directory::categories::configure_categories_routes())
        .with_state(state)
}
