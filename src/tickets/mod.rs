pub mod error;
pub mod lifecycle;
pub mod models;
pub mod service;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::middleware::CurrentUser;
use crate::core::shared::state::AppState;
use crate::directory::User;
use error::TicketError;
use models::{RichTextContent, TicketStatus};
use service::{
    CreateTicketRequest, ListQuery, TicketResponse, TicketStats, TicketWithComments,
    UpdateTicketRequest,
};

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub agent_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: TicketStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResolutionRequest {
    pub resolution_comment: Option<RichTextContent>,
}

#[derive(Debug, Serialize)]
pub struct CanReopenResponse {
    pub ticket_id: Uuid,
    pub can_reopen: bool,
    pub window_business_days: i64,
}

async fn ensure_access(state: &AppState, ticket_id: Uuid, user: &User) -> Result<(), TicketError> {
    if state.tickets.can_access_ticket(ticket_id, user).await? {
        Ok(())
    } else {
        Err(TicketError::Forbidden(format!("No access to ticket {ticket_id}")))
    }
}

pub(crate) fn ensure_agent(user: &User) -> Result<(), TicketError> {
    if user.is_agent() {
        Ok(())
    } else {
        Err(TicketError::Forbidden("Agent role required".to_string()))
    }
}

pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateTicketRequest>,
) -> Result<(StatusCode, Json<TicketResponse>), TicketError> {
    let ticket = state.tickets.create_ticket(req, &user).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<TicketResponse>>, TicketError> {
    let tickets = state.tickets.list_tickets(&user, &query).await?;
    Ok(Json(state.tickets.to_responses(tickets).await?))
}

pub async fn my_tickets(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<TicketResponse>>, TicketError> {
    let tickets = state.tickets.tickets_for_user(&user).await?;
    Ok(Json(state.tickets.to_responses(tickets).await?))
}

pub async fn queue_tickets(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<TicketResponse>>, TicketError> {
    let tickets = state.tickets.queue_tickets(&user).await?;
    Ok(Json(state.tickets.to_responses(tickets).await?))
}

pub async fn assigned_tickets(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<TicketResponse>>, TicketError> {
    let tickets = state.tickets.assigned_tickets(&user).await?;
    Ok(Json(state.tickets.to_responses(tickets).await?))
}

pub async fn list_overdue_tickets(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<TicketResponse>>, TicketError> {
    let tickets = state.tickets.overdue_tickets(&user).await?;
    Ok(Json(state.tickets.to_responses(tickets).await?))
}

pub async fn get_ticket_stats(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<TicketStats>, TicketError> {
    Ok(Json(state.tickets.ticket_stats(&user).await?))
}

pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TicketResponse>, TicketError> {
    ensure_access(&state, id, &user).await?;
    Ok(Json(state.tickets.get_ticket(id).await?))
}

pub async fn get_ticket_with_comments(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TicketWithComments>, TicketError> {
    ensure_access(&state, id, &user).await?;
    Ok(Json(state.tickets.get_ticket_with_comments(id).await?))
}

pub async fn update_ticket(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTicketRequest>,
) -> Result<Json<TicketResponse>, TicketError> {
    ensure_access(&state, id, &user).await?;
    Ok(Json(state.tickets.update_ticket(id, req).await?))
}

pub async fn delete_ticket(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, TicketError> {
    ensure_access(&state, id, &user).await?;
    state.tickets.delete_ticket(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn assign_ticket(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<AssignRequest>,
) -> Result<Json<TicketResponse>, TicketError> {
    ensure_agent(&user)?;
    Ok(Json(state.tickets.assign_ticket(id, req.agent_id).await?))
}

pub async fn auto_assign_ticket(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TicketResponse>, TicketError> {
    ensure_agent(&user)?;
    Ok(Json(state.tickets.auto_assign_ticket(id).await?))
}

pub async fn change_status(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<TicketResponse>, TicketError> {
    ensure_access(&state, id, &user).await?;
    let ticket = state
        .tickets
        .lifecycle()
        .update_ticket_status(id, req.status)
        .await?;
    Ok(Json(state.tickets.to_response(ticket).await?))
}

pub async fn resolve_ticket(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    req: Option<Json<ResolutionRequest>>,
) -> Result<Json<TicketResponse>, TicketError> {
    ensure_access(&state, id, &user).await?;
    let req = req.map(|Json(req)| req).unwrap_or_default();
    let ticket = state
        .tickets
        .lifecycle()
        .resolve_ticket(id, &user, req.resolution_comment)
        .await?;
    Ok(Json(state.tickets.to_response(ticket).await?))
}

pub async fn close_ticket(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    req: Option<Json<ResolutionRequest>>,
) -> Result<Json<TicketResponse>, TicketError> {
    ensure_access(&state, id, &user).await?;
    let req = req.map(|Json(req)| req).unwrap_or_default();
    let ticket = state
        .tickets
        .lifecycle()
        .close_ticket(id, &user, req.resolution_comment)
        .await?;
    Ok(Json(state.tickets.to_response(ticket).await?))
}

pub async fn reopen_ticket(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TicketResponse>, TicketError> {
    ensure_access(&state, id, &user).await?;
    let ticket = state.tickets.lifecycle().reopen_ticket(id).await?;
    Ok(Json(state.tickets.to_response(ticket).await?))
}

pub async fn can_reopen_ticket(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<CanReopenResponse>, TicketError> {
    ensure_access(&state, id, &user).await?;
    let lifecycle = state.tickets.lifecycle();
    Ok(Json(CanReopenResponse {
        ticket_id: id,
        can_reopen: lifecycle.can_reopen_ticket(id).await?,
        window_business_days: lifecycle.reopen_window(),
    }))
}

pub fn configure_tickets_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tickets", get(list_tickets).post(create_ticket))
        .route("/api/tickets/mine", get(my_tickets))
        .route("/api/tickets/queue", get(queue_tickets))
        .route("/api/tickets/assigned", get(assigned_tickets))
        .route("/api/tickets/overdue", get(list_overdue_tickets))
        .route("/api/tickets/stats", get(get_ticket_stats))
        .route("/api/tickets/:id", get(get_ticket).put(update_ticket).delete(delete_ticket))
        .route("/api/tickets/:id/full", get(get_ticket_with_comments))
        .route("/api/tickets/:id/assign", put(assign_ticket))
        .route("/api/tickets/:id/auto-assign", put(auto_assign_ticket))
        .route("/api/tickets/:id/status", put(change_status))
        .route("/api/tickets/:id/resolve", put(resolve_ticket))
        .route("/api/tickets/:id/close", put(close_ticket))
        .route("/api/tickets/:id/reopen", put(reopen_ticket))
        .route("/api/tickets/:id/can-reopen", get(can_reopen_ticket))
}
