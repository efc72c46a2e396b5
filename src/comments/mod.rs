use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::middleware::CurrentUser;
use crate::core::shared::clock::Clock;
use crate::core::shared::state::AppState;
use crate::directory::User;
use crate::store::TicketStore;
use crate::tickets::error::TicketError;
use crate::tickets::lifecycle::TicketLifecycle;
use crate::tickets::models::{RichTextContent, TicketStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub author_id: Uuid,
    pub content: RichTextContent,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(
        ticket_id: Uuid,
        author_id: Uuid,
        content: RichTextContent,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            ticket_id,
            author_id,
            content,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub content: RichTextContent,
}

#[derive(Debug, Serialize)]
pub struct CommentCreated {
    pub comment: Comment,
    /// Set when the reply moved the ticket between waiting states.
    pub ticket_status: Option<TicketStatus>,
}

pub struct CommentService {
    store: Arc<dyn TicketStore>,
    lifecycle: Arc<TicketLifecycle>,
    clock: Arc<dyn Clock>,
}

impl CommentService {
    pub fn new(
        store: Arc<dyn TicketStore>,
        lifecycle: Arc<TicketLifecycle>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            lifecycle,
            clock,
        }
    }

    pub async fn create_comment(
        &self,
        ticket_id: Uuid,
        author: &User,
        content: RichTextContent,
    ) -> Result<CommentCreated, TicketError> {
        if content.is_blank() {
            return Err(TicketError::Validation(
                "Comment content cannot be empty".to_string(),
            ));
        }

        let mut ticket = self
            .store
            .get_ticket(ticket_id)
            .await?
            .ok_or_else(|| TicketError::ticket_not_found(ticket_id))?;

        let comment = Comment::new(ticket_id, author.id, content, self.clock.now());
        let comment = self.store.insert_comment(comment).await?;

        // Status and SLA only move once the comment is stored.
        let ticket_status = self
            .lifecycle
            .on_comment_created(&mut ticket, author.role)
            .await?;
        info!(
            "Comment {} added to ticket {} by {} ({})",
            comment.id, ticket_id, author.id, author.role
        );

        Ok(CommentCreated {
            comment,
            ticket_status,
        })
    }

    pub async fn comments_for_ticket(&self, ticket_id: Uuid) -> Result<Vec<Comment>, TicketError> {
        if self.store.get_ticket(ticket_id).await?.is_none() {
            return Err(TicketError::ticket_not_found(ticket_id));
        }
        Ok(self.store.comments_for_ticket(ticket_id).await?)
    }

    pub async fn get_comment(&self, comment_id: Uuid) -> Result<Comment, TicketError> {
        self.store
            .get_comment(comment_id)
            .await?
            .ok_or_else(|| TicketError::NotFound(format!("Comment {comment_id} not found")))
    }

    pub async fn update_comment(
        &self,
        comment_id: Uuid,
        editor: &User,
        content: RichTextContent,
    ) -> Result<Comment, TicketError> {
        let mut comment = self.get_comment(comment_id).await?;
        if comment.author_id != editor.id {
            return Err(TicketError::Forbidden(
                "Only the author can edit a comment".to_string(),
            ));
        }
        if content.is_blank() {
            return Err(TicketError::Validation(
                "Comment content cannot be empty".to_string(),
            ));
        }

        comment.content = content;
        comment.updated_at = self.clock.now();
        self.store.save_comment(&comment).await?;
        Ok(comment)
    }

    pub async fn delete_comment(&self, comment_id: Uuid, editor: &User) -> Result<(), TicketError> {
        let comment = self.get_comment(comment_id).await?;
        if comment.author_id != editor.id {
            return Err(TicketError::Forbidden(
                "Only the author can delete a comment".to_string(),
            ));
        }
        self.store.delete_comment(comment_id).await?;
        info!("Comment {} deleted by {}", comment_id, editor.id);
        Ok(())
    }
}

async fn ensure_ticket_access(
    state: &AppState,
    ticket_id: Uuid,
    user: &User,
) -> Result<(), TicketError> {
    if state.tickets.can_access_ticket(ticket_id, user).await? {
        Ok(())
    } else {
        Err(TicketError::Forbidden(format!(
            "No access to ticket {ticket_id}"
        )))
    }
}

pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(ticket_id): Path<Uuid>,
) -> Result<Json<Vec<Comment>>, TicketError> {
    ensure_ticket_access(&state, ticket_id, &user).await?;
    Ok(Json(state.comments.comments_for_ticket(ticket_id).await?))
}

pub async fn add_comment(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(ticket_id): Path<Uuid>,
    Json(req): Json<CommentRequest>,
) -> Result<(StatusCode, Json<CommentCreated>), TicketError> {
    ensure_ticket_access(&state, ticket_id, &user).await?;
    let created = state
        .comments
        .create_comment(ticket_id, &user, req.content)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_comment(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Comment>, TicketError> {
    let comment = state.comments.get_comment(id).await?;
    ensure_ticket_access(&state, comment.ticket_id, &user).await?;
    Ok(Json(comment))
}

pub async fn update_comment(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<CommentRequest>,
) -> Result<Json<Comment>, TicketError> {
    Ok(Json(
        state.comments.update_comment(id, &user, req.content).await?,
    ))
}

pub async fn delete_comment(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, TicketError> {
    state.comments.delete_comment(id, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn configure_comments_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/tickets/:id/comments",
            get(list_comments).post(add_comment),
        )
        .route(
            "/api/comments/:id",
            get(get_comment).put(update_comment).delete(delete_comment),
        )
}
