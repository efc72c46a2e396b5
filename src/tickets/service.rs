use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use super::error::TicketError;
use super::lifecycle::{apply_transition, TicketLifecycle};
use super::models::{
    RichTextContent, Ticket, TicketPriority, TicketSeverity, TicketStatus, TicketTag,
};
use crate::assignment::AssignmentEngine;
use crate::comments::Comment;
use crate::core::shared::clock::Clock;
use crate::directory::{Category, SubCategory, User, UserRole};
use crate::sla::{SlaEngine, SlaJobSender};
use crate::store::{Directory, TicketFilter, TicketStore};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTicketRequest {
    pub category_id: Uuid,
    pub subcategory_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub content: Option<RichTextContent>,
    pub priority: Option<TicketPriority>,
    pub severity: Option<TicketSeverity>,
    pub tags: Option<Vec<TicketTag>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTicketRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<RichTextContent>,
    pub priority: Option<TicketPriority>,
    pub severity: Option<TicketSeverity>,
    pub tags: Option<Vec<TicketTag>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserInfo {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub role: UserRole,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        Self {
            full_name: user.full_name(),
            id: user.id,
            email: user.email,
            role: user.role,
        }
    }
}

/// A ticket with its references loaded.
#[derive(Debug, Clone, Serialize)]
pub struct TicketResponse {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub category: Option<Category>,
    pub subcategory: Option<SubCategory>,
    pub user: Option<UserInfo>,
    pub agent: Option<UserInfo>,
}

#[derive(Debug, Serialize)]
pub struct TicketWithComments {
    pub ticket: TicketResponse,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TicketStats {
    pub total: usize,
    pub by_status: BTreeMap<&'static str, usize>,
    pub by_priority: BTreeMap<&'static str, usize>,
    pub by_severity: BTreeMap<&'static str, usize>,
    pub sla_breached: usize,
}

impl TicketStats {
    pub fn from_tickets(tickets: &[Ticket]) -> Self {
        let mut stats = Self {
            total: tickets.len(),
            by_status: TicketStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect(),
            by_priority: TicketPriority::ALL.iter().map(|p| (p.as_str(), 0)).collect(),
            by_severity: TicketSeverity::ALL.iter().map(|s| (s.as_str(), 0)).collect(),
            sla_breached: 0,
        };
        for ticket in tickets {
            *stats.by_status.entry(ticket.status.as_str()).or_default() += 1;
            *stats.by_priority.entry(ticket.priority.as_str()).or_default() += 1;
            *stats.by_severity.entry(ticket.severity.as_str()).or_default() += 1;
            if ticket.sla_breached {
                stats.sla_breached += 1;
            }
        }
        stats
    }
}

pub struct TicketService {
    store: Arc<dyn TicketStore>,
    directory: Arc<dyn Directory>,
    lifecycle: Arc<TicketLifecycle>,
    assignment: Arc<AssignmentEngine>,
    sla: Arc<SlaEngine>,
    clock: Arc<dyn Clock>,
    sla_jobs: Option<SlaJobSender>,
}

impl TicketService {
    pub fn new(
        store: Arc<dyn TicketStore>,
        directory: Arc<dyn Directory>,
        lifecycle: Arc<TicketLifecycle>,
        assignment: Arc<AssignmentEngine>,
        sla: Arc<SlaEngine>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            directory,
            lifecycle,
            assignment,
            sla,
            clock,
            sla_jobs: None,
        }
    }

    /// Hand initial SLA stamping to a background consumer instead of doing it inline.
    pub fn with_sla_queue(mut self, sender: SlaJobSender) -> Self {
        self.sla_jobs = Some(sender);
        self
    }

    pub fn lifecycle(&self) -> &TicketLifecycle {
        &self.lifecycle
    }

    async fn load(&self, ticket_id: Uuid) -> Result<Ticket, TicketError> {
        self.store
            .get_ticket(ticket_id)
            .await?
            .ok_or_else(|| TicketError::ticket_not_found(ticket_id))
    }

    pub async fn to_response(&self, ticket: Ticket) -> Result<TicketResponse, TicketError> {
        let category = self.directory.get_category(ticket.category_id).await?;
        let subcategory = self.directory.get_subcategory(ticket.subcategory_id).await?;
        let user = self.directory.get_user(ticket.user_id).await?.map(UserInfo::from);
        let agent = match ticket.agent_id {
            Some(agent_id) => self.directory.get_user(agent_id).await?.map(UserInfo::from),
            None => None,
        };

        Ok(TicketResponse {
            ticket,
            category,
            subcategory,
            user,
            agent,
        })
    }

    pub async fn to_responses(&self, tickets: Vec<Ticket>) -> Result<Vec<TicketResponse>, TicketError> {
        let mut responses = Vec::with_capacity(tickets.len());
        for ticket in tickets {
            responses.push(self.to_response(ticket).await?);
        }
        Ok(responses)
    }

    pub async fn create_ticket(
        &self,
        req: CreateTicketRequest,
        user: &User,
    ) -> Result<TicketResponse, TicketError> {
        if req.title.trim().is_empty() {
            return Err(TicketError::Validation("Title is required".to_string()));
        }
        let category = self
            .directory
            .get_category(req.category_id)
            .await?
            .ok_or_else(|| TicketError::Validation(format!("Unknown category {}", req.category_id)))?;
        let subcategory = self
            .directory
            .get_subcategory(req.subcategory_id)
            .await?
            .ok_or_else(|| {
                TicketError::Validation(format!("Unknown subcategory {}", req.subcategory_id))
            })?;
        if subcategory.category_id != category.id {
            return Err(TicketError::Validation(format!(
                "Subcategory {} does not belong to category {}",
                subcategory.name, category.name
            )));
        }

        let now = self.clock.now();
        let description = req.description.unwrap_or_default();
        let content = req
            .content
            .unwrap_or_else(|| RichTextContent::from_text(&description));
        let mut ticket = Ticket::new(
            category.id,
            subcategory.id,
            user.id,
            req.title.trim().to_string(),
            description,
            content,
            now,
        );
        ticket.priority = req.priority.unwrap_or_default();
        ticket.severity = req.severity.unwrap_or_default();
        ticket.tags = req.tags.unwrap_or_default();

        let mut ticket = self.store.insert_ticket(ticket).await?;
        info!(
            "Ticket {} created by {} in {} ({})",
            ticket.id, user.id, category.name, ticket.priority
        );

        match self.assignment.select_least_loaded(&ticket).await {
            Ok(Some(agent)) => {
                ticket.agent_id = Some(agent.id);
                apply_transition(&mut ticket, TicketStatus::InProgress, now);
                self.store.save_ticket(&ticket).await?;
                info!("Ticket {} auto-assigned to agent {}", ticket.id, agent.id);
            }
            Ok(None) => info!("Ticket {} left unassigned: no agents available", ticket.id),
            Err(e) => warn!("Auto-assignment failed for ticket {}: {}", ticket.id, e),
        }

        self.schedule_sla(&mut ticket).await;
        self.to_response(ticket).await
    }

    async fn schedule_sla(&self, ticket: &mut Ticket) {
        if let Some(jobs) = &self.sla_jobs {
            if jobs.send(ticket.id).is_ok() {
                return;
            }
            warn!("SLA job queue closed, stamping ticket {} inline", ticket.id);
        }
        if let Err(e) = self.sla.update_ticket_sla(ticket).await {
            warn!("Error setting SLA for ticket {}: {}", ticket.id, e);
        }
    }

    pub async fn get_ticket(&self, ticket_id: Uuid) -> Result<TicketResponse, TicketError> {
        let ticket = self.load(ticket_id).await?;
        self.to_response(ticket).await
    }

    pub async fn get_ticket_with_comments(
        &self,
        ticket_id: Uuid,
    ) -> Result<TicketWithComments, TicketError> {
        let ticket = self.get_ticket(ticket_id).await?;
        let comments = self.store.comments_for_ticket(ticket_id).await?;
        Ok(TicketWithComments { ticket, comments })
    }

    pub async fn update_ticket(
        &self,
        ticket_id: Uuid,
        req: UpdateTicketRequest,
    ) -> Result<TicketResponse, TicketError> {
        let mut ticket = self.load(ticket_id).await?;

        if let Some(title) = req.title {
            if title.trim().is_empty() {
                return Err(TicketError::Validation("Title cannot be empty".to_string()));
            }
            ticket.title = title.trim().to_string();
        }
        if let Some(description) = req.description {
            ticket.description = description;
        }
        if let Some(content) = req.content {
            ticket.content = content;
        }
        if let Some(priority) = req.priority {
            ticket.priority = priority;
        }
        if let Some(severity) = req.severity {
            ticket.severity = severity;
        }
        if let Some(tags) = req.tags {
            ticket.tags = tags;
        }
        ticket.updated_at = self.clock.now();

        self.store.save_ticket(&ticket).await?;
        self.to_response(ticket).await
    }

    pub async fn delete_ticket(&self, ticket_id: Uuid) -> Result<(), TicketError> {
        if !self.store.delete_ticket(ticket_id).await? {
            return Err(TicketError::ticket_not_found(ticket_id));
        }
        info!("Ticket {} deleted", ticket_id);
        Ok(())
    }

    async fn agent_category(&self, agent_id: Uuid) -> Result<Option<Uuid>, TicketError> {
        Ok(self
            .directory
            .agent_skills_for(agent_id)
            .await?
            .and_then(|skills| skills.category_id()))
    }

    fn require_agent(user: &User) -> Result<(), TicketError> {
        if user.is_agent() {
            Ok(())
        } else {
            Err(TicketError::Forbidden("Agent role required".to_string()))
        }
    }

    /// Requesters see their own tickets. Agents see their assignments plus the
    /// unassigned tickets of their category.
    pub async fn list_tickets(&self, user: &User, query: &ListQuery) -> Result<Vec<Ticket>, TicketError> {
        let mut base = TicketFilter::new();
        if let Some(status) = query.status {
            base = base.status(status);
        }
        if let Some(priority) = query.priority {
            base = base.priority(priority);
        }

        if !user.is_agent() {
            return Ok(self.store.find_tickets(&base.requester(user.id)).await?);
        }

        let mut tickets = self
            .store
            .find_tickets(&base.clone().assigned_to(user.id))
            .await?;
        if let Some(category_id) = self.agent_category(user.id).await? {
            let unassigned = self
                .store
                .find_tickets(&base.category(category_id).unassigned())
                .await?;
            tickets.extend(unassigned);
            tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }
        Ok(tickets)
    }

    pub async fn tickets_for_user(&self, user: &User) -> Result<Vec<Ticket>, TicketError> {
        let filter = if user.is_agent() {
            TicketFilter::new().assigned_to(user.id)
        } else {
            TicketFilter::new().requester(user.id)
        };
        Ok(self.store.find_tickets(&filter).await?)
    }

    pub async fn queue_tickets(&self, agent: &User) -> Result<Vec<Ticket>, TicketError> {
        Self::require_agent(agent)?;
        let Some(category_id) = self.agent_category(agent.id).await? else {
            return Ok(Vec::new());
        };
        let filter = TicketFilter::new()
            .unassigned()
            .status_in(&[TicketStatus::New, TicketStatus::WaitingForAgent])
            .category(category_id);
        Ok(self.store.find_tickets(&filter).await?)
    }

    pub async fn assigned_tickets(&self, agent: &User) -> Result<Vec<Ticket>, TicketError> {
        Self::require_agent(agent)?;
        Ok(self
            .store
            .find_tickets(&TicketFilter::new().assigned_to(agent.id))
            .await?)
    }

    pub async fn overdue_tickets(&self, agent: &User) -> Result<Vec<Ticket>, TicketError> {
        Self::require_agent(agent)?;
        Ok(self.sla.get_overdue_tickets().await?)
    }

    pub async fn can_access_ticket(&self, ticket_id: Uuid, user: &User) -> Result<bool, TicketError> {
        let ticket = self.load(ticket_id).await?;
        if !user.is_agent() {
            return Ok(ticket.user_id == user.id);
        }
        match ticket.agent_id {
            Some(agent_id) => Ok(agent_id == user.id),
            None => Ok(self.agent_category(user.id).await? == Some(ticket.category_id)),
        }
    }

    pub async fn ticket_stats(&self, user: &User) -> Result<TicketStats, TicketError> {
        let tickets = self.list_tickets(user, &ListQuery::default()).await?;
        Ok(TicketStats::from_tickets(&tickets))
    }

    pub async fn assign_ticket(
        &self,
        ticket_id: Uuid,
        agent_id: Uuid,
    ) -> Result<TicketResponse, TicketError> {
        let mut ticket = self.load(ticket_id).await?;
        let agent = self
            .directory
            .get_user(agent_id)
            .await?
            .filter(User::is_agent)
            .ok_or_else(|| TicketError::InvalidAgent(format!("User {agent_id} is not an agent")))?;

        self.apply_assignment(&mut ticket, &agent).await?;
        self.to_response(ticket).await
    }

    /// Runs the full assignment engine, primary strategy included.
    pub async fn auto_assign_ticket(&self, ticket_id: Uuid) -> Result<TicketResponse, TicketError> {
        let mut ticket = self.load(ticket_id).await?;
        let agent = self
            .assignment
            .assign_ticket_to_agent(&ticket)
            .await?
            .ok_or(TicketError::NoAgentAvailable)?;

        self.apply_assignment(&mut ticket, &agent).await?;
        self.to_response(ticket).await
    }

    async fn apply_assignment(&self, ticket: &mut Ticket, agent: &User) -> Result<(), TicketError> {
        ticket.agent_id = Some(agent.id);
        self.lifecycle
            .force_status(ticket, TicketStatus::InProgress)
            .await?;
        info!("Ticket {} assigned to agent {}", ticket.id, agent.id);
        Ok(())
    }
}
