pub mod llm_ranking;
pub mod strategy;

pub use llm_ranking::LlmRankingStrategy;
pub use strategy::{AssignmentStrategy, LeastLoadedStrategy, Selection};

use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::shared::clock::Clock;
use crate::directory::{AgentSkills, User};
use crate::store::{Directory, StoreError, TicketFilter, TicketStore};
use crate::tickets::error::TicketError;
use crate::tickets::models::{
    Ticket, TicketPriority, TicketSeverity, TicketStatus, TicketTag,
};

const WORKLOAD_WINDOW_DAYS: i64 = 30;

/// What a strategy gets to know about the ticket being routed.
#[derive(Debug, Clone, Serialize)]
pub struct TicketContext {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub content: String,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub priority: TicketPriority,
    pub severity: TicketSeverity,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub requester: Option<String>,
    pub tags: Vec<TicketTag>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AgentWorkload {
    pub active_tickets: usize,
    pub high_priority_active: usize,
    pub total_tickets: usize,
    pub closed_tickets: usize,
    /// Closed or resolved within the trailing window.
    pub recently_closed: usize,
    pub avg_resolution_hours: Option<f64>,
}

impl AgentWorkload {
    pub fn from_tickets(tickets: &[Ticket], now: DateTime<Utc>) -> Self {
        let window_start = now - Duration::days(WORKLOAD_WINDOW_DAYS);
        let mut workload = Self {
            total_tickets: tickets.len(),
            ..Self::default()
        };
        let mut resolution_hours = Vec::new();

        for ticket in tickets {
            if ticket.status.is_active() {
                workload.active_tickets += 1;
                if ticket.priority.is_urgent() {
                    workload.high_priority_active += 1;
                }
            }
            if ticket.status.is_terminal() {
                workload.closed_tickets += 1;
                if let Some(closed_at) = ticket.closed_at.filter(|at| *at >= window_start) {
                    workload.recently_closed += 1;
                    let minutes = (closed_at - ticket.created_at).num_minutes();
                    resolution_hours.push(minutes as f64 / 60.0);
                }
            }
        }

        if !resolution_hours.is_empty() {
            let sum: f64 = resolution_hours.iter().sum();
            workload.avg_resolution_hours = Some(sum / resolution_hours.len() as f64);
        }
        workload
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentCandidate {
    pub skills: AgentSkills,
    pub category_match: bool,
    pub matching_subcategories: Vec<String>,
    pub workload: AgentWorkload,
}

impl AgentCandidate {
    pub fn agent_id(&self) -> Uuid {
        self.skills.agent.id
    }
}

pub struct AssignmentEngine {
    store: Arc<dyn TicketStore>,
    directory: Arc<dyn Directory>,
    clock: Arc<dyn Clock>,
    primary: Option<Arc<dyn AssignmentStrategy>>,
    fallback: LeastLoadedStrategy,
    timeout: std::time::Duration,
}

impl AssignmentEngine {
    pub fn new(
        store: Arc<dyn TicketStore>,
        directory: Arc<dyn Directory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            directory,
            clock,
            primary: None,
            fallback: LeastLoadedStrategy,
            timeout: std::time::Duration::from_secs(20),
        }
    }

    pub fn with_primary(
        mut self,
        strategy: Arc<dyn AssignmentStrategy>,
        timeout: std::time::Duration,
    ) -> Self {
        self.primary = Some(strategy);
        self.timeout = timeout;
        self
    }

    pub async fn ticket_context(&self, ticket: &Ticket) -> Result<TicketContext, StoreError> {
        let category = self.directory.get_category(ticket.category_id).await?;
        let subcategory = self.directory.get_subcategory(ticket.subcategory_id).await?;
        let requester = self.directory.get_user(ticket.user_id).await?;

        Ok(TicketContext {
            id: ticket.id,
            title: ticket.title.clone(),
            description: ticket.description.clone(),
            content: ticket.content.text.clone(),
            category: category.map(|c| c.name),
            subcategory: subcategory.map(|s| s.name),
            priority: ticket.priority,
            severity: ticket.severity,
            status: ticket.status,
            created_at: ticket.created_at,
            requester: requester.map(|u| u.full_name()),
            tags: ticket.tags.clone(),
        })
    }

    /// Every agent with a skill profile, in directory order.
    pub async fn candidates(&self, ticket: &Ticket) -> Result<Vec<AgentCandidate>, StoreError> {
        let now = self.clock.now();
        let mut candidates = Vec::new();

        for skills in self.directory.agent_skills().await? {
            let assigned = self
                .store
                .find_tickets(&TicketFilter::new().assigned_to(skills.agent.id))
                .await?;
            let matching_subcategories = skills
                .subcategories
                .iter()
                .filter(|s| s.id == ticket.subcategory_id)
                .map(|s| s.name.clone())
                .collect();

            candidates.push(AgentCandidate {
                category_match: skills.covers_category(ticket.category_id),
                matching_subcategories,
                workload: AgentWorkload::from_tickets(&assigned, now),
                skills,
            });
        }
        Ok(candidates)
    }

    /// Deterministic pick used at creation time. Only agents covering the
    /// ticket's category qualify; otherwise the ticket waits in their queue.
    pub async fn select_least_loaded(&self, ticket: &Ticket) -> Result<Option<User>, StoreError> {
        let candidates = self.candidates(ticket).await?;
        Ok(self
            .fallback
            .pick_in_category(&candidates)
            .map(|candidate| candidate.skills.agent.clone()))
    }

    /// Primary strategy under a timeout, then the deterministic fallback.
    /// Only store failures surface as errors.
    pub async fn assign_ticket_to_agent(&self, ticket: &Ticket) -> Result<Option<User>, TicketError> {
        let candidates = self.candidates(ticket).await?;
        if candidates.is_empty() {
            info!("No agents with skill profiles for ticket {}", ticket.id);
            return Ok(None);
        }

        if let Some(primary) = &self.primary {
            let context = self.ticket_context(ticket).await?;
            if let Some(selection) = self
                .run_primary(primary.as_ref(), &context, &candidates)
                .await
            {
                let chosen = candidates
                    .iter()
                    .find(|c| c.agent_id() == selection.agent_id)
                    .map(|c| c.skills.agent.clone());
                if chosen.is_some() {
                    return Ok(chosen);
                }
            }
        }

        let chosen = self.fallback.pick(&candidates).map(|c| c.skills.agent.clone());
        if let Some(agent) = &chosen {
            info!(
                "Fallback assignment for ticket {}: agent {}",
                ticket.id, agent.id
            );
        }
        Ok(chosen)
    }

    async fn run_primary(
        &self,
        strategy: &dyn AssignmentStrategy,
        context: &TicketContext,
        candidates: &[AgentCandidate],
    ) -> Option<Selection> {
        let outcome = tokio::time::timeout(self.timeout, strategy.select(context, candidates)).await;
        match outcome {
            Err(_) => {
                warn!(
                    "Assignment strategy {} timed out after {:?} for ticket {}",
                    strategy.name(),
                    self.timeout,
                    context.id
                );
                None
            }
            Ok(Err(e)) => {
                warn!(
                    "Assignment strategy {} failed for ticket {}: {}",
                    strategy.name(),
                    context.id,
                    e
                );
                None
            }
            Ok(Ok(None)) => {
                info!(
                    "Assignment strategy {} found no suitable agent for ticket {}",
                    strategy.name(),
                    context.id
                );
                None
            }
            Ok(Ok(Some(selection)))
                if !candidates.iter().any(|c| c.agent_id() == selection.agent_id) =>
            {
                warn!(
                    "Assignment strategy {} picked unknown agent {} for ticket {}",
                    strategy.name(),
                    selection.agent_id,
                    context.id
                );
                None
            }
            Ok(Ok(Some(selection))) => Some(selection),
        }
    }
}
