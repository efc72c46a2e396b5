pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::comments::Comment;
use crate::directory::{AgentSkills, Category, SubCategory, User};
use crate::tickets::models::{Ticket, TicketPriority, TicketStatus};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Connection pool error: {0}")]
    Pool(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Task error: {0}")]
    Task(String),
    /// Unique or foreign-key constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgentFilter {
    #[default]
    Any,
    Unassigned,
    Assigned(Uuid),
}

/// Conjunction of optional equality/inequality predicates over tickets.
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    pub status_in: Option<Vec<TicketStatus>>,
    pub status_not: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub category_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub agent: AgentFilter,
    pub sla_due_before: Option<DateTime<Utc>>,
    pub sla_breached: Option<bool>,
}

impl TicketFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: TicketStatus) -> Self {
        self.status_in = Some(vec![status]);
        self
    }

    pub fn status_in(mut self, statuses: &[TicketStatus]) -> Self {
        self.status_in = Some(statuses.to_vec());
        self
    }

    pub fn status_not(mut self, status: TicketStatus) -> Self {
        self.status_not = Some(status);
        self
    }

    pub fn priority(mut self, priority: TicketPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn category(mut self, category_id: Uuid) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn requester(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn assigned_to(mut self, agent_id: Uuid) -> Self {
        self.agent = AgentFilter::Assigned(agent_id);
        self
    }

    pub fn unassigned(mut self) -> Self {
        self.agent = AgentFilter::Unassigned;
        self
    }

    pub fn sla_due_before(mut self, at: DateTime<Utc>) -> Self {
        self.sla_due_before = Some(at);
        self
    }

    pub fn sla_breached(mut self, breached: bool) -> Self {
        self.sla_breached = Some(breached);
        self
    }

    pub fn matches(&self, ticket: &Ticket) -> bool {
        if let Some(statuses) = &self.status_in {
            if !statuses.contains(&ticket.status) {
                return false;
            }
        }
        if self.status_not == Some(ticket.status) {
            return false;
        }
        if self.priority.is_some_and(|p| p != ticket.priority) {
            return false;
        }
        if self.category_id.is_some_and(|c| c != ticket.category_id) {
            return false;
        }
        if self.user_id.is_some_and(|u| u != ticket.user_id) {
            return false;
        }
        match self.agent {
            AgentFilter::Any => {}
            AgentFilter::Unassigned if ticket.agent_id.is_some() => return false,
            AgentFilter::Assigned(id) if ticket.agent_id != Some(id) => return false,
            _ => {}
        }
        if let Some(before) = self.sla_due_before {
            match ticket.sla_due_date {
                Some(due) if due < before => {}
                _ => return false,
            }
        }
        if self.sla_breached.is_some_and(|b| b != ticket.sla_breached) {
            return false;
        }
        true
    }
}

#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn insert_ticket(&self, ticket: Ticket) -> Result<Ticket, StoreError>;
    async fn get_ticket(&self, id: Uuid) -> Result<Option<Ticket>, StoreError>;
    async fn save_ticket(&self, ticket: &Ticket) -> Result<(), StoreError>;
    async fn delete_ticket(&self, id: Uuid) -> Result<bool, StoreError>;
    /// Newest first.
    async fn find_tickets(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, StoreError>;

    async fn insert_comment(&self, comment: Comment) -> Result<Comment, StoreError>;
    async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>, StoreError>;
    async fn save_comment(&self, comment: &Comment) -> Result<(), StoreError>;
    async fn delete_comment(&self, id: Uuid) -> Result<bool, StoreError>;
    /// Oldest first.
    async fn comments_for_ticket(&self, ticket_id: Uuid) -> Result<Vec<Comment>, StoreError>;
}

#[async_trait]
pub trait Directory: Send + Sync {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn get_category(&self, id: Uuid) -> Result<Option<Category>, StoreError>;
    async fn get_subcategory(&self, id: Uuid) -> Result<Option<SubCategory>, StoreError>;
    /// Every agent skill profile, resolved, in a stable order.
    async fn agent_skills(&self) -> Result<Vec<AgentSkills>, StoreError>;
    async fn agent_skills_for(&self, agent_id: Uuid) -> Result<Option<AgentSkills>, StoreError>;

    /// Ordered by name.
    async fn list_categories(&self) -> Result<Vec<Category>, StoreError>;
    /// Ordered by name.
    async fn subcategories_for(&self, category_id: Uuid) -> Result<Vec<SubCategory>, StoreError>;
    async fn insert_category(&self, category: Category) -> Result<Category, StoreError>;
    /// False when no such category exists.
    async fn save_category(&self, category: &Category) -> Result<bool, StoreError>;
    /// Takes the category's subcategories with it. Refused while tickets reference it.
    async fn delete_category(&self, id: Uuid) -> Result<bool, StoreError>;
    async fn insert_subcategory(&self, subcategory: SubCategory) -> Result<SubCategory, StoreError>;
    /// False when no such subcategory exists.
    async fn save_subcategory(&self, subcategory: &SubCategory) -> Result<bool, StoreError>;
    /// Refused while tickets reference it.
    async fn delete_subcategory(&self, id: Uuid) -> Result<bool, StoreError>;
}
