use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    New,
    InProgress,
    WaitingForCustomer,
    WaitingForAgent,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 6] = [
        TicketStatus::New,
        TicketStatus::InProgress,
        TicketStatus::WaitingForCustomer,
        TicketStatus::WaitingForAgent,
        TicketStatus::Resolved,
        TicketStatus::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::InProgress => "in_progress",
            Self::WaitingForCustomer => "waiting_for_customer",
            Self::WaitingForAgent => "waiting_for_agent",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }

    /// Statuses an agent or requester may move a ticket to by hand.
    pub fn allowed_transitions(&self) -> &'static [TicketStatus] {
        match self {
            Self::New => &[Self::InProgress, Self::WaitingForAgent],
            Self::InProgress => &[Self::WaitingForCustomer, Self::Resolved, Self::Closed],
            Self::WaitingForCustomer => &[Self::InProgress, Self::Closed],
            Self::WaitingForAgent => &[Self::InProgress],
            Self::Resolved => &[Self::Closed, Self::InProgress],
            Self::Closed => &[Self::InProgress],
        }
    }

    pub fn can_transition_to(&self, next: TicketStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Closed)
    }

    /// Statuses counted as open work when measuring an agent's load.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::New | Self::InProgress | Self::WaitingForCustomer)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "in_progress" => Ok(Self::InProgress),
            "waiting_for_customer" => Ok(Self::WaitingForCustomer),
            "waiting_for_agent" => Ok(Self::WaitingForAgent),
            "resolved" => Ok(Self::Resolved),
            "closed" => Ok(Self::Closed),
            other => Err(format!("unknown ticket status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl TicketPriority {
    pub const ALL: [TicketPriority; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn is_urgent(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

impl fmt::Display for TicketPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown ticket priority: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TicketSeverity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl TicketSeverity {
    pub const ALL: [TicketSeverity; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl FromStr for TicketSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown ticket severity: {other}")),
        }
    }
}

/// Editor payload: HTML for display, editor JSON, and plain text for search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RichTextContent {
    pub html: String,
    pub json: serde_json::Value,
    pub text: String,
}

impl RichTextContent {
    pub fn from_text(text: &str) -> Self {
        let json = if text.trim().is_empty() {
            serde_json::json!({ "type": "doc", "content": [] })
        } else {
            serde_json::json!({
                "type": "doc",
                "content": [{
                    "type": "paragraph",
                    "content": [{ "type": "text", "text": text }]
                }]
            })
        };

        Self {
            html: text.replace('\n', "<br>"),
            json,
            text: text.to_string(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty() && self.html.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketTag {
    pub key: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Uuid,
    pub category_id: Uuid,
    pub subcategory_id: Uuid,
    pub user_id: Uuid,
    pub agent_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub content: RichTextContent,
    pub priority: TicketPriority,
    pub severity: TicketSeverity,
    pub tags: Vec<TicketTag>,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub sla_due_date: Option<DateTime<Utc>>,
    pub sla_breached: bool,
    pub sla_paused_at: Option<DateTime<Utc>>,
    pub sla_total_paused_minutes: i64,
}

impl Ticket {
    /// A freshly submitted ticket: status `new`, no agent, SLA not yet stamped.
    pub fn new(
        category_id: Uuid,
        subcategory_id: Uuid,
        user_id: Uuid,
        title: String,
        description: String,
        content: RichTextContent,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            category_id,
            subcategory_id,
            user_id,
            agent_id: None,
            title,
            description,
            content,
            priority: TicketPriority::default(),
            severity: TicketSeverity::default(),
            tags: Vec::new(),
            status: TicketStatus::New,
            created_at: now,
            updated_at: now,
            closed_at: None,
            sla_due_date: None,
            sla_breached: false,
            sla_paused_at: None,
            sla_total_paused_minutes: 0,
        }
    }

    pub fn is_sla_paused(&self) -> bool {
        self.sla_paused_at.is_some()
    }
}
