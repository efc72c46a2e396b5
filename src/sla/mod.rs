pub mod monitor;

pub use monitor::{sla_job_channel, SlaJobReceiver, SlaJobSender, SlaMonitor, SweepReport};

use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::config::SlaConfig;
use crate::core::shared::clock::Clock;
use crate::store::{StoreError, TicketFilter, TicketStore};
use crate::tickets::models::{Ticket, TicketPriority, TicketStatus};

/// Response-time targets per priority, in hours.
#[derive(Debug, Clone, PartialEq)]
pub struct SlaPolicy {
    response_hours: HashMap<TicketPriority, i64>,
    default_hours: i64,
}

impl Default for SlaPolicy {
    fn default() -> Self {
        Self::from_config(&SlaConfig::default())
    }
}

impl SlaPolicy {
    pub fn from_config(config: &SlaConfig) -> Self {
        let response_hours = HashMap::from([
            (TicketPriority::Critical, config.critical_hours),
            (TicketPriority::High, config.high_hours),
            (TicketPriority::Medium, config.medium_hours),
            (TicketPriority::Low, config.low_hours),
        ]);
        Self {
            response_hours,
            default_hours: config.default_hours,
        }
    }

    pub fn without(mut self, priority: TicketPriority) -> Self {
        self.response_hours.remove(&priority);
        self
    }

    pub fn response_hours(&self, priority: TicketPriority) -> i64 {
        self.response_hours
            .get(&priority)
            .copied()
            .unwrap_or(self.default_hours)
    }

    /// Plain calendar arithmetic: weekends and business hours are not skipped.
    pub fn due_date(&self, created_at: DateTime<Utc>, priority: TicketPriority) -> DateTime<Utc> {
        created_at + Duration::hours(self.response_hours(priority))
    }
}

pub fn check_sla_breach(ticket: &Ticket, now: DateTime<Utc>) -> bool {
    let Some(due) = ticket.sla_due_date else {
        return false;
    };
    if ticket.status == TicketStatus::WaitingForCustomer {
        return false;
    }
    now > due
}

/// Stamps the pause time. Returns false when the clock was already paused.
pub fn pause_sla_clock(ticket: &mut Ticket, now: DateTime<Utc>) -> bool {
    if ticket.is_sla_paused() {
        return false;
    }
    ticket.sla_paused_at = Some(now);
    true
}

/// Pushes the deadline out by the paused wall-clock time and clears the pause.
pub fn resume_sla_clock(ticket: &mut Ticket, now: DateTime<Utc>) -> Option<Duration> {
    let paused_at = ticket.sla_paused_at.take()?;
    let pause = (now - paused_at).max(Duration::zero());

    ticket.sla_total_paused_minutes += pause.num_minutes();
    if let Some(due) = ticket.sla_due_date {
        ticket.sla_due_date = Some(due + pause);
    }
    Some(pause)
}

pub struct SlaEngine {
    store: Arc<dyn TicketStore>,
    clock: Arc<dyn Clock>,
    policy: SlaPolicy,
}

impl SlaEngine {
    pub fn new(store: Arc<dyn TicketStore>, clock: Arc<dyn Clock>, policy: SlaPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn calculate_sla_due_date(&self, ticket: &Ticket) -> DateTime<Utc> {
        self.policy.due_date(ticket.created_at, ticket.priority)
    }

    pub fn check_sla_breach(&self, ticket: &Ticket) -> bool {
        check_sla_breach(ticket, self.clock.now())
    }

    /// Stamps the due date once and raises the breach flag. Safe to re-run.
    pub async fn update_ticket_sla(&self, ticket: &mut Ticket) -> Result<(), StoreError> {
        if ticket.sla_due_date.is_none() {
            let due = self.calculate_sla_due_date(ticket);
            debug!("SLA due date for ticket {} set to {}", ticket.id, due);
            ticket.sla_due_date = Some(due);
        }

        // sticky: never cleared here
        ticket.sla_breached = ticket.sla_breached || self.check_sla_breach(ticket);

        self.store.save_ticket(ticket).await
    }

    pub async fn pause_sla(&self, ticket: &mut Ticket) -> Result<bool, StoreError> {
        if !pause_sla_clock(ticket, self.clock.now()) {
            return Ok(false);
        }
        info!("SLA paused for ticket {}", ticket.id);
        self.store.save_ticket(ticket).await?;
        Ok(true)
    }

    pub async fn resume_sla(&self, ticket: &mut Ticket) -> Result<Option<Duration>, StoreError> {
        let Some(pause) = resume_sla_clock(ticket, self.clock.now()) else {
            return Ok(None);
        };
        info!(
            "SLA resumed for ticket {} after {} minutes",
            ticket.id,
            pause.num_minutes()
        );
        self.store.save_ticket(ticket).await?;
        Ok(Some(pause))
    }

    /// Past-due tickets not yet flagged, excluding paused ones.
    pub async fn get_overdue_tickets(&self) -> Result<Vec<Ticket>, StoreError> {
        let filter = TicketFilter::new()
            .sla_due_before(self.clock.now())
            .sla_breached(false)
            .status_not(TicketStatus::WaitingForCustomer);
        self.store.find_tickets(&filter).await
    }
}
