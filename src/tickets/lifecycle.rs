use chrono::{DateTime, Datelike, Utc, Weekday};
use log::{info, warn};
use std::sync::Arc;
use uuid::Uuid;

use super::error::TicketError;
use super::models::{RichTextContent, Ticket, TicketStatus};
use crate::comments::Comment;
use crate::core::shared::clock::Clock;
use crate::directory::{User, UserRole};
use crate::sla::{pause_sla_clock, resume_sla_clock};
use crate::store::TicketStore;

/// Weekdays from `start`'s date to `end`'s date, counting both ends.
pub fn business_days_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let last = end.date_naive();
    start
        .date_naive()
        .iter_days()
        .take_while(|day| *day <= last)
        .filter(|day| !matches!(day.weekday(), Weekday::Sat | Weekday::Sun))
        .count() as i64
}

/// Moves a ticket to `next` and keeps its timestamps and SLA clock consistent.
/// Does not check the transition table.
pub fn apply_transition(ticket: &mut Ticket, next: TicketStatus, now: DateTime<Utc>) {
    let previous = ticket.status;
    ticket.status = next;
    ticket.updated_at = now;

    if next.is_terminal() {
        ticket.closed_at = Some(now);
    } else {
        ticket.closed_at = None;
    }

    if next == TicketStatus::WaitingForCustomer {
        pause_sla_clock(ticket, now);
    } else if previous == TicketStatus::WaitingForCustomer {
        resume_sla_clock(ticket, now);
    }
}

/// Status a new comment moves the ticket to, if any.
pub fn status_after_comment(current: TicketStatus, author: UserRole) -> Option<TicketStatus> {
    match (author, current) {
        (UserRole::Agent, TicketStatus::InProgress | TicketStatus::WaitingForAgent) => {
            Some(TicketStatus::WaitingForCustomer)
        }
        (UserRole::User, TicketStatus::WaitingForCustomer) => Some(TicketStatus::WaitingForAgent),
        _ => None,
    }
}

pub struct TicketLifecycle {
    store: Arc<dyn TicketStore>,
    clock: Arc<dyn Clock>,
    reopen_window: i64,
}

impl TicketLifecycle {
    pub fn new(store: Arc<dyn TicketStore>, clock: Arc<dyn Clock>, reopen_window: i64) -> Self {
        Self {
            store,
            clock,
            reopen_window,
        }
    }

    pub fn reopen_window(&self) -> i64 {
        self.reopen_window
    }

    async fn load(&self, ticket_id: Uuid) -> Result<Ticket, TicketError> {
        self.store
            .get_ticket(ticket_id)
            .await?
            .ok_or_else(|| TicketError::ticket_not_found(ticket_id))
    }

    pub async fn update_ticket_status(
        &self,
        ticket_id: Uuid,
        new_status: TicketStatus,
    ) -> Result<Ticket, TicketError> {
        let mut ticket = self.load(ticket_id).await?;

        if !ticket.status.can_transition_to(new_status) {
            warn!(
                "Rejected transition for ticket {}: {} -> {}",
                ticket_id, ticket.status, new_status
            );
            return Err(TicketError::InvalidTransition {
                from: ticket.status,
                to: new_status,
            });
        }

        let previous = ticket.status;
        apply_transition(&mut ticket, new_status, self.clock.now());
        self.store.save_ticket(&ticket).await?;

        info!(
            "Ticket {} status changed: {} -> {}",
            ticket_id, previous, new_status
        );
        Ok(ticket)
    }

    /// Transition driven by the system (comments, assignment); skips the manual table.
    pub async fn force_status(
        &self,
        ticket: &mut Ticket,
        new_status: TicketStatus,
    ) -> Result<(), TicketError> {
        let previous = ticket.status;
        apply_transition(ticket, new_status, self.clock.now());
        self.store.save_ticket(ticket).await?;

        if previous != new_status {
            info!(
                "Ticket {} status changed: {} -> {}",
                ticket.id, previous, new_status
            );
        }
        Ok(())
    }

    pub async fn close_ticket(
        &self,
        ticket_id: Uuid,
        actor: &User,
        resolution_comment: Option<RichTextContent>,
    ) -> Result<Ticket, TicketError> {
        self.finish(ticket_id, TicketStatus::Closed, actor, resolution_comment)
            .await
    }

    pub async fn resolve_ticket(
        &self,
        ticket_id: Uuid,
        actor: &User,
        resolution_comment: Option<RichTextContent>,
    ) -> Result<Ticket, TicketError> {
        self.finish(ticket_id, TicketStatus::Resolved, actor, resolution_comment)
            .await
    }

    async fn finish(
        &self,
        ticket_id: Uuid,
        status: TicketStatus,
        actor: &User,
        resolution_comment: Option<RichTextContent>,
    ) -> Result<Ticket, TicketError> {
        let ticket = self.update_ticket_status(ticket_id, status).await?;

        // Stored directly: a resolution note must not bounce the ticket back out of its final state.
        if let Some(content) = resolution_comment.filter(|c| !c.is_blank()) {
            let comment = Comment::new(ticket_id, actor.id, content, self.clock.now());
            self.store.insert_comment(comment).await?;
        }
        Ok(ticket)
    }

    fn check_reopen(&self, ticket: &Ticket) -> Result<(), TicketError> {
        let expired = |elapsed_business_days| TicketError::ReopenWindowExpired {
            status: ticket.status,
            elapsed_business_days,
            window: self.reopen_window,
        };

        if !ticket.status.is_terminal() {
            return Err(expired(None));
        }
        let Some(closed_at) = ticket.closed_at else {
            return Err(expired(None));
        };

        let elapsed = business_days_between(closed_at, self.clock.now());
        if elapsed > self.reopen_window {
            return Err(expired(Some(elapsed)));
        }
        Ok(())
    }

    pub async fn can_reopen_ticket(&self, ticket_id: Uuid) -> Result<bool, TicketError> {
        let ticket = self.load(ticket_id).await?;
        Ok(self.check_reopen(&ticket).is_ok())
    }

    pub async fn reopen_ticket(&self, ticket_id: Uuid) -> Result<Ticket, TicketError> {
        let ticket = self.load(ticket_id).await?;
        if let Err(e) = self.check_reopen(&ticket) {
            info!("Reopen refused for ticket {}: {}", ticket_id, e);
            return Err(e);
        }
        self.update_ticket_status(ticket_id, TicketStatus::InProgress)
            .await
    }

    /// Flips between waiting states when someone replies. Returns the new status if it changed.
    pub async fn on_comment_created(
        &self,
        ticket: &mut Ticket,
        author: UserRole,
    ) -> Result<Option<TicketStatus>, TicketError> {
        let Some(next) = status_after_comment(ticket.status, author) else {
            return Ok(None);
        };
        self.force_status(ticket, next).await?;
        Ok(Some(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_business_days_inclusive() {
        // Mon 2024-05-06
        assert_eq!(business_days_between(at(2024, 5, 6), at(2024, 5, 6)), 1);
        assert_eq!(business_days_between(at(2024, 5, 6), at(2024, 5, 10)), 5);
        assert_eq!(business_days_between(at(2024, 5, 6), at(2024, 5, 12)), 5);
        assert_eq!(business_days_between(at(2024, 5, 6), at(2024, 5, 13)), 6);
        assert_eq!(business_days_between(at(2024, 5, 11), at(2024, 5, 12)), 0);
    }

    #[test]
    fn test_business_days_ignores_time_of_day() {
        let late = Utc.with_ymd_and_hms(2024, 5, 6, 23, 59, 0).unwrap();
        let early = Utc.with_ymd_and_hms(2024, 5, 7, 0, 1, 0).unwrap();
        assert_eq!(business_days_between(late, early), 2);
    }

    #[test]
    fn test_business_days_reversed_range_is_zero() {
        assert_eq!(business_days_between(at(2024, 5, 10), at(2024, 5, 6)), 0);
    }

    #[test]
    fn test_apply_transition_sets_and_clears_closed_at() {
        let t0 = at(2024, 5, 6);
        let mut ticket = Ticket::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            "Laptop".to_string(),
            String::new(),
            RichTextContent::default(),
            t0,
        );
        apply_transition(&mut ticket, TicketStatus::Resolved, t0 + Duration::hours(1));
        assert_eq!(ticket.closed_at, Some(t0 + Duration::hours(1)));

        apply_transition(&mut ticket, TicketStatus::InProgress, t0 + Duration::hours(2));
        assert!(ticket.closed_at.is_none());
        assert_eq!(ticket.updated_at, t0 + Duration::hours(2));
    }

    #[test]
    fn test_apply_transition_drives_sla_clock() {
        let t0 = at(2024, 5, 6);
        let mut ticket = Ticket::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            "Laptop".to_string(),
            String::new(),
            RichTextContent::default(),
            t0,
        );
        ticket.sla_due_date = Some(t0 + Duration::hours(4));

        apply_transition(&mut ticket, TicketStatus::WaitingForCustomer, t0);
        assert_eq!(ticket.sla_paused_at, Some(t0));

        apply_transition(&mut ticket, TicketStatus::Closed, t0 + Duration::hours(1));
        assert!(ticket.sla_paused_at.is_none());
        assert_eq!(ticket.sla_due_date, Some(t0 + Duration::hours(5)));
        assert_eq!(ticket.sla_total_paused_minutes, 60);
    }

    #[test]
    fn test_comment_rules() {
        use TicketStatus::*;
        assert_eq!(
            status_after_comment(InProgress, UserRole::Agent),
            Some(WaitingForCustomer)
        );
        assert_eq!(
            status_after_comment(WaitingForAgent, UserRole::Agent),
            Some(WaitingForCustomer)
        );
        assert_eq!(
            status_after_comment(WaitingForCustomer, UserRole::User),
            Some(WaitingForAgent)
        );
        assert_eq!(status_after_comment(WaitingForCustomer, UserRole::Agent), None);
        assert_eq!(status_after_comment(New, UserRole::Agent), None);
        assert_eq!(status_after_comment(InProgress, UserRole::User), None);
        assert_eq!(status_after_comment(Closed, UserRole::User), None);
    }
}
