use chrono::{DateTime, Utc};
use cron::Schedule;
use log::{error, info, warn};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::SlaEngine;
use crate::store::{StoreError, TicketStore};

pub type SlaJobSender = mpsc::UnboundedSender<Uuid>;
pub type SlaJobReceiver = mpsc::UnboundedReceiver<Uuid>;

/// Queue of freshly created ticket ids waiting for their initial SLA stamp.
pub fn sla_job_channel() -> (SlaJobSender, SlaJobReceiver) {
    mpsc::unbounded_channel()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub checked: usize,
    pub breached: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct SlaMonitor {
    engine: Arc<SlaEngine>,
    store: Arc<dyn TicketStore>,
    schedule: Schedule,
}

impl SlaMonitor {
    pub fn new(
        engine: Arc<SlaEngine>,
        store: Arc<dyn TicketStore>,
        sweep_schedule: &str,
    ) -> Result<Self, cron::error::Error> {
        Ok(Self {
            engine,
            store,
            schedule: Schedule::from_str(sweep_schedule)?,
        })
    }

    pub fn next_run_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    /// One pass over overdue tickets. A failure on one ticket does not stop the others.
    pub async fn run_sweep(&self) -> Result<SweepReport, StoreError> {
        let overdue = self.engine.get_overdue_tickets().await?;
        let mut report = SweepReport {
            checked: overdue.len(),
            ..SweepReport::default()
        };

        if overdue.is_empty() {
            info!("SLA sweep: no overdue tickets");
            return Ok(report);
        }

        let now = self.engine.now();
        for mut ticket in overdue {
            match self.engine.update_ticket_sla(&mut ticket).await {
                Ok(()) if ticket.sla_breached => {
                    warn!(
                        "SLA breach detected for ticket {}: due {:?}, now {}",
                        ticket.id, ticket.sla_due_date, now
                    );
                    report.breached += 1;
                }
                Ok(()) => {}
                Err(e) => {
                    error!("Error updating SLA for ticket {}: {}", ticket.id, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "SLA sweep completed: {} checked, {} breached, {} failed",
            report.checked, report.breached, report.failed
        );
        Ok(report)
    }

    /// Returns false when the ticket no longer exists.
    pub async fn stamp_new_ticket(&self, ticket_id: Uuid) -> Result<bool, StoreError> {
        let Some(mut ticket) = self.store.get_ticket(ticket_id).await? else {
            error!("Ticket {} not found for SLA update", ticket_id);
            return Ok(false);
        };
        self.engine.update_ticket_sla(&mut ticket).await?;
        info!(
            "SLA due date set for ticket {}: {:?}",
            ticket_id, ticket.sla_due_date
        );
        Ok(true)
    }

    pub fn start(&self, jobs: SlaJobReceiver) -> Vec<JoinHandle<()>> {
        info!("Starting SLA monitor");
        vec![self.spawn_sweeper(), self.spawn_stamper(jobs)]
    }

    fn spawn_sweeper(&self) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let Some(next) = monitor.next_run_after(now) else {
                    warn!("SLA sweep schedule has no upcoming runs, stopping sweeper");
                    return;
                };
                let wait = (next - now).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;

                if let Err(e) = monitor.run_sweep().await {
                    error!("Error in SLA monitoring sweep: {}", e);
                }
            }
        })
    }

    fn spawn_stamper(&self, mut jobs: SlaJobReceiver) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            while let Some(ticket_id) = jobs.recv().await {
                if let Err(e) = monitor.stamp_new_ticket(ticket_id).await {
                    error!("Error setting SLA for ticket {}: {}", ticket_id, e);
                }
            }
            info!("SLA job queue closed");
        })
    }
}
