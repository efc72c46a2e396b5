use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use super::{AgentCandidate, TicketContext};
use crate::tickets::error::TicketError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub agent_id: Uuid,
    pub reasoning: Option<String>,
}

/// Picks one agent out of the candidate list, or none.
#[async_trait]
pub trait AssignmentStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn select(
        &self,
        ticket: &TicketContext,
        candidates: &[AgentCandidate],
    ) -> Result<Option<Selection>, TicketError>;
}

/// Category match first, then the fewest active tickets. Ties go to the earliest candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeastLoadedStrategy;

impl LeastLoadedStrategy {
    pub fn pick<'a>(&self, candidates: &'a [AgentCandidate]) -> Option<&'a AgentCandidate> {
        let matching = || candidates.iter().filter(|c| c.category_match);
        let pool: Vec<&AgentCandidate> = if matching().next().is_some() {
            matching().collect()
        } else {
            candidates.iter().collect()
        };

        pool.into_iter()
            .min_by_key(|candidate| candidate.workload.active_tickets)
    }

    /// Like `pick`, but never leaves the ticket's category.
    pub fn pick_in_category<'a>(
        &self,
        candidates: &'a [AgentCandidate],
    ) -> Option<&'a AgentCandidate> {
        candidates
            .iter()
            .filter(|c| c.category_match)
            .min_by_key(|candidate| candidate.workload.active_tickets)
    }
}

#[async_trait]
impl AssignmentStrategy for LeastLoadedStrategy {
    fn name(&self) -> &'static str {
        "least_loaded"
    }

    async fn select(
        &self,
        _ticket: &TicketContext,
        candidates: &[AgentCandidate],
    ) -> Result<Option<Selection>, TicketError> {
        Ok(self.pick(candidates).map(|candidate| Selection {
            agent_id: candidate.agent_id(),
            reasoning: Some(format!(
                "{} with {} active tickets{}",
                candidate.skills.agent.full_name(),
                candidate.workload.active_tickets,
                if candidate.category_match {
                    " in the ticket's category"
                } else {
                    ""
                }
            )),
        }))
    }
}
