use anyhow::Context;
use log::info;
use std::sync::Arc;
use std::time::Duration;

use crate::assignment::{AssignmentEngine, LlmRankingStrategy};
use crate::comments::CommentService;
use crate::core::config::AppConfig;
use crate::core::shared::clock::Clock;
use crate::directory::categories::CategoryService;
use crate::llm::LLMProvider;
use crate::sla::{sla_job_channel, SlaEngine, SlaJobReceiver, SlaMonitor, SlaPolicy};
use crate::store::{Directory, TicketStore};
use crate::tickets::lifecycle::TicketLifecycle;
use crate::tickets::service::TicketService;

pub struct AppState {
    pub config: AppConfig,
    pub directory: Arc<dyn Directory>,
    pub categories: Arc<CategoryService>,
    pub tickets: Arc<TicketService>,
    pub comments: Arc<CommentService>,
}

/// Everything `main` needs besides the router state.
pub struct Background {
    pub monitor: SlaMonitor,
    pub sla_jobs: SlaJobReceiver,
}

impl AppState {
    pub fn assemble(
        config: AppConfig,
        store: Arc<dyn TicketStore>,
        directory: Arc<dyn Directory>,
        clock: Arc<dyn Clock>,
        llm: Option<Arc<dyn LLMProvider>>,
    ) -> anyhow::Result<(Arc<Self>, Background)> {
        let sla = Arc::new(SlaEngine::new(
            store.clone(),
            clock.clone(),
            SlaPolicy::from_config(&config.sla),
        ));
        let monitor = SlaMonitor::new(sla.clone(), store.clone(), &config.sla.sweep_schedule)
            .with_context(|| format!("Invalid SLA sweep schedule '{}'", config.sla.sweep_schedule))?;

        let lifecycle = Arc::new(TicketLifecycle::new(
            store.clone(),
            clock.clone(),
            config.lifecycle.reopen_window_business_days,
        ));

        let mut assignment = AssignmentEngine::new(store.clone(), directory.clone(), clock.clone());
        if let Some(llm) = llm {
            info!("LLM ranking enabled for ticket assignment");
            assignment = assignment.with_primary(
                Arc::new(LlmRankingStrategy::new(llm)),
                Duration::from_secs(config.assignment.strategy_timeout_secs),
            );
        }

        let (sender, receiver) = sla_job_channel();
        let tickets = TicketService::new(
            store.clone(),
            directory.clone(),
            lifecycle.clone(),
            Arc::new(assignment),
            sla,
            clock.clone(),
        )
        .with_sla_queue(sender);
        let comments = CommentService::new(store, lifecycle, clock);

        let categories = CategoryService::new(directory.clone());

        let state = Arc::new(Self {
            config,
            directory,
            categories: Arc::new(categories),
            tickets: Arc::new(tickets),
            comments: Arc::new(comments),
        });
        Ok((
            state,
            Background {
                monitor,
                sla_jobs: receiver,
            },
        ))
    }
}
