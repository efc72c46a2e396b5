mod common;

use async_trait::async_trait;
use chrono::Duration;
use common::{monday_morning, TestApp};
use helpdesk::core::config::AppConfig;
use helpdesk::directory::Category;
use helpdesk::llm::LLMProvider;
use helpdesk::tickets::error::TicketError;
use helpdesk::tickets::models::{TicketPriority, TicketStatus};
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// Answers every prompt with whatever was set last.
#[derive(Default)]
struct ScriptedLlm {
    response: Mutex<String>,
}

impl ScriptedLlm {
    fn answer(&self, response: &str) {
        *self.response.lock().unwrap() = response.to_string();
    }
}

#[async_trait]
impl LLMProvider for ScriptedLlm {
    async fn generate(
        &self,
        _prompt: &str,
        _config: &Value,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.response.lock().unwrap().clone())
    }
}

async fn app_with_llm() -> (TestApp, Arc<ScriptedLlm>) {
    let llm = Arc::new(ScriptedLlm::default());
    let app = TestApp::build(AppConfig::default(), Some(llm.clone())).await;
    (app, llm)
}

#[tokio::test]
async fn test_critical_ticket_is_stamped_and_auto_assigned() {
    let mut app = TestApp::new().await;
    let agent = app.add_agent("Nia", Some(app.category.id)).await;

    let created = app.create_ticket(TicketPriority::Critical).await;
    assert_eq!(
        created.ticket.sla_due_date,
        Some(monday_morning() + Duration::hours(2))
    );
    assert_eq!(created.ticket.agent_id, Some(agent.id));
    assert_eq!(created.ticket.status, TicketStatus::InProgress);
    assert_eq!(created.agent.map(|a| a.id), Some(agent.id));
}

#[tokio::test]
async fn test_creation_prefers_category_match_then_lowest_load() {
    let mut app = TestApp::new().await;
    let hardware = Category {
        id: uuid::Uuid::new_v4(),
        name: "Hardware".to_string(),
        description: None,
    };
    app.store.add_category(hardware.clone()).await;
    let outsider = app.add_agent("Omar", Some(hardware.id)).await;
    let first = app.add_agent("Ana", Some(app.category.id)).await;
    let second = app.add_agent("Ben", Some(app.category.id)).await;

    let a = app.create_ticket(TicketPriority::Medium).await;
    let b = app.create_ticket(TicketPriority::Medium).await;
    let c = app.create_ticket(TicketPriority::Medium).await;

    assert_eq!(a.ticket.agent_id, Some(first.id));
    assert_eq!(b.ticket.agent_id, Some(second.id));
    assert_eq!(c.ticket.agent_id, Some(first.id));
    for ticket in [&a, &b, &c] {
        assert_ne!(ticket.ticket.agent_id, Some(outsider.id));
    }
}

#[tokio::test]
async fn test_ticket_outside_every_agent_category_waits_in_queue() {
    let mut app = TestApp::new().await;
    let hardware = Category {
        id: uuid::Uuid::new_v4(),
        name: "Hardware".to_string(),
        description: None,
    };
    app.store.add_category(hardware.clone()).await;
    let outsider = app.add_agent("Omar", Some(hardware.id)).await;

    let created = app.create_ticket(TicketPriority::Critical).await;
    assert_eq!(created.ticket.status, TicketStatus::New);
    assert_eq!(created.ticket.agent_id, None);
    assert!(created.ticket.sla_due_date.is_some());

    let network = app.add_agent("Nia", Some(app.category.id)).await;
    let queue = app.state.tickets.queue_tickets(&network).await.unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].id, created.ticket.id);
    assert!(app.state.tickets.queue_tickets(&outsider).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_explicit_auto_assign_may_leave_the_category() {
    let mut app = TestApp::new().await;
    let outsider = app.add_agent("Omar", None).await;

    let created = app.create_ticket(TicketPriority::Medium).await;
    assert_eq!(created.ticket.agent_id, None);

    let assigned = app
        .state
        .tickets
        .auto_assign_ticket(created.ticket.id)
        .await
        .unwrap();
    assert_eq!(assigned.ticket.agent_id, Some(outsider.id));
    assert_eq!(assigned.ticket.status, TicketStatus::InProgress);
}

#[tokio::test]
async fn test_ticket_without_agents_stays_new() {
    let mut app = TestApp::new().await;
    let created = app.create_ticket(TicketPriority::High).await;
    assert_eq!(created.ticket.status, TicketStatus::New);
    assert_eq!(created.ticket.agent_id, None);

    assert!(matches!(
        app.state.tickets.auto_assign_ticket(created.ticket.id).await,
        Err(TicketError::NoAgentAvailable)
    ));
}

#[tokio::test]
async fn test_auto_assign_uses_llm_pick() {
    let (mut app, llm) = app_with_llm().await;
    let created = app.create_ticket(TicketPriority::High).await;
    assert_eq!(created.ticket.agent_id, None);

    let idle = app.add_agent("Ana", Some(app.category.id)).await;
    let expert = app.add_agent("Ben", None).await;
    llm.answer(&format!(
        r#"{{"selected_agent_id": "{}", "reasoning": "knows VPNs"}}"#,
        expert.id
    ));

    let assigned = app
        .state
        .tickets
        .auto_assign_ticket(created.ticket.id)
        .await
        .unwrap();
    assert_eq!(assigned.ticket.agent_id, Some(expert.id));
    assert_ne!(assigned.ticket.agent_id, Some(idle.id));
    assert_eq!(assigned.ticket.status, TicketStatus::InProgress);
}

#[tokio::test]
async fn test_auto_assign_falls_back_on_bad_llm_answers() {
    let (mut app, llm) = app_with_llm().await;
    let created = app.create_ticket(TicketPriority::Low).await;
    let idle = app.add_agent("Ana", Some(app.category.id)).await;
    app.add_agent("Ben", None).await;

    let answers = [
        "I think Ana would be great".to_string(),
        r#"{"selected_agent_id": null, "reasoning": "nobody"}"#.to_string(),
        format!(r#"{{"selected_agent_id": "{}"}}"#, uuid::Uuid::new_v4()),
        r#"{"selected_agent_id": "agent-7"}"#.to_string(),
    ];
    for answer in answers {
        llm.answer(&answer);
        let assigned = app
            .state
            .tickets
            .auto_assign_ticket(created.ticket.id)
            .await
            .unwrap();
        assert_eq!(assigned.ticket.agent_id, Some(idle.id), "answer: {answer}");
    }
}

#[tokio::test]
async fn test_manual_assignment_requires_an_agent() {
    let mut app = TestApp::new().await;
    let created = app.create_ticket(TicketPriority::Medium).await;
    let agent = app.add_agent("Nia", None).await;

    let requester = app.requester.id;
    assert!(matches!(
        app.state.tickets.assign_ticket(created.ticket.id, requester).await,
        Err(TicketError::InvalidAgent(_))
    ));
    assert!(matches!(
        app.state
            .tickets
            .assign_ticket(created.ticket.id, uuid::Uuid::new_v4())
            .await,
        Err(TicketError::InvalidAgent(_))
    ));

    let assigned = app
        .state
        .tickets
        .assign_ticket(created.ticket.id, agent.id)
        .await
        .unwrap();
    assert_eq!(assigned.ticket.agent_id, Some(agent.id));
    assert_eq!(assigned.ticket.status, TicketStatus::InProgress);
}
