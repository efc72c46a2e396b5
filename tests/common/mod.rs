#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use helpdesk::core::config::AppConfig;
use helpdesk::core::middleware::USER_ID_HEADER;
use helpdesk::core::shared::clock::ManualClock;
use helpdesk::core::shared::state::{AppState, Background};
use helpdesk::directory::{AgentProfile, Category, SubCategory, User, UserRole};
use helpdesk::llm::LLMProvider;
use helpdesk::store::MemoryStore;
use helpdesk::tickets::models::TicketPriority;
use helpdesk::tickets::service::{CreateTicketRequest, TicketResponse};

/// Monday 2024-05-06 09:00 UTC.
pub fn monday_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap()
}

/// The whole service assembled over a memory store and a manual clock.
pub struct TestApp {
    pub state: Arc<AppState>,
    pub background: Background,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub category: Category,
    pub subcategory: SubCategory,
    pub requester: User,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::build(AppConfig::default(), None).await
    }

    pub async fn build(config: AppConfig, llm: Option<Arc<dyn LLMProvider>>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(monday_morning()));
        let (state, background) =
            AppState::assemble(config, store.clone(), store.clone(), clock.clone(), llm).unwrap();

        let category = Category {
            id: Uuid::new_v4(),
            name: "Network".to_string(),
            description: None,
        };
        let subcategory = SubCategory {
            id: Uuid::new_v4(),
            category_id: category.id,
            name: "VPN".to_string(),
            description: None,
        };
        store.add_category(category.clone()).await;
        store.add_subcategory(subcategory.clone()).await;

        let requester = add_person(&store, "Riley", UserRole::User).await;

        Self {
            state,
            background,
            store,
            clock,
            category,
            subcategory,
            requester,
        }
    }

    pub async fn add_user(&self, name: &str) -> User {
        add_person(&self.store, name, UserRole::User).await
    }

    pub async fn add_agent(&self, name: &str, category_id: Option<Uuid>) -> User {
        let agent = add_person(&self.store, name, UserRole::Agent).await;
        self.store
            .add_agent_profile(AgentProfile {
                id: Uuid::new_v4(),
                agent_id: agent.id,
                category_id,
                subcategory_ids: Vec::new(),
            })
            .await;
        agent
    }

    pub fn ticket_request(&self, priority: TicketPriority) -> CreateTicketRequest {
        CreateTicketRequest {
            category_id: self.category.id,
            subcategory_id: self.subcategory.id,
            title: "VPN drops every hour".to_string(),
            description: Some("Disconnects at :00".to_string()),
            content: None,
            priority: Some(priority),
            severity: None,
            tags: None,
        }
    }

    /// Creates a ticket as the requester and runs the queued SLA stamp.
    pub async fn create_ticket(&mut self, priority: TicketPriority) -> TicketResponse {
        let created = self
            .state
            .tickets
            .create_ticket(self.ticket_request(priority), &self.requester)
            .await
            .unwrap();
        self.drain_sla_jobs().await;
        self.state.tickets.get_ticket(created.ticket.id).await.unwrap()
    }

    /// Processes every queued SLA stamp the way the background consumer would.
    pub async fn drain_sla_jobs(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(ticket_id) = self.background.sla_jobs.try_recv() {
            self.background
                .monitor
                .stamp_new_ticket(ticket_id)
                .await
                .unwrap();
            processed += 1;
        }
        processed
    }
}

async fn add_person(store: &MemoryStore, name: &str, role: UserRole) -> User {
    let user = User {
        id: Uuid::new_v4(),
        first_name: name.to_string(),
        last_name: "Tester".to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        role,
        created_at: monday_morning(),
    };
    store.add_user(user.clone()).await;
    user
}

/// Sends one request through the router and decodes the JSON reply, if any.
pub async fn call(
    router: &Router,
    method: Method,
    uri: &str,
    user: Option<&User>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        request = request.header(USER_ID_HEADER, user.id.to_string());
    }
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}
