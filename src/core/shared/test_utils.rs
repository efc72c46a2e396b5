use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::assignment::AssignmentEngine;
use crate::comments::CommentService;
use crate::core::shared::clock::ManualClock;
use crate::directory::{AgentProfile, Category, SubCategory, User, UserRole};
use crate::llm::LLMProvider;
use crate::sla::{SlaEngine, SlaPolicy};
use crate::store::MemoryStore;
use crate::tickets::lifecycle::TicketLifecycle;
use crate::tickets::models::TicketPriority;
use crate::tickets::service::{CreateTicketRequest, TicketResponse, TicketService};

/// Monday 2024-05-06 09:00 UTC.
pub fn fixed_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap()
}

#[derive(Debug)]
pub struct MockLLMProvider {
    pub response: String,
}

impl MockLLMProvider {
    pub fn with_response(response: &str) -> Self {
        Self {
            response: response.to_string(),
        }
    }
}

#[async_trait]
impl LLMProvider for MockLLMProvider {
    async fn generate(
        &self,
        _prompt: &str,
        _config: &Value,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.response.clone())
    }
}

/// Services wired over a memory store and a manual clock, with one
/// category, one subcategory and one requester already in place.
pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub sla: Arc<SlaEngine>,
    pub lifecycle: Arc<TicketLifecycle>,
    pub assignment: Arc<AssignmentEngine>,
    pub tickets: TicketService,
    pub comments: CommentService,
    pub category: Category,
    pub subcategory: SubCategory,
    pub requester: User,
}

impl Fixture {
    pub async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(fixed_start()));
        let sla = Arc::new(SlaEngine::new(store.clone(), clock.clone(), SlaPolicy::default()));
        let lifecycle = Arc::new(TicketLifecycle::new(store.clone(), clock.clone(), 10));
        let assignment = Arc::new(AssignmentEngine::new(
            store.clone(),
            store.clone(),
            clock.clone(),
        ));
        let tickets = TicketService::new(
            store.clone(),
            store.clone(),
            lifecycle.clone(),
            assignment.clone(),
            sla.clone(),
            clock.clone(),
        );
        let comments = CommentService::new(store.clone(), lifecycle.clone(), clock.clone());

        let (category, subcategories) = add_category(&store, "Network", &["VPN"]).await;
        let requester = add_person(&store, "Riley", UserRole::User).await;

        Self {
            store,
            clock,
            sla,
            lifecycle,
            assignment,
            tickets,
            comments,
            category,
            subcategory: subcategories[0].clone(),
            requester,
        }
    }

    pub async fn add_category(&self, name: &str, subs: &[&str]) -> (Category, Vec<SubCategory>) {
        add_category(&self.store, name, subs).await
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

    pub async fn create_ticket(&self, priority: TicketPriority) -> TicketResponse {
        self.tickets
            .create_ticket(
                CreateTicketRequest {
                    category_id: self.category.id,
                    subcategory_id: self.subcategory.id,
                    title: "VPN drops every hour".to_string(),
                    description: Some("Disconnects at :00".to_string()),
                    content: None,
                    priority: Some(priority),
                    severity: None,
                    tags: None,
                },
                &self.requester,
            )
            .await
            .unwrap()
    }
}

async fn add_person(store: &MemoryStore, name: &str, role: UserRole) -> User {
    let user = User {
        id: Uuid::new_v4(),
        first_name: name.to_string(),
        last_name: "Tester".to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        role,
        created_at: fixed_start(),
    };
    store.add_user(user.clone()).await;
    user
}

async fn add_category(store: &MemoryStore, name: &str, subs: &[&str]) -> (Category, Vec<SubCategory>) {
    let category = Category {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: None,
    };
    store.add_category(category.clone()).await;

    let mut subcategories = Vec::new();
    for sub in subs {
        let subcategory = SubCategory {
            id: Uuid::new_v4(),
            category_id: category.id,
            name: sub.to_string(),
            description: None,
        };
        store.add_subcategory(subcategory.clone()).await;
        subcategories.push(subcategory);
    }
    (category, subcategories)
}
