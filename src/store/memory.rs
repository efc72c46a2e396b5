use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Directory, StoreError, TicketFilter, TicketStore};
use crate::comments::Comment;
use crate::directory::{AgentProfile, AgentSkills, Category, SubCategory, User};
use crate::tickets::models::Ticket;

#[derive(Debug, Default)]
struct DirectoryData {
    users: HashMap<Uuid, User>,
    categories: HashMap<Uuid, Category>,
    subcategories: HashMap<Uuid, SubCategory>,
    // Insertion order is the enumeration order used for tie-breaking.
    profiles: Vec<AgentProfile>,
}

impl DirectoryData {
    // Same constraints as the `categories` and `subcategories` tables.
    fn check_category_name(&self, category: &Category) -> Result<(), StoreError> {
        let taken = self
            .categories
            .values()
            .any(|other| other.id != category.id && other.name == category.name);
        if taken {
            return Err(StoreError::Conflict(format!(
                "Category '{}' already exists",
                category.name
            )));
        }
        Ok(())
    }

    fn check_subcategory(&self, subcategory: &SubCategory) -> Result<(), StoreError> {
        if !self.categories.contains_key(&subcategory.category_id) {
            return Err(StoreError::Conflict(format!(
                "Category {} does not exist",
                subcategory.category_id
            )));
        }
        let taken = self.subcategories.values().any(|other| {
            other.id != subcategory.id
                && other.category_id == subcategory.category_id
                && other.name == subcategory.name
        });
        if taken {
            return Err(StoreError::Conflict(format!(
                "Subcategory '{}' already exists in this category",
                subcategory.name
            )));
        }
        Ok(())
    }
}

/// Process-local store used for development, seeding and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tickets: RwLock<HashMap<Uuid, Ticket>>,
    comments: RwLock<HashMap<Uuid, Comment>>,
    directory: RwLock<DirectoryData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, user: User) {
        self.directory.write().await.users.insert(user.id, user);
    }

    pub async fn add_category(&self, category: Category) {
        self.directory
            .write()
            .await
            .categories
            .insert(category.id, category);
    }

    pub async fn add_subcategory(&self, subcategory: SubCategory) {
        self.directory
            .write()
            .await
            .subcategories
            .insert(subcategory.id, subcategory);
    }

    /// Replaces any existing profile for the same agent, keeping its position.
    pub async fn add_agent_profile(&self, profile: AgentProfile) {
        let mut directory = self.directory.write().await;
        if let Some(existing) = directory
            .profiles
            .iter_mut()
            .find(|p| p.agent_id == profile.agent_id)
        {
            *existing = profile;
        } else {
            directory.profiles.push(profile);
        }
    }

    fn resolve(directory: &DirectoryData, profile: &AgentProfile) -> Option<AgentSkills> {
        let agent = directory.users.get(&profile.agent_id)?.clone();
        let category = profile
            .category_id
            .and_then(|id| directory.categories.get(&id).cloned());
        let subcategories = profile
            .subcategory_ids
            .iter()
            .filter_map(|id| directory.subcategories.get(id).cloned())
            .collect();

        Some(AgentSkills {
            agent,
            category,
            subcategories,
        })
    }
}

#[async_trait]
impl TicketStore for MemoryStore {
    async fn insert_ticket(&self, ticket: Ticket) -> Result<Ticket, StoreError> {
        self.tickets.write().await.insert(ticket.id, ticket.clone());
        Ok(ticket)
    }

    async fn get_ticket(&self, id: Uuid) -> Result<Option<Ticket>, StoreError> {
        Ok(self.tickets.read().await.get(&id).cloned())
    }

    /// Updates in place. A ticket deleted meanwhile stays deleted.
    async fn save_ticket(&self, ticket: &Ticket) -> Result<(), StoreError> {
        if let Some(stored) = self.tickets.write().await.get_mut(&ticket.id) {
            *stored = ticket.clone();
        }
        Ok(())
    }

    async fn delete_ticket(&self, id: Uuid) -> Result<bool, StoreError> {
        let removed = self.tickets.write().await.remove(&id).is_some();
        if removed {
            self.comments
                .write()
                .await
                .retain(|_, comment| comment.ticket_id != id);
        }
        Ok(removed)
    }

    async fn find_tickets(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, StoreError> {
        let mut tickets: Vec<Ticket> = self
            .tickets
            .read()
            .await
            .values()
            .filter(|ticket| filter.matches(ticket))
            .cloned()
            .collect();
        tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tickets)
    }

    async fn insert_comment(&self, comment: Comment) -> Result<Comment, StoreError> {
        self.comments
            .write()
            .await
            .insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>, StoreError> {
        Ok(self.comments.read().await.get(&id).cloned())
    }

    async fn save_comment(&self, comment: &Comment) -> Result<(), StoreError> {
        self.comments
            .write()
            .await
            .insert(comment.id, comment.clone());
        Ok(())
    }

    async fn delete_comment(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.comments.write().await.remove(&id).is_some())
    }

    async fn comments_for_ticket(&self, ticket_id: Uuid) -> Result<Vec<Comment>, StoreError> {
        let mut comments: Vec<Comment> = self
            .comments
            .read()
            .await
            .values()
            .filter(|comment| comment.ticket_id == ticket_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(comments)
    }
}

#[async_trait]
impl Directory for MemoryStore {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.directory.read().await.users.get(&id).cloned())
    }

    async fn get_category(&self, id: Uuid) -> Result<Option<Category>, StoreError> {
        Ok(self.directory.read().await.categories.get(&id).cloned())
    }

    async fn get_subcategory(&self, id: Uuid) -> Result<Option<SubCategory>, StoreError> {
        Ok(self.directory.read().await.subcategories.get(&id).cloned())
    }

    async fn agent_skills(&self) -> Result<Vec<AgentSkills>, StoreError> {
        let directory = self.directory.read().await;
        Ok(directory
            .profiles
            .iter()
            .filter_map(|profile| Self::resolve(&directory, profile))
            .collect())
    }

    async fn agent_skills_for(&self, agent_id: Uuid) -> Result<Option<AgentSkills>, StoreError> {
        let directory = self.directory.read().await;
        Ok(directory
            .profiles
            .iter()
            .find(|profile| profile.agent_id == agent_id)
            .and_then(|profile| Self::resolve(&directory, profile)))
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let mut categories: Vec<Category> = self
            .directory
            .read()
            .await
            .categories
            .values()
            .cloned()
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn subcategories_for(&self, category_id: Uuid) -> Result<Vec<SubCategory>, StoreError> {
        let mut subcategories: Vec<SubCategory> = self
            .directory
            .read()
            .await
            .subcategories
            .values()
            .filter(|sub| sub.category_id == category_id)
            .cloned()
            .collect();
        subcategories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(subcategories)
    }

    async fn insert_category(&self, category: Category) -> Result<Category, StoreError> {
        let mut directory = self.directory.write().await;
        directory.check_category_name(&category)?;
        directory.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn save_category(&self, category: &Category) -> Result<bool, StoreError> {
        let mut directory = self.directory.write().await;
        if !directory.categories.contains_key(&category.id) {
            return Ok(false);
        }
        directory.check_category_name(category)?;
        directory.categories.insert(category.id, category.clone());
        Ok(true)
    }

    async fn delete_category(&self, id: Uuid) -> Result<bool, StoreError> {
        let tickets = self.tickets.read().await;
        let mut directory = self.directory.write().await;
        if !directory.categories.contains_key(&id) {
            return Ok(false);
        }
        if tickets.values().any(|ticket| ticket.category_id == id) {
            return Err(StoreError::Conflict(format!(
                "Category {id} is still referenced by tickets"
            )));
        }

        directory.categories.remove(&id);
        let removed: Vec<Uuid> = directory
            .subcategories
            .values()
            .filter(|sub| sub.category_id == id)
            .map(|sub| sub.id)
            .collect();
        for sub_id in &removed {
            directory.subcategories.remove(sub_id);
        }
        for profile in directory.profiles.iter_mut() {
            if profile.category_id == Some(id) {
                profile.category_id = None;
            }
            profile.subcategory_ids.retain(|sub_id| !removed.contains(sub_id));
        }
        Ok(true)
    }

    async fn insert_subcategory(&self, subcategory: SubCategory) -> Result<SubCategory, StoreError> {
        let mut directory = self.directory.write().await;
        directory.check_subcategory(&subcategory)?;
        directory
            .subcategories
            .insert(subcategory.id, subcategory.clone());
        Ok(subcategory)
    }

    async fn save_subcategory(&self, subcategory: &SubCategory) -> Result<bool, StoreError> {
        let mut directory = self.directory.write().await;
        if !directory.subcategories.contains_key(&subcategory.id) {
            return Ok(false);
        }
        directory.check_subcategory(subcategory)?;
        directory
            .subcategories
            .insert(subcategory.id, subcategory.clone());
        Ok(true)
    }

    async fn delete_subcategory(&self, id: Uuid) -> Result<bool, StoreError> {
        let tickets = self.tickets.read().await;
        let mut directory = self.directory.write().await;
        if !directory.subcategories.contains_key(&id) {
            return Ok(false);
        }
        if tickets.values().any(|ticket| ticket.subcategory_id == id) {
            return Err(StoreError::Conflict(format!(
                "Subcategory {id} is still referenced by tickets"
            )));
        }
        directory.subcategories.remove(&id);
        for profile in directory.profiles.iter_mut() {
            profile.subcategory_ids.retain(|sub_id| *sub_id != id);
        }
        Ok(true)
    }
}
