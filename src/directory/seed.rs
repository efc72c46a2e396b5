use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use log::info;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

use super::{AgentProfile, Category, SubCategory, User, UserRole};
use crate::store::MemoryStore;

/// Users, categories and agent skills loaded from a TOML file into the memory store.
///
/// ```toml
/// [[categories]]
/// name = "Network"
/// subcategories = ["VPN", "Wi-Fi"]
///
/// [[users]]
/// first_name = "Nia"
/// email = "nia@example.com"
/// role = "agent"
/// category = "Network"
/// subcategories = ["VPN"]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectorySeed {
    #[serde(default)]
    pub categories: Vec<CategorySeed>,
    #[serde(default)]
    pub users: Vec<UserSeed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategorySeed {
    pub id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub subcategories: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserSeed {
    pub id: Option<Uuid>,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub role: UserRole,
    /// Agents only: name of the primary category.
    pub category: Option<String>,
    #[serde(default)]
    pub subcategories: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub categories: usize,
    pub subcategories: usize,
    pub users: usize,
    pub agents: usize,
}

impl DirectorySeed {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        toml::from_str(raw).context("Invalid directory seed")
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read directory seed {}", path.display()))?;
        Self::parse(&raw)
    }

    pub async fn apply(&self, store: &MemoryStore, now: DateTime<Utc>) -> anyhow::Result<SeedSummary> {
        let mut summary = SeedSummary::default();
        let mut categories: HashMap<&str, (Uuid, HashMap<&str, Uuid>)> = HashMap::new();

        for seed in &self.categories {
            if categories.contains_key(seed.name.as_str()) {
                bail!("Duplicate category '{}' in seed", seed.name);
            }
            let category = Category {
                id: seed.id.unwrap_or_else(Uuid::new_v4),
                name: seed.name.clone(),
                description: seed.description.clone(),
            };

            let mut subcategories = HashMap::new();
            for name in &seed.subcategories {
                let subcategory = SubCategory {
                    id: Uuid::new_v4(),
                    category_id: category.id,
                    name: name.clone(),
                    description: None,
                };
                subcategories.insert(name.as_str(), subcategory.id);
                store.add_subcategory(subcategory).await;
                summary.subcategories += 1;
            }

            categories.insert(seed.name.as_str(), (category.id, subcategories));
            store.add_category(category).await;
            summary.categories += 1;
        }

        for seed in &self.users {
            let user = User {
                id: seed.id.unwrap_or_else(Uuid::new_v4),
                first_name: seed.first_name.clone(),
                last_name: seed.last_name.clone(),
                email: seed.email.clone(),
                role: seed.role,
                created_at: now,
            };

            if user.is_agent() {
                let profile = Self::profile_for(seed, user.id, &categories)?;
                store.add_agent_profile(profile).await;
                summary.agents += 1;
            } else if seed.category.is_some() || !seed.subcategories.is_empty() {
                bail!("User {} has skills but is not an agent", seed.email);
            }

            store.add_user(user).await;
            summary.users += 1;
        }

        info!(
            "Directory seeded: {} categories, {} subcategories, {} users ({} agents)",
            summary.categories, summary.subcategories, summary.users, summary.agents
        );
        Ok(summary)
    }

    fn profile_for(
        seed: &UserSeed,
        agent_id: Uuid,
        categories: &HashMap<&str, (Uuid, HashMap<&str, Uuid>)>,
    ) -> anyhow::Result<AgentProfile> {
        let Some(category_name) = &seed.category else {
            if !seed.subcategories.is_empty() {
                bail!("Agent {} lists subcategories without a category", seed.email);
            }
            return Ok(AgentProfile {
                id: Uuid::new_v4(),
                agent_id,
                category_id: None,
                subcategory_ids: Vec::new(),
            });
        };

        let (category_id, subcategories) = categories
            .get(category_name.as_str())
            .with_context(|| format!("Agent {} references unknown category '{}'", seed.email, category_name))?;

        let subcategory_ids = seed
            .subcategories
            .iter()
            .map(|name| {
                subcategories.get(name.as_str()).copied().with_context(|| {
                    format!("Unknown subcategory '{name}' in category '{category_name}'")
                })
            })
            .collect::<anyhow::Result<Vec<Uuid>>>()?;

        Ok(AgentProfile {
            id: Uuid::new_v4(),
            agent_id,
            category_id: Some(*category_id),
            subcategory_ids,
        })
    }
}
