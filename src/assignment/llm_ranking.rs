use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::strategy::{AssignmentStrategy, Selection};
use super::{AgentCandidate, TicketContext};
use crate::llm::LLMProvider;
use crate::tickets::error::TicketError;

const CONTENT_PREVIEW_CHARS: usize = 500;

const SYSTEM_PROMPT: &str = "You are an expert support ticket router. Pick the single best agent \
for the ticket below.\n\
Weigh skills first: an agent whose category matches the ticket is strongly preferred, and a \
matching subcategory is better still.\n\
Weigh workload second: among comparable agents prefer fewer active tickets, fewer high-priority \
active tickets and a shorter average resolution time.\n\
Critical and high priority tickets should go to experienced agents who are not overloaded.\n\
If no agent is suitable, answer with a null id.\n\
Respond only with JSON of the form {\"selected_agent_id\": \"<uuid or null>\", \"reasoning\": \"<one short paragraph>\"}.";

#[derive(Debug, Deserialize)]
struct RankingResponse {
    selected_agent_id: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Delegates the choice to a language model.
pub struct LlmRankingStrategy {
    llm: Arc<dyn LLMProvider>,
}

impl LlmRankingStrategy {
    pub fn new(llm: Arc<dyn LLMProvider>) -> Self {
        Self { llm }
    }

    pub fn build_prompt(ticket: &TicketContext, candidates: &[AgentCandidate]) -> String {
        let content: String = ticket.content.chars().take(CONTENT_PREVIEW_CHARS).collect();
        let mut lines = vec![
            "TICKET".to_string(),
            format!("Title: {}", ticket.title),
            format!("Description: {}", ticket.description),
            format!("Content: {content}"),
            format!("Category: {}", ticket.category.as_deref().unwrap_or("Unknown")),
            format!("Subcategory: {}", ticket.subcategory.as_deref().unwrap_or("Unknown")),
            format!("Priority: {}", ticket.priority),
            format!("Severity: {}", ticket.severity.as_str()),
            format!("Status: {}", ticket.status),
        ];
        if !ticket.tags.is_empty() {
            let tags: Vec<String> = ticket
                .tags
                .iter()
                .map(|tag| match &tag.value {
                    Some(value) => format!("{}={}", tag.key, value),
                    None => tag.key.clone(),
                })
                .collect();
            lines.push(format!("Tags: {}", tags.join(", ")));
        }

        lines.push(String::new());
        lines.push("AVAILABLE AGENTS".to_string());
        for candidate in candidates {
            lines.extend(Self::describe_candidate(candidate));
        }

        let mut prompt = lines.join("\n");
        prompt.push('\n');
        prompt
    }

    fn describe_candidate(candidate: &AgentCandidate) -> [String; 7] {
        let skills = &candidate.skills;
        let category = skills
            .category
            .as_ref()
            .map(|c| c.name.as_str())
            .unwrap_or("None");
        let matches = if candidate.category_match {
            " (matches ticket)"
        } else {
            ""
        };
        let subcategories: Vec<&str> = skills
            .subcategories
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        let subcategories = if subcategories.is_empty() {
            "None".to_string()
        } else {
            subcategories.join(", ")
        };
        let avg = candidate
            .workload
            .avg_resolution_hours
            .map(|h| format!("{h:.1}"))
            .unwrap_or_else(|| "N/A".to_string());

        [
            format!("- Agent ID: {}", skills.agent.id),
            format!("  Name: {}", skills.agent.full_name()),
            format!("  Email: {}", skills.agent.email),
            format!("  Category: {category}{matches}"),
            format!("  Subcategories: {subcategories}"),
            format!(
                "  Active tickets: {} ({} high priority)",
                candidate.workload.active_tickets, candidate.workload.high_priority_active
            ),
            format!("  Average resolution hours (30 days): {avg}"),
        ]
    }

    /// Accepts bare JSON or JSON inside a markdown code fence.
    pub fn parse_response(raw: &str) -> Result<Option<Selection>, TicketError> {
        let body = strip_code_fence(raw);
        let parsed: RankingResponse = serde_json::from_str(body).map_err(|e| {
            TicketError::UpstreamUnavailable(format!("unparseable ranking response: {e}"))
        })?;

        let Some(raw_id) = parsed.selected_agent_id else {
            return Ok(None);
        };
        match Uuid::parse_str(raw_id.trim()) {
            Ok(agent_id) => Ok(Some(Selection {
                agent_id,
                reasoning: parsed.reasoning,
            })),
            Err(_) => {
                warn!("Ranking returned a malformed agent id: {}", raw_id);
                Ok(None)
            }
        }
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[async_trait]
impl AssignmentStrategy for LlmRankingStrategy {
    fn name(&self) -> &'static str {
        "llm_ranking"
    }

    async fn select(
        &self,
        ticket: &TicketContext,
        candidates: &[AgentCandidate],
    ) -> Result<Option<Selection>, TicketError> {
        let prompt = Self::build_prompt(ticket, candidates);
        debug!(
            "Ranking {} candidates for ticket {}",
            candidates.len(),
            ticket.id
        );

        let config = serde_json::json!({
            "system": SYSTEM_PROMPT,
            "temperature": 0.0,
        });
        let raw = self
            .llm
            .generate(&prompt, &config)
            .await
            .map_err(|e| TicketError::UpstreamUnavailable(e.to_string()))?;

        let selection = Self::parse_response(&raw)?;
        if let Some(selection) = &selection {
            info!(
                "LLM selected agent {} for ticket {}: {}",
                selection.agent_id,
                ticket.id,
                selection.reasoning.as_deref().unwrap_or("")
            );
        }
        Ok(selection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::AgentWorkload;
    use crate::directory::{AgentSkills, Category, SubCategory, User, UserRole};
    use crate::tickets::models::{TicketPriority, TicketSeverity, TicketStatus, TicketTag};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_prompt_layout() {
        let network = Category {
            id: Uuid::new_v4(),
            name: "Network".to_string(),
            description: None,
        };
        let ticket = TicketContext {
            id: Uuid::new_v4(),
            title: "VPN down".to_string(),
            description: "Cannot connect".to_string(),
            content: "x".repeat(CONTENT_PREVIEW_CHARS + 20),
            category: Some("Network".to_string()),
            subcategory: None,
            priority: TicketPriority::High,
            severity: TicketSeverity::Medium,
            status: TicketStatus::New,
            created_at: Utc.with_ymd_and_hms(2024, 5, 6, 8, 0, 0).unwrap(),
            requester: None,
            tags: vec![
                TicketTag {
                    key: "site".to_string(),
                    value: Some("hq".to_string()),
                },
                TicketTag {
                    key: "vip".to_string(),
                    value: None,
                },
            ],
        };
        let agent = User {
            id: Uuid::new_v4(),
            first_name: "Ana".to_string(),
            last_name: "Silva".to_string(),
            email: "ana@example.com".to_string(),
            role: UserRole::Agent,
            created_at: ticket.created_at,
        };
        let candidate = AgentCandidate {
            skills: AgentSkills {
                agent: agent.clone(),
                subcategories: vec![SubCategory {
                    id: Uuid::new_v4(),
                    category_id: network.id,
                    name: "VPN".to_string(),
                    description: None,
                }],
                category: Some(network),
            },
            category_match: true,
            matching_subcategories: Vec::new(),
            workload: AgentWorkload {
                active_tickets: 3,
                high_priority_active: 1,
                avg_resolution_hours: Some(5.5),
                ..AgentWorkload::default()
            },
        };

        let prompt = LlmRankingStrategy::build_prompt(&ticket, &[candidate]);
        let expected = format!(
            "TICKET\n\
             Title: VPN down\n\
             Description: Cannot connect\n\
             Content: {}\n\
             Category: Network\n\
             Subcategory: Unknown\n\
             Priority: high\n\
             Severity: medium\n\
             Status: new\n\
             Tags: site=hq, vip\n\
             \n\
             AVAILABLE AGENTS\n\
             - Agent ID: {}\n  \
             Name: Ana Silva\n  \
             Email: ana@example.com\n  \
             Category: Network (matches ticket)\n  \
             Subcategories: VPN\n  \
             Active tickets: 3 (1 high priority)\n  \
             Average resolution hours (30 days): 5.5\n",
            "x".repeat(CONTENT_PREVIEW_CHARS),
            agent.id
        );
        assert_eq!(prompt, expected);
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn test_parse_selection() {
        let id = Uuid::new_v4();
        let raw = format!(
            "```json\n{{\"selected_agent_id\": \"{id}\", \"reasoning\": \"network expert\"}}\n```"
        );
        let selection = LlmRankingStrategy::parse_response(&raw).unwrap().unwrap();
        assert_eq!(selection.agent_id, id);
        assert_eq!(selection.reasoning.as_deref(), Some("network expert"));
    }

    #[test]
    fn test_parse_null_and_garbage() {
        let none = LlmRankingStrategy::parse_response(
            r#"{"selected_agent_id": null, "reasoning": "nobody fits"}"#,
        )
        .unwrap();
        assert!(none.is_none());

        let malformed =
            LlmRankingStrategy::parse_response(r#"{"selected_agent_id": "agent-7"}"#).unwrap();
        assert!(malformed.is_none());

        let err = LlmRankingStrategy::parse_response("I think Alice").unwrap_err();
        assert!(matches!(err, TicketError::UpstreamUnavailable(_)));
    }
}
