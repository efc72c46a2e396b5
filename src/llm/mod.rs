use async_trait::async_trait;
use serde_json::Value;

/// Text-in, text-out completion backend.
///
/// `config` carries per-call options; the keys understood by the bundled
/// client are `system` (system prompt), `temperature` and `max_tokens`.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        config: &Value,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;
}

#[cfg(feature = "llm")]
pub use openai::OpenAIClient;

#[cfg(feature = "llm")]
mod openai {
    use super::LLMProvider;
    use async_trait::async_trait;
    use log::debug;
    use serde_json::Value;

    /// Client for any OpenAI-compatible `/chat/completions` endpoint.
    pub struct OpenAIClient {
        client: reqwest::Client,
        api_key: String,
        base_url: String,
        model: String,
    }

    impl OpenAIClient {
        pub fn new(api_key: String, base_url: Option<String>, model: String) -> Self {
            let base_url = base_url
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
                .trim_end_matches('/')
                .to_string();
            Self {
                client: reqwest::Client::new(),
                api_key,
                base_url,
                model,
            }
        }

        fn messages(prompt: &str, config: &Value) -> Vec<Value> {
            let mut messages = Vec::with_capacity(2);
            if let Some(system) = config.get("system").and_then(Value::as_str) {
                messages.push(serde_json::json!({"role": "system", "content": system}));
            }
            messages.push(serde_json::json!({"role": "user", "content": prompt}));
            messages
        }
    }

    #[async_trait]
    impl LLMProvider for OpenAIClient {
        async fn generate(
            &self,
            prompt: &str,
            config: &Value,
        ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
            let mut body = serde_json::json!({
                "model": self.model,
                "messages": Self::messages(prompt, config),
                "max_tokens": config.get("max_tokens").and_then(Value::as_u64).unwrap_or(1000),
            });
            if let Some(temperature) = config.get("temperature").and_then(Value::as_f64) {
                body["temperature"] = serde_json::json!(temperature);
            }

            let mut request = self
                .client
                .post(format!("{}/chat/completions", self.base_url))
                .json(&body);
            if !self.api_key.is_empty() {
                request = request.header("Authorization", format!("Bearer {}", self.api_key));
            }

            let response = request.send().await?.error_for_status()?;
            let result: Value = response.json().await?;
            let content = result["choices"][0]["message"]["content"]
                .as_str()
                .ok_or("completion response has no message content")?;

            debug!("LLM returned {} chars", content.len());
            Ok(content.to_string())
        }
    }
}
