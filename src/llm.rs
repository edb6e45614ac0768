use crate::config::AppConfig;
use crate::error::{ChatError, Result};

/// Thin client over an OpenAI-compatible chat-completions endpoint.
///
/// The rest of the crate treats this as `prompt string -> completion string`;
/// model choice and transport live here.
pub struct LlmClient {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl LlmClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.llm_timeout)
            .build()
            .map_err(|e| ChatError::ApiConfig(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            client,
        })
    }

    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": "You are a precise assistant. Follow the instructions exactly and return only what is asked for, no other text."},
                {"role": "user", "content": prompt}
            ],
            "temperature": 0.1,
            "max_tokens": 1000
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Llm(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ChatError::ApiConfig(format!(
                "LLM API rejected credentials: HTTP {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(ChatError::Llm(format!("LLM API returned HTTP {}", status)));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ChatError::Llm(format!("Failed to parse LLM response: {}", e)))?;

        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| ChatError::Llm("No content in LLM response".to_string()))?;

        Ok(content.to_string())
    }
}
