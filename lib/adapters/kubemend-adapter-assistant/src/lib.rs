//! Diagnostic assistant reached over an OpenAI-compatible chat-completions API.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use kubemend_domain::AssistantConfig;
use kubemend_ports::{AssistantPort, AssistantRequest};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    pub fn new(model: &str, request: &AssistantRequest) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system_prompt.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.user_prompt.clone(),
                },
            ],
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: Option<ChatMessageContent>,
}

#[derive(Debug, Deserialize)]
pub struct ChatMessageContent {
    pub content: Option<String>,
}

impl ChatResponse {
    /// Content of the first choice; empty when the reply carries none.
    pub fn into_content(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .unwrap_or_default()
    }
}

pub struct ChatCompletionsAssistant {
    http_client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key_env: String,
    api_key: Option<String>,
}

impl ChatCompletionsAssistant {
    pub fn new(config: &AssistantConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("building assistant HTTP client")?;
        Ok(Self {
            http_client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key_env: config.api_key_env.clone(),
            api_key: config.api_key(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl AssistantPort for ChatCompletionsAssistant {
    async fn complete(&self, request: AssistantRequest) -> Result<String> {
        let Some(api_key) = &self.api_key else {
            bail!("{} is not set", self.api_key_env);
        };
        let body = ChatRequest::new(&self.model, &request);

        info!(model = %self.model, prompt_chars = request.user_prompt.len(), "requesting diagnosis");
        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to reach diagnostic assistant")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "assistant returned an error");
            bail!("Assistant returned error {status}: {error_text}");
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("Failed to parse assistant response")?;
        let content = parsed.into_content();
        debug!(response_chars = content.len(), "diagnosis received");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_carries_system_then_user() {
        let request = AssistantRequest {
            system_prompt: "be terse".to_string(),
            user_prompt: "logs".to_string(),
        };
        let body = serde_json::to_value(ChatRequest::new("llama3-8b-8192", &request)).unwrap();
        assert_eq!(body["model"], "llama3-8b-8192");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "logs");
    }

    #[test]
    fn test_first_choice_content_is_returned() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"Restart the pod."}},{"message":{"content":"ignored"}}]}"#,
        )
        .unwrap();
        assert_eq!(response.into_content(), "Restart the pod.");
    }

    #[test]
    fn test_missing_content_is_empty() {
        let no_choices: ChatResponse = serde_json::from_str(r#"{"object":"chat.completion"}"#).unwrap();
        assert_eq!(no_choices.into_content(), "");

        let null_content: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert_eq!(null_content.into_content(), "");
    }

    #[tokio::test]
    async fn test_missing_key_is_reported() {
        let config = AssistantConfig {
            api_key_env: "KUBEMEND_TEST_UNSET_ASSISTANT_KEY".to_string(),
            ..AssistantConfig::default()
        };
        let assistant = ChatCompletionsAssistant::new(&config).unwrap();
        assert!(!assistant.has_credentials());
        assert_eq!(assistant.model(), "llama3-8b-8192");

        let err = assistant
            .complete(AssistantRequest {
                system_prompt: String::new(),
                user_prompt: "logs".to_string(),
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("KUBEMEND_TEST_UNSET_ASSISTANT_KEY"));
    }
}
