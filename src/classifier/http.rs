use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::app::{Result, SiftError};
use crate::classifier::CompletionBackend;
use crate::config::OracleConfig;
use crate::fetcher::http_client;

/// Oracle transport against an OpenAI-compatible chat-completions
/// endpoint. One user message in, one choice out, no streaming.
///
/// The credential is resolved per request, so a context built for a
/// read-only command never demands one.
pub struct HttpBackend {
    client: Client,
    config: OracleConfig,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct OracleErrorResponse {
    error: OracleErrorBody,
}

#[derive(Debug, Deserialize)]
struct OracleErrorBody {
    message: String,
}

impl HttpBackend {
    pub fn from_config(config: &OracleConfig) -> Self {
        Self {
            client: http_client(),
            config: config.clone(),
        }
    }
}

#[async_trait]
impl CompletionBackend for HttpBackend {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let api_key = self.config.api_key()?;
        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: prompt.to_string(),
            }],
            stream: false,
        };

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = match response.json::<OracleErrorResponse>().await {
                Ok(body) => body.error.message,
                Err(_) => "unknown error".to_string(),
            };
            return Err(SiftError::Other(format!(
                "oracle returned {}: {}",
                status, message
            )));
        }

        let result: ChatCompletionResponse = response.json().await?;
        result
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| SiftError::OracleContract("response carried no choices".into()))
    }
}
