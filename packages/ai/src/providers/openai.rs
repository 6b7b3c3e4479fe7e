//! `OpenAI` chat completions provider implementation.
//!
//! Also used for `OpenAI`-compatible servers when `AI_BASE_URL` is set.

use crime_risk_http::RetryPolicy;
use serde::{Deserialize, Serialize};

use super::{LlmProvider, Message, Role};
use crate::AiError;

/// Model used when `AI_MODEL` is not set.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// `OpenAI` API provider.
pub struct OpenAiProvider {
    api_key: Option<String>,
    model: String,
    base_url: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl OpenAiProvider {
    /// Creates a new `OpenAI` provider. `base_url` defaults to the public
    /// `OpenAI` API.
    #[must_use]
    pub fn new(api_key: Option<String>, model: String, base_url: Option<String>) -> Self {
        Self {
            api_key,
            model,
            base_url: base_url
                .map_or_else(|| DEFAULT_BASE_URL.to_string(), |url| url.trim_end_matches('/').to_string()),
            client: reqwest::Client::new(),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct OpenAiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

fn build_request<'a>(
    model: &'a str,
    system_prompt: &'a str,
    messages: &'a [Message],
    json: bool,
) -> OpenAiRequest<'a> {
    let mut api_messages = vec![OpenAiMessage {
        role: "system",
        content: system_prompt,
    }];
    api_messages.extend(messages.iter().map(|msg| OpenAiMessage {
        role: match msg.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        },
        content: &msg.content,
    }));

    OpenAiRequest {
        model,
        messages: api_messages,
        max_tokens: 2048,
        temperature: 0.4,
        response_format: json.then_some(ResponseFormat {
            format_type: "json_object",
        }),
    }
}

fn extract_text(body: serde_json::Value) -> Result<String, AiError> {
    let response: OpenAiResponse = serde_json::from_value(body)?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| AiError::Provider {
            message: "No content in OpenAI response".to_string(),
        })
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    async fn chat(
        &self,
        system_prompt: &str,
        messages: &[Message],
        json: bool,
    ) -> Result<String, AiError> {
        let request = build_request(&self.model, system_prompt, messages, json);
        let url = format!("{}/chat/completions", self.base_url);

        let body = crime_risk_http::send_json(&self.retry, || {
            let builder = self.client.post(&url).json(&request);
            match &self.api_key {
                Some(key) => builder.bearer_auth(key),
                None => builder,
            }
        })
        .await?;

        extract_text(body)
    }

    fn name(&self) -> String {
        format!("openai/{}", self.model)
    }
}
