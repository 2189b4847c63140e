//! Model-backed translation through an OpenAI-compatible chat-completions API.
//!
//! Works with OpenAI, Ollama, vLLM, LiteLLM and other servers exposing
//! `/v1/chat/completions`. The model is asked to reply with a JSON object
//! `{"sql": ..., "reason": ...}`; `sql` may be null when it cannot answer.
//!
//! The handler must always be registered inside a
//! [`super::BoundedHandler`], after the pattern handlers.

use super::{Question, TranslationHandler};
use crate::catalog::SchemaCatalog;
use crate::models::TranslationResult;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

const SYSTEM_PROMPT: &str = "You translate questions about a SQLite banking database into a \
single read-only SQLite SELECT statement. Use only the tables and columns in the schema. \
Reply with a JSON object {\"sql\": string or null, \"reason\": short string} and nothing else.";

/// Endpoint settings, normally loaded from the environment.
#[derive(Clone)]
pub struct CompletionConfig {
    pub api_key: String,
    pub model: String,
    pub api_url: String,
    pub max_tokens: u32,
}

impl std::fmt::Debug for CompletionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionConfig")
            .field("model", &self.model)
            .field("api_url", &self.api_url)
            .field("max_tokens", &self.max_tokens)
            // Note: api_key is intentionally omitted
            .finish_non_exhaustive()
    }
}

impl CompletionConfig {
    /// Loads config from `TALKDATA_LLM_*` variables. Returns `None` if no
    /// API key is set.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let api_key = lookup("TALKDATA_LLM_API_KEY").or_else(|| lookup("OPENAI_API_KEY"))?;
        if api_key.is_empty() {
            return None;
        }

        Some(Self {
            api_key,
            model: lookup("TALKDATA_LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_url: lookup("TALKDATA_LLM_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            max_tokens: lookup("TALKDATA_LLM_MAX_TOKENS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(512),
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Why a completion produced no usable answer.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("Completion request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("Completion API error ({status}): {body}")]
    Api { status: StatusCode, body: String },

    #[error("Failed to parse completion response: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("Completion API returned an empty response")]
    EmptyReply,

    #[error("Completion reply was not valid JSON: {0}")]
    InvalidAnswer(#[from] serde_json::Error),
}

/// The JSON object the model is asked to produce.
#[derive(Debug, Deserialize, PartialEq)]
struct ModelAnswer {
    sql: Option<String>,
    #[serde(default)]
    reason: String,
}

/// Asks a hosted model for SQL when no pattern handler matched.
#[derive(Debug, Clone)]
pub struct CompletionHandler {
    client: Client,
    config: CompletionConfig,
}

impl CompletionHandler {
    pub fn new(config: CompletionConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Sends the prompt and parses the model's `{sql, reason}` reply.
    async fn ask(&self, user_prompt: String) -> Result<ModelAnswer, CompletionError> {
        let reply = self.complete(user_prompt).await?;
        Ok(parse_answer(&reply)?)
    }

    async fn complete(&self, user_prompt: String) -> Result<String, CompletionError> {
        let request = ChatRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: 0.0,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt,
                },
            ],
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(CompletionError::Request)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Api { status, body });
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(CompletionError::Decode)?;

        let text = reply
            .choices
            .into_iter()
            .filter_map(|c| c.message.content)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(CompletionError::EmptyReply);
        }
        Ok(text)
    }
}

/// Builds the user prompt from the schema and the question.
fn build_prompt(question: &Question, schema: &SchemaCatalog) -> String {
    let mut prompt = String::from("Schema:\n");
    for (table, columns) in schema.tables() {
        let columns: Vec<String> = columns
            .iter()
            .map(|c| format!("{} {}", c.name, c.declared_type))
            .collect();
        prompt.push_str(&format!("- {}({})\n", table, columns.join(", ")));
    }
    prompt.push_str("\nQuestion: ");
    prompt.push_str(question.original().trim());
    prompt
}

/// Parses the model reply, tolerating markdown code fences.
fn parse_answer(reply: &str) -> Result<ModelAnswer, serde_json::Error> {
    let trimmed = reply.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);
    serde_json::from_str(body.trim())
}

#[async_trait]
impl TranslationHandler for CompletionHandler {
    fn name(&self) -> &str {
        "completion"
    }

    async fn try_translate(
        &self,
        question: &Question,
        schema: &SchemaCatalog,
    ) -> Option<TranslationResult> {
        match self.ask(build_prompt(question, schema)).await {
            Ok(ModelAnswer {
                sql: Some(sql),
                reason,
            }) if !sql.trim().is_empty() => Some(TranslationResult::translated(
                self.name(),
                sql.trim().to_string(),
                if reason.is_empty() {
                    "generated by language model".to_string()
                } else {
                    reason
                },
                Vec::new(),
            )),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Completion handler failed: {}", e);
                Some(TranslationResult::no_match())
            }
        }
    }
}
