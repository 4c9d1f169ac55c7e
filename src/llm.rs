// src/llm.rs

use crate::config::{LlmBackend, LlmSection};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

/// Collaborator errors cross the async seam, so they carry Send + Sync.
pub type LlmError = Box<dyn std::error::Error + Send + Sync>;

/// The report-generation seam: a prompt template plus the structured
/// context, returning free text.
#[async_trait]
pub trait ReportGenerator {
    async fn generate_report(
        &self,
        template: &str,
        context: &HashMap<String, String>,
    ) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
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
    message: ChatMessage,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f64>,
}

/// Resolved endpoint configuration ready to make API calls.
struct ResolvedEndpoint {
    base_url: String,
    model: String,
    api_key: String,
}

/// Resolve the LLM config section into a concrete endpoint.
fn resolve_endpoint(llm: &LlmSection) -> Result<ResolvedEndpoint, LlmError> {
    match llm.backend {
        LlmBackend::Ollama => {
            info!(
                url = %llm.ollama.base_url,
                model = %llm.ollama.model,
                "Using Ollama (local) backend"
            );
            Ok(ResolvedEndpoint {
                base_url: llm.ollama.base_url.clone(),
                model: llm.ollama.model.clone(),
                api_key: "ollama".to_string(), // required by API but ignored
            })
        }
        LlmBackend::Remote => {
            let api_key = std::env::var("LLM_API_KEY")
                .map_err(|_| "LLM_API_KEY env var required for remote backend")?;
            info!(
                url = %llm.remote.base_url,
                model = %llm.remote.model,
                "Using remote API backend"
            );
            Ok(ResolvedEndpoint {
                base_url: llm.remote.base_url.clone(),
                model: llm.remote.model.clone(),
                api_key,
            })
        }
        LlmBackend::Heuristics => {
            Err("Heuristics backend selected — no LLM endpoint available".into())
        }
    }
}

/// Check if the Ollama server is reachable.
async fn check_ollama_health(client: &Client, base_url: &str) -> bool {
    // Ollama's health endpoint is at the root (not under /v1)
    let health_url = base_url.trim_end_matches("/v1").trim_end_matches("/v1/");

    match client
        .get(health_url)
        .timeout(std::time::Duration::from_secs(3))
        .send()
        .await
    {
        Ok(resp) => {
            if resp.status().is_success() {
                info!("Ollama server is reachable");
                true
            } else {
                warn!(status = %resp.status(), "Ollama server returned non-OK status");
                false
            }
        }
        Err(e) => {
            warn!(error = %e, "Ollama server not reachable");
            false
        }
    }
}

/// HTTP client for the configured chat + embedding endpoint.
pub struct LlmClient {
    client: Client,
    endpoint: ResolvedEndpoint,
    embedding_model: String,
}

impl LlmClient {
    /// Build a client for the configured backend, verifying local
    /// backends are actually up before the first real call.
    pub async fn connect(llm: &LlmSection) -> Result<Self, LlmError> {
        let endpoint = resolve_endpoint(llm)?;
        let client = Client::new();

        if llm.backend == LlmBackend::Ollama
            && !check_ollama_health(&client, &endpoint.base_url).await
        {
            return Err(format!(
                "Ollama is not running at {}. Start it with: ollama serve",
                endpoint.base_url
            )
            .into());
        }

        Ok(Self {
            client,
            endpoint,
            embedding_model: llm.embedding_model.clone(),
        })
    }

    /// One chat completion at temperature 0; returns the assistant's text.
    pub async fn chat(&self, system: Option<&str>, user: &str) -> Result<String, LlmError> {
        let mut messages = Vec::new();
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: user.to_string(),
        });

        let request = ChatRequest {
            model: self.endpoint.model.clone(),
            messages,
            temperature: 0.0,
        };

        let url = format!("{}/chat/completions", self.endpoint.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.endpoint.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("LLM API error {status}: {body}").into());
        }

        let chat_response: ChatResponse = response.json().await?;
        chat_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| "Empty response from LLM".into())
    }

    /// Embed one text with the configured embedding model.
    pub async fn embed(&self, text: &str) -> Result<Vec<f64>, LlmError> {
        let request = EmbeddingRequest {
            model: self.embedding_model.clone(),
            input: text.to_string(),
        };

        let url = format!("{}/embeddings", self.endpoint.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.endpoint.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("Embedding API error {status}: {body}").into());
        }

        let embedding_response: EmbeddingResponse = response.json().await?;
        embedding_response
            .data
            .into_iter()
            .next()
            .map(|data| data.embedding)
            .ok_or_else(|| "Empty embedding response".into())
    }
}

#[async_trait]
impl ReportGenerator for LlmClient {
    async fn generate_report(
        &self,
        template: &str,
        context: &HashMap<String, String>,
    ) -> Result<String, LlmError> {
        let prompt = render_template(template, context);
        info!(
            model = %self.endpoint.model,
            prompt_len = prompt.len(),
            "Generating report"
        );
        self.chat(None, &prompt).await
    }
}

/// Fill `{placeholder}` slots in a prompt template from the context map.
fn render_template(template: &str, context: &HashMap<String, String>) -> String {
    let mut rendered = template.to_string();
    for (key, value) in context {
        rendered = rendered.replace(&format!("{{{key}}}"), value);
    }
    rendered
}

/// Cut the outermost JSON object out of a model response that may carry
/// markdown fences or reasoning text around it.
pub fn extract_json_object(content: &str) -> Result<&str, LlmError> {
    let trimmed = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let start = trimmed.find('{').ok_or("No '{' found in LLM response")?;
    let end = trimmed.rfind('}').ok_or("No '}' found in LLM response")?;
    if end <= start {
        return Err("Malformed JSON in LLM response".into());
    }
    Ok(&trimmed[start..=end])
}
