use serde::Deserialize;
use std::{fs, path::Path};
use tracing::warn;

#[derive(Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub retrieval: RetrievalSection,
}

fn default_db_path() -> String {
    "docstore/documents.db".to_string()
}

/// Which backend answers chat and embedding calls. `Heuristics` means no
/// LLM at all: extraction falls back to regex and reports are unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    Ollama,
    Remote,
    Heuristics,
}

#[derive(Deserialize)]
pub struct LlmSection {
    #[serde(default = "default_backend")]
    pub backend: LlmBackend,
    #[serde(default = "default_ollama")]
    pub ollama: EndpointSection,
    #[serde(default = "default_remote")]
    pub remote: EndpointSection,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

#[derive(Deserialize, Clone)]
pub struct EndpointSection {
    pub base_url: String,
    pub model: String,
}

#[derive(Deserialize)]
pub struct RetrievalSection {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_backend() -> LlmBackend {
    LlmBackend::Ollama
}

fn default_ollama() -> EndpointSection {
    EndpointSection {
        base_url: "http://localhost:11434/v1".to_string(),
        model: "qwen2.5:7b".to_string(),
    }
}

fn default_remote() -> EndpointSection {
    EndpointSection {
        base_url: "https://api.openai.com/v1".to_string(),
        model: "gpt-4o-mini".to_string(),
    }
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_top_k() -> usize {
    3
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            ollama: default_ollama(),
            remote: default_remote(),
            embedding_model: default_embedding_model(),
        }
    }
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            llm: LlmSection::default(),
            retrieval: RetrievalSection::default(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// A missing or broken config file is not fatal; defaults cover local
    /// Ollama use.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(
                    path = %path.as_ref().display(),
                    error = %e,
                    "Config not loaded — using defaults"
                );
                Self::default()
            }
        }
    }
}
