//! LLM Backend Module
//!
//! Provides a unified interface for the text-completion capability used by
//! routing, synthesis, chat formatting and NL→SQL generation.
//!
//! ## Architecture
//!
//! - **ChatCompletionsBackend**: OpenAI-compatible `/chat/completions` client
//!   (Groq by default), one instance per configured model/temperature.
//! - **DisabledBackend**: always fails with [`LlmError::Disabled`], which sends
//!   every caller onto its deterministic fallback path.
//!
//! Backends are constructed once at startup into an [`LlmClients`] bundle and
//! passed down explicitly. Every call is bounded by the client timeout; a
//! timeout is just another [`LlmError`].

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

mod chat_completions;
pub mod fallback;
pub mod json;
pub mod sql_generator;

pub use chat_completions::ChatCompletionsBackend;
pub use fallback::{Fallback, Origin, Resolved};
pub use sql_generator::{LlmSqlGenerator, SqlGenerator};

use crate::config::LlmConfig;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM backend is disabled")]
    Disabled,

    #[error("LLM API key not set (expected in ${0})")]
    MissingApiKey(String),

    #[error("LLM HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM server returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("LLM call timed out after {0}s")]
    Timeout(u64),

    #[error("LLM returned an empty response")]
    EmptyResponse,
}

/// Unified trait for LLM backends
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Generate a response from the LLM given a prompt
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;

    /// Get the backend name for logging
    fn backend_name(&self) -> &'static str;
}

/// Backend used when the LLM is switched off or unconfigured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledBackend;

#[async_trait]
impl LlmBackend for DisabledBackend {
    async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::Disabled)
    }

    fn backend_name(&self) -> &'static str {
        "disabled"
    }
}

/// One backend per LLM role.
#[derive(Clone)]
pub struct LlmClients {
    pub routing: Arc<dyn LlmBackend>,
    pub synthesis: Arc<dyn LlmBackend>,
    pub chat: Arc<dyn LlmBackend>,
    pub sql: Arc<dyn LlmBackend>,
}

impl LlmClients {
    /// Every role disabled.
    pub fn disabled() -> Self {
        Self::uniform(Arc::new(DisabledBackend))
    }

    /// The same backend for every role.
    pub fn uniform(backend: Arc<dyn LlmBackend>) -> Self {
        Self {
            routing: Arc::clone(&backend),
            synthesis: Arc::clone(&backend),
            chat: Arc::clone(&backend),
            sql: backend,
        }
    }

    /// Build from config. A disabled config, missing API key or failed HTTP
    /// client build yields disabled backends rather than an error.
    pub fn from_config(config: &LlmConfig) -> Self {
        if !config.enabled {
            tracing::info!("LLM disabled by configuration, using deterministic fallbacks");
            return Self::disabled();
        }

        let Some(api_key) = config.api_key() else {
            tracing::warn!(
                env = %config.api_key_env,
                "LLM API key not set, using deterministic fallbacks"
            );
            return Self::disabled();
        };

        let build = |model: &str, temperature: f64| -> Arc<dyn LlmBackend> {
            match ChatCompletionsBackend::new(config, &api_key, model, temperature) {
                Ok(b) => Arc::new(b),
                Err(e) => {
                    tracing::warn!(model = %model, error = %e, "Failed to build LLM client");
                    Arc::new(DisabledBackend)
                }
            }
        };

        let clients = Self {
            routing: build(&config.routing_model, config.temperature),
            synthesis: build(&config.synthesis_model, config.temperature),
            chat: build(&config.chat_model, config.temperature),
            sql: build(&config.sql_model, config.sql_temperature),
        };

        tracing::info!(
            base_url = %config.base_url,
            routing_model = %config.routing_model,
            sql_model = %config.sql_model,
            "LLM clients initialized"
        );
        clients
    }
}
