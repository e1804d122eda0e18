//! Chatbot façade over the orchestrator
//!
//! Keeps a per-session conversation history and optionally rewrites the
//! orchestrator's briefing into a conversational reply. One session per
//! caller; sessions share the orchestrator, not their history.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::agents::{AgentResult, ExplainabilityLog, Orchestrator};
use crate::config::ChatConfig;
use crate::llm::{Fallback, LlmBackend};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    /// Trace of the run that produced an assistant turn
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<ExplainabilityLog>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub success: bool,
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub trace: ExplainabilityLog,
    pub agent_results: Vec<AgentResult>,
    /// Completed exchanges so far; absent when the run failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<usize>,
}

pub fn formatting_prompt(query: &str, raw_response: &str) -> String {
    format!(
        "You are an administrative assistant chatbot. Convert this technical analysis into a clear, conversational response for an administrator.\n\n\
         User Query: {query}\n\n\
         Technical Response:\n{raw_response}\n\n\
         Convert this into a friendly, professional chatbot response that:\n\
         1. Directly answers the question\n\
         2. Uses clear, non-technical language when possible\n\
         3. Highlights key insights and recommendations\n\
         4. Maintains a professional but approachable tone\n\n\
         Response:"
    )
}

pub struct ChatSession {
    orchestrator: Arc<Orchestrator>,
    llm: Arc<dyn LlmBackend>,
    config: ChatConfig,
    history: Vec<ConversationTurn>,
}

impl ChatSession {
    pub fn new(orchestrator: Arc<Orchestrator>, llm: Arc<dyn LlmBackend>, config: ChatConfig) -> Self {
        Self {
            orchestrator,
            llm,
            config,
            history: Vec::new(),
        }
    }

    /// Number of completed question/answer exchanges.
    pub fn conversation_id(&self) -> usize {
        self.history.iter().filter(|t| t.role == Role::Assistant).count()
    }

    pub async fn ask(&mut self, query: &str, district: Option<&str>) -> ChatReply {
        self.history.push(ConversationTurn {
            role: Role::User,
            content: query.to_string(),
            district: district.map(str::to_string),
            trace: None,
        });

        let output = self.orchestrator.run(query, district).await;

        if !output.success {
            let error = output
                .error
                .unwrap_or_else(|| "Unknown error occurred".to_string());
            return ChatReply {
                success: false,
                response: format!("I encountered an error: {error}"),
                error: Some(error),
                trace: output.trace,
                agent_results: output.agent_results,
                conversation_id: None,
            };
        }

        let raw = output
            .response
            .unwrap_or_else(|| "No response generated".to_string());
        let response = self.format(query, raw).await;

        self.history.push(ConversationTurn {
            role: Role::Assistant,
            content: response.clone(),
            district: output.district,
            trace: Some(output.trace.clone()),
        });
        let conversation_id = self.conversation_id();
        info!(conversation_id, "Chat exchange completed");

        ChatReply {
            success: true,
            response,
            error: None,
            trace: output.trace,
            agent_results: output.agent_results,
            conversation_id: Some(conversation_id),
        }
    }

    async fn format(&self, query: &str, raw: String) -> String {
        if !self.config.formatting || raw.is_empty() {
            return raw;
        }
        let formatted = self.llm.generate(&formatting_prompt(query, &raw)).await;
        Fallback::resolve(formatted, |_| raw.clone()).into_inner()
    }

    /// The last `limit` turns, oldest first. `None` uses the configured default.
    pub fn history(&self, limit: Option<usize>) -> &[ConversationTurn] {
        let limit = limit.unwrap_or(self.config.history_limit);
        let start = self.history.len().saturating_sub(limit);
        &self.history[start..]
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::data::{SnapshotDataAccess, Tables};
    use crate::llm::{DisabledBackend, LlmClients, LlmError};
    use async_trait::async_trait;

    struct Upper;

    #[async_trait]
    impl LlmBackend for Upper {
        async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
            Ok(format!("formatted {} chars", prompt.len()))
        }

        fn backend_name(&self) -> &'static str {
            "upper"
        }
    }

    fn session(llm: Arc<dyn LlmBackend>, formatting: bool) -> ChatSession {
        let data = Arc::new(SnapshotDataAccess::new(Tables::default()));
        let orchestrator = Arc::new(Orchestrator::new(data, LlmClients::disabled(), &AppConfig::default()));
        let config = ChatConfig {
            history_limit: 3,
            formatting,
        };
        ChatSession::new(orchestrator, llm, config)
    }

    #[tokio::test]
    async fn test_greeting_exchange_counts() {
        let mut chat = session(Arc::new(DisabledBackend), true);
        let reply = chat.ask("hello", None).await;
        assert!(reply.success);
        assert!(reply.response.starts_with("Hello!"), "raw answer kept when formatting fails");
        assert_eq!(reply.conversation_id, Some(1));
        assert_eq!(chat.history(None).len(), 2);
    }

    #[tokio::test]
    async fn test_formatting_applied_when_available() {
        let mut chat = session(Arc::new(Upper), true);
        let reply = chat.ask("hi", None).await;
        assert!(reply.response.starts_with("formatted "));

        let mut plain = session(Arc::new(Upper), false);
        assert!(plain.ask("hi", None).await.response.starts_with("Hello!"));
    }

    #[tokio::test]
    async fn test_history_limit_and_clear() {
        let mut chat = session(Arc::new(DisabledBackend), false);
        chat.ask("hi", None).await;
        chat.ask("hey", None).await;
        assert_eq!(chat.history(None).len(), 3);
        assert_eq!(chat.history(Some(10)).len(), 4);
        assert_eq!(chat.history(None)[2].role, Role::Assistant);
        assert_eq!(chat.conversation_id(), 2);

        chat.clear();
        assert!(chat.history(None).is_empty());
        assert_eq!(chat.conversation_id(), 0);
    }
}
