//! Question routing between the structural tool and semantic retrieval.
//!
//! One classification prompt is sent to the completion model, which must
//! reply with a JSON object naming a tool. Anything other than a
//! well-formed structural choice routes to semantic retrieval, so
//! [`Router::route`] never fails.

use std::sync::Arc;

use review_harness_core::json_recover::recover_as;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::cancel::cancellable;
use crate::llm::Completer;
use crate::structural::{FIND_GLOBAL_VARIABLES, FIND_HTTP_HANDLERS};

/// Which retrieval path should answer a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolChoice {
    /// Run a named structural query against one file.
    Structural { query: String, file_path: String },
    /// Similarity search over the chunk store.
    Semantic,
}

#[derive(Debug, Deserialize)]
struct RawChoice {
    tool: String,
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    file_path: Option<String>,
}

pub struct Router {
    completer: Arc<dyn Completer>,
}

impl Router {
    pub fn new(completer: Arc<dyn Completer>) -> Self {
        Self { completer }
    }

    pub async fn route(&self, question: &str, cancel: &CancellationToken) -> ToolChoice {
        let prompt = routing_prompt(question);
        let response = match cancellable(cancel, self.completer.complete(&prompt)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "router call failed, using semantic search");
                return ToolChoice::Semantic;
            }
            Err(_) => return ToolChoice::Semantic,
        };
        match parse_tool_choice(&response) {
            Some(choice) => {
                tracing::debug!(?choice, "router decision");
                choice
            }
            None => {
                tracing::warn!(response = %response, "unparseable router response, using semantic search");
                ToolChoice::Semantic
            }
        }
    }
}

/// Interpret a router reply. `None` when it is not a usable decision.
pub fn parse_tool_choice(response: &str) -> Option<ToolChoice> {
    let raw: RawChoice = recover_as(response).ok()?;
    match raw.tool.trim().to_ascii_lowercase().as_str() {
        "structural_query" | "ast_tool" => {
            let query = raw.query.filter(|q| !q.trim().is_empty())?;
            let file_path = raw.file_path.filter(|p| !p.trim().is_empty())?;
            Some(ToolChoice::Structural {
                query: query.trim().to_string(),
                file_path: file_path.trim().to_string(),
            })
        }
        "semantic_search" | "vector_search" => Some(ToolChoice::Semantic),
        _ => None,
    }
}

fn routing_prompt(question: &str) -> String {
    format!(
        "You are an expert software engineering assistant. Choose the best tool to answer the \
user's question about a code repository.\n\n\
Tools:\n\
1. \"structural_query\": precise structural questions about ONE specific file. Supported \
queries: \"{handlers}\" (HTTP handler registrations) and \"{globals}\" (package-level \
variables). Requires \"query\" and \"file_path\".\n\
2. \"semantic_search\": open-ended or conceptual questions, or anything spanning several \
files. This is the default.\n\n\
Respond with a single JSON object and nothing else.\n\
Example 1: {{\"tool\": \"semantic_search\", \"reason\": \"The question is general.\"}}\n\
Example 2: {{\"tool\": \"structural_query\", \"query\": \"{handlers}\", \"file_path\": \
\"cmd/webhook.go\", \"reason\": \"The user asks for handlers in one file.\"}}\n\n\
QUESTION: \"{question}\"\n\nJSON:",
        handlers = FIND_HTTP_HANDLERS,
        globals = FIND_GLOBAL_VARIABLES,
        question = question,
    )
}
