//! Structural queries over single source files.
//!
//! A structural query answers a precise question about one file's syntax
//! tree (which HTTP handlers does it register, which package-level
//! variables does it declare) without going through embeddings. The
//! agent treats this path as optional: any failure falls back to
//! retrieval.

mod go_ast;

pub use go_ast::GoAstTool;

use async_trait::async_trait;

use crate::error::StructuralError;

/// Lists `http.HandleFunc(pattern, handler)` registrations.
pub const FIND_HTTP_HANDLERS: &str = "find_http_handlers";
/// Lists package-level `var` names.
pub const FIND_GLOBAL_VARIABLES: &str = "find_global_variables";

#[async_trait]
pub trait StructuralTool: Send + Sync {
    /// Run `query` against `file_path` (relative to the repository root).
    async fn execute(&self, query: &str, file_path: &str) -> Result<String, StructuralError>;
}
