//! Go structural queries backed by tree-sitter.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tree_sitter::{Language, Node, Parser};

use super::{StructuralTool, FIND_GLOBAL_VARIABLES, FIND_HTTP_HANDLERS};
use crate::error::StructuralError;

/// Answers structural queries on `.go` files below a repository root.
#[derive(Debug, Clone)]
pub struct GoAstTool {
    root: PathBuf,
}

impl GoAstTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, file_path: &str) -> Option<PathBuf> {
        let rel = Path::new(file_path);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        (!escapes).then(|| self.root.join(rel))
    }
}

#[async_trait]
impl StructuralTool for GoAstTool {
    async fn execute(&self, query: &str, file_path: &str) -> Result<String, StructuralError> {
        let full_path = self
            .resolve(file_path)
            .ok_or_else(|| StructuralError::NotFound(file_path.to_string()))?;
        let source = match tokio::fs::read(&full_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StructuralError::NotFound(file_path.to_string()))
            }
            Err(e) => {
                return Err(StructuralError::Parse {
                    path: file_path.to_string(),
                    detail: e.to_string(),
                })
            }
        };

        let query = query.to_string();
        let path = file_path.to_string();
        tokio::task::spawn_blocking(move || run_query(&query, &path, &source))
            .await
            .map_err(|e| StructuralError::Parse {
                path: file_path.to_string(),
                detail: e.to_string(),
            })?
    }
}

fn run_query(query: &str, file_path: &str, source: &[u8]) -> Result<String, StructuralError> {
    let parse_error = |detail: String| StructuralError::Parse {
        path: file_path.to_string(),
        detail,
    };

    let language: Language = tree_sitter_go::LANGUAGE.into();
    let mut parser = Parser::new();
    parser
        .set_language(&language)
        .map_err(|e| parse_error(e.to_string()))?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| parse_error("parser produced no tree".to_string()))?;
    let root = tree.root_node();
    if root.has_error() {
        return Err(parse_error(first_error_position(root)));
    }

    match query {
        FIND_HTTP_HANDLERS => Ok(find_http_handlers(root, source)),
        FIND_GLOBAL_VARIABLES => Ok(find_global_variables(root, source)),
        other => Err(StructuralError::UnknownQuery(other.to_string())),
    }
}

fn first_error_position(root: Node<'_>) -> String {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            let pos = node.start_position();
            return format!("syntax error at {}:{}", pos.row + 1, pos.column + 1);
        }
        let mut cursor = node.walk();
        let children: Vec<_> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    "syntax error".to_string()
}

fn find_http_handlers(root: Node<'_>, source: &[u8]) -> String {
    let mut handlers = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.kind() == "call_expression" {
            if let Some(line) = handler_registration(node, source) {
                handlers.push(line);
            }
        }
        let mut cursor = node.walk();
        let children: Vec<_> = node.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }

    if handlers.is_empty() {
        return "No HTTP handlers found using `http.HandleFunc`.".to_string();
    }
    format!("Found the following HTTP handlers:\n{}", handlers.join("\n"))
}

/// `http.HandleFunc(pattern, handler)` with exactly two arguments.
fn handler_registration(call: Node<'_>, source: &[u8]) -> Option<String> {
    let function = call.child_by_field_name("function")?;
    if function.kind() != "selector_expression" {
        return None;
    }
    let operand = function.child_by_field_name("operand")?;
    let field = function.child_by_field_name("field")?;
    if operand.kind() != "identifier"
        || text(operand, source) != "http"
        || text(field, source) != "HandleFunc"
    {
        return None;
    }

    let arguments = call.child_by_field_name("arguments")?;
    let mut cursor = arguments.walk();
    let args: Vec<_> = arguments
        .named_children(&mut cursor)
        .filter(|n| n.kind() != "comment")
        .collect();
    let [pattern, handler] = args.as_slice() else {
        return None;
    };
    Some(format!(
        "- Pattern: {}, Handler: {}",
        expression_text(*pattern, source),
        expression_text(*handler, source)
    ))
}

fn find_global_variables(root: Node<'_>, source: &[u8]) -> String {
    let mut globals = Vec::new();
    let mut cursor = root.walk();
    for decl in root.named_children(&mut cursor) {
        if decl.kind() != "var_declaration" {
            continue;
        }
        let mut decl_cursor = decl.walk();
        for child in decl.named_children(&mut decl_cursor) {
            match child.kind() {
                "var_spec" => push_spec_names(child, source, &mut globals),
                "var_spec_list" => {
                    let mut list_cursor = child.walk();
                    for spec in child.named_children(&mut list_cursor) {
                        if spec.kind() == "var_spec" {
                            push_spec_names(spec, source, &mut globals);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    if globals.is_empty() {
        return "No global variables found.".to_string();
    }
    format!("Found the following global variables:\n{}", globals.join("\n"))
}

fn push_spec_names(spec: Node<'_>, source: &[u8], out: &mut Vec<String>) {
    let mut cursor = spec.walk();
    for name in spec.children_by_field_name("name", &mut cursor) {
        out.push(format!("- {}", text(name, source)));
    }
}

/// Literal and identifier arguments print as written; anything else is
/// reported as `complex_expression`.
fn expression_text<'a>(node: Node<'_>, source: &'a [u8]) -> &'a str {
    match node.kind() {
        "identifier"
        | "interpreted_string_literal"
        | "raw_string_literal"
        | "int_literal"
        | "float_literal"
        | "imaginary_literal"
        | "rune_literal" => text(node, source),
        _ => "complex_expression",
    }
}

fn text<'a>(node: Node<'_>, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const WEBHOOK: &str = r#"package main

import "net/http"

var (
	port    = 8080
	secret, token string
)

var logger = newLogger()

func main() {
	http.HandleFunc("/webhook", handleWebhook)
	http.HandleFunc(`/health`, func(w http.ResponseWriter, r *http.Request) {})
	mux.HandleFunc("/other", other)
	http.ListenAndServe(":8080", nil)
}
"#;

    fn repo() -> TempDir {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("cmd")).unwrap();
        fs::write(tmp.path().join("cmd/webhook.go"), WEBHOOK).unwrap();
        fs::write(tmp.path().join("broken.go"), "package main\nfunc {\n").unwrap();
        fs::write(tmp.path().join("empty.go"), "package main\n").unwrap();
        tmp
    }

    #[tokio::test]
    async fn finds_http_handlers() {
        let tmp = repo();
        let tool = GoAstTool::new(tmp.path());
        let out = tool
            .execute(FIND_HTTP_HANDLERS, "cmd/webhook.go")
            .await
            .unwrap();
        assert_eq!(
            out,
            "Found the following HTTP handlers:\n\
             - Pattern: \"/webhook\", Handler: handleWebhook\n\
             - Pattern: `/health`, Handler: complex_expression"
        );
    }

    #[tokio::test]
    async fn finds_global_variables() {
        let tmp = repo();
        let tool = GoAstTool::new(tmp.path());
        let out = tool
            .execute(FIND_GLOBAL_VARIABLES, "cmd/webhook.go")
            .await
            .unwrap();
        assert_eq!(
            out,
            "Found the following global variables:\n- port\n- secret\n- token\n- logger"
        );
    }

    #[tokio::test]
    async fn empty_results_have_messages() {
        let tmp = repo();
        let tool = GoAstTool::new(tmp.path());
        assert_eq!(
            tool.execute(FIND_HTTP_HANDLERS, "empty.go").await.unwrap(),
            "No HTTP handlers found using `http.HandleFunc`."
        );
        assert_eq!(
            tool.execute(FIND_GLOBAL_VARIABLES, "empty.go").await.unwrap(),
            "No global variables found."
        );
    }

    #[tokio::test]
    async fn failures_are_typed() {
        let tmp = repo();
        let tool = GoAstTool::new(tmp.path());
        assert!(matches!(
            tool.execute(FIND_HTTP_HANDLERS, "missing.go").await,
            Err(StructuralError::NotFound(p)) if p == "missing.go"
        ));
        assert!(matches!(
            tool.execute(FIND_HTTP_HANDLERS, "../outside.go").await,
            Err(StructuralError::NotFound(_))
        ));
        assert!(matches!(
            tool.execute(FIND_HTTP_HANDLERS, "broken.go").await,
            Err(StructuralError::Parse { .. })
        ));
        assert!(matches!(
            tool.execute("find_structs", "empty.go").await,
            Err(StructuralError::UnknownQuery(q)) if q == "find_structs"
        ));
    }
}
