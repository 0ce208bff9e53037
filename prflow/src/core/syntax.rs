//! Grammar-based syntax checks for changed files.
//!
//! Source languages go through tree-sitter; JSON and TOML through their serde
//! parsers. Files whose extension maps to no grammar are not checked.

use std::fmt;
use std::path::Path;

use anyhow::{Result, anyhow};

const SNIPPET_CHARS: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLanguage {
    Rust,
    TypeScript,
    /// TSX grammar, also used for `.js`/`.jsx`.
    Tsx,
    Python,
    Go,
    Json,
    Toml,
}

impl SourceLanguage {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "rs" => Some(Self::Rust),
            "ts" | "mts" | "cts" => Some(Self::TypeScript),
            "tsx" | "js" | "jsx" | "mjs" | "cjs" => Some(Self::Tsx),
            "py" => Some(Self::Python),
            "go" => Some(Self::Go),
            "json" => Some(Self::Json),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }

    fn tree_sitter_language(&self) -> Option<tree_sitter::Language> {
        match self {
            Self::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            Self::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            Self::Tsx => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
            Self::Python => Some(tree_sitter_python::LANGUAGE.into()),
            Self::Go => Some(tree_sitter_go::LANGUAGE.into()),
            Self::Json | Self::Toml => None,
        }
    }
}

impl fmt::Display for SourceLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rust => "rust",
            Self::TypeScript => "typescript",
            Self::Tsx => "tsx",
            Self::Python => "python",
            Self::Go => "go",
            Self::Json => "json",
            Self::Toml => "toml",
        };
        f.write_str(name)
    }
}

/// First parse error found in a file. Line and column are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub line: u32,
    pub column: u32,
    pub message: String,
}

/// Parse `source` and return its first syntax error, if any.
///
/// `Err` means the grammar itself could not be loaded.
pub fn check_syntax(language: SourceLanguage, source: &str) -> Result<Option<SyntaxError>> {
    match language {
        SourceLanguage::Json => Ok(check_json(source)),
        SourceLanguage::Toml => Ok(check_toml(source)),
        _ => check_tree_sitter(language, source),
    }
}

fn check_tree_sitter(language: SourceLanguage, source: &str) -> Result<Option<SyntaxError>> {
    let grammar = language
        .tree_sitter_language()
        .ok_or_else(|| anyhow!("no tree-sitter grammar for {language}"))?;
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&grammar)
        .map_err(|err| anyhow!("load {language} grammar: {err}"))?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| anyhow!("{language} parser returned no tree"))?;

    let root = tree.root_node();
    if !root.has_error() {
        return Ok(None);
    }
    let Some(node) = first_error_node(root) else {
        // has_error without a locatable node; report at the root.
        return Ok(Some(SyntaxError {
            line: 1,
            column: 1,
            message: format!("{language} parse error"),
        }));
    };

    let position = node.start_position();
    let message = if node.is_missing() {
        format!("missing `{}`", node.kind())
    } else {
        let text = node.utf8_text(source.as_bytes()).unwrap_or_default();
        format!("unexpected `{}`", snippet(text))
    };
    Ok(Some(SyntaxError {
        line: position.row as u32 + 1,
        column: position.column as u32 + 1,
        message,
    }))
}

fn first_error_node<'t>(node: tree_sitter::Node<'t>) -> Option<tree_sitter::Node<'t>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = first_error_node(child) {
            return Some(found);
        }
    }
    None
}

fn check_json(source: &str) -> Option<SyntaxError> {
    let err = serde_json::from_str::<serde_json::Value>(source).err()?;
    Some(SyntaxError {
        line: err.line() as u32,
        column: err.column() as u32,
        message: err.to_string(),
    })
}

fn check_toml(source: &str) -> Option<SyntaxError> {
    let err = toml::from_str::<toml::Table>(source).err()?;
    let offset = err.span().map_or(0, |span| span.start);
    let (line, column) = line_column(source, offset);
    Some(SyntaxError {
        line,
        column,
        message: err.message().trim().to_string(),
    })
}

/// 1-based line/column of a byte offset.
fn line_column(source: &str, offset: usize) -> (u32, u32) {
    let offset = offset.min(source.len());
    let before = &source.as_bytes()[..offset];
    let line = before.iter().filter(|&&b| b == b'\n').count() + 1;
    let line_start = before
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |i| i + 1);
    (line as u32, (offset - line_start) as u32 + 1)
}

fn snippet(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or_default().trim();
    if first_line.chars().count() <= SNIPPET_CHARS {
        return first_line.to_string();
    }
    let cut: String = first_line.chars().take(SNIPPET_CHARS).collect();
    format!("{cut}...")
}
