//! Render error types.

use thiserror::Error;

/// Rendering failures.
///
/// A render failure never takes the server down: HTTP callers answer 500,
/// watch cycles log it and skip the broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("unknown theme `{0}`")]
    UnknownTheme(String),

    #[error("malformed front matter at line {line}: `{text}`")]
    FrontMatter { line: usize, text: String },

    #[error("invalid value `{value}` for directive `{key}`")]
    InvalidDirective { key: String, value: String },
}
