//! Request routing.
//!
//! [`route`] maps `(method, path, body)` to a [`Reply`] without touching the
//! socket, so every endpoint is testable in-process.
//!
//! | Route              | Behavior                                         |
//! |--------------------|--------------------------------------------------|
//! | `GET /`            | render the markdown file into the preview page   |
//! | `GET /client.js`   | embedded browser script                          |
//! | `POST /api/reload` | render the body and broadcast it                 |
//! | `POST /api/command`| re-broadcast a navigation command                |
//! | anything else      | static file next to the markdown file            |

use std::fs;
use std::io;
use std::path::PathBuf;

use serde_json::{Value, json};
use thiserror::Error;
use tiny_http::Method;

use super::path::resolve_asset;
use crate::embed::serve::{CLIENT_JS, PAGE_HTML, PageVars};
use crate::reload::Publisher;
use crate::render::RenderError;
use crate::utils::mime::{self, types};

/// Everything a request handler needs.
pub struct ServeContext {
    pub publisher: Publisher,
    pub markdown_file: PathBuf,
    /// Static files are served from here
    pub asset_root: PathBuf,
    /// Live-update port advertised to the page
    pub ws_port: u16,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    AssetNotFound(String),

    #[error("invalid command JSON: {0}")]
    MalformedCommand(#[source] serde_json::Error),

    #[error("render failed: {0}")]
    Render(#[from] RenderError),

    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ApiError {
    pub fn status(&self) -> u16 {
        match self {
            Self::AssetNotFound(_) => 404,
            Self::MalformedCommand(_) => 400,
            Self::Render(_) | Self::Read { .. } => 500,
        }
    }
}

/// A response ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Reply {
    fn ok(content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type,
            body: body.into(),
        }
    }

    fn json(status: u16, value: &Value) -> Self {
        Self {
            status,
            content_type: types::JSON,
            body: value.to_string().into_bytes(),
        }
    }

    /// Plain-text reply for page and asset failures.
    fn from_error(error: &ApiError) -> Self {
        let body: &[u8] = match error {
            ApiError::AssetNotFound(_) => b"Not Found",
            _ => b"Internal Server Error",
        };
        Self {
            status: error.status(),
            content_type: types::PLAIN,
            body: body.to_vec(),
        }
    }
}

pub fn route(ctx: &ServeContext, method: &Method, url: &str, body: &str) -> Reply {
    let path = url.split(['?', '#']).next().unwrap_or(url);

    let result = match (method, path) {
        (Method::Get | Method::Head, "/") => index(ctx),
        (Method::Get | Method::Head, "/client.js") => Ok(Reply::ok(types::JAVASCRIPT, CLIENT_JS)),
        (Method::Post, "/api/reload") => return reload(ctx, body),
        (Method::Post, "/api/command") => return command(ctx, body),
        (Method::Get | Method::Head, _) => asset(ctx, path),
        _ => Err(ApiError::AssetNotFound(path.to_string())),
    };

    result.unwrap_or_else(|e| {
        match &e {
            ApiError::AssetNotFound(_) => crate::debug!("serve"; "{}", e),
            _ => crate::log!("serve"; "{}", e),
        }
        Reply::from_error(&e)
    })
}

/// Render the markdown file fresh into the preview page.
fn index(ctx: &ServeContext) -> Result<Reply, ApiError> {
    let markdown = fs::read_to_string(&ctx.markdown_file).map_err(|source| ApiError::Read {
        path: ctx.markdown_file.clone(),
        source,
    })?;
    let result = ctx.publisher.renderer().render(&markdown)?;

    let title = ctx
        .markdown_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let page = PAGE_HTML.render(&PageVars {
        title,
        ws_port: ctx.ws_port,
        css: result.css,
        html: result.html,
    });
    Ok(Reply::ok(types::HTML, page))
}

fn reload(ctx: &ServeContext, markdown: &str) -> Reply {
    crate::debug!("serve"; "reload request received");
    match ctx.publisher.publish(markdown) {
        Ok(_) => Reply::json(200, &json!({ "status": "ok" })),
        Err(e) => {
            crate::log!("serve"; "reload failed: {}", e);
            Reply::json(
                500,
                &json!({ "status": "error", "message": "Failed to render markdown" }),
            )
        }
    }
}

/// Re-broadcast any JSON value; tabs decide what they act on.
fn command(ctx: &ServeContext, body: &str) -> Reply {
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => {
            let e = ApiError::MalformedCommand(e);
            crate::log!("serve"; "{}", e);
            return Reply::json(
                e.status(),
                &json!({ "status": "error", "message": "Invalid JSON" }),
            );
        }
    };

    if !ctx.publisher.ws().broadcast_payload(value.to_string()) {
        crate::debug!("serve"; "command dropped, live-update actor stopped");
    }
    Reply::json(200, &json!({ "status": "ok", "command": value }))
}

fn asset(ctx: &ServeContext, path: &str) -> Result<Reply, ApiError> {
    let file = resolve_asset(path, &ctx.asset_root)
        .ok_or_else(|| ApiError::AssetNotFound(path.to_string()))?;
    let body = fs::read(&file).map_err(|source| ApiError::Read {
        path: file.clone(),
        source,
    })?;
    Ok(Reply::ok(mime::from_path(&file), body))
}

#[cfg(test)]
mod tests;
