//! MIME type lookup for the preview server.
//!
//! Covers what a slide deck typically references next to its markdown:
//! images, media, fonts and the occasional stylesheet or script.

use std::path::Path;

/// MIME type constants used in responses.
pub mod types {
    pub const HTML: &str = "text/html; charset=utf-8";
    pub const PLAIN: &str = "text/plain; charset=utf-8";
    pub const CSS: &str = "text/css; charset=utf-8";
    pub const JAVASCRIPT: &str = "text/javascript; charset=utf-8";
    pub const JSON: &str = "application/json";
    pub const MARKDOWN: &str = "text/markdown; charset=utf-8";

    pub const OCTET_STREAM: &str = "application/octet-stream";
    pub const WASM: &str = "application/wasm";
    pub const PDF: &str = "application/pdf";

    pub const PNG: &str = "image/png";
    pub const JPEG: &str = "image/jpeg";
    pub const GIF: &str = "image/gif";
    pub const WEBP: &str = "image/webp";
    pub const SVG: &str = "image/svg+xml";
    pub const ICO: &str = "image/x-icon";

    pub const MP3: &str = "audio/mpeg";
    pub const WAV: &str = "audio/wav";
    pub const MP4: &str = "video/mp4";
    pub const WEBM: &str = "video/webm";

    pub const WOFF: &str = "font/woff";
    pub const WOFF2: &str = "font/woff2";
    pub const TTF: &str = "font/ttf";
    pub const OTF: &str = "font/otf";
    pub const EOT: &str = "application/vnd.ms-fontobject";
}

/// Guess MIME type from a path's extension (case-insensitive).
pub fn from_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    from_extension(ext.as_deref())
}

/// Guess MIME type from an extension string.
pub fn from_extension(ext: Option<&str>) -> &'static str {
    match ext {
        Some("html" | "htm") => types::HTML,
        Some("css") => types::CSS,
        Some("js" | "mjs") => types::JAVASCRIPT,
        Some("json") => types::JSON,
        Some("md" | "markdown") => types::MARKDOWN,
        Some("txt") => types::PLAIN,

        Some("svg") => types::SVG,
        Some("png") => types::PNG,
        Some("jpg" | "jpeg") => types::JPEG,
        Some("gif") => types::GIF,
        Some("webp") => types::WEBP,
        Some("ico") => types::ICO,

        Some("mp3") => types::MP3,
        Some("wav") => types::WAV,
        Some("mp4" | "m4v") => types::MP4,
        Some("webm") => types::WEBM,

        Some("woff") => types::WOFF,
        Some("woff2") => types::WOFF2,
        Some("ttf") => types::TTF,
        Some("otf") => types::OTF,
        Some("eot") => types::EOT,

        Some("pdf") => types::PDF,
        Some("wasm") => types::WASM,

        _ => types::OCTET_STREAM,
    }
}
