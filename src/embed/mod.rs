//! Embedded static resources.
//!
//! - `serve` - preview page template and browser script
//! - `theme` - deck layout and the built-in theme
//!
//! # Usage
//!
//! ```ignore
//! use embed::serve::{PAGE_HTML, PageVars};
//!
//! let html = PAGE_HTML.render(&PageVars { title, ws_port, css, html });
//! ```

mod template;

pub use template::{Template, TemplateVars};

pub mod serve {
    use std::borrow::Cow;

    use super::{Template, TemplateVars};

    /// Text of `#deck-style` as served, and so as the browser reads it back.
    ///
    /// A literal `</style` would end the element early, so it is written as
    /// `<\/style`. Updates carry the raw CSS, which then differs from this
    /// text and replaces it once.
    pub fn style_text(css: &str) -> Cow<'_, str> {
        if css.contains("</style") {
            Cow::Owned(css.replace("</style", "<\\/style"))
        } else {
            Cow::Borrowed(css)
        }
    }

    /// Variables for page.html.
    pub struct PageVars {
        pub title: String,
        pub ws_port: u16,
        /// Deck stylesheet, placed in `#deck-style`.
        pub css: String,
        /// Deck markup, placed in `#deck-container`.
        pub html: String,
    }

    impl TemplateVars for PageVars {
        fn apply(&self, content: &str) -> String {
            // Deck markup goes last so placeholder-looking text in it stays put.
            content
                .replace("__TITLE__", &crate::utils::html::escape(&self.title))
                .replace("__WS_PORT__", &self.ws_port.to_string())
                .replace("__PREVIEW_CSS__", PREVIEW_CSS)
                .replacen("__DECK_CSS__", &style_text(&self.css), 1)
                .replacen("__DECK_HTML__", &self.html, 1)
        }
    }

    /// Preview page shell.
    pub const PAGE_HTML: Template<PageVars> =
        Template::new(include_str!("serve/page.html"));

    /// Browser side of the live-update protocol.
    pub const CLIENT_JS: &str = include_str!("serve/client.js");

    /// Preview chrome: help overlay and command prompt.
    pub const PREVIEW_CSS: &str = include_str!("serve/preview.css");
}

pub mod theme {
    /// Layout shared by every theme.
    pub const DECK_CSS: &str = include_str!("theme/deck.css");

    /// The built-in `default` theme.
    pub const DEFAULT_THEME_CSS: &str = include_str!("theme/default.css");
}
