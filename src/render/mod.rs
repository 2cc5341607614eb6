//! Markdown to slide deck rendering.
//!
//! # Module Structure
//!
//! - `slides` - markdown to `<section>` per slide
//! - `directive` - theme/class/paginate/header/footer directives
//! - `theme` - named CSS themes
//! - `error` - `RenderError`
//!
//! # Usage
//!
//! ```ignore
//! let renderer = DeckRenderer::new(&config.theme_dir, &config.theme)?;
//! let RenderResult { html, css } = renderer.render("# Hello\n\n---\n\n# World")?;
//! ```

mod directive;
mod error;
mod slides;
mod theme;

pub use error::RenderError;
pub use theme::{BUILTIN_THEME, ThemeSet};

use std::path::PathBuf;

use crate::embed::theme::DECK_CSS;

/// Output of one render: deck markup and the stylesheet it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderResult {
    pub html: String,
    pub css: String,
}

/// Markdown renderer shared by the watcher and the HTTP handlers.
pub trait Renderer: Send + Sync {
    fn render(&self, markdown: &str) -> Result<RenderResult, RenderError>;
}

/// Slide deck renderer over a fixed theme set.
#[derive(Debug)]
pub struct DeckRenderer {
    themes: ThemeSet,
    default_theme: String,
}

impl DeckRenderer {
    /// Build a renderer, loading themes from `theme_dirs`.
    ///
    /// Bad theme entries are warnings. A `default_theme` that does not exist
    /// after loading is an error.
    pub fn new(theme_dirs: &[PathBuf], default_theme: &str) -> Result<Self, RenderError> {
        let mut themes = ThemeSet::with_builtin();
        let loaded = themes.load_dirs(theme_dirs);
        if loaded > 0 {
            crate::log!("theme"; "loaded {} theme{}", loaded, if loaded == 1 { "" } else { "s" });
        }
        Self::with_themes(themes, default_theme)
    }

    pub fn with_themes(themes: ThemeSet, default_theme: &str) -> Result<Self, RenderError> {
        if !themes.contains(default_theme) {
            return Err(RenderError::UnknownTheme(default_theme.to_string()));
        }
        Ok(Self {
            themes,
            default_theme: default_theme.to_string(),
        })
    }

    pub fn themes(&self) -> &ThemeSet {
        &self.themes
    }
}

impl Renderer for DeckRenderer {
    fn render(&self, markdown: &str) -> Result<RenderResult, RenderError> {
        let deck = slides::parse_deck(markdown)?;

        let name = deck.theme.as_deref().unwrap_or(&self.default_theme);
        let theme_css = self
            .themes
            .get(name)
            .ok_or_else(|| RenderError::UnknownTheme(name.to_string()))?;

        Ok(RenderResult {
            html: deck.to_html(name),
            css: format!("{DECK_CSS}\n{theme_css}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> DeckRenderer {
        let mut themes = ThemeSet::with_builtin();
        themes.add("/* @theme gaia */ section { background: #fff8e1; }".into(), "gaia");
        DeckRenderer::with_themes(themes, BUILTIN_THEME).unwrap()
    }

    #[test]
    fn test_render_is_deterministic() {
        let r = renderer();
        let md = "# A\n\n---\n\n# B\n";
        assert_eq!(r.render(md).unwrap(), r.render(md).unwrap());
    }

    #[test]
    fn test_render_uses_deck_theme() {
        let result = renderer().render("<!-- theme: gaia -->\n\n# A\n").unwrap();
        assert!(result.css.contains("#fff8e1"));
        assert!(result.css.starts_with(DECK_CSS));
        assert!(result.html.contains("data-theme=\"gaia\""));
    }

    #[test]
    fn test_unknown_theme_fails() {
        let err = renderer().render("<!-- theme: nope -->\n\n# A\n").unwrap_err();
        assert_eq!(err, RenderError::UnknownTheme("nope".into()));
    }

    #[test]
    fn test_missing_default_theme_is_fatal() {
        let err = DeckRenderer::new(&[], "gaia").unwrap_err();
        assert_eq!(err, RenderError::UnknownTheme("gaia".into()));
    }
}
