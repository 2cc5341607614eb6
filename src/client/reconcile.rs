//! Browser-tab model: the served page, its deck stylesheet, and a session
//! that consumes pushed messages and key presses.
//!
//! `client.js` implements the same behavior in the browser; this is the
//! reference the server-side tests exercise.

use thiserror::Error;

use super::dom::{Attrs, Element, Node, find_by_id, find_by_id_mut, parse_fragment, slides};
use super::morph::{MorphStats, morph_into};
use super::nav::{Effect, KeyEvent, NavError, Navigator, PromptState, SlideInfo, Timer};
use crate::embed::serve::style_text;
use crate::reload::message::{DecodeError, Decoded, decode};
use crate::render::RenderResult;

/// Element whose children hold the deck.
pub const CONTAINER_ID: &str = "deck-container";
/// Style element holding the deck CSS.
pub const STYLE_ID: &str = "deck-style";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleSheet {
    text: String,
    writes: usize,
}

impl StyleSheet {
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of times the text was actually replaced.
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Replace the text only when it differs.
    pub fn restyle(&mut self, css: &str) -> bool {
        if self.text == css {
            return false;
        }
        self.text = css.to_string();
        self.writes += 1;
        true
    }
}

/// A loaded preview page.
#[derive(Debug, Clone)]
pub struct Page {
    pub body: Vec<Node>,
    pub style: StyleSheet,
}

impl Page {
    /// Page as served on first load, with the style text the browser sees.
    pub fn load(initial: &RenderResult) -> Self {
        let mut attrs = Attrs::new();
        attrs.push(("id".to_string(), CONTAINER_ID.to_string()));
        let container = Element::new("div", attrs, parse_fragment(&initial.html).nodes);

        Self {
            body: vec![Node::Element(container)],
            style: StyleSheet {
                text: style_text(&initial.css).into_owned(),
                writes: 0,
            },
        }
    }

    pub fn container(&self) -> Option<&Element> {
        find_by_id(&self.body, CONTAINER_ID)
    }

    /// Morph the container's children into `html`. `None` when the page has
    /// no container.
    pub fn patch(&mut self, html: &str) -> Option<MorphStats> {
        let container = find_by_id_mut(&mut self.body, CONTAINER_ID)?;
        Some(morph_into(container, parse_fragment(html).nodes))
    }

    /// Slides as currently in the document.
    pub fn slide_infos(&self) -> Vec<SlideInfo> {
        slides(&self.body)
            .into_iter()
            .map(|s| SlideInfo {
                uid: s.uid,
                text: s.text_content(),
            })
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Nav(#[from] NavError),
}

/// Visible state driven by navigation effects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct View {
    /// Slide number last scrolled to
    pub scrolled_to: Option<usize>,
    /// Accumulated relative scrolling, in viewport heights
    pub scroll_offset: f32,
    pub help_visible: bool,
    pub prompt: PromptState,
    pub closed: bool,
    /// Timers waiting to fire
    pub pending: Vec<Timer>,
}

/// One connected tab.
#[derive(Debug)]
pub struct ClientSession {
    pub page: Page,
    pub nav: Navigator,
    pub view: View,
}

impl ClientSession {
    pub fn new(page: Page) -> Self {
        let mut nav = Navigator::new();
        nav.set_slides(page.slide_infos());
        Self {
            page,
            nav,
            view: View::default(),
        }
    }

    /// Handle one pushed WebSocket message.
    ///
    /// Malformed messages and failed commands are reported and leave the
    /// page and scroll position unchanged.
    pub fn handle_text(&mut self, text: &str) -> Result<(), SessionError> {
        match decode(text)? {
            Decoded::Update { html, css } => {
                if self.page.patch(&html).is_none() {
                    crate::debug!("client"; "no #{} element, update skipped", CONTAINER_ID);
                }
                self.page.style.restyle(&css);
                self.nav.set_slides(self.page.slide_infos());
            }
            Decoded::Command(command) => {
                let effects = self.nav.remote(&command)?;
                self.apply(effects);
            }
            Decoded::Ignored => {}
        }
        Ok(())
    }

    pub fn handle_key(&mut self, event: KeyEvent) {
        let effects = self.nav.handle_key(event);
        self.apply(effects);
    }

    /// Fire every pending timer, oldest first.
    pub fn fire_timers(&mut self) {
        for timer in std::mem::take(&mut self.view.pending) {
            let effects = self.nav.on_timer(timer);
            self.apply(effects);
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::ScrollToSlide { number, .. } => {
                    self.view.scrolled_to = Some(number);
                    self.view.scroll_offset = 0.0;
                }
                Effect::ScrollBy(fraction) => self.view.scroll_offset += fraction,
                Effect::Prompt(state) => self.view.prompt = state,
                Effect::ToggleHelp => self.view.help_visible = !self.view.help_visible,
                Effect::ClosePreview => self.view.closed = true,
                Effect::Schedule(timer) => self.view.pending.push(timer),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::nav::Key;
    use crate::reload::message::UpdateMessage;
    use crate::render::{DeckRenderer, Renderer, ThemeSet};

    fn renderer() -> DeckRenderer {
        DeckRenderer::with_themes(ThemeSet::with_builtin(), "default").unwrap()
    }

    fn deck(count: usize) -> String {
        (1..=count)
            .map(|i| format!("# Slide {i}\n\nbody {i}\n"))
            .collect::<Vec<_>>()
            .join("\n---\n\n")
    }

    /// Serialized form of `html` after a parse round.
    fn normalized(html: &str) -> String {
        parse_fragment(html).to_html()
    }

    fn session(markdown: &str) -> ClientSession {
        let result = renderer().render(markdown).unwrap();
        ClientSession::new(Page::load(&result))
    }

    fn push(session: &mut ClientSession, markdown: &str) -> RenderResult {
        let result = renderer().render(markdown).unwrap();
        session
            .handle_text(&UpdateMessage::update(&result).to_json())
            .unwrap();
        result
    }

    #[test]
    fn test_update_patches_container() {
        let mut session = session(&deck(2));
        let result = push(&mut session, &deck(3));

        assert_eq!(
            session.page.container().unwrap().inner_html(),
            normalized(&result.html)
        );
        assert_eq!(session.nav.slide_count(), 3);
    }

    #[test]
    fn test_repeated_update_is_noop() {
        let markdown = deck(3);
        let result = renderer().render(&markdown).unwrap();
        let mut page = Page::load(&result);

        let stats = page.patch(&result.html).unwrap();
        assert!(stats.is_noop());
        assert!(!page.style.restyle(&result.css));
        assert_eq!(page.style.writes(), 0);
    }

    #[test]
    fn test_escaped_style_is_replaced_once() {
        let result = RenderResult {
            html: "<div class=\"deck\"><section id=\"1\">a</section></div>".into(),
            css: "section::after { content: \"</style>\"; }".into(),
        };
        let mut page = Page::load(&result);
        assert_eq!(page.style.text(), "section::after { content: \"<\\/style>\"; }");

        assert!(page.style.restyle(&result.css));
        assert!(!page.style.restyle(&result.css));
        assert_eq!(page.style.writes(), 1);
        assert_eq!(page.style.text(), result.css);
    }

    #[test]
    fn test_slide_nodes_survive_edit() {
        let mut session = session(&deck(3));
        let before: Vec<u64> = session.page.slide_infos().iter().map(|s| s.uid).collect();

        push(&mut session, &deck(3).replace("body 2", "edited"));

        let after = session.page.slide_infos();
        assert_eq!(before, after.iter().map(|s| s.uid).collect::<Vec<_>>());
        assert!(after[1].text.contains("edited"));
    }

    #[test]
    fn test_last_update_wins() {
        let mut session = session(&deck(1));
        push(&mut session, &deck(2));
        push(&mut session, &deck(4));
        let last = push(&mut session, &deck(3));

        assert_eq!(
            session.page.container().unwrap().inner_html(),
            normalized(&last.html)
        );
        assert_eq!(session.page.style.text(), last.css);
    }

    #[test]
    fn test_patch_without_container() {
        let mut page = Page {
            body: Vec::new(),
            style: StyleSheet::default(),
        };
        assert!(page.patch("<p>x</p>").is_none());
    }

    #[test]
    fn test_goto_command_scrolls() {
        let mut session = session(&deck(5));
        session
            .handle_text(r#"{"command":"goto","slide":"3"}"#)
            .unwrap();
        assert_eq!(session.view.scrolled_to, Some(3));
    }

    #[test]
    fn test_out_of_range_goto_keeps_position() {
        let mut session = session(&deck(5));
        session.handle_text(r#"{"command":"goto","slide":2}"#).unwrap();

        let err = session.handle_text(r#"{"command":"goto","slide":9}"#);
        assert!(matches!(err, Err(SessionError::Nav(NavError::OutOfRange { .. }))));
        assert_eq!(session.view.scrolled_to, Some(2));
    }

    #[test]
    fn test_find_command() {
        let mut session = session(&deck(4));
        session
            .handle_text(r#"{"command":"find","string":"BODY 3"}"#)
            .unwrap();
        assert_eq!(session.view.scrolled_to, Some(3));
    }

    #[test]
    fn test_find_matches_decoded_entities() {
        let result = RenderResult {
            html: concat!(
                "<div class=\"deck\">",
                "<section id=\"1\"><p>Intro</p></section>",
                "<section id=\"2\"><p>&copy; Acme &mdash; 2024</p></section>",
                "</div>"
            )
            .into(),
            css: String::new(),
        };
        let mut session = ClientSession::new(Page::load(&result));
        session
            .handle_text(r#"{"command":"find","string":"© acme — 2024"}"#)
            .unwrap();
        assert_eq!(session.view.scrolled_to, Some(2));
    }

    #[test]
    fn test_malformed_message_changes_nothing() {
        let mut session = session(&deck(2));
        let before = session.page.container().unwrap().inner_html();

        assert!(session.handle_text("not json").is_err());
        assert!(session.handle_text(r#"{"type":"update","html":1}"#).is_err());
        session.handle_text(r#"{"command":"dance"}"#).unwrap();

        assert_eq!(session.page.container().unwrap().inner_html(), before);
        assert_eq!(session.view, View::default());
    }

    #[test]
    fn test_close_preview() {
        let mut session = session(&deck(1));
        session
            .handle_text(r#"{"command":"close_preview"}"#)
            .unwrap();
        assert!(session.view.closed);
    }

    #[test]
    fn test_keys_drive_view() {
        let mut session = session(&deck(3));
        session.handle_key(KeyEvent::ch('G'));
        assert_eq!(session.view.scrolled_to, Some(3));

        session.handle_key(KeyEvent::ch('?'));
        assert!(session.view.help_visible);

        session.handle_key(KeyEvent::ch(':'));
        session.handle_key(KeyEvent::ch('7'));
        session.handle_key(KeyEvent::plain(Key::Enter));
        assert!(matches!(session.view.prompt, PromptState::Error(_)));
        assert_eq!(session.view.scrolled_to, Some(3));

        session.fire_timers();
        assert_eq!(session.view.prompt, PromptState::Hidden);
    }
}
