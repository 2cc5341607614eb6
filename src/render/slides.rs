//! Markdown to slide deck HTML.
//!
//! ```text
//! markdown ─► containers ─► pulldown-cmark events ─► split on top-level rules
//!                                   │                         │
//!                          directives, marks, links     <section> per slide
//! ```

use std::sync::OnceLock;

use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, TagEnd, TextMergeStream, html};
use regex::Regex;

use super::directive::{self, DirectiveState, SlideDirectives};
use super::error::RenderError;
use crate::utils::html::escape;

/// Container names recognized in `::: name` fences.
const CONTAINERS: &[&str] = &["note"];

/// One rendered deck before theme resolution.
#[derive(Debug)]
pub struct Deck {
    pub slides: Vec<Slide>,
    pub theme: Option<String>,
}

#[derive(Debug)]
pub struct Slide {
    pub body: String,
    pub directives: SlideDirectives,
}

impl Deck {
    /// Serialize the deck into its container markup.
    pub fn to_html(&self, theme: &str) -> String {
        let mut out = String::with_capacity(self.slides.iter().map(|s| s.body.len() + 64).sum());
        out.push_str(&format!("<div class=\"deck\" data-theme=\"{}\">\n", escape(theme)));
        for (index, slide) in self.slides.iter().enumerate() {
            write_slide(&mut out, index + 1, slide);
        }
        out.push_str("</div>\n");
        out
    }
}

fn write_slide(out: &mut String, number: usize, slide: &Slide) {
    let d = &slide.directives;
    out.push_str(&format!("<section id=\"{number}\" data-slide=\"{number}\""));
    if let Some(class) = &d.class {
        out.push_str(&format!(" class=\"{}\"", escape(class)));
    }
    if d.paginate {
        out.push_str(" data-paginate=\"true\"");
    }
    out.push_str(">\n");
    if let Some(header) = &d.header {
        out.push_str(&format!("<header>{}</header>\n", escape(header)));
    }
    out.push_str(&slide.body);
    if let Some(footer) = &d.footer {
        out.push_str(&format!("<footer>{}</footer>\n", escape(footer)));
    }
    out.push_str("</section>\n");
}

fn options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_HEADING_ATTRIBUTES
        | Options::ENABLE_YAML_STYLE_METADATA_BLOCKS
}

/// Parse markdown into slides, resolving directives.
pub fn parse_deck(markdown: &str) -> Result<Deck, RenderError> {
    let source = expand_containers(markdown);
    let events: Vec<Event> = TextMergeStream::new(Parser::new_ext(&source, options())).collect();

    let mut state = DirectiveState::new();
    let mut slides = Vec::new();
    let mut current: Vec<Event> = Vec::new();
    let mut depth = 0usize;
    let mut code_depth = 0usize;
    let mut link_depth = 0usize;
    let mut image_depth = 0usize;

    let mut iter = events.into_iter();
    while let Some(event) = iter.next() {
        match event {
            Event::Start(Tag::MetadataBlock(_)) => {
                let mut text = String::new();
                for inner in iter.by_ref() {
                    match inner {
                        Event::Text(t) => text.push_str(&t),
                        Event::End(TagEnd::MetadataBlock(_)) => break,
                        _ => {}
                    }
                }
                for (key, value) in directive::parse_front_matter(&text)? {
                    state.apply(key, value)?;
                }
            }

            Event::Start(Tag::HtmlBlock) if depth == 0 => {
                let mut block = vec![Event::Start(Tag::HtmlBlock)];
                let mut raw = String::new();
                for inner in iter.by_ref() {
                    let end = matches!(inner, Event::End(TagEnd::HtmlBlock));
                    if let Event::Html(h) = &inner {
                        raw.push_str(h);
                    }
                    block.push(inner);
                    if end {
                        break;
                    }
                }
                if !apply_comment(&mut state, &raw)? {
                    current.extend(block);
                }
            }

            Event::InlineHtml(h) if h.trim_start().starts_with("<!--") => {
                if !apply_comment(&mut state, &h)? {
                    current.push(Event::InlineHtml(h));
                }
            }

            Event::Rule if depth == 0 => {
                slides.push(finish(&mut current, &mut state));
            }

            Event::Text(text) if code_depth == 0 && image_depth == 0 => {
                current.push(decorate_text(text, link_depth == 0));
            }

            Event::Start(tag) => {
                depth += 1;
                match tag {
                    Tag::CodeBlock(_) => code_depth += 1,
                    Tag::Link { .. } => link_depth += 1,
                    Tag::Image { .. } => image_depth += 1,
                    _ => {}
                }
                current.push(Event::Start(tag));
            }

            Event::End(tag) => {
                depth = depth.saturating_sub(1);
                match tag {
                    TagEnd::CodeBlock => code_depth = code_depth.saturating_sub(1),
                    TagEnd::Link => link_depth = link_depth.saturating_sub(1),
                    TagEnd::Image => image_depth = image_depth.saturating_sub(1),
                    _ => {}
                }
                current.push(Event::End(tag));
            }

            other => current.push(other),
        }
    }
    slides.push(finish(&mut current, &mut state));

    Ok(Deck {
        slides,
        theme: state.theme().map(str::to_string),
    })
}

/// Apply a directive comment. Returns false for ordinary comments.
fn apply_comment(state: &mut DirectiveState, html: &str) -> Result<bool, RenderError> {
    let Some(pairs) = directive::parse_comment(html) else {
        return Ok(false);
    };
    for (key, value) in pairs {
        state.apply(key, value)?;
    }
    Ok(true)
}

fn finish(events: &mut Vec<Event>, state: &mut DirectiveState) -> Slide {
    let mut body = String::new();
    html::push_html(&mut body, events.drain(..));
    Slide {
        body,
        directives: state.finish_slide(),
    }
}

/// Rewrite `::: name` fences into `<div class="name">` blocks.
///
/// Fences inside code blocks are left alone, as are unknown container names
/// and stray closing fences.
fn expand_containers(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len() + 32);
    let mut fence: Option<(char, usize)> = None;
    let mut open = 0usize;

    for line in markdown.lines() {
        let trimmed = line.trim_start();

        if let Some((ch, len)) = fence {
            let closes = trimmed.chars().take_while(|&c| c == ch).count() >= len
                && trimmed.trim_start_matches(ch).trim().is_empty();
            if closes {
                fence = None;
            }
        } else if let Some(marker) = code_fence(trimmed) {
            fence = Some(marker);
        } else if let Some(rest) = trimmed.strip_prefix(":::") {
            let name = rest.trim();
            if name.is_empty() && open > 0 {
                open -= 1;
                out.push_str("\n</div>\n\n");
                continue;
            }
            let name = name.split_whitespace().next().unwrap_or_default();
            if CONTAINERS.contains(&name) {
                open += 1;
                out.push_str(&format!("<div class=\"{name}\">\n\n"));
                continue;
            }
        }

        out.push_str(line);
        out.push('\n');
    }

    for _ in 0..open {
        out.push_str("\n</div>\n");
    }
    out
}

/// Opening code fence marker: (fence char, run length).
fn code_fence(line: &str) -> Option<(char, usize)> {
    let ch = line.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = line.chars().take_while(|&c| c == ch).count();
    (len >= 3).then_some((ch, len))
}

/// Apply `==mark==` and bare URL links to a text run.
///
/// Returns the text unchanged when there is nothing to decorate.
fn decorate_text(text: CowStr<'_>, linkify: bool) -> Event<'_> {
    static MARK: OnceLock<Regex> = OnceLock::new();
    static URL: OnceLock<Regex> = OnceLock::new();
    let mark = MARK.get_or_init(|| Regex::new(r"==([^=\s](?:[^=]*[^=\s])?)==").unwrap());
    let url = URL.get_or_init(|| Regex::new(r#"https?://[^\s<>"']*[^\s<>"'.,:;!?)\]]"#).unwrap());

    let has_mark = mark.is_match(&text);
    let has_url = linkify && url.is_match(&text);
    if !has_mark && !has_url {
        return Event::Text(text);
    }
    let text: &str = &text;

    let link = |s: &str| -> String {
        if !linkify {
            return escape(s).into_owned();
        }
        let mut out = String::new();
        let mut last = 0;
        for m in url.find_iter(s) {
            out.push_str(&escape(&s[last..m.start()]));
            let href = escape(m.as_str());
            out.push_str(&format!("<a href=\"{href}\">{href}</a>"));
            last = m.end();
        }
        out.push_str(&escape(&s[last..]));
        out
    };

    let mut out = String::with_capacity(text.len() + 16);
    let mut last = 0;
    for caps in mark.captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&link(&text[last..whole.start()]));
        out.push_str("<mark>");
        out.push_str(&link(inner.as_str()));
        out.push_str("</mark>");
        last = whole.end();
    }
    out.push_str(&link(&text[last..]));

    Event::InlineHtml(out.into())
}
