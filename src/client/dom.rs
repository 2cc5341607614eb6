//! Document model for reconciliation.
//!
//! A small owned tree parsed from HTML fragments with `tl`. Every node gets
//! a process-unique `uid` at creation; reconciliation keeps the uid of every
//! node it reuses, so node identity is observable.
//!
//! Text and attribute values are stored decoded and escaped on output.

use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

use crate::utils::html::{escape, is_raw_text_element, is_void_element, unescape};

static NEXT_UID: AtomicU64 = AtomicU64::new(1);

fn next_uid() -> u64 {
    NEXT_UID.fetch_add(1, Ordering::Relaxed)
}

pub type Attrs = SmallVec<[(String, String); 4]>;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(Text),
    Comment(Text),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub uid: u64,
    pub tag: String,
    pub attrs: Attrs,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub uid: u64,
    pub text: String,
}

impl Text {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            uid: next_uid(),
            text: text.into(),
        }
    }
}

impl Element {
    pub fn new(tag: impl Into<String>, attrs: Attrs, children: Vec<Node>) -> Self {
        Self {
            uid: next_uid(),
            tag: tag.into(),
            attrs,
            children,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute. Returns true if the value changed.
    pub fn set_attr(&mut self, name: &str, value: &str) -> bool {
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) if v == value => false,
            Some((_, v)) => {
                *v = value.to_string();
                true
            }
            None => {
                self.attrs.push((name.to_string(), value.to_string()));
                true
            }
        }
    }

    /// Remove an attribute. Returns true if it was present.
    pub fn remove_attr(&mut self, name: &str) -> bool {
        let before = self.attrs.len();
        self.attrs.retain(|(k, _)| k != name);
        self.attrs.len() != before
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    /// Concatenated descendant text, as `textContent` reads it.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }

    /// Serialized children.
    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        let raw = is_raw_text_element(&self.tag);
        for child in &self.children {
            write_node(child, raw, &mut out);
        }
        out
    }
}

impl Node {
    pub fn uid(&self) -> u64 {
        match self {
            Self::Element(e) => e.uid,
            Self::Text(t) | Self::Comment(t) => t.uid,
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Self::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Number of nodes in this subtree.
    pub fn subtree_len(&self) -> usize {
        match self {
            Self::Element(e) => 1 + e.children.iter().map(Node::subtree_len).sum::<usize>(),
            _ => 1,
        }
    }
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Element(e) => collect_text(&e.children, out),
            Node::Text(t) => out.push_str(&t.text),
            Node::Comment(_) => {}
        }
    }
}

// =============================================================================
// Parsing
// =============================================================================

/// A parsed run of sibling nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub nodes: Vec<Node>,
}

impl Fragment {
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            write_node(node, false, &mut out);
        }
        out
    }

    /// Slide count, as `section[id]` elements.
    pub fn slide_count(&self) -> usize {
        slides(&self.nodes).len()
    }
}

/// Parse an HTML fragment.
///
/// `tl` only fails on inputs too large to index; those yield an empty
/// fragment.
pub fn parse_fragment(html: &str) -> Fragment {
    let Ok(dom) = tl::parse(html, tl::ParserOptions::default()) else {
        crate::debug!("client"; "html fragment too large to parse");
        return Fragment::default();
    };

    let parser = dom.parser();
    let nodes = dom
        .children()
        .iter()
        .filter_map(|handle| convert(*handle, parser, false))
        .collect();
    Fragment { nodes }
}

fn convert(handle: tl::NodeHandle, parser: &tl::Parser, raw_text: bool) -> Option<Node> {
    match handle.get(parser)? {
        tl::Node::Tag(tag) => {
            let name = tag.name().as_utf8_str().to_lowercase();
            let attrs = tag
                .attributes()
                .iter()
                .map(|(key, value)| {
                    let value = value.map(|v| unescape(&v).into_owned()).unwrap_or_default();
                    (key.to_lowercase(), value)
                })
                .collect();

            let raw = is_raw_text_element(&name);
            let children = tag
                .children()
                .top()
                .iter()
                .filter_map(|child| convert(*child, parser, raw))
                .collect();

            Some(Node::Element(Element::new(name, attrs, children)))
        }
        tl::Node::Raw(bytes) => {
            let text = bytes.as_utf8_str();
            let text = if raw_text {
                text.into_owned()
            } else {
                unescape(&text).into_owned()
            };
            Some(Node::Text(Text::new(text)))
        }
        tl::Node::Comment(bytes) => {
            let text = bytes.as_utf8_str();
            let body = text
                .strip_prefix("<!--")
                .and_then(|t| t.strip_suffix("-->"))
                .unwrap_or(&text);
            Some(Node::Comment(Text::new(body)))
        }
    }
}

// =============================================================================
// Serialization
// =============================================================================

fn write_node(node: &Node, raw_parent: bool, out: &mut String) {
    match node {
        Node::Element(e) => {
            out.push('<');
            out.push_str(&e.tag);
            for (key, value) in &e.attrs {
                out.push(' ');
                out.push_str(key);
                out.push_str("=\"");
                out.push_str(&escape(value));
                out.push('"');
            }
            out.push('>');
            if is_void_element(&e.tag) {
                return;
            }
            out.push_str(&e.inner_html());
            out.push_str("</");
            out.push_str(&e.tag);
            out.push('>');
        }
        Node::Text(t) if raw_parent => out.push_str(&t.text),
        Node::Text(t) => out.push_str(&escape(&t.text)),
        Node::Comment(c) => {
            out.push_str("<!--");
            out.push_str(&c.text);
            out.push_str("-->");
        }
    }
}

// =============================================================================
// Queries
// =============================================================================

/// Elements matching `pred`, in document order.
pub fn query_all<'a>(nodes: &'a [Node], pred: &dyn Fn(&Element) -> bool) -> Vec<&'a Element> {
    let mut found = Vec::new();
    walk(nodes, pred, &mut found);
    found
}

fn walk<'a>(nodes: &'a [Node], pred: &dyn Fn(&Element) -> bool, found: &mut Vec<&'a Element>) {
    for node in nodes {
        if let Node::Element(e) = node {
            if pred(e) {
                found.push(e);
            }
            walk(&e.children, pred, found);
        }
    }
}

/// `section[id]` elements, in document order.
pub fn slides(nodes: &[Node]) -> Vec<&Element> {
    query_all(nodes, &|e| e.tag == "section" && e.id().is_some())
}

pub fn find_by_id<'a>(nodes: &'a [Node], id: &str) -> Option<&'a Element> {
    for node in nodes {
        if let Node::Element(e) = node {
            if e.id() == Some(id) {
                return Some(e);
            }
            if let Some(found) = find_by_id(&e.children, id) {
                return Some(found);
            }
        }
    }
    None
}

pub fn find_by_id_mut<'a>(nodes: &'a mut [Node], id: &str) -> Option<&'a mut Element> {
    for node in nodes {
        if let Node::Element(e) = node {
            if e.id() == Some(id) {
                return Some(e);
            }
            if let Some(found) = find_by_id_mut(&mut e.children, id) {
                return Some(found);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_serialize() {
        let html = r#"<section id="1"><h1>A &amp; B</h1><p>x</p></section>"#;
        let fragment = parse_fragment(html);
        assert_eq!(fragment.nodes.len(), 1);
        assert_eq!(fragment.to_html(), html);

        let lead = parse_fragment(r#"<section id="2" class="lead"></section>"#);
        let section = lead.nodes[0].as_element().unwrap();
        assert_eq!(section.attr("class"), Some("lead"));
        assert_eq!(section.id(), Some("2"));
    }

    #[test]
    fn test_text_content_decodes() {
        let fragment = parse_fragment("<p>Fish &amp; <b>Chips</b><!-- hidden --></p>");
        let p = fragment.nodes[0].as_element().unwrap();
        assert_eq!(p.text_content(), "Fish & Chips");

        let fragment = parse_fragment("<p>&copy; Caf&eacute; &hellip;</p>");
        let p = fragment.nodes[0].as_element().unwrap();
        assert_eq!(p.text_content(), "© Café …");
    }

    #[test]
    fn test_slides_in_document_order() {
        let fragment = parse_fragment(
            r#"<div class="deck"><section id="1">a</section><section>x</section><section id="2">b</section></div>"#,
        );
        let slides = slides(&fragment.nodes);
        assert_eq!(slides.len(), 2);
        assert_eq!(slides[0].id(), Some("1"));
        assert_eq!(slides[1].text_content(), "b");
        assert_eq!(fragment.slide_count(), 2);
    }

    #[test]
    fn test_uids_are_unique() {
        let fragment = parse_fragment("<p>a</p><p>b</p>");
        let uids: Vec<u64> = fragment.nodes.iter().map(Node::uid).collect();
        assert_ne!(uids[0], uids[1]);
    }

    #[test]
    fn test_find_by_id_mut() {
        let mut fragment = parse_fragment(r#"<div><span id="target">x</span></div>"#);
        let span = find_by_id_mut(&mut fragment.nodes, "target").unwrap();
        assert!(span.set_attr("class", "hit"));
        assert!(!span.set_attr("class", "hit"));
        assert_eq!(
            find_by_id(&fragment.nodes, "target").unwrap().attr("class"),
            Some("hit")
        );
    }
}
