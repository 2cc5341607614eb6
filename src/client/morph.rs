//! In-place tree morphing.
//!
//! Transforms a live node list into the shape of a freshly parsed one while
//! reusing as many existing nodes as possible. Elements carrying an `id` are
//! matched by id; everything else is matched in order by node kind and tag.
//! Reused nodes keep their `uid`, so scroll anchors and element state
//! survive an update.

use std::mem;

use rustc_hash::FxHashMap;

use super::dom::{Element, Node};

/// What a morph did to the target tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MorphStats {
    pub created: usize,
    pub removed: usize,
    pub attrs_changed: usize,
    pub text_changed: usize,
    pub reused: usize,
}

impl MorphStats {
    /// True when the target already matched the source.
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.removed == 0 && self.attrs_changed == 0 && self.text_changed == 0
    }
}

/// Morph `target`'s children into `source`'s children.
///
/// The target element itself and its attributes are left untouched.
pub fn morph_into(target: &mut Element, source: Vec<Node>) -> MorphStats {
    let mut stats = MorphStats::default();
    morph_children(&mut target.children, source, &mut stats);
    stats
}

fn morph_children(target: &mut Vec<Node>, source: Vec<Node>, stats: &mut MorphStats) {
    let mut old: Vec<Option<Node>> = mem::take(target).into_iter().map(Some).collect();

    let mut by_id: FxHashMap<String, usize> = FxHashMap::default();
    for (i, node) in old.iter().enumerate() {
        if let Some(Node::Element(e)) = node
            && let Some(id) = e.id()
        {
            by_id.entry(id.to_string()).or_insert(i);
        }
    }

    let mut cursor = 0;
    let mut result = Vec::with_capacity(source.len());

    for new in source {
        let matched = keyed_match(&new, &old, &by_id).or_else(|| {
            let found = (cursor..old.len()).find(|&i| {
                old[i]
                    .as_ref()
                    .is_some_and(|candidate| compatible(candidate, &new))
            });
            if let Some(i) = found {
                cursor = i + 1;
            }
            found
        });

        match matched.and_then(|i| old[i].take()) {
            Some(mut existing) => {
                update(&mut existing, new, stats);
                result.push(existing);
            }
            None => {
                stats.created += new.subtree_len();
                result.push(new);
            }
        }
    }

    stats.removed += old.iter().flatten().count();
    *target = result;
}

fn keyed_match(new: &Node, old: &[Option<Node>], by_id: &FxHashMap<String, usize>) -> Option<usize> {
    let Node::Element(e) = new else { return None };
    let &i = by_id.get(e.id()?)?;
    match &old[i] {
        Some(Node::Element(existing)) if existing.tag == e.tag => Some(i),
        _ => None,
    }
}

/// Unkeyed matching. Old elements with an id are reserved for keyed
/// matches.
fn compatible(old: &Node, new: &Node) -> bool {
    match (old, new) {
        (Node::Element(a), Node::Element(b)) => a.tag == b.tag && a.id().is_none(),
        (Node::Text(_), Node::Text(_)) | (Node::Comment(_), Node::Comment(_)) => true,
        _ => false,
    }
}

fn update(existing: &mut Node, new: Node, stats: &mut MorphStats) {
    stats.reused += 1;
    match (existing, new) {
        (Node::Element(old), Node::Element(new)) => {
            morph_attrs(old, &new, stats);
            morph_children(&mut old.children, new.children, stats);
        }
        (Node::Text(old), Node::Text(new)) | (Node::Comment(old), Node::Comment(new)) => {
            if old.text != new.text {
                old.text = new.text;
                stats.text_changed += 1;
            }
        }
        _ => {}
    }
}

fn morph_attrs(old: &mut Element, new: &Element, stats: &mut MorphStats) {
    for (key, value) in &new.attrs {
        if old.set_attr(key, value) {
            stats.attrs_changed += 1;
        }
    }

    let stale: Vec<String> = old
        .attrs
        .iter()
        .filter(|(k, _)| new.attr(k).is_none())
        .map(|(k, _)| k.clone())
        .collect();
    for key in stale {
        old.remove_attr(&key);
        stats.attrs_changed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::dom::{Attrs, parse_fragment, slides};

    fn container(html: &str) -> Element {
        Element::new("div", Attrs::new(), parse_fragment(html).nodes)
    }

    fn uids(nodes: &[Node], out: &mut Vec<u64>) {
        for node in nodes {
            out.push(node.uid());
            if let Node::Element(e) = node {
                uids(&e.children, out);
            }
        }
    }

    #[test]
    fn test_identical_source_is_noop() {
        let html = r#"<section id="1"><h1>Title</h1><p>body</p></section>"#;
        let mut target = container(html);
        let mut before = Vec::new();
        uids(&target.children, &mut before);

        let stats = morph_into(&mut target, parse_fragment(html).nodes);

        let mut after = Vec::new();
        uids(&target.children, &mut after);
        assert!(stats.is_noop());
        assert_eq!(before, after);
        assert_eq!(target.inner_html(), html);
    }

    #[test]
    fn test_text_edit_keeps_nodes() {
        let mut target = container(r#"<section id="1"><p>old</p></section>"#);
        let p_uid = slides(&target.children)[0].children[0].uid();

        let stats = morph_into(
            &mut target,
            parse_fragment(r#"<section id="1"><p>new</p></section>"#).nodes,
        );

        assert_eq!(stats.text_changed, 1);
        assert_eq!(stats.created, 0);
        assert_eq!(slides(&target.children)[0].children[0].uid(), p_uid);
        assert_eq!(target.inner_html(), r#"<section id="1"><p>new</p></section>"#);
    }

    #[test]
    fn test_keyed_elements_survive_reorder() {
        let mut target = container(r#"<section id="1">a</section><section id="2">b</section>"#);
        let second = slides(&target.children)[1].uid;

        let html = r#"<section id="2">b</section><section id="1">a</section>"#;
        morph_into(&mut target, parse_fragment(html).nodes);

        assert_eq!(slides(&target.children)[0].uid, second);
        assert_eq!(target.inner_html(), html);
    }

    #[test]
    fn test_added_and_removed_slides() {
        let mut target = container(r#"<section id="1">a</section><section id="2">b</section>"#);
        let stats = morph_into(&mut target, parse_fragment(r#"<section id="1">a</section>"#).nodes);
        assert_eq!(stats.removed, 1);
        assert_eq!(slides(&target.children).len(), 1);

        let stats = morph_into(
            &mut target,
            parse_fragment(r#"<section id="1">a</section><section id="2">c</section>"#).nodes,
        );
        // section plus its text node
        assert_eq!(stats.created, 2);
        assert_eq!(slides(&target.children).len(), 2);
    }

    #[test]
    fn test_attribute_changes() {
        let mut target = container(r#"<section id="1" class="lead">a</section>"#);
        let stats = morph_into(
            &mut target,
            parse_fragment(r#"<section id="1" data-paginate="true">a</section>"#).nodes,
        );

        let slide = slides(&target.children)[0];
        assert_eq!(slide.attr("class"), None);
        assert_eq!(slide.attr("data-paginate"), Some("true"));
        assert_eq!(stats.attrs_changed, 2);
    }

    #[test]
    fn test_tag_change_replaces_element() {
        let mut target = container("<p>x</p>");
        let stats = morph_into(&mut target, parse_fragment("<h2>x</h2>").nodes);
        assert_eq!(stats.removed, 1);
        assert_eq!(stats.created, 2);
        assert_eq!(target.inner_html(), "<h2>x</h2>");
    }
}
