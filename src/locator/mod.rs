//! Discovery of translatable text units.
//!
//! The inclusion policy is a pure function over [`NodeFacts`]; the traversal
//! only gathers those facts from the document and acts on the verdict.

use kuchiki::NodeRef;
use tracing::debug;

use crate::document::{self, Document};

pub mod comments;

use comments::{find_comment_spans, project_segments};

pub const MIN_TEXT_CHARS: usize = 2;

/// Identity of a unit. [`locate`] numbers units in discovery order; the state
/// store relabels them so a text node keeps one id across scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitId(pub usize);

/// One independently mutable text node.
#[derive(Debug, Clone)]
pub struct TextUnit {
    id: UnitId,
    node: NodeRef,
}

impl TextUnit {
    pub fn new(id: UnitId, node: NodeRef) -> Self {
        Self { id, node }
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn node(&self) -> &NodeRef {
        &self.node
    }

    pub fn text(&self) -> String {
        document::text_of(&self.node)
    }

    pub fn set_text(&self, value: &str) {
        document::set_text(&self.node, value);
    }

    pub fn container(&self) -> Option<NodeRef> {
        document::container(&self.node)
    }
}

/// Where to look for text.
#[derive(Debug, Clone, Default)]
pub enum Scope {
    /// The document body.
    #[default]
    Document,
    /// Everything under one element.
    Subtree(NodeRef),
    /// A user selection: text nodes from `start` through `end`.
    Range { start: NodeRef, end: NodeRef },
}

#[derive(Debug, Clone, Copy)]
pub struct NodeFacts<'a> {
    /// Tag of the element directly holding the text, lower-cased.
    pub container_tag: Option<&'a str>,
    /// Text sits inside a `code`/`pre` block.
    pub verbatim: bool,
    /// Container is not rendered.
    pub hidden: bool,
    pub text: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    SplitComments,
    Reject(RejectReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Detached,
    Control,
    Hidden,
    TooShort,
}

pub fn is_control_kind(tag: &str) -> bool {
    matches!(
        tag,
        "script"
            | "style"
            | "noscript"
            | "iframe"
            | "object"
            | "embed"
            | "template"
            | "svg"
            | "canvas"
    )
}

pub fn is_long_enough(text: &str) -> bool {
    text.trim().chars().count() >= MIN_TEXT_CHARS
}

pub fn classify(facts: &NodeFacts<'_>) -> Verdict {
    let Some(tag) = facts.container_tag else {
        return Verdict::Reject(RejectReason::Detached);
    };
    if is_control_kind(tag) {
        return Verdict::Reject(RejectReason::Control);
    }
    if facts.verbatim || document::is_verbatim_kind(tag) {
        return Verdict::SplitComments;
    }
    if facts.hidden {
        return Verdict::Reject(RejectReason::Hidden);
    }
    if !is_long_enough(facts.text) {
        return Verdict::Reject(RejectReason::TooShort);
    }
    Verdict::Accept
}

/// Collects text units under `scope` in document order. Comment spans found in
/// code blocks are split into their own text nodes on the way.
pub fn locate(document: &Document, scope: &Scope) -> Vec<TextUnit> {
    let candidates = match scope {
        Scope::Document => document::text_nodes(&document.body()),
        Scope::Subtree(root) => document::text_nodes(root),
        Scope::Range { start, end } => document::text_nodes_in_range(document.root(), start, end),
    };

    let mut units = Vec::new();
    let mut rejected = 0usize;
    for node in candidates {
        let container = document::container(&node);
        let tag = container.as_ref().and_then(document::tag_name);
        let text = document::text_of(&node);
        let verbatim = document::in_verbatim_block(&node);
        let hidden = !verbatim && container.as_ref().is_some_and(document::is_hidden);
        let facts = NodeFacts {
            container_tag: tag.as_deref(),
            verbatim,
            hidden,
            text: &text,
        };
        match classify(&facts) {
            Verdict::Accept => push_unit(&mut units, node),
            Verdict::SplitComments => {
                for comment in split_comments(&node, &text) {
                    push_unit(&mut units, comment);
                }
            }
            Verdict::Reject(_) => rejected += 1,
        }
    }
    debug!("located {} text units ({} rejected)", units.len(), rejected);
    units
}

fn push_unit(units: &mut Vec<TextUnit>, node: NodeRef) {
    let id = UnitId(units.len());
    units.push(TextUnit::new(id, node));
}

/// Splits a verbatim text node at its comment spans and returns the comment
/// nodes long enough to translate. Code text stays in place untouched.
fn split_comments(node: &NodeRef, text: &str) -> Vec<NodeRef> {
    let spans = find_comment_spans(text);
    if spans.is_empty() {
        return Vec::new();
    }
    let segments = project_segments(text, &spans);
    let pieces: Vec<&str> = segments.iter().map(|segment| segment.text).collect();
    let nodes = if pieces.len() == 1 {
        vec![node.clone()]
    } else {
        document::split_text_node(node, &pieces)
    };
    segments
        .iter()
        .zip(nodes)
        .filter(|(segment, _)| segment.is_comment && is_long_enough(segment.text))
        .map(|(_, node)| node)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts<'a>(tag: &'a str, text: &'a str) -> NodeFacts<'a> {
        NodeFacts {
            container_tag: Some(tag),
            verbatim: false,
            hidden: false,
            text,
        }
    }

    fn texts(units: &[TextUnit]) -> Vec<String> {
        units.iter().map(TextUnit::text).collect()
    }

    #[test]
    fn policy_rejects_control_hidden_and_short_text() {
        assert_eq!(
            classify(&facts("script", "var x = 1;")),
            Verdict::Reject(RejectReason::Control)
        );
        assert_eq!(
            classify(&NodeFacts {
                hidden: true,
                ..facts("p", "Hello")
            }),
            Verdict::Reject(RejectReason::Hidden)
        );
        assert_eq!(
            classify(&facts("p", "  a  ")),
            Verdict::Reject(RejectReason::TooShort)
        );
        assert_eq!(classify(&facts("p", "Hi")), Verdict::Accept);
        assert_eq!(
            classify(&NodeFacts {
                container_tag: None,
                ..facts("p", "Hello")
            }),
            Verdict::Reject(RejectReason::Detached)
        );
    }

    #[test]
    fn policy_sends_code_to_comment_splitting_before_visibility() {
        assert_eq!(classify(&facts("pre", "x")), Verdict::SplitComments);
        assert_eq!(
            classify(&NodeFacts {
                verbatim: true,
                hidden: true,
                ..facts("span", "let x = 1;")
            }),
            Verdict::SplitComments
        );
    }

    #[test]
    fn locate_walks_body_in_document_order() {
        let doc = Document::parse(
            r#"<html><head><title>Title text</title></head><body>
            <h1>Heading</h1>
            <script>var hidden = "no";</script>
            <style>p { color: red; }</style>
            <p>First <b>bold</b> tail</p>
            <div style="display:none">Invisible</div>
            <p>x</p>
            <p>Last</p>
            </body></html>"#,
        );
        let units = locate(&doc, &Scope::Document);
        assert_eq!(texts(&units), vec!["Heading", "First ", "bold", " tail", "Last"]);
        let ids: Vec<usize> = units.iter().map(|unit| unit.id().0).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn locate_extracts_only_comments_from_code() {
        let doc = Document::parse(
            "<body><pre><code>let a = 1; // set the answer\n/* x */\nlet b = 2;</code></pre></body>",
        );
        let before = doc.to_html();
        let units = locate(&doc, &Scope::Document);
        assert_eq!(texts(&units), vec!["// set the answer", "/* x */"]);
        assert_eq!(doc.to_html(), before);
    }

    #[test]
    fn locate_skips_code_without_comments() {
        let doc = Document::parse("<body><code>cargo build --release</code><p>Done now</p></body>");
        let units = locate(&doc, &Scope::Document);
        assert_eq!(texts(&units), vec!["Done now"]);
    }

    #[test]
    fn locate_respects_subtree_and_range_scopes() {
        let doc = Document::parse(
            "<body><p id='a'>Alpha</p><div id='main'><p>Beta</p><p id='c'>Gamma</p></div><p id='d'>Delta</p></body>",
        );
        let main = doc.select_first("#main").expect("main");
        assert_eq!(
            texts(&locate(&doc, &Scope::Subtree(main))),
            vec!["Beta", "Gamma"]
        );

        let start = doc.select_first("#c").expect("c");
        let end = doc.select_first("#d").expect("d");
        assert_eq!(
            texts(&locate(&doc, &Scope::Range { start, end })),
            vec!["Gamma", "Delta"]
        );
    }

    #[test]
    fn split_comment_units_stay_split_on_rescan() {
        let doc = Document::parse("<body><pre>run() # start it\nstop()</pre></body>");
        let first = locate(&doc, &Scope::Document);
        assert_eq!(texts(&first), vec!["# start it"]);
        first[0].set_text("# démarrer");
        let second = locate(&doc, &Scope::Document);
        assert_eq!(texts(&second), vec!["# démarrer"]);
        assert!(second[0].node() == first[0].node());
    }
}
