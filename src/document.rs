use anyhow::{Result, anyhow};
use kuchiki::NodeRef;
use kuchiki::traits::*;

pub const INDICATOR_ATTR: &str = "data-translated";

/// An in-memory HTML document whose text nodes are mutated in place.
#[derive(Debug, Clone)]
pub struct Document {
    root: NodeRef,
}

impl Document {
    pub fn parse(html: &str) -> Self {
        Self {
            root: kuchiki::parse_html().one(html),
        }
    }

    pub fn root(&self) -> &NodeRef {
        &self.root
    }

    /// The `<body>` element, or the document node itself for fragments
    /// without one.
    pub fn body(&self) -> NodeRef {
        self.root
            .select_first("body")
            .map(|body| body.as_node().clone())
            .unwrap_or_else(|_| self.root.clone())
    }

    pub fn title(&self) -> Option<String> {
        let title = self.root.select_first("title").ok()?;
        let text = title.as_node().text_contents();
        let text = text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }

    pub fn select_first(&self, selector: &str) -> Result<NodeRef> {
        self.root
            .select_first(selector)
            .map(|node| node.as_node().clone())
            .map_err(|_| anyhow!("no element matches selector '{}'", selector))
    }

    pub fn to_html(&self) -> String {
        self.root.to_string()
    }
}

/// Nearest element ancestor of a node.
pub fn container(node: &NodeRef) -> Option<NodeRef> {
    node.ancestors().find(|ancestor| ancestor.as_element().is_some())
}

pub fn tag_name(node: &NodeRef) -> Option<String> {
    node.as_element()
        .map(|element| element.name.local.as_ref().to_ascii_lowercase())
}

pub fn text_of(node: &NodeRef) -> String {
    node.as_text()
        .map(|text| text.borrow().clone())
        .unwrap_or_default()
}

pub fn set_text(node: &NodeRef, value: &str) {
    if let Some(text) = node.as_text() {
        let mut current = text.borrow_mut();
        if current.as_str() != value {
            *current = value.to_string();
        }
    }
}

pub fn set_attr(node: &NodeRef, name: &str, value: &str) {
    if let Some(element) = node.as_element() {
        element
            .attributes
            .borrow_mut()
            .insert(name.to_string(), value.to_string());
    }
}

pub fn remove_attr(node: &NodeRef, name: &str) {
    if let Some(element) = node.as_element() {
        element.attributes.borrow_mut().remove(name);
    }
}

pub fn attr(node: &NodeRef, name: &str) -> Option<String> {
    let element = node.as_element()?;
    let attrs = element.attributes.borrow();
    attrs.get(name).map(str::to_string)
}

/// Whether the node sits inside a `code`/`pre` block.
pub fn in_verbatim_block(node: &NodeRef) -> bool {
    node.ancestors()
        .filter_map(|ancestor| tag_name(&ancestor))
        .any(|name| is_verbatim_kind(&name))
}

pub fn is_verbatim_kind(name: &str) -> bool {
    matches!(name, "code" | "pre")
}

/// Computed visibility for a static document: the element or any ancestor is
/// marked `hidden`, hidden through its inline style, or hidden by the user
/// agent stylesheet.
pub fn is_hidden(element: &NodeRef) -> bool {
    element.inclusive_ancestors().any(|node| {
        let Some(name) = tag_name(&node) else {
            return false;
        };
        if is_user_agent_hidden(&name) || attr(&node, "hidden").is_some() {
            return true;
        }
        attr(&node, "style")
            .map(|style| InlineStyle::parse(&style).hides())
            .unwrap_or(false)
    })
}

fn is_user_agent_hidden(name: &str) -> bool {
    matches!(
        name,
        "head" | "title" | "meta" | "link" | "base" | "datalist" | "dialog"
    )
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct InlineStyle {
    pub display_none: bool,
    pub visibility_hidden: bool,
    pub transparent: bool,
}

impl InlineStyle {
    pub fn parse(style: &str) -> Self {
        let mut parsed = InlineStyle::default();
        for declaration in style.split(';') {
            let Some((property, value)) = declaration.split_once(':') else {
                continue;
            };
            let property = property.trim().to_ascii_lowercase();
            let value = value
                .trim()
                .trim_end_matches("!important")
                .trim()
                .to_ascii_lowercase();
            match property.as_str() {
                "display" => parsed.display_none = value == "none",
                "visibility" => parsed.visibility_hidden = value == "hidden",
                "opacity" => {
                    parsed.transparent = value
                        .parse::<f32>()
                        .map(|opacity| opacity <= 0.0)
                        .unwrap_or(false)
                }
                _ => {}
            }
        }
        parsed
    }

    pub fn hides(&self) -> bool {
        self.display_none || self.visibility_hidden || self.transparent
    }
}

/// Replaces a text node with consecutive sibling text nodes holding `pieces`
/// and returns one node per piece. The first piece reuses the original node so
/// existing references stay valid. Pieces are expected to concatenate to the
/// node's current text.
pub fn split_text_node(node: &NodeRef, pieces: &[&str]) -> Vec<NodeRef> {
    let Some((first, rest)) = pieces.split_first() else {
        return Vec::new();
    };
    set_text(node, first);
    let mut nodes = Vec::with_capacity(pieces.len());
    nodes.push(node.clone());
    let mut anchor = node.clone();
    for piece in rest {
        let sibling = NodeRef::new_text(*piece);
        anchor.insert_after(sibling.clone());
        anchor = sibling.clone();
        nodes.push(sibling);
    }
    nodes
}

/// All text nodes under `root` in depth-first pre-order.
pub fn text_nodes(root: &NodeRef) -> Vec<NodeRef> {
    root.descendants()
        .filter(|node| node.as_text().is_some())
        .collect()
}

/// Text nodes between `start` and `end` (both inclusive, including their
/// descendants) in document order.
pub fn text_nodes_in_range(root: &NodeRef, start: &NodeRef, end: &NodeRef) -> Vec<NodeRef> {
    let ordered: Vec<NodeRef> = root.inclusive_descendants().collect();
    let Some(from) = ordered.iter().position(|node| node == start) else {
        return Vec::new();
    };
    let last = end.inclusive_descendants().last().unwrap_or_else(|| end.clone());
    let Some(to) = ordered.iter().position(|node| *node == last) else {
        return Vec::new();
    };
    if from > to {
        return Vec::new();
    }
    ordered[from..=to]
        .iter()
        .filter(|node| node.as_text().is_some())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_style_detects_hidden_declarations() {
        assert!(InlineStyle::parse("display: none").hides());
        assert!(InlineStyle::parse("color:red; VISIBILITY:hidden !important").hides());
        assert!(InlineStyle::parse("opacity: 0").hides());
        assert!(InlineStyle::parse("opacity:0.0;").hides());
        assert!(!InlineStyle::parse("opacity: 0.5; display: block").hides());
        assert!(!InlineStyle::parse("garbage").hides());
    }

    #[test]
    fn hidden_is_inherited_from_ancestors() {
        let doc = Document::parse(
            r#"<body><div style="display:none"><p><span id="a">x</span></p></div><p id="b">y</p><p id="c" hidden>z</p></body>"#,
        );
        let a = doc.select_first("#a").expect("a");
        let b = doc.select_first("#b").expect("b");
        let c = doc.select_first("#c").expect("c");
        assert!(is_hidden(&a));
        assert!(!is_hidden(&b));
        assert!(is_hidden(&c));
    }

    #[test]
    fn split_text_node_keeps_text_and_order() {
        let doc = Document::parse("<body><pre>a // one\nb /* two */</pre></body>");
        let pre = doc.select_first("pre").expect("pre");
        let node = pre.first_child().expect("text");
        let nodes = split_text_node(&node, &["a ", "// one", "\nb ", "/* two */"]);
        assert_eq!(nodes.len(), 4);
        assert!(nodes[0] == node);
        assert_eq!(text_of(&nodes[1]), "// one");
        assert_eq!(pre.text_contents(), "a // one\nb /* two */");
        assert_eq!(doc.to_html().matches("a // one\nb /* two */").count(), 1);
    }

    #[test]
    fn range_covers_descendants_of_both_ends() {
        let doc = Document::parse(
            "<body><p id='a'>one<b>two</b></p><p id='b'>three</p><p id='c'>four</p></body>",
        );
        let start = doc.select_first("#a").expect("a");
        let end = doc.select_first("#b").expect("b");
        let texts: Vec<String> = text_nodes_in_range(doc.root(), &start, &end)
            .iter()
            .map(text_of)
            .collect();
        assert_eq!(texts, vec!["one", "two", "three"]);

        let reversed = text_nodes_in_range(doc.root(), &end, &start);
        assert!(reversed.is_empty());
    }

    #[test]
    fn title_and_body_lookup() {
        let doc = Document::parse("<html><head><title> Hello page </title></head><body><p>x</p></body></html>");
        assert_eq!(doc.title().as_deref(), Some("Hello page"));
        assert_eq!(tag_name(&doc.body()).as_deref(), Some("body"));
    }
}
