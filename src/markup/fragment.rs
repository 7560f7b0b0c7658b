use super::{is_embedded_tag, ChildSummary, Container};
use scraper::{ElementRef, Html, Node};
use std::cell::RefCell;
use std::collections::BTreeMap;

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "figcaption", "figure",
    "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav", "ol", "p",
    "pre", "section", "table", "tr", "ul",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FragmentNode {
    Text(String),
    Element {
        tag: String,
        /// Sorted by name so serialization is stable.
        attrs: Vec<(String, String)>,
        children: Vec<FragmentNode>,
    },
}

impl FragmentNode {
    fn text_into(&self, out: &mut String) {
        match self {
            Self::Text(t) => out.push_str(t),
            Self::Element { children, .. } => children.iter().for_each(|c| c.text_into(out)),
        }
    }

    fn text(&self) -> String {
        let mut out = String::new();
        self.text_into(&mut out);
        out
    }

    fn has_embedded(&self) -> bool {
        match self {
            Self::Text(_) => false,
            Self::Element { tag, children, .. } => {
                is_embedded_tag(tag) || children.iter().any(FragmentNode::has_embedded)
            }
        }
    }

    fn write_html(&self, out: &mut String) {
        match self {
            Self::Text(t) => escape_into(out, t, false),
            Self::Element {
                tag,
                attrs,
                children,
            } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    escape_into(out, value, true);
                    out.push('"');
                }
                out.push('>');
                if VOID_TAGS.contains(&tag.as_str()) {
                    return;
                }
                children.iter().for_each(|c| c.write_html(out));
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }

    fn write_lines(&self, out: &mut String) {
        match self {
            Self::Text(t) => out.push_str(t),
            Self::Element { tag, .. } if tag == "br" => out.push('\n'),
            Self::Element { tag, children, .. } => {
                let block = BLOCK_TAGS.contains(&tag.as_str());
                if block && !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                children.iter().for_each(|c| c.write_lines(out));
                if block && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
        }
    }
}

// Same escaping rules as the HTML serializer browsers use for innerHTML.
fn escape_into(out: &mut String, s: &str, attr: bool) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\u{A0}' => out.push_str("&nbsp;"),
            '"' if attr => out.push_str("&quot;"),
            '<' if !attr => out.push_str("&lt;"),
            '>' if !attr => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}

fn convert_children(parent: ElementRef<'_>) -> Vec<FragmentNode> {
    parent
        .children()
        .filter_map(|child| match child.value() {
            Node::Text(text) => Some(FragmentNode::Text(text.to_string())),
            Node::Element(el) => ElementRef::wrap(child).map(|child_ref| {
                let mut attrs: Vec<(String, String)> = el
                    .attrs()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect();
                attrs.sort();
                FragmentNode::Element {
                    tag: el.name().to_string(),
                    attrs,
                    children: convert_children(child_ref),
                }
            }),
            _ => None,
        })
        .collect()
}

// The fragment parser roots its output in an <html> element; some inputs also
// produce head/body wrappers. Only their content belongs to the note.
fn unwrap_document(nodes: Vec<FragmentNode>) -> Vec<FragmentNode> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            FragmentNode::Element { tag, children, .. } if tag == "html" || tag == "body" => {
                out.extend(unwrap_document(children));
            }
            FragmentNode::Element { tag, .. } if tag == "head" => {}
            other => out.push(other),
        }
    }
    out
}

fn parse_nodes(markup: &str) -> Vec<FragmentNode> {
    if markup.is_empty() {
        return Vec::new();
    }
    let html = Html::parse_fragment(markup);
    unwrap_document(convert_children(html.root_element()))
}

/// Detached stand-in for the editable element.
///
/// Holds the container's children and its own marker attributes; used for
/// canonicalizing markup outside the DOM and as the surface of headless views.
#[derive(Debug, Default)]
pub struct Fragment {
    children: RefCell<Vec<FragmentNode>>,
    markers: RefCell<BTreeMap<String, String>>,
}

impl Fragment {
    pub fn parse(markup: &str) -> Self {
        Self {
            children: RefCell::new(parse_nodes(markup)),
            markers: RefCell::new(BTreeMap::new()),
        }
    }

    pub fn children(&self) -> Vec<FragmentNode> {
        self.children.borrow().clone()
    }

    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        self.children
            .borrow()
            .iter()
            .for_each(|c| c.write_lines(&mut out));
        out
    }
}

impl Container for Fragment {
    fn text_content(&self) -> String {
        let mut out = String::new();
        self.children
            .borrow()
            .iter()
            .for_each(|c| c.text_into(&mut out));
        out
    }

    fn contains_embedded(&self) -> bool {
        self.children.borrow().iter().any(FragmentNode::has_embedded)
    }

    fn element_children(&self) -> Vec<ChildSummary> {
        self.children
            .borrow()
            .iter()
            .filter(|c| matches!(c, FragmentNode::Element { .. }))
            .map(|c| ChildSummary {
                text: c.text(),
                embedded: c.has_embedded(),
            })
            .collect()
    }

    fn inner_html(&self) -> String {
        let mut out = String::new();
        self.children
            .borrow()
            .iter()
            .for_each(|c| c.write_html(&mut out));
        out
    }

    fn set_inner_html(&self, markup: &str) {
        *self.children.borrow_mut() = parse_nodes(markup);
    }

    fn wrap_children(&self, tag: &str) {
        let mut children = self.children.borrow_mut();
        let moved = std::mem::take(&mut *children);
        children.push(FragmentNode::Element {
            tag: tag.to_string(),
            attrs: Vec::new(),
            children: moved,
        });
    }

    fn set_marker(&self, name: &str, value: &str) {
        self.markers
            .borrow_mut()
            .insert(name.to_string(), value.to_string());
    }

    fn remove_marker(&self, name: &str) {
        self.markers.borrow_mut().remove(name);
    }

    fn has_marker(&self, name: &str) -> bool {
        self.markers.borrow().contains_key(name)
    }
}
