use super::NodeTree;
use wasm_bindgen::JsCast;
use web_sys::{Document, Node};

/// The browser's own node graph.
#[derive(Clone, Copy, Debug, Default)]
pub struct DomTree;

fn report(op: &str, result: Result<Node, wasm_bindgen::JsValue>) {
    if let Err(e) = result {
        log::warn!("{op} failed: {e:?}");
    }
}

impl NodeTree for DomTree {
    type Node = Node;
    type Document = Document;

    fn owner_document(&self, node: &Node) -> Option<Document> {
        node.owner_document()
    }

    fn same_document(&self, a: &Document, b: &Document) -> bool {
        a.is_same_node(Some(b.as_ref()))
    }

    fn parent(&self, node: &Node) -> Option<Node> {
        node.parent_node()
    }

    fn next_sibling(&self, node: &Node) -> Option<Node> {
        node.next_sibling()
    }

    fn is_connected(&self, node: &Node) -> bool {
        node.is_connected()
    }

    fn replace(&self, old: &Node, new: &Node) {
        if let Some(parent) = old.parent_node() {
            report("replaceChild", parent.replace_child(new, old));
        }
    }

    fn insert_before(&self, parent: &Node, node: &Node, anchor: Option<&Node>) {
        let anchor = anchor.filter(|a| {
            a.parent_node()
                .is_some_and(|p| p.is_same_node(Some(parent)))
        });
        report("insertBefore", parent.insert_before(node, anchor));
    }

    fn adopt(&self, document: &Document, node: &Node) {
        report("adoptNode", document.adopt_node(node));
    }

    fn ensure_body(&self, document: &Document) -> Option<Node> {
        if let Some(body) = document.body() {
            return Some(body.unchecked_into());
        }

        let root: Node = match document.document_element() {
            Some(root) => root.unchecked_into(),
            None => {
                let html = document.create_element("html").ok()?;
                document.append_child(&html).ok()?
            }
        };
        let body = document.create_element("body").ok()?;
        root.append_child(&body).ok()
    }

    fn append(&self, parent: &Node, node: &Node) {
        report("appendChild", parent.append_child(node));
    }
}
