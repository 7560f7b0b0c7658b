use super::NodeTree;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(usize);

pub type Listener = Rc<dyn Fn()>;

struct NodeData {
    tag: String,
    document: DocumentId,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    listeners: Vec<(String, Listener)>,
}

struct DocumentData {
    root: NodeId,
    body: Option<NodeId>,
}

#[derive(Default)]
struct Arena {
    nodes: Vec<NodeData>,
    documents: Vec<DocumentData>,
}

impl Arena {
    fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0]
    }

    fn push_node(&mut self, document: DocumentId, tag: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            tag: tag.to_string(),
            document,
            parent: None,
            children: Vec::new(),
            listeners: Vec::new(),
        });
        id
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.node_mut(id).parent.take() {
            self.node_mut(parent).children.retain(|c| *c != id);
        }
    }

    fn set_document(&mut self, id: NodeId, document: DocumentId) {
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let node = self.node_mut(next);
            node.document = document;
            stack.extend(node.children.iter().copied());
        }
    }

    /// Detach `node` and hang it under `parent` at `index`, adopting it
    /// into the parent's document as the DOM does.
    fn insert_at(&mut self, parent: NodeId, node: NodeId, index: Option<usize>) {
        self.detach(node);
        let document = self.node(parent).document;
        self.set_document(node, document);
        self.node_mut(node).parent = Some(parent);
        let children = &mut self.node_mut(parent).children;
        match index {
            Some(i) if i <= children.len() => children.insert(i, node),
            _ => children.push(node),
        }
    }
}

/// Arena-backed node graph with per-node event listeners.
///
/// Stands in for the DOM where there is none; listeners belong to the node,
/// so they travel with it across documents just as in a browser.
#[derive(Clone, Default)]
pub struct MemoryTree {
    arena: Rc<RefCell<Arena>>,
}

impl MemoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new document with an `html` root, and a body if `with_body`.
    pub fn create_document(&self, with_body: bool) -> DocumentId {
        let mut arena = self.arena.borrow_mut();
        let id = DocumentId(arena.documents.len());
        let root = arena.push_node(id, "html");
        arena.documents.push(DocumentData { root, body: None });
        if with_body {
            let body = arena.push_node(id, "body");
            arena.insert_at(root, body, None);
            arena.documents[id.0].body = Some(body);
        }
        id
    }

    pub fn create_element(&self, document: DocumentId, tag: &str) -> NodeId {
        self.arena.borrow_mut().push_node(document, tag)
    }

    pub fn body(&self, document: DocumentId) -> Option<NodeId> {
        self.arena.borrow().documents[document.0].body
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.arena.borrow().node(node).children.clone()
    }

    pub fn tag(&self, node: NodeId) -> String {
        self.arena.borrow().node(node).tag.clone()
    }

    pub fn add_listener(&self, node: NodeId, event: &str, listener: Listener) {
        self.arena
            .borrow_mut()
            .node_mut(node)
            .listeners
            .push((event.to_string(), listener));
    }

    /// Fire `event` at `node`; returns how many listeners ran.
    pub fn dispatch(&self, node: NodeId, event: &str) -> usize {
        // Listeners may touch the tree, so none run under the borrow.
        let listeners: Vec<Listener> = self
            .arena
            .borrow()
            .node(node)
            .listeners
            .iter()
            .filter(|(name, _)| name == event)
            .map(|(_, l)| Rc::clone(l))
            .collect();
        for listener in &listeners {
            listener();
        }
        listeners.len()
    }
}

impl NodeTree for MemoryTree {
    type Node = NodeId;
    type Document = DocumentId;

    fn owner_document(&self, node: &NodeId) -> Option<DocumentId> {
        Some(self.arena.borrow().node(*node).document)
    }

    fn same_document(&self, a: &DocumentId, b: &DocumentId) -> bool {
        a == b
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.arena.borrow().node(*node).parent
    }

    fn next_sibling(&self, node: &NodeId) -> Option<NodeId> {
        let arena = self.arena.borrow();
        let parent = arena.node(*node).parent?;
        let siblings = &arena.node(parent).children;
        let index = siblings.iter().position(|c| c == node)?;
        siblings.get(index + 1).copied()
    }

    fn is_connected(&self, node: &NodeId) -> bool {
        let arena = self.arena.borrow();
        let mut current = *node;
        while let Some(parent) = arena.node(current).parent {
            current = parent;
        }
        let document = arena.node(current).document;
        arena.documents[document.0].root == current
    }

    fn replace(&self, old: &NodeId, new: &NodeId) {
        let mut arena = self.arena.borrow_mut();
        let Some(parent) = arena.node(*old).parent else {
            return;
        };
        arena.detach(*new);
        let index = arena.node(parent).children.iter().position(|c| c == old);
        arena.detach(*old);
        arena.insert_at(parent, *new, index);
    }

    fn insert_before(&self, parent: &NodeId, node: &NodeId, anchor: Option<&NodeId>) {
        let mut arena = self.arena.borrow_mut();
        arena.detach(*node);
        let index = anchor.and_then(|a| arena.node(*parent).children.iter().position(|c| c == a));
        arena.insert_at(*parent, *node, index);
    }

    fn adopt(&self, document: &DocumentId, node: &NodeId) {
        let mut arena = self.arena.borrow_mut();
        arena.detach(*node);
        arena.set_document(*node, *document);
    }

    fn ensure_body(&self, document: &DocumentId) -> Option<NodeId> {
        if let Some(body) = self.body(*document) {
            return Some(body);
        }
        let mut arena = self.arena.borrow_mut();
        let root = arena.documents[document.0].root;
        let body = arena.push_node(*document, "body");
        arena.insert_at(root, body, None);
        arena.documents[document.0].body = Some(body);
        Some(body)
    }

    fn append(&self, parent: &NodeId, node: &NodeId) {
        self.arena.borrow_mut().insert_at(*parent, *node, None);
    }
}
