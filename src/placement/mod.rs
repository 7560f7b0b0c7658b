//! Home of the one editable surface, and its moves between documents.
//!
//! The surface node is moved, never cloned: its listeners, focus and every
//! closure hanging off it stay alive in whichever document holds it. A
//! placeholder keeps its spot in the main document while it is away.

mod dom;
mod memory;

pub use dom::DomTree;
pub use memory::{DocumentId, MemoryTree, NodeId};

use crate::error::SessionError;

/// Node-graph operations placement needs. Every mutation moves live nodes,
/// adopting them into the destination document when necessary.
pub trait NodeTree {
    type Node: Clone;
    type Document: Clone;

    fn owner_document(&self, node: &Self::Node) -> Option<Self::Document>;
    fn same_document(&self, a: &Self::Document, b: &Self::Document) -> bool;
    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;
    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;
    /// Attached, through its ancestors, to a document.
    fn is_connected(&self, node: &Self::Node) -> bool;
    /// Put `new` where `old` is; `old` ends up detached.
    fn replace(&self, old: &Self::Node, new: &Self::Node);
    /// Insert before `anchor` if it is still a child of `parent`, else append.
    fn insert_before(&self, parent: &Self::Node, node: &Self::Node, anchor: Option<&Self::Node>);
    /// Make `document` own `node`, detaching it from its current parent.
    fn adopt(&self, document: &Self::Document, node: &Self::Node);
    /// The document's body, created if it has none.
    fn ensure_body(&self, document: &Self::Document) -> Option<Self::Node>;
    fn append(&self, parent: &Self::Node, node: &Self::Node);
}

/// Where the surface lives when it is at home.
pub struct PlacementContext<T: NodeTree> {
    tree: T,
    main_document: T::Document,
    element: T::Node,
    original_parent: Option<T::Node>,
    anchor: Option<T::Node>,
    placeholder: T::Node,
}

impl<T: NodeTree> PlacementContext<T> {
    /// Record `element`'s current position as its home.
    pub fn new(
        tree: T,
        main_document: T::Document,
        element: T::Node,
        placeholder: T::Node,
    ) -> Self {
        let original_parent = tree.parent(&element);
        let anchor = tree.next_sibling(&element);
        Self {
            tree,
            main_document,
            element,
            original_parent,
            anchor,
            placeholder,
        }
    }

    pub fn tree(&self) -> &T {
        &self.tree
    }

    pub fn element(&self) -> &T::Node {
        &self.element
    }

    pub fn placeholder(&self) -> &T::Node {
        &self.placeholder
    }

    pub fn main_document(&self) -> &T::Document {
        &self.main_document
    }

    pub fn is_placeholder_shown(&self) -> bool {
        self.tree.is_connected(&self.placeholder)
    }

    /// Whether the surface belongs to the main document.
    pub fn is_home_document(&self) -> bool {
        self.owned_by(&self.main_document)
    }

    /// Stand the placeholder in the surface's spot.
    pub fn show_placeholder(&mut self) {
        if self.is_placeholder_shown() {
            return;
        }

        if self.is_home_document() {
            if let Some(parent) = self.tree.parent(&self.element) {
                self.anchor = self.tree.next_sibling(&self.element);
                self.original_parent = Some(parent);
                self.tree.replace(&self.element, &self.placeholder);
                return;
            }
        }

        if let Some(parent) = &self.original_parent {
            self.tree
                .insert_before(parent, &self.placeholder, self.anchor.as_ref());
            return;
        }

        match self.tree.ensure_body(&self.main_document) {
            Some(body) => self.tree.append(&body, &self.placeholder),
            None => log::warn!("no body to hold the note placeholder"),
        }
    }

    /// Bring the surface back into the main document, in the placeholder's
    /// spot when there is one.
    pub fn restore_note(&mut self) {
        if !self.is_home_document() {
            self.tree.adopt(&self.main_document, &self.element);
        }

        if self.is_placeholder_shown() {
            self.tree.replace(&self.placeholder, &self.element);
        } else if let Some(parent) = &self.original_parent {
            self.tree
                .insert_before(parent, &self.element, self.anchor.as_ref());
        } else {
            match self.tree.ensure_body(&self.main_document) {
                Some(body) => self.tree.append(&body, &self.element),
                None => {
                    log::warn!("no body to restore the note into");
                    return;
                }
            }
        }

        self.original_parent = self.tree.parent(&self.element);
        self.anchor = self.tree.next_sibling(&self.element);
    }

    /// Move the live surface into `target`'s body.
    pub fn move_note_to_document(&mut self, target: &T::Document) -> Result<(), SessionError> {
        if !self.owned_by(target) {
            self.tree.adopt(target, &self.element);
        }
        let body = self
            .tree
            .ensure_body(target)
            .ok_or(SessionError::NoBody)?;
        self.tree.append(&body, &self.element);
        Ok(())
    }

    fn owned_by(&self, document: &T::Document) -> bool {
        self.tree
            .owner_document(&self.element)
            .is_some_and(|doc| self.tree.same_document(&doc, document))
    }
}
