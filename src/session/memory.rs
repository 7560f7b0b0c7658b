use super::DetachedHost;
use crate::error::SessionError;
use crate::placement::{DocumentId, MemoryTree, NodeId};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(usize);

struct OpenWindow {
    document: DocumentId,
    on_closed: Vec<Box<dyn FnOnce()>>,
}

#[derive(Default)]
struct WindowsState {
    next_id: usize,
    open: BTreeMap<WindowId, OpenWindow>,
    last_opened: Option<WindowId>,
    opened: usize,
    focused: usize,
}

/// Detached views as extra documents in a [`MemoryTree`].
///
/// New documents start without a body, as some browser views do.
#[derive(Clone)]
pub struct MemoryWindows {
    tree: MemoryTree,
    state: Rc<RefCell<WindowsState>>,
    unavailable: Rc<Cell<bool>>,
}

impl MemoryWindows {
    pub fn new(tree: MemoryTree) -> Self {
        Self {
            tree,
            state: Rc::new(RefCell::new(WindowsState::default())),
            unavailable: Rc::new(Cell::new(false)),
        }
    }

    /// Refuse every `open`, like a blocked popup.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.set(unavailable);
    }

    pub fn last_opened(&self) -> Option<WindowId> {
        self.state.borrow().last_opened
    }

    pub fn open_count(&self) -> usize {
        self.state.borrow().opened
    }

    pub fn focus_count(&self) -> usize {
        self.state.borrow().focused
    }

    pub fn body_of(&self, window: WindowId) -> Option<NodeId> {
        let document = self.state.borrow().open.get(&window)?.document;
        self.tree.body(document)
    }

    /// The user closes `window`; close callbacks run.
    pub fn user_close(&self, window: WindowId) {
        let closed = self.state.borrow_mut().open.remove(&window);
        if let Some(closed) = closed {
            for callback in closed.on_closed {
                callback();
            }
        }
    }
}

impl DetachedHost for MemoryWindows {
    type Document = DocumentId;
    type Window = WindowId;

    async fn open(&self, _width: u32, _height: u32) -> Result<WindowId, SessionError> {
        if self.unavailable.get() {
            return Err(SessionError::DetachedUnavailable(
                "detached views are disabled".to_string(),
            ));
        }
        let document = self.tree.create_document(false);
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = WindowId(state.next_id);
        state.open.insert(
            id,
            OpenWindow {
                document,
                on_closed: Vec::new(),
            },
        );
        state.last_opened = Some(id);
        state.opened += 1;
        Ok(id)
    }

    fn document(&self, window: &WindowId) -> Option<DocumentId> {
        self.state.borrow().open.get(window).map(|w| w.document)
    }

    fn close(&self, window: &WindowId) {
        self.user_close(*window);
    }

    fn focus(&self, window: &WindowId) {
        if self.state.borrow().open.contains_key(window) {
            self.state.borrow_mut().focused += 1;
        }
    }

    fn on_closed(&self, window: &WindowId, callback: Box<dyn FnOnce()>) {
        if let Some(open) = self.state.borrow_mut().open.get_mut(window) {
            open.on_closed.push(callback);
        }
    }
}
