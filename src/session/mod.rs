//! One page load's worth of note editing: the synchronizer, the surface's
//! placement, and the single detached view.

mod browser;
mod memory;

pub use browser::{boot, BrowserSession, PipWindows};
pub use memory::{MemoryWindows, WindowId};

use crate::config::SyncConfig;
use crate::error::SessionError;
use crate::placement::{NodeTree, PlacementContext};
use crate::state::{ClearOptions, CommitOptions, NoteSynchronizer};
use crate::storage::KvBackend;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Something that can show a detached top-level view next to the page.
#[allow(async_fn_in_trait)]
pub trait DetachedHost {
    type Document;
    type Window;

    async fn open(&self, width: u32, height: u32) -> Result<Self::Window, SessionError>;
    fn document(&self, window: &Self::Window) -> Option<Self::Document>;
    fn close(&self, window: &Self::Window);
    fn focus(&self, window: &Self::Window);
    /// Run `callback` once the view goes away, however it was closed.
    fn on_closed(&self, window: &Self::Window, callback: Box<dyn FnOnce()>);
}

struct DetachedView<W> {
    /// Tells a late close notification from the current view's.
    generation: u64,
    window: W,
}

struct SessionInner<B, T: NodeTree, D: DetachedHost> {
    sync: NoteSynchronizer<B>,
    placement: RefCell<PlacementContext<T>>,
    windows: D,
    detached: RefCell<Option<DetachedView<D::Window>>>,
    generation: Cell<u64>,
    opening: Cell<bool>,
    width: u32,
    height: u32,
}

/// Built once per page load; owns the one outstanding detached view.
pub struct NoteSession<B, T: NodeTree, D: DetachedHost>(Rc<SessionInner<B, T, D>>);

impl<B, T: NodeTree, D: DetachedHost> Clone for NoteSession<B, T, D> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<B, T, D> NoteSession<B, T, D>
where
    B: KvBackend + 'static,
    T: NodeTree + 'static,
    D: DetachedHost<Document = T::Document> + 'static,
{
    pub fn new(
        sync: NoteSynchronizer<B>,
        placement: PlacementContext<T>,
        windows: D,
        config: &SyncConfig,
    ) -> Self {
        Self(Rc::new(SessionInner {
            sync,
            placement: RefCell::new(placement),
            windows,
            detached: RefCell::new(None),
            generation: Cell::new(0),
            opening: Cell::new(false),
            width: config.detached_width,
            height: config.detached_height,
        }))
    }

    pub fn sync(&self) -> &NoteSynchronizer<B> {
        &self.0.sync
    }

    pub fn windows(&self) -> &D {
        &self.0.windows
    }

    /// Subscribe to sibling views, then load the stored note.
    pub async fn start(&self) -> String {
        self.0.sync.listen();
        self.0.sync.load().await
    }

    pub fn handle_input(&self) {
        self.0.sync.handle_input();
    }

    /// Start over with an empty note, everywhere.
    pub fn reset(&self) -> String {
        self.0.sync.commit("", CommitOptions::default())
    }

    pub fn delete(&self) {
        self.0.sync.clear(ClearOptions::default());
    }

    pub fn is_detached(&self) -> bool {
        self.0.detached.borrow().is_some()
    }

    pub fn focus_detached(&self) -> bool {
        match self.0.detached.borrow().as_ref() {
            Some(view) => {
                self.0.windows.focus(&view.window);
                true
            }
            None => false,
        }
    }

    /// Pop the surface out into a detached view, or focus the one already open.
    ///
    /// The placeholder holds the surface's spot while it is away; if the view
    /// cannot be opened the surface goes straight back.
    pub async fn open_detached(&self) -> Result<(), SessionError> {
        if self.focus_detached() || self.0.opening.get() {
            return Ok(());
        }

        self.0.opening.set(true);
        self.0.placement.borrow_mut().show_placeholder();
        let opened = self.0.windows.open(self.0.width, self.0.height).await;
        self.0.opening.set(false);

        let window = match opened {
            Ok(window) => window,
            Err(e) => {
                log::warn!("detached view unavailable: {e}");
                self.0.placement.borrow_mut().restore_note();
                return Err(e);
            }
        };

        let moved = {
            let mut placement = self.0.placement.borrow_mut();
            let moved = match self.0.windows.document(&window) {
                Some(document) => placement.move_note_to_document(&document),
                None => Err(SessionError::DetachedUnavailable(
                    "detached view has no document".to_string(),
                )),
            };
            if moved.is_err() {
                placement.restore_note();
            }
            moved
        };
        if let Err(e) = moved {
            self.0.windows.close(&window);
            return Err(e);
        }

        let generation = self.0.generation.get() + 1;
        self.0.generation.set(generation);

        let weak = Rc::downgrade(&self.0);
        self.0.windows.on_closed(
            &window,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    NoteSession(inner).detached_closed(generation);
                }
            }),
        );
        *self.0.detached.borrow_mut() = Some(DetachedView { generation, window });
        log::info!("note popped out (view #{generation})");
        Ok(())
    }

    /// Close the detached view and bring the surface home.
    pub fn close_detached(&self) -> bool {
        let Some(view) = self.0.detached.borrow_mut().take() else {
            return false;
        };
        self.0.placement.borrow_mut().restore_note();
        self.0.windows.close(&view.window);
        true
    }

    fn detached_closed(&self, generation: u64) {
        let current = {
            let mut detached = self.0.detached.borrow_mut();
            match detached.as_ref() {
                Some(view) if view.generation == generation => detached.take(),
                _ => None,
            }
        };
        if current.is_some() {
            log::info!("detached view #{generation} closed");
            self.0.placement.borrow_mut().restore_note();
        }
    }

    /// Whether the surface is in the main document right now.
    pub fn is_home(&self) -> bool {
        self.0.placement.borrow().is_home_document()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::LocalBus;
    use crate::markup::{Container, EMPTY_BLOCK};
    use crate::models::NoteIdentity;
    use crate::placement::{MemoryTree, NodeId};
    use crate::schedule::ManualHost;
    use crate::state::{SyncParts, SyncState};
    use crate::storage::{codec, MemoryBackend, NoteStore};
    use crate::surface::{MemorySurface, MemoryTitle};
    use futures::executor::block_on;

    type TestSession = NoteSession<MemoryBackend, MemoryTree, MemoryWindows>;

    struct Harness {
        config: SyncConfig,
        host: ManualHost,
        backend: MemoryBackend,
        bus: LocalBus,
        tree: MemoryTree,
    }

    struct Page {
        session: TestSession,
        content: Rc<MemorySurface>,
        node: NodeId,
        parent: NodeId,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                config: SyncConfig::default(),
                host: ManualHost::new(),
                backend: MemoryBackend::default(),
                bus: LocalBus::new(),
                tree: MemoryTree::new(),
            }
        }

        fn page(&self) -> Page {
            let doc = self.tree.create_document(true);
            let body = self.tree.body(doc).expect("body");
            let parent = self.tree.create_element(doc, "article");
            let node = self.tree.create_element(doc, "div");
            self.tree.append(&body, &parent);
            self.tree.append(&parent, &node);

            let content = Rc::new(MemorySurface::default());
            let sync = NoteSynchronizer::new(
                SyncParts {
                    note: NoteIdentity::new(Some("todo"), &self.config),
                    surface: content.clone(),
                    store: NoteStore::new(self.backend.clone(), &self.config),
                    channel: Rc::new(self.bus.endpoint()),
                    host: self.host.clone().into_host(),
                    titles: Rc::new(MemoryTitle::default()),
                },
                &self.config,
            );
            let placeholder = self.tree.create_element(doc, "aside");
            let placement = PlacementContext::new(self.tree.clone(), doc, node, placeholder);
            let windows = MemoryWindows::new(self.tree.clone());
            let session = NoteSession::new(sync, placement, windows, &self.config);

            let s2 = session.clone();
            self.tree
                .add_listener(node, "input", Rc::new(move || s2.handle_input()));

            Page {
                session,
                content,
                node,
                parent,
            }
        }

        fn key(&self) -> String {
            NoteIdentity::new(Some("todo"), &self.config)
                .storage_key()
                .to_string()
        }

        fn stored(&self) -> Option<String> {
            self.backend.raw(&self.key()).map(|r| codec::decode_record(&r))
        }
    }

    #[test]
    fn test_start_loads_and_listens() {
        let h = Harness::new();
        h.backend
            .insert_raw(&h.key(), &codec::compress("<div>remember</div>"));
        let a = h.page();
        let b = h.page();

        assert_eq!(block_on(a.session.start()), "<div>remember</div>");
        block_on(b.session.start());

        a.content.set_inner_html("<div>remember this</div>");
        a.session.handle_input();
        h.host.advance(h.config.persist_debounce_ms);
        assert_eq!(b.content.inner_html(), "<div>remember this</div>");
    }

    #[test]
    fn test_reset_and_delete_clear_everywhere() {
        let h = Harness::new();
        let a = h.page();
        let b = h.page();
        block_on(a.session.start());
        block_on(b.session.start());

        a.session.sync().commit("draft", CommitOptions::default());
        h.host.run_until_stalled();
        assert_eq!(b.content.inner_html(), "<div>draft</div>");

        assert_eq!(a.session.reset(), EMPTY_BLOCK);
        h.host.run_until_stalled();
        assert_eq!(h.stored(), None);
        assert_eq!(b.content.inner_html(), EMPTY_BLOCK);

        a.session.sync().commit("again", CommitOptions::default());
        h.host.run_until_stalled();
        b.session.delete();
        h.host.run_until_stalled();
        assert_eq!(h.stored(), None);
        assert_eq!(a.content.inner_html(), EMPTY_BLOCK);
    }

    #[test]
    fn test_open_detached_moves_surface_and_input_still_syncs() {
        let h = Harness::new();
        let p = h.page();
        block_on(p.session.start());
        // Let the load's delete of the missing record finish.
        h.host.run_until_stalled();
        assert_eq!(p.session.sync().state(), SyncState::Idle);

        block_on(p.session.open_detached()).expect("opens");
        assert!(p.session.is_detached());
        assert!(!p.session.is_home());
        let window = p.session.windows().last_opened().expect("one window");
        let body = p.session.windows().body_of(window).expect("body created");
        assert_eq!(h.tree.children(body), vec![p.node]);

        p.content.set_inner_html("written in the pop-out");
        assert_eq!(h.tree.dispatch(p.node, "input"), 1);
        assert_eq!(p.session.sync().state(), SyncState::PendingWrite);
        h.host.advance(h.config.persist_debounce_ms);
        assert_eq!(h.stored().as_deref(), Some("<div>written in the pop-out</div>"));
    }

    #[test]
    fn test_second_open_focuses_existing_view() {
        let h = Harness::new();
        let p = h.page();
        block_on(p.session.open_detached()).expect("opens");
        block_on(p.session.open_detached()).expect("focuses");

        assert_eq!(p.session.windows().open_count(), 1);
        assert_eq!(p.session.windows().focus_count(), 1);
        assert!(p.session.focus_detached());
    }

    #[test]
    fn test_user_closing_view_restores_surface_once() {
        let h = Harness::new();
        let p = h.page();
        block_on(p.session.open_detached()).expect("opens");
        let first = p.session.windows().last_opened().expect("window");

        p.session.windows().user_close(first);
        assert!(!p.session.is_detached());
        assert!(p.session.is_home());
        assert_eq!(h.tree.children(p.parent), vec![p.node]);

        // A reopened view is not torn down by a stale close of the first.
        block_on(p.session.open_detached()).expect("reopens");
        p.session.windows().user_close(first);
        assert!(p.session.is_detached());
    }

    #[test]
    fn test_close_detached_restores_and_ignores_own_close_event() {
        let h = Harness::new();
        let p = h.page();
        block_on(p.session.open_detached()).expect("opens");

        assert!(p.session.close_detached());
        assert!(!p.session.close_detached());
        assert_eq!(h.tree.children(p.parent), vec![p.node]);
        assert!(!p.session.focus_detached());
    }

    #[test]
    fn test_failed_open_leaves_surface_home() {
        let h = Harness::new();
        let p = h.page();
        p.session.windows().set_unavailable(true);

        let err = block_on(p.session.open_detached()).expect_err("refused");
        assert!(matches!(err, SessionError::DetachedUnavailable(_)));
        assert!(!p.session.is_detached());
        assert_eq!(h.tree.children(p.parent), vec![p.node]);
    }
}
