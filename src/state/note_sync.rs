use crate::channel::Channel;
use crate::config::SyncConfig;
use crate::markup::{canonicalize, derive_title, normalize, sanitize, Container, DEFAULT_TITLE};
use crate::models::NoteIdentity;
use crate::schedule::{Debouncer, Host, IdleDebouncer};
use crate::storage::{KvBackend, NoteStore};
use crate::surface::{Surface, TitleSink};
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::{Rc, Weak};
use strum::Display;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum SyncState {
    /// Nothing scheduled, nothing in flight.
    Idle,
    /// A debounced persist is waiting for the input burst to end.
    PendingWrite,
    /// A store operation has been spawned and not finished yet.
    Persisting,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommitOptions {
    pub broadcast: bool,
}

impl Default for CommitOptions {
    fn default() -> Self {
        Self { broadcast: true }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClearOptions {
    pub broadcast: bool,
}

impl Default for ClearOptions {
    fn default() -> Self {
        Self { broadcast: true }
    }
}

/// Everything one synchronizer is wired to.
pub struct SyncParts<B> {
    pub note: NoteIdentity,
    pub surface: Rc<dyn Surface>,
    pub store: NoteStore<B>,
    pub channel: Rc<dyn Channel>,
    pub host: Rc<dyn Host>,
    pub titles: Rc<dyn TitleSink>,
}

#[derive(Default)]
struct SyncMemo {
    /// Last markup seen by `queue`, to skip events that changed nothing.
    last_value: Option<String>,
    /// Canonical markup of the record as last written or received.
    last_persisted: Option<String>,
}

struct Shared<B> {
    note: NoteIdentity,
    surface: Rc<dyn Surface>,
    store: NoteStore<B>,
    channel: Rc<dyn Channel>,
    host: Rc<dyn Host>,
    persist: Debouncer,
    titles: IdleDebouncer<String>,
    memo: RefCell<SyncMemo>,
    in_flight: Rc<Cell<usize>>,
}

/// Keeps one note's surface, record, title and sibling views in step.
///
/// Responsibilities:
/// - debounced persistence of local input (`queue`)
/// - immediate replacement (`apply` for loads and remote values, `commit` for
///   local intent) and deletion (`clear`)
/// - broadcast to sibling views, never echoing what came from storage or
///   from another view
/// - title updates at idle points
///
/// Storage failures never surface here; the live surface stays authoritative.
pub struct NoteSynchronizer<B>(Rc<Shared<B>>);

impl<B> Clone for NoteSynchronizer<B> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<B: KvBackend + 'static> NoteSynchronizer<B> {
    pub fn new(parts: SyncParts<B>, config: &SyncConfig) -> Self {
        let SyncParts {
            note,
            surface,
            store,
            channel,
            host,
            titles,
        } = parts;

        let persist = Debouncer::new(Rc::clone(&host), config.persist_debounce_ms);
        let titles = IdleDebouncer::new(
            Rc::clone(&host),
            config.title_debounce_ms,
            config.title_idle_timeout_ms,
            move |title: String| titles.set_title(&title),
        );

        Self(Rc::new(Shared {
            note,
            surface,
            store,
            channel,
            host,
            persist,
            titles,
            memo: RefCell::new(SyncMemo::default()),
            in_flight: Rc::new(Cell::new(0)),
        }))
    }

    pub fn note(&self) -> &NoteIdentity {
        &self.0.note
    }

    pub fn surface(&self) -> &Rc<dyn Surface> {
        &self.0.surface
    }

    pub fn store(&self) -> &NoteStore<B> {
        &self.0.store
    }

    pub fn state(&self) -> SyncState {
        if self.0.in_flight.get() > 0 {
            SyncState::Persisting
        } else if self.0.persist.is_pending() {
            SyncState::PendingWrite
        } else {
            SyncState::Idle
        }
    }

    /// Load the stored record into the surface.
    ///
    /// The raw stored value seeds the persisted cache, so a record already in
    /// canonical form is not written back, while a legacy one is rewritten once.
    pub async fn load(&self) -> String {
        let stored = self.0.store.load_note(&self.0.note).await;
        log::info!(
            "loading note `{}` ({})",
            self.0.note.slug(),
            if stored.is_some() { "stored" } else { "new" }
        );
        self.0.memo.borrow_mut().last_persisted = stored.clone();
        self.apply(stored.as_deref().unwrap_or(""))
    }

    /// Route sibling broadcasts into [`handle_remote`](Self::handle_remote).
    ///
    /// The subscription holds a weak reference: once every handle to this
    /// synchronizer is dropped, messages are ignored.
    pub fn listen(&self) {
        let weak: Weak<Shared<B>> = Rc::downgrade(&self.0);
        self.0.channel.subscribe(Rc::new(move |value: String| {
            if let Some(shared) = weak.upgrade() {
                NoteSynchronizer(shared).handle_remote(&value);
            }
        }));
    }

    /// A value committed by another view.
    ///
    /// Dropped while the local surface has focus: a view that is being typed
    /// into must not be overwritten by a broadcast that raced its keystrokes.
    pub fn handle_remote(&self, value: &str) {
        if self.0.surface.is_focused() {
            log::debug!("surface focused, ignoring remote update");
            return;
        }
        // The sender already wrote this value.
        self.0.memo.borrow_mut().last_persisted = Some(value.to_string());
        self.apply(value);
    }

    /// Normalize the surface after an input event and queue the result.
    pub fn handle_input(&self) {
        let markup = normalize(&*self.0.surface);
        self.queue(&markup);
    }

    /// Force the surface to `value` without broadcasting.
    ///
    /// For values that came from storage or from another view. Persists at
    /// once and flushes the title.
    pub fn apply(&self, value: &str) -> String {
        self.replace(value, false)
    }

    /// Debounced persist + broadcast of local input.
    pub fn queue(&self, value: &str) {
        {
            let mut memo = self.0.memo.borrow_mut();
            if memo.last_value.as_deref() == Some(value) {
                return;
            }
            memo.last_value = Some(value.to_string());
        }

        self.0.titles.schedule(derive_title(value));

        let weak = Rc::downgrade(&self.0);
        let value = value.to_string();
        self.0.persist.schedule(move || {
            if let Some(shared) = weak.upgrade() {
                NoteSynchronizer(shared).persist(&value, true);
            }
        });
    }

    /// Replace the content right away, superseding any queued write.
    pub fn commit(&self, value: &str, options: CommitOptions) -> String {
        self.replace(value, options.broadcast)
    }

    /// Empty the surface and delete the record with its metadata.
    pub fn clear(&self, options: ClearOptions) {
        self.0.persist.cancel();
        self.0.titles.cancel();

        self.0.surface.set_inner_html("");
        let markup = normalize(&*self.0.surface);
        {
            let mut memo = self.0.memo.borrow_mut();
            memo.last_value = Some(markup);
            memo.last_persisted = None;
        }

        self.delete_record();
        if options.broadcast {
            self.0.channel.post("");
        }
        self.set_title_now(DEFAULT_TITLE.to_string());
    }

    /// Run a queued persist now instead of at the end of its window.
    pub fn flush(&self) -> bool {
        let flushed = self.0.persist.flush();
        self.0.titles.flush();
        flushed
    }

    fn replace(&self, value: &str, broadcast: bool) -> String {
        self.0.persist.cancel();

        self.0.surface.set_inner_html(&sanitize(value));
        let markup = normalize(&*self.0.surface);
        self.0.memo.borrow_mut().last_value = Some(markup.clone());

        let persisted = self.persist(&markup, broadcast);
        self.set_title_now(derive_title(&persisted));
        markup
    }

    /// Sanitize, canonicalize, then delete, skip or write; returns what the
    /// record now holds ("" when deleted).
    fn persist(&self, value: &str, broadcast: bool) -> String {
        let canonical = canonicalize(&sanitize(value));

        if canonical.empty {
            self.0.memo.borrow_mut().last_persisted = None;
            self.delete_record();
            if broadcast {
                self.0.channel.post("");
            }
            return String::new();
        }

        let markup = canonical.markup;
        {
            let mut memo = self.0.memo.borrow_mut();
            if memo.last_persisted.as_deref() == Some(markup.as_str()) {
                log::debug!("note `{}` unchanged, skipping write", self.0.note.slug());
                return markup;
            }
            memo.last_persisted = Some(markup.clone());
        }

        let note = self.0.note.clone();
        let title = derive_title(&markup);
        let now = self.0.host.now_ms();
        let record = markup.clone();
        self.spawn_store(move |store| async move {
            store.save_note(&note, &record, title, now).await;
        });

        if broadcast {
            self.0.channel.post(&markup);
        }
        markup
    }

    fn delete_record(&self) {
        let note = self.0.note.clone();
        self.spawn_store(move |store| async move {
            store.delete_note(&note).await;
        });
    }

    fn spawn_store<F, Fut>(&self, op: F)
    where
        F: FnOnce(NoteStore<B>) -> Fut,
        Fut: Future<Output = ()> + 'static,
    {
        let in_flight = Rc::clone(&self.0.in_flight);
        in_flight.set(in_flight.get() + 1);
        let task = op(self.0.store.clone());
        // Queued rather than spawned directly: a delete must never be
        // overtaken by a save issued after it.
        let drain = self.0.store.enqueue(async move {
            task.await;
            in_flight.set(in_flight.get().saturating_sub(1));
        });
        if let Some(drain) = drain {
            self.0.host.spawn(drain);
        }
    }

    fn set_title_now(&self, title: String) {
        self.0.titles.schedule(title);
        self.0.titles.flush();
    }
}
