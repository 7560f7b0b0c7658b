//! Persistent store adapter.
//!
//! [`KvBackend`] is the raw async key/value medium (IndexedDB, localStorage,
//! memory). [`NoteStore`] layers the record codec, the metadata index and the
//! "failures are logged no-ops" policy on top of it.

mod browser;
pub mod codec;
mod memory;
mod meta;

pub use browser::{BrowserBackend, IdbBackend, LocalStorageBackend};
pub use memory::MemoryBackend;

use crate::config::SyncConfig;
use crate::error::StoreResult;
use crate::models::NoteIdentity;
use crate::schedule::LocalTask;
use futures::lock::Mutex;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::rc::Rc;

/// Durable, origin-scoped async key/value namespace.
#[allow(async_fn_in_trait)]
pub trait KvBackend {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;
    async fn remove(&self, key: &str) -> StoreResult<()>;
    async fn keys(&self) -> StoreResult<Vec<String>>;
}

/// Store operations waiting to run, strictly in the order they were queued.
#[derive(Default)]
struct WriteQueue {
    pending: RefCell<VecDeque<LocalTask>>,
    draining: Cell<bool>,
}

impl WriteQueue {
    async fn drain(self: Rc<Self>) {
        loop {
            let next = self.pending.borrow_mut().pop_front();
            let Some(op) = next else {
                break;
            };
            op.await;
        }
        self.draining.set(false);
    }
}

pub struct NoteStore<B> {
    backend: Rc<B>,
    prefix: String,
    meta_key: String,
    /// Keeps a listing from interleaving with a record+index mutation.
    write_lock: Rc<Mutex<()>>,
    queue: Rc<WriteQueue>,
}

impl<B> Clone for NoteStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Rc::clone(&self.backend),
            prefix: self.prefix.clone(),
            meta_key: self.meta_key.clone(),
            write_lock: Rc::clone(&self.write_lock),
            queue: Rc::clone(&self.queue),
        }
    }
}

impl<B: KvBackend> NoteStore<B> {
    pub fn new(backend: B, config: &SyncConfig) -> Self {
        Self {
            backend: Rc::new(backend),
            prefix: config.storage_prefix.clone(),
            meta_key: config.meta_index_key.clone(),
            write_lock: Rc::new(Mutex::new(())),
            queue: Rc::new(WriteQueue::default()),
        }
    }

    /// Queue `op` behind every operation queued before it on this store or
    /// its clones.
    ///
    /// Returns the task that drains the queue when none is running yet; the
    /// caller spawns it. Otherwise the running drain picks `op` up.
    pub fn enqueue(&self, op: impl Future<Output = ()> + 'static) -> Option<LocalTask> {
        self.queue.pending.borrow_mut().push_back(Box::pin(op));
        if self.queue.draining.replace(true) {
            return None;
        }
        Some(Box::pin(Rc::clone(&self.queue).drain()))
    }

    /// Operations waiting for an earlier one to finish.
    pub fn queued(&self) -> usize {
        self.queue.pending.borrow().len()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Read and decompress; legacy uncompressed values come back as stored.
    pub async fn get(&self, key: &str) -> Option<String> {
        match self.backend.get(key).await {
            Ok(stored) => stored.map(|s| codec::decode_record(&s)),
            Err(e) => {
                log::warn!("store get {key} failed: {e}");
                None
            }
        }
    }

    pub async fn set(&self, key: &str, value: &str) {
        if let Err(e) = self.backend.set(key, &codec::compress(value)).await {
            log::warn!("store set {key} failed: {e}");
        }
    }

    pub async fn remove(&self, key: &str) {
        if let Err(e) = self.backend.remove(key).await {
            log::warn!("store remove {key} failed: {e}");
        }
    }

    pub async fn keys(&self) -> Vec<String> {
        self.backend.keys().await.unwrap_or_else(|e| {
            log::warn!("store keys failed: {e}");
            Vec::new()
        })
    }

    pub async fn load_note(&self, note: &NoteIdentity) -> Option<String> {
        self.get(note.storage_key()).await
    }

    /// Upsert the metadata entry, then write the compressed record.
    pub async fn save_note(&self, note: &NoteIdentity, markup: &str, title: String, now_ms: i64) {
        let _guard = self.write_lock.lock().await;
        self.upsert_meta(note.slug(), title, now_ms).await;
        self.set(note.storage_key(), markup).await;
    }

    /// Remove the record and its metadata entry together.
    pub async fn delete_note(&self, note: &NoteIdentity) {
        let _guard = self.write_lock.lock().await;
        self.remove(note.storage_key()).await;
        self.remove_meta(note.slug()).await;
    }

    fn slug_of<'a>(&self, key: &'a str) -> Option<&'a str> {
        if key == self.meta_key {
            return None;
        }
        key.strip_prefix(self.prefix.as_str())
    }

    fn key_of(&self, slug: &str) -> String {
        format!("{}{}", self.prefix, slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    fn store() -> (NoteStore<MemoryBackend>, MemoryBackend) {
        let backend = MemoryBackend::default();
        (NoteStore::new(backend.clone(), &SyncConfig::default()), backend)
    }

    #[test]
    fn test_set_compresses_and_get_decompresses() {
        let (store, backend) = store();
        block_on(store.set("scratchnote::root", "<div>hello</div>"));

        let raw = backend.raw("scratchnote::root").expect("record should exist");
        assert_ne!(raw, "<div>hello</div>");
        assert_eq!(
            block_on(store.get("scratchnote::root")).as_deref(),
            Some("<div>hello</div>")
        );
    }

    #[test]
    fn test_get_returns_legacy_raw_value() {
        let (store, backend) = store();
        backend.insert_raw("scratchnote::old", "<div>legacy</div>");
        assert_eq!(
            block_on(store.get("scratchnote::old")).as_deref(),
            Some("<div>legacy</div>")
        );
    }

    #[test]
    fn test_backend_failures_are_swallowed() {
        let (store, backend) = store();
        backend.insert_raw("k", "v");
        backend.set_failing(true);

        block_on(store.set("k", "new"));
        block_on(store.remove("k"));
        assert_eq!(block_on(store.get("k")), None);
        assert!(block_on(store.keys()).is_empty());

        backend.set_failing(false);
        assert_eq!(backend.raw("k").as_deref(), Some("v"));
    }

    #[test]
    fn test_save_and_delete_note_keep_meta_in_lockstep() {
        let (store, backend) = store();
        let note = NoteIdentity::new(Some("work"), &SyncConfig::default());

        block_on(store.save_note(&note, "<div>todo</div>", "todo".to_string(), 10));
        let index = block_on(store.read_index());
        assert_eq!(index.get("work").map(|m| m.title.as_str()), Some("todo"));
        assert!(backend.raw("scratchnote::work").is_some());

        block_on(store.delete_note(&note));
        assert!(backend.raw("scratchnote::work").is_none());
        assert!(block_on(store.read_index()).get("work").is_none());
    }

    #[test]
    fn test_enqueued_ops_run_in_order_with_one_drain() {
        let (store, _) = store();
        let order = Rc::new(RefCell::new(Vec::new()));

        let mut drains = Vec::new();
        for tag in ["save", "delete", "save again"] {
            let order = Rc::clone(&order);
            let other = store.clone();
            drains.push(other.enqueue(async move { order.borrow_mut().push(tag) }));
        }
        assert_eq!(drains.iter().filter(|d| d.is_some()).count(), 1);
        assert_eq!(store.queued(), 3);

        let drain = drains.into_iter().flatten().next().expect("one drain task");
        block_on(drain);
        assert_eq!(*order.borrow(), vec!["save", "delete", "save again"]);
        assert_eq!(store.queued(), 0);

        // Idle again: the next op starts a fresh drain.
        assert!(store.enqueue(async {}).is_some());
    }
}
