use super::KvBackend;
use crate::error::{StoreError, StoreResult};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

#[derive(Default)]
struct MemoryInner {
    map: RefCell<BTreeMap<String, String>>,
    failing: Cell<bool>,
    writes: RefCell<BTreeMap<String, usize>>,
}

/// In-process backend for headless sessions and tests.
///
/// Clones share the same map, so a test can keep a handle while the store
/// owns another.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Rc<MemoryInner>,
}

impl MemoryBackend {
    /// Make every call fail, as an unavailable or full backend would.
    pub fn set_failing(&self, failing: bool) {
        self.inner.failing.set(failing);
    }

    /// Number of successful `set` calls for `key` so far.
    pub fn writes_to(&self, key: &str) -> usize {
        self.inner.writes.borrow().get(key).copied().unwrap_or(0)
    }

    /// Stored value exactly as written (still compressed).
    pub fn raw(&self, key: &str) -> Option<String> {
        self.inner.map.borrow().get(key).cloned()
    }

    pub fn insert_raw(&self, key: &str, value: &str) {
        self.inner
            .map
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }

    fn check(&self) -> StoreResult<()> {
        if self.inner.failing.get() {
            Err(StoreError::Unavailable("memory backend set to fail".to_string()))
        } else {
            Ok(())
        }
    }
}

impl KvBackend for MemoryBackend {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.check()?;
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.check()?;
        self.insert_raw(key, value);
        *self
            .inner
            .writes
            .borrow_mut()
            .entry(key.to_string())
            .or_insert(0) += 1;
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.check()?;
        self.inner.map.borrow_mut().remove(key);
        Ok(())
    }

    async fn keys(&self) -> StoreResult<Vec<String>> {
        self.check()?;
        Ok(self.inner.map.borrow().keys().cloned().collect())
    }
}
