use super::{Host, LocalTask, TimerHandle};
use futures::executor::{LocalPool, LocalSpawner};
use futures::task::LocalSpawnExt;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

struct Timer {
    due_ms: i64,
    handle: TimerHandle,
    callback: Box<dyn FnOnce()>,
}

struct ManualInner {
    now_ms: Cell<i64>,
    next_id: Cell<i32>,
    /// Keyed by (due, id) so equal deadlines fire in scheduling order.
    timers: RefCell<BTreeMap<(i64, i32), Timer>>,
    pool: RefCell<LocalPool>,
    /// Held apart from the pool so tasks can spawn while the pool runs.
    spawner: LocalSpawner,
}

/// Deterministic event loop with a virtual clock.
///
/// Time only moves in [`advance`](Self::advance); idle callbacks are due
/// immediately, since nothing else competes for the loop. Spawned tasks run
/// whenever the loop turns.
#[derive(Clone)]
pub struct ManualHost {
    inner: Rc<ManualInner>,
}

impl Default for ManualHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualHost {
    pub fn new() -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Self {
            inner: Rc::new(ManualInner {
                now_ms: Cell::new(0),
                next_id: Cell::new(1),
                timers: RefCell::new(BTreeMap::new()),
                pool: RefCell::new(pool),
                spawner,
            }),
        }
    }

    pub fn into_host(self) -> Rc<dyn Host> {
        Rc::new(self)
    }

    /// Move the clock forward, firing every timer that comes due on the way
    /// (including ones scheduled by earlier callbacks).
    pub fn advance(&self, ms: u32) {
        let target = self.inner.now_ms.get() + i64::from(ms);
        self.run_until_stalled();

        loop {
            let next = {
                let mut timers = self.inner.timers.borrow_mut();
                let first = timers.keys().next().copied();
                match first {
                    Some(key) if key.0 <= target => timers.remove(&key),
                    _ => None,
                }
            };
            let Some(timer) = next else {
                break;
            };
            self.inner.now_ms.set(timer.due_ms.max(self.inner.now_ms.get()));
            (timer.callback)();
            self.run_until_stalled();
        }

        self.inner.now_ms.set(target);
        self.run_until_stalled();
    }

    /// Poll spawned tasks until none can make progress.
    pub fn run_until_stalled(&self) {
        self.inner.pool.borrow_mut().run_until_stalled();
    }

    pub fn pending_timers(&self) -> usize {
        self.inner.timers.borrow().len()
    }

    fn add_timer(
        &self,
        due_ms: i64,
        handle_of: fn(i32) -> TimerHandle,
        callback: Box<dyn FnOnce()>,
    ) -> TimerHandle {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        let handle = handle_of(id);
        self.inner.timers.borrow_mut().insert(
            (due_ms, id),
            Timer {
                due_ms,
                handle,
                callback,
            },
        );
        handle
    }
}

impl Host for ManualHost {
    fn now_ms(&self) -> i64 {
        self.inner.now_ms.get()
    }

    fn set_timeout(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> TimerHandle {
        let due = self.inner.now_ms.get() + i64::from(delay_ms);
        self.add_timer(due, TimerHandle::Timeout, callback)
    }

    fn request_idle(&self, _timeout_ms: u32, callback: Box<dyn FnOnce()>) -> TimerHandle {
        let due = self.inner.now_ms.get();
        self.add_timer(due, |id| TimerHandle::Idle(id as u32), callback)
    }

    fn cancel(&self, handle: TimerHandle) {
        self.inner
            .timers
            .borrow_mut()
            .retain(|_, timer| timer.handle != handle);
    }

    fn spawn(&self, task: LocalTask) {
        if let Err(e) = self.inner.spawner.spawn_local(task) {
            log::warn!("manual host could not spawn task: {e}");
        }
    }
}
