//! Timers, idle callbacks and the debounce primitives built on them.

mod browser;
mod manual;

pub use browser::BrowserHost;
pub use manual::ManualHost;

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

pub type LocalTask = Pin<Box<dyn Future<Output = ()>>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerHandle {
    Timeout(i32),
    Idle(u32),
}

/// The event loop the core runs on.
///
/// Single-threaded: callbacks and tasks never run concurrently with each
/// other, only interleaved at timer and `await` points.
pub trait Host {
    fn now_ms(&self) -> i64;
    fn set_timeout(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> TimerHandle;
    /// Run `callback` at the next idle point, or after `timeout_ms` at the latest.
    fn request_idle(&self, timeout_ms: u32, callback: Box<dyn FnOnce()>) -> TimerHandle;
    fn cancel(&self, handle: TimerHandle);
    /// Fire-and-forget a local future.
    fn spawn(&self, task: LocalTask);
}

struct Pending {
    generation: u64,
    handle: TimerHandle,
    job: Box<dyn FnOnce()>,
}

/// Trailing-edge debounce: each `schedule` replaces the pending job and
/// restarts the window, so a burst ends in exactly one call.
#[derive(Clone)]
pub struct Debouncer {
    host: Rc<dyn Host>,
    delay_ms: u32,
    generation: Rc<Cell<u64>>,
    pending: Rc<RefCell<Option<Pending>>>,
}

impl Debouncer {
    pub fn new(host: Rc<dyn Host>, delay_ms: u32) -> Self {
        Self {
            host,
            delay_ms,
            generation: Rc::new(Cell::new(0)),
            pending: Rc::new(RefCell::new(None)),
        }
    }

    pub fn delay_ms(&self) -> u32 {
        self.delay_ms
    }

    pub fn schedule(&self, job: impl FnOnce() + 'static) {
        self.cancel();

        let generation = self.generation.get() + 1;
        self.generation.set(generation);

        let pending = Rc::clone(&self.pending);
        let handle = self.host.set_timeout(
            self.delay_ms,
            Box::new(move || {
                let due = {
                    let mut slot = pending.borrow_mut();
                    match slot.as_ref() {
                        Some(p) if p.generation == generation => slot.take(),
                        _ => None,
                    }
                };
                if let Some(p) = due {
                    (p.job)();
                }
            }),
        );

        *self.pending.borrow_mut() = Some(Pending {
            generation,
            handle,
            job: Box::new(job),
        });
    }

    /// Drop the pending job without running it. Returns whether one existed.
    pub fn cancel(&self) -> bool {
        let pending = self.pending.borrow_mut().take();
        match pending {
            Some(p) => {
                self.host.cancel(p.handle);
                true
            }
            None => false,
        }
    }

    /// Run the pending job now instead of at the end of the window.
    pub fn flush(&self) -> bool {
        let pending = self.pending.borrow_mut().take();
        match pending {
            Some(p) => {
                self.host.cancel(p.handle);
                (p.job)();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.borrow().is_some()
    }
}

/// Debounce whose trailing call additionally waits for an idle point
/// (bounded by a timeout), for writes that must never compete with input.
///
/// Only the latest value is ever delivered.
pub struct IdleDebouncer<T: 'static> {
    host: Rc<dyn Host>,
    debounce: Debouncer,
    idle_timeout_ms: u32,
    idle: Rc<Cell<Option<TimerHandle>>>,
    latest: Rc<RefCell<Option<T>>>,
    sink: Rc<dyn Fn(T)>,
}

impl<T: 'static> IdleDebouncer<T> {
    pub fn new(
        host: Rc<dyn Host>,
        delay_ms: u32,
        idle_timeout_ms: u32,
        sink: impl Fn(T) + 'static,
    ) -> Self {
        Self {
            debounce: Debouncer::new(Rc::clone(&host), delay_ms),
            host,
            idle_timeout_ms,
            idle: Rc::new(Cell::new(None)),
            latest: Rc::new(RefCell::new(None)),
            sink: Rc::new(sink),
        }
    }

    pub fn schedule(&self, value: T) {
        *self.latest.borrow_mut() = Some(value);
        if let Some(handle) = self.idle.take() {
            self.host.cancel(handle);
        }

        let host = Rc::clone(&self.host);
        let idle = Rc::clone(&self.idle);
        let latest = Rc::clone(&self.latest);
        let sink = Rc::clone(&self.sink);
        let timeout = self.idle_timeout_ms;
        self.debounce.schedule(move || {
            let idle_slot = Rc::clone(&idle);
            let handle = host.request_idle(
                timeout,
                Box::new(move || {
                    idle_slot.set(None);
                    let value = latest.borrow_mut().take();
                    if let Some(value) = value {
                        sink(value);
                    }
                }),
            );
            idle.set(Some(handle));
        });
    }

    /// Deliver the latest value synchronously, skipping both waits.
    pub fn flush(&self) {
        self.cancel_timers();
        let value = self.latest.borrow_mut().take();
        if let Some(value) = value {
            (self.sink)(value);
        }
    }

    /// Forget the pending value.
    pub fn cancel(&self) {
        self.cancel_timers();
        self.latest.borrow_mut().take();
    }

    pub fn is_pending(&self) -> bool {
        self.latest.borrow().is_some()
    }

    fn cancel_timers(&self) {
        self.debounce.cancel();
        if let Some(handle) = self.idle.take() {
            self.host.cancel(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> (Rc<Cell<u32>>, impl Fn() -> Box<dyn FnOnce()>) {
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        (hits, move || {
            let h = Rc::clone(&h);
            Box::new(move || h.set(h.get() + 1)) as Box<dyn FnOnce()>
        })
    }

    #[test]
    fn test_burst_collapses_into_one_trailing_call() {
        let host = ManualHost::new();
        let d = Debouncer::new(host.clone().into_host(), 400);
        let (hits, job) = counter();

        for _ in 0..5 {
            d.schedule(job());
            host.advance(100);
        }
        assert_eq!(hits.get(), 0);
        assert!(d.is_pending());

        host.advance(400);
        assert_eq!(hits.get(), 1);
        assert!(!d.is_pending());
    }

    #[test]
    fn test_trailing_call_uses_latest_job() {
        let host = ManualHost::new();
        let d = Debouncer::new(host.clone().into_host(), 50);
        let seen = Rc::new(RefCell::new(Vec::new()));
        for v in ["a", "b", "c"] {
            let seen = Rc::clone(&seen);
            d.schedule(move || seen.borrow_mut().push(v));
        }
        host.advance(50);
        assert_eq!(*seen.borrow(), vec!["c"]);
    }

    #[test]
    fn test_cancel_discards_pending_job() {
        let host = ManualHost::new();
        let d = Debouncer::new(host.clone().into_host(), 100);
        let (hits, job) = counter();
        d.schedule(job());
        assert!(d.cancel());
        assert!(!d.cancel());
        host.advance(1_000);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_flush_runs_now_and_only_once() {
        let host = ManualHost::new();
        let d = Debouncer::new(host.clone().into_host(), 100);
        let (hits, job) = counter();
        d.schedule(job());
        assert!(d.flush());
        assert_eq!(hits.get(), 1);
        host.advance(1_000);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_idle_debouncer_waits_for_window_then_idle() {
        let host = ManualHost::new();
        let out = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&out);
        let titles = IdleDebouncer::new(host.clone().into_host(), 150, 500, move |t: String| {
            sink.borrow_mut().push(t)
        });

        titles.schedule("a".to_string());
        titles.schedule("b".to_string());
        host.advance(149);
        assert!(out.borrow().is_empty());

        // The debounce fires and the idle callback follows in the same turn.
        host.advance(1);
        assert_eq!(*out.borrow(), vec!["b".to_string()]);
        assert!(!titles.is_pending());
    }

    #[test]
    fn test_idle_debouncer_flush_is_synchronous() {
        let host = ManualHost::new();
        let out = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&out);
        let titles = IdleDebouncer::new(host.clone().into_host(), 150, 500, move |t: String| {
            sink.borrow_mut().push(t)
        });

        titles.schedule("x".to_string());
        titles.flush();
        assert_eq!(*out.borrow(), vec!["x".to_string()]);

        host.advance(1_000);
        assert_eq!(out.borrow().len(), 1);
    }
}
