//! Cross-view notification bus.
//!
//! At-most-once, best-effort, no acknowledgement: a message is the latest
//! committed markup (or "" after a clear). Durability belongs to the store.

mod browser;

pub use browser::BroadcastChannelBus;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub type MessageHandler = Rc<dyn Fn(String)>;

pub trait Channel {
    /// Deliver `message` to every other view; never back to this one.
    fn post(&self, message: &str);
    /// Replace this view's handler.
    fn subscribe(&self, handler: MessageHandler);
}

/// Channel that goes nowhere, for views without a bus.
#[derive(Clone, Copy, Debug, Default)]
pub struct Disconnected;

impl Channel for Disconnected {
    fn post(&self, _message: &str) {}
    fn subscribe(&self, _handler: MessageHandler) {}
}

#[derive(Default)]
struct BusInner {
    next_id: Cell<usize>,
    handlers: RefCell<Vec<(usize, Option<MessageHandler>)>>,
    history: RefCell<Vec<(usize, String)>>,
}

/// In-process bus; every [`endpoint`](LocalBus::endpoint) is one view.
#[derive(Clone, Default)]
pub struct LocalBus {
    inner: Rc<BusInner>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endpoint(&self) -> LocalEndpoint {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner.handlers.borrow_mut().push((id, None));
        LocalEndpoint {
            id,
            bus: self.clone(),
        }
    }

    /// Every message posted so far, in order.
    pub fn history(&self) -> Vec<String> {
        self.inner
            .history
            .borrow()
            .iter()
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Messages posted by `endpoint`.
    pub fn sent_by(&self, endpoint: &LocalEndpoint) -> Vec<String> {
        self.inner
            .history
            .borrow()
            .iter()
            .filter(|(from, _)| *from == endpoint.id)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

#[derive(Clone)]
pub struct LocalEndpoint {
    id: usize,
    bus: LocalBus,
}

impl Channel for LocalEndpoint {
    fn post(&self, message: &str) {
        self.bus
            .inner
            .history
            .borrow_mut()
            .push((self.id, message.to_string()));

        // Collect first: handlers may post or subscribe re-entrantly.
        let targets: Vec<MessageHandler> = self
            .bus
            .inner
            .handlers
            .borrow()
            .iter()
            .filter(|(id, _)| *id != self.id)
            .filter_map(|(_, h)| h.clone())
            .collect();

        for handler in targets {
            handler(message.to_string());
        }
    }

    fn subscribe(&self, handler: MessageHandler) {
        if let Some(slot) = self
            .bus
            .inner
            .handlers
            .borrow_mut()
            .iter_mut()
            .find(|(id, _)| *id == self.id)
        {
            slot.1 = Some(handler);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Rc<RefCell<Vec<String>>>, MessageHandler) {
        let got = Rc::new(RefCell::new(Vec::new()));
        let g = Rc::clone(&got);
        (got, Rc::new(move |m: String| g.borrow_mut().push(m)))
    }

    #[test]
    fn test_post_reaches_siblings_but_not_sender() {
        let bus = LocalBus::new();
        let a = bus.endpoint();
        let b = bus.endpoint();
        let c = bus.endpoint();
        let (got_a, ha) = recorder();
        let (got_b, hb) = recorder();
        let (got_c, hc) = recorder();
        a.subscribe(ha);
        b.subscribe(hb);
        c.subscribe(hc);

        a.post("<div>x</div>");
        assert!(got_a.borrow().is_empty());
        assert_eq!(*got_b.borrow(), vec!["<div>x</div>".to_string()]);
        assert_eq!(*got_c.borrow(), vec!["<div>x</div>".to_string()]);
        assert_eq!(bus.sent_by(&a), vec!["<div>x</div>".to_string()]);
        assert!(bus.sent_by(&b).is_empty());
    }

    #[test]
    fn test_unsubscribed_endpoint_drops_messages() {
        let bus = LocalBus::new();
        let a = bus.endpoint();
        let _b = bus.endpoint();
        a.post("");
        assert_eq!(bus.history(), vec![String::new()]);
    }
}
