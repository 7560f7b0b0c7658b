use super::{Channel, MessageHandler};
use std::cell::RefCell;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{BroadcastChannel, MessageEvent};

/// `BroadcastChannel` scoped to one note; the browser already skips the
/// posting context.
pub struct BroadcastChannelBus {
    channel: BroadcastChannel,
    on_message: RefCell<Option<Closure<dyn FnMut(MessageEvent)>>>,
}

impl BroadcastChannelBus {
    pub fn open(name: &str) -> Result<Self, JsValue> {
        Ok(Self {
            channel: BroadcastChannel::new(name)?,
            on_message: RefCell::new(None),
        })
    }
}

impl Channel for BroadcastChannelBus {
    fn post(&self, message: &str) {
        if let Err(e) = self.channel.post_message(&JsValue::from_str(message)) {
            log::warn!("broadcast to {} failed: {e:?}", self.channel.name());
        }
    }

    fn subscribe(&self, handler: MessageHandler) {
        let closure = Closure::<dyn FnMut(MessageEvent)>::new(move |ev: MessageEvent| {
            match ev.data().as_string() {
                Some(value) => handler(value),
                None => log::debug!("ignoring non-string broadcast payload"),
            }
        });
        self.channel
            .set_onmessage(Some(closure.as_ref().unchecked_ref()));
        // Replacing the old closure drops it; the channel no longer points at it.
        *self.on_message.borrow_mut() = Some(closure);
    }
}

impl Drop for BroadcastChannelBus {
    fn drop(&mut self) {
        self.channel.set_onmessage(None);
        self.channel.close();
    }
}
