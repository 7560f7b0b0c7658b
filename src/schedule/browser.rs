use super::{Host, LocalTask, TimerHandle};
use crate::util::now_ms;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;

/// The page's own event loop.
#[derive(Clone, Copy, Debug, Default)]
pub struct BrowserHost;

fn supports_idle_callback(win: &web_sys::Window) -> bool {
    js_sys::Reflect::has(win, &"requestIdleCallback".into()).unwrap_or(false)
}

impl Host for BrowserHost {
    fn now_ms(&self) -> i64 {
        now_ms()
    }

    fn set_timeout(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> TimerHandle {
        let Some(win) = web_sys::window() else {
            return TimerHandle::Timeout(0);
        };
        let cb = Closure::once_into_js(move || callback());
        let tid = win
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                cb.unchecked_ref(),
                i32::try_from(delay_ms).unwrap_or(i32::MAX),
            )
            .unwrap_or(0);
        TimerHandle::Timeout(tid)
    }

    fn request_idle(&self, timeout_ms: u32, callback: Box<dyn FnOnce()>) -> TimerHandle {
        let Some(win) = web_sys::window() else {
            return TimerHandle::Idle(0);
        };
        // Safari has no requestIdleCallback; a zero timeout still yields to input.
        if !supports_idle_callback(&win) {
            return self.set_timeout(0, callback);
        }

        let cb = Closure::once_into_js(move || callback());
        let opts = web_sys::IdleRequestOptions::new();
        opts.set_timeout(timeout_ms);
        match win.request_idle_callback_with_options(cb.unchecked_ref(), &opts) {
            Ok(id) => TimerHandle::Idle(id),
            Err(e) => {
                log::warn!("requestIdleCallback failed: {e:?}");
                TimerHandle::Idle(0)
            }
        }
    }

    fn cancel(&self, handle: TimerHandle) {
        let Some(win) = web_sys::window() else {
            return;
        };
        match handle {
            TimerHandle::Timeout(id) => win.clear_timeout_with_handle(id),
            TimerHandle::Idle(id) => win.cancel_idle_callback(id),
        }
    }

    fn spawn(&self, task: LocalTask) {
        leptos::task::spawn_local(task);
    }
}
