use super::{DetachedHost, NoteSession};
use crate::channel::{BroadcastChannelBus, Channel, Disconnected};
use crate::config::SyncConfig;
use crate::error::SessionError;
use crate::models::NoteIdentity;
use crate::placement::{DomTree, PlacementContext};
use crate::schedule::BrowserHost;
use crate::state::{NoteSynchronizer, SyncParts};
use crate::storage::{BrowserBackend, NoteStore};
use crate::surface::{DocumentTitle, DomSurface};
use crate::util;
use js_sys::{Function, Object, Promise, Reflect};
use std::rc::Rc;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

pub type BrowserSession = NoteSession<BrowserBackend, DomTree, PipWindows>;

const POPUP_TARGET: &str = "scratchnote-detached";

/// Document Picture-in-Picture where the browser has it, a popup otherwise.
#[derive(Clone, Copy, Debug, Default)]
pub struct PipWindows;

impl PipWindows {
    async fn request_pip(
        pip: &JsValue,
        width: u32,
        height: u32,
    ) -> Result<web_sys::Window, SessionError> {
        let options = Object::new();
        Reflect::set(&options, &"width".into(), &width.into())
            .map_err(|e| SessionError::detached(&e))?;
        Reflect::set(&options, &"height".into(), &height.into())
            .map_err(|e| SessionError::detached(&e))?;

        let request: Function = Reflect::get(pip, &"requestWindow".into())
            .map_err(|e| SessionError::detached(&e))?
            .dyn_into()
            .map_err(|e| SessionError::detached(&e))?;
        let promise: Promise = request
            .call1(pip, &options)
            .map_err(|e| SessionError::detached(&e))?
            .unchecked_into();
        let window = JsFuture::from(promise)
            .await
            .map_err(|e| SessionError::detached(&e))?;

        // The PiP window lives in another realm, so `instanceof Window` fails.
        Ok(window.unchecked_into())
    }

    fn copy_styles(from: &web_sys::Document, to: &web_sys::Document) {
        let Ok(sheets) = from.query_selector_all("style, link[rel=stylesheet]") else {
            return;
        };
        let Some(head) = to.head() else {
            return;
        };
        for i in 0..sheets.length() {
            let Some(sheet) = sheets.item(i) else {
                continue;
            };
            if let Ok(copy) = sheet.clone_node_with_deep(true) {
                let _ = head.append_child(&copy);
            }
        }
    }
}

impl DetachedHost for PipWindows {
    type Document = web_sys::Document;
    type Window = web_sys::Window;

    async fn open(&self, width: u32, height: u32) -> Result<web_sys::Window, SessionError> {
        let main = util::window()?;

        let pip = Reflect::get(&main, &"documentPictureInPicture".into())
            .ok()
            .filter(|v| !v.is_undefined() && !v.is_null());
        let window = match pip {
            Some(pip) => Self::request_pip(&pip, width, height).await?,
            None => {
                log::debug!("no document picture-in-picture, using a popup");
                let features = format!("popup,width={width},height={height}");
                main.open_with_url_and_target_and_features("", POPUP_TARGET, &features)
                    .map_err(|e| SessionError::detached(&e))?
                    .ok_or_else(|| SessionError::DetachedUnavailable("popup blocked".to_string()))?
            }
        };

        if let (Some(from), Some(to)) = (main.document(), window.document()) {
            Self::copy_styles(&from, &to);
        }
        Ok(window)
    }

    fn document(&self, window: &web_sys::Window) -> Option<web_sys::Document> {
        window.document()
    }

    fn close(&self, window: &web_sys::Window) {
        if let Err(e) = window.close() {
            log::warn!("closing detached view failed: {e:?}");
        }
    }

    fn focus(&self, window: &web_sys::Window) {
        let _ = window.focus();
    }

    fn on_closed(&self, window: &web_sys::Window, callback: Box<dyn FnOnce()>) {
        let cb = Closure::once_into_js(move || callback());
        if let Err(e) = window.add_event_listener_with_callback("pagehide", cb.unchecked_ref()) {
            log::warn!("cannot watch detached view for closing: {e:?}");
        }
    }
}

/// Wire a session to the live page around `surface` and load the note.
pub async fn boot(
    surface: web_sys::HtmlElement,
    config: SyncConfig,
) -> Result<BrowserSession, SessionError> {
    let window = util::window()?;
    let document = util::document()?;
    if !surface.is_connected() {
        return Err(SessionError::SurfaceMissing(surface.class_name()));
    }

    let search = window.location().search().unwrap_or_default();
    let note = NoteIdentity::from_query(&search, &config);
    log::info!("opening note `{}`", note.slug());

    let backend = BrowserBackend::detect(&config.database_name, &config.store_name).await;
    let channel: Rc<dyn Channel> = match BroadcastChannelBus::open(note.channel_name()) {
        Ok(bus) => Rc::new(bus),
        Err(e) => {
            log::warn!("no cross-view channel, this view stays on its own: {e:?}");
            Rc::new(Disconnected)
        }
    };

    let placeholder = document
        .create_element("div")
        .map_err(|_| SessionError::NoDocument)?;
    placeholder.set_class_name("note-placeholder");
    placeholder.set_text_content(Some("This note is open in a floating window."));

    let sync = NoteSynchronizer::new(
        SyncParts {
            note,
            surface: Rc::new(DomSurface::new(surface.clone())),
            store: NoteStore::new(backend, &config),
            channel,
            host: Rc::new(BrowserHost),
            titles: Rc::new(DocumentTitle),
        },
        &config,
    );
    let placement = PlacementContext::new(
        DomTree,
        document,
        surface.clone().unchecked_into(),
        placeholder.unchecked_into(),
    );
    let session = NoteSession::new(sync, placement, PipWindows, &config);

    // Bound on the element itself so the listener moves with it into a
    // detached document.
    let s2 = session.clone();
    let on_input = Closure::wrap(Box::new(move || {
        s2.handle_input();
    }) as Box<dyn FnMut()>);
    if let Err(e) =
        surface.add_event_listener_with_callback("input", on_input.as_ref().unchecked_ref())
    {
        log::error!("cannot listen for input on the note surface: {e:?}");
    }
    // The session lives as long as the page.
    on_input.forget();

    session.start().await;
    Ok(session)
}
