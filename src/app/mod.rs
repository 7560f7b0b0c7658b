use crate::config::SyncConfig;
use crate::session::{boot, BrowserSession};
use leptos::html;
use leptos::prelude::*;
use leptos::task::spawn_local;
use leptos_dom::helpers::window_event_listener;
use wasm_bindgen::JsCast;

#[component]
pub fn App() -> impl IntoView {
    let surface_ref: NodeRef<html::Div> = NodeRef::new();
    let session = StoredValue::new_local(None::<BrowserSession>);
    let booting = StoredValue::new_local(false);
    let error: RwSignal<Option<String>> = RwSignal::new(None);

    // Bind the session once the surface is mounted.
    Effect::new(move |_| {
        let Some(el) = surface_ref.get() else {
            return;
        };
        if booting.get_value() {
            return;
        }
        booting.set_value(true);

        let el: web_sys::HtmlElement = el.unchecked_into();
        spawn_local(async move {
            match boot(el, SyncConfig::from_env()).await {
                Ok(s) => session.set_value(Some(s)),
                Err(e) => {
                    log::error!("note session failed to start: {e}");
                    error.set(Some(e.to_string()));
                }
            }
        });
    });

    // pagehide -> write out whatever is still debounced
    let _pagehide_handle =
        window_event_listener(leptos::ev::pagehide, move |_ev: web_sys::PageTransitionEvent| {
            session.with_value(|s| {
                if let Some(s) = s {
                    s.sync().flush();
                }
            });
        });

    let on_new = move |_| {
        session.with_value(|s| {
            if let Some(s) = s {
                s.reset();
            }
        });
    };

    let on_pop_out = move |_| {
        let Some(s) = session.with_value(|s| s.clone()) else {
            return;
        };
        spawn_local(async move {
            if let Err(e) = s.open_detached().await {
                error.set(Some(e.to_string()));
            }
        });
    };

    view! {
        <main class="scratchnote">
            <nav class="scratchnote-toolbar">
                <button type="button" on:click=on_new>"New"</button>
                <button type="button" on:click=on_pop_out>"Pop out"</button>
            </nav>
            {move || error.get().map(|e| view! { <p class="scratchnote-error">{e}</p> })}
            <div
                class="scratchnote-surface"
                contenteditable="true"
                spellcheck="true"
                node_ref=surface_ref
            ></div>
        </main>
    }
}
