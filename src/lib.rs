//! Local-first scratch note: one editable surface kept in step with its
//! stored record and with every other open view of the same note.

mod app;
pub mod channel;
pub mod config;
pub mod error;
pub mod logging;
pub mod markup;
pub mod models;
pub mod placement;
pub mod schedule;
pub mod session;
pub mod state;
pub mod storage;
pub mod surface;
mod util;

pub use app::App;
pub use config::SyncConfig;
pub use error::{SessionError, StoreError};
pub use models::{NoteIdentity, NoteMeta};
pub use session::{BrowserSession, NoteSession};
pub use state::{ClearOptions, CommitOptions, NoteSynchronizer, SyncState};

use leptos::prelude::*;

// Needed for `#[wasm_bindgen(start)]` on the wasm entrypoint.
#[cfg(all(target_arch = "wasm32", not(test)))]
use wasm_bindgen::prelude::wasm_bindgen;

// Only register the WASM start function for normal builds (not for tests),
// otherwise wasm-bindgen-test will end up with multiple entry symbols.
#[cfg_attr(all(target_arch = "wasm32", not(test)), wasm_bindgen(start))]
pub fn main() {
    console_error_panic_hook::set_once();
    logging::init(log::LevelFilter::Info);
    mount_to_body(App);
}

#[cfg(test)]
mod tests {
    use crate::channel::LocalBus;
    use crate::markup::Container;
    use crate::schedule::{Host, ManualHost};
    use crate::state::SyncParts;
    use crate::storage::{MemoryBackend, NoteStore};
    use crate::surface::{MemorySurface, MemoryTitle};
    use crate::{CommitOptions, NoteIdentity, NoteSynchronizer, SyncConfig, SyncState};
    use futures::executor::block_on;
    use std::rc::Rc;

    fn view(
        config: &SyncConfig,
        query: &str,
        host: &ManualHost,
        backend: &MemoryBackend,
        bus: &LocalBus,
    ) -> (NoteSynchronizer<MemoryBackend>, Rc<MemorySurface>) {
        let surface = Rc::new(MemorySurface::default());
        let sync = NoteSynchronizer::new(
            SyncParts {
                note: NoteIdentity::from_query(query, config),
                surface: surface.clone(),
                store: NoteStore::new(backend.clone(), config),
                channel: Rc::new(bus.endpoint()),
                host: host.clone().into_host(),
                titles: Rc::new(MemoryTitle::default()),
            },
            config,
        );
        (sync, surface)
    }

    #[test]
    fn test_notes_from_different_queries_stay_apart() {
        let config = SyncConfig::default();
        let host = ManualHost::new();
        let backend = MemoryBackend::default();
        let bus = LocalBus::new();

        let (groceries, _) = view(&config, "?note=groceries", &host, &backend, &bus);
        let (root, _) = view(&config, "", &host, &backend, &bus);
        block_on(groceries.load());
        block_on(root.load());

        groceries.commit("<div>eggs</div>", CommitOptions::default());
        root.commit("<div>root note</div>", CommitOptions::default());
        host.run_until_stalled();

        let listed = block_on(groceries.store().list_notes(host.now_ms()));
        let titles: Vec<(String, String)> = listed
            .into_iter()
            .map(|m| (m.slug, m.title))
            .collect();
        assert_eq!(
            titles,
            vec![
                ("groceries".to_string(), "eggs".to_string()),
                ("root".to_string(), "root note".to_string()),
            ]
        );
    }

    #[test]
    fn test_reload_shows_last_committed_content() {
        let config = SyncConfig::default();
        let host = ManualHost::new();
        let backend = MemoryBackend::default();
        let bus = LocalBus::new();

        let (first, surface) = view(&config, "?note=diary", &host, &backend, &bus);
        block_on(first.load());
        surface.set_inner_html("dear diary");
        first.handle_input();
        host.advance(config.persist_debounce_ms);
        drop(first);

        let (second, reloaded) = view(&config, "?note=diary", &host, &backend, &bus);
        assert_eq!(block_on(second.load()), "<div>dear diary</div>");
        assert_eq!(reloaded.inner_html(), "<div>dear diary</div>");
        assert_eq!(second.state(), SyncState::Idle);
    }
}
