use super::KvBackend;
use crate::error::{StoreError, StoreResult};
use std::cell::RefCell;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{IdbDatabase, IdbObjectStore, IdbRequest, IdbTransactionMode};

/// Resolve once `req` fires `success`, reject on `error`.
fn request_done(req: &IdbRequest) -> JsFuture {
    let promise = js_sys::Promise::new(&mut |resolve, reject| {
        req.set_onsuccess(Some(&resolve));
        req.set_onerror(Some(&reject));
    });
    JsFuture::from(promise)
}

async fn run_request(req: IdbRequest) -> StoreResult<JsValue> {
    request_done(&req)
        .await
        .map_err(|e| StoreError::from_js(&e))?;
    req.result().map_err(|e| StoreError::from_js(&e))
}

/// IndexedDB-backed store: one database, one object store, string values.
pub struct IdbBackend {
    database_name: String,
    store_name: String,
    db: RefCell<Option<IdbDatabase>>,
}

impl IdbBackend {
    pub fn new(database_name: &str, store_name: &str) -> Self {
        Self {
            database_name: database_name.to_string(),
            store_name: store_name.to_string(),
            db: RefCell::new(None),
        }
    }

    async fn database(&self) -> StoreResult<IdbDatabase> {
        let cached = self.db.borrow().clone();
        if let Some(db) = cached {
            return Ok(db);
        }

        let factory = web_sys::window()
            .ok_or_else(|| StoreError::Unavailable("no window".to_string()))?
            .indexed_db()
            .map_err(|e| StoreError::from_js(&e))?
            .ok_or_else(|| StoreError::Unavailable("indexedDB not supported".to_string()))?;

        let open = factory
            .open_with_u32(&self.database_name, 1)
            .map_err(|e| StoreError::from_js(&e))?;

        let store_name = self.store_name.clone();
        let on_upgrade = Closure::once_into_js(move |ev: web_sys::Event| {
            let db = ev
                .target()
                .and_then(|t| t.dyn_into::<web_sys::IdbOpenDbRequest>().ok())
                .and_then(|req| req.result().ok())
                .and_then(|r| r.dyn_into::<IdbDatabase>().ok());
            if let Some(db) = db {
                if !db.object_store_names().contains(&store_name) {
                    if let Err(e) = db.create_object_store(&store_name) {
                        log::warn!("indexedDB store creation failed: {e:?}");
                    }
                }
            }
        });
        open.set_onupgradeneeded(Some(on_upgrade.unchecked_ref()));

        let db = run_request(open.into())
            .await?
            .dyn_into::<IdbDatabase>()
            .map_err(|_| StoreError::Unavailable("open did not yield a database".to_string()))?;

        *self.db.borrow_mut() = Some(db.clone());
        Ok(db)
    }

    async fn object_store(&self, mode: IdbTransactionMode) -> StoreResult<IdbObjectStore> {
        let db = self.database().await?;
        let tx = db
            .transaction_with_str_and_mode(&self.store_name, mode)
            .map_err(|e| StoreError::from_js(&e))?;
        tx.object_store(&self.store_name)
            .map_err(|e| StoreError::from_js(&e))
    }

    /// Open the database now so an unusable IndexedDB is detected up front.
    pub async fn check_open(&self) -> StoreResult<()> {
        self.database().await.map(|_| ())
    }
}

impl KvBackend for IdbBackend {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let store = self.object_store(IdbTransactionMode::Readonly).await?;
        let req = store
            .get(&JsValue::from_str(key))
            .map_err(|e| StoreError::from_js(&e))?;
        Ok(run_request(req).await?.as_string())
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let store = self.object_store(IdbTransactionMode::Readwrite).await?;
        let req = store
            .put_with_key(&JsValue::from_str(value), &JsValue::from_str(key))
            .map_err(|e| StoreError::from_js(&e))?;
        run_request(req).await.map(|_| ())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        let store = self.object_store(IdbTransactionMode::Readwrite).await?;
        let req = store
            .delete(&JsValue::from_str(key))
            .map_err(|e| StoreError::from_js(&e))?;
        run_request(req).await.map(|_| ())
    }

    async fn keys(&self) -> StoreResult<Vec<String>> {
        let store = self.object_store(IdbTransactionMode::Readonly).await?;
        let req = store.get_all_keys().map_err(|e| StoreError::from_js(&e))?;
        let keys = js_sys::Array::from(&run_request(req).await?);
        Ok(keys.iter().filter_map(|k| k.as_string()).collect())
    }
}

fn local_storage() -> StoreResult<web_sys::Storage> {
    web_sys::window()
        .and_then(|w| w.local_storage().ok().flatten())
        .ok_or_else(|| StoreError::Unavailable("localStorage not available".to_string()))
}

/// Synchronous `localStorage`, used when IndexedDB cannot be opened.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalStorageBackend;

impl KvBackend for LocalStorageBackend {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        local_storage()?
            .get_item(key)
            .map_err(|e| StoreError::from_js(&e))
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        local_storage()?
            .set_item(key, value)
            .map_err(|e| StoreError::from_js(&e))
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        local_storage()?
            .remove_item(key)
            .map_err(|e| StoreError::from_js(&e))
    }

    async fn keys(&self) -> StoreResult<Vec<String>> {
        let storage = local_storage()?;
        let len = storage.length().map_err(|e| StoreError::from_js(&e))?;
        Ok((0..len)
            .filter_map(|i| storage.key(i).ok().flatten())
            .collect())
    }
}

/// The backend a browser session actually runs on.
pub enum BrowserBackend {
    Idb(IdbBackend),
    Local(LocalStorageBackend),
}

impl BrowserBackend {
    /// Prefer IndexedDB; fall back to localStorage when it cannot be opened
    /// (private mode, disabled storage, very old engines).
    pub async fn detect(database_name: &str, store_name: &str) -> Self {
        let idb = IdbBackend::new(database_name, store_name);
        match idb.check_open().await {
            Ok(()) => Self::Idb(idb),
            Err(e) => {
                log::warn!("indexedDB unavailable, using localStorage: {e}");
                Self::Local(LocalStorageBackend)
            }
        }
    }
}

impl KvBackend for BrowserBackend {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        match self {
            Self::Idb(b) => b.get(key).await,
            Self::Local(b) => b.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        match self {
            Self::Idb(b) => b.set(key, value).await,
            Self::Local(b) => b.set(key, value).await,
        }
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        match self {
            Self::Idb(b) => b.remove(key).await,
            Self::Local(b) => b.remove(key).await,
        }
    }

    async fn keys(&self) -> StoreResult<Vec<String>> {
        match self {
            Self::Idb(b) => b.keys().await,
            Self::Local(b) => b.keys().await,
        }
    }
}
