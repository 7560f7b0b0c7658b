use thiserror::Error;
use wasm_bindgen::JsValue;

/// Failure reported by a [`KvBackend`](crate::storage::KvBackend).
///
/// These never reach the user: `NoteStore` logs them and carries on, the
/// live surface stays authoritative until the next successful write.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("storage quota exceeded")]
    QuotaExceeded,

    #[error("storage request failed: {0}")]
    Request(String),

    #[error("metadata index is corrupt: {0}")]
    Index(#[from] serde_json::Error),
}

impl StoreError {
    /// Map a rejected browser storage call (usually a `DOMException`).
    pub(crate) fn from_js(value: &JsValue) -> Self {
        let name = js_sys::Reflect::get(value, &"name".into())
            .ok()
            .and_then(|n| n.as_string())
            .unwrap_or_default();

        if name == "QuotaExceededError" {
            return Self::QuotaExceeded;
        }

        let message = js_sys::Reflect::get(value, &"message".into())
            .ok()
            .and_then(|m| m.as_string())
            .or_else(|| value.as_string())
            .unwrap_or_else(|| "unknown error".to_string());

        if name.is_empty() {
            Self::Request(message)
        } else {
            Self::Request(format!("{name}: {message}"))
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Failures of the session itself. Only these are allowed to stop startup.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("browser window is not available")]
    NoWindow,

    #[error("document is not available")]
    NoDocument,

    #[error("note surface `{0}` not found")]
    SurfaceMissing(String),

    #[error("detached view could not be opened: {0}")]
    DetachedUnavailable(String),

    #[error("document has no body and none could be created")]
    NoBody,
}

impl SessionError {
    pub(crate) fn detached(value: &JsValue) -> Self {
        let message = js_sys::Reflect::get(value, &"message".into())
            .ok()
            .and_then(|m| m.as_string())
            .or_else(|| value.as_string())
            .unwrap_or_else(|| "unknown error".to_string());
        Self::DetachedUnavailable(message)
    }
}
