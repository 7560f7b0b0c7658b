use serde::{Deserialize, Serialize};

/// Tunables for the synchronization core.
///
/// Every field has a default, so a partial `window.ENV` (or an empty JSON
/// object) is a valid configuration.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Record key = prefix + scope.
    pub storage_prefix: String,
    /// Fixed key of the JSON metadata index.
    pub meta_index_key: String,
    pub default_scope: String,
    /// Query parameter carrying the note scope (`?note=work`).
    pub scope_param: String,

    pub persist_debounce_ms: u32,
    pub title_debounce_ms: u32,
    /// Upper bound for waiting on an idle point before writing the title.
    pub title_idle_timeout_ms: u32,

    pub channel_name: String,

    pub database_name: String,
    pub store_name: String,

    pub detached_width: u32,
    pub detached_height: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            storage_prefix: "scratchnote::".to_string(),
            meta_index_key: "scratchnote_meta_index".to_string(),
            default_scope: "root".to_string(),
            scope_param: "note".to_string(),
            persist_debounce_ms: 400,
            title_debounce_ms: 150,
            title_idle_timeout_ms: 500,
            channel_name: "scratchnote_sync".to_string(),
            database_name: "scratchnote".to_string(),
            store_name: "notes".to_string(),
            detached_width: 420,
            detached_height: 560,
        }
    }
}

impl SyncConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Read overrides from `window.ENV`.
    ///
    /// Both `window.ENV.SYNC` (documented) and a flat `window.ENV` are accepted.
    pub fn from_env() -> Self {
        let Some(window) = web_sys::window() else {
            return Self::default();
        };
        let Some(env) = window.get("ENV") else {
            return Self::default();
        };
        if env.is_undefined() || !env.is_object() {
            return Self::default();
        }

        let scoped = js_sys::Reflect::get(&env, &"SYNC".into())
            .ok()
            .filter(|v| v.is_object());
        let source = scoped.unwrap_or_else(|| env.into());

        let json = js_sys::JSON::stringify(&source)
            .ok()
            .and_then(|s| s.as_string());
        match json {
            Some(json) => Self::from_json(&json).unwrap_or_else(|e| {
                log::warn!("ignoring malformed window.ENV sync config: {e}");
                Self::default()
            }),
            None => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_yields_defaults() {
        let cfg = SyncConfig::from_json("{}").expect("empty object should parse");
        assert_eq!(cfg, SyncConfig::default());
        assert_eq!(cfg.default_scope, "root");
    }

    #[test]
    fn test_partial_override_keeps_other_defaults() {
        let cfg = SyncConfig::from_json(r#"{"persist_debounce_ms": 250, "scope_param": "s"}"#)
            .expect("partial config should parse");
        assert_eq!(cfg.persist_debounce_ms, 250);
        assert_eq!(cfg.scope_param, "s");
        assert_eq!(cfg.storage_prefix, "scratchnote::");
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let cfg = SyncConfig::from_json(r#"{"API_URL": "http://x"}"#).expect("should parse");
        assert_eq!(cfg, SyncConfig::default());
    }
}
