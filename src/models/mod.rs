use crate::config::SyncConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which note a page session edits.
///
/// One identity maps to exactly one record key, one title and one broadcast
/// channel.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NoteIdentity {
    slug: String,
    key: String,
    channel: String,
}

impl NoteIdentity {
    pub fn new(scope: Option<&str>, config: &SyncConfig) -> Self {
        let slug = scope
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(config.default_scope.as_str())
            .to_string();

        Self {
            key: format!("{}{}", config.storage_prefix, slug),
            channel: format!("{}::{}", config.channel_name, slug),
            slug,
        }
    }

    /// Parse the scope out of a `location.search` string (`?note=work&x=1`).
    pub fn from_query(search: &str, config: &SyncConfig) -> Self {
        let scope = search
            .trim_start_matches('?')
            .split('&')
            .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
            .find(|(name, _)| *name == config.scope_param)
            .map(|(_, value)| {
                let value = value.replace('+', " ");
                urlencoding::decode(&value)
                    .map(|v| v.into_owned())
                    .unwrap_or(value)
            });

        Self::new(scope.as_deref(), config)
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn storage_key(&self) -> &str {
        &self.key
    }

    pub fn channel_name(&self) -> &str {
        &self.channel
    }
}

/// Cached listing entry for one note; lets the listing avoid decompressing
/// every record.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct NoteMeta {
    pub slug: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
}

/// slug -> meta, persisted as one JSON record.
pub type MetaIndex = BTreeMap<String, NoteMeta>;
