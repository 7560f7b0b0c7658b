use super::{codec, KvBackend, NoteStore};
use crate::error::StoreError;
use crate::markup::derive_title;
use crate::models::{MetaIndex, NoteMeta};
use std::collections::BTreeSet;

/// An entry that cannot have come from a save of the record under `slug`:
/// derived titles are never blank, and no save is stamped in the future.
fn is_stale(slug: &str, meta: &NoteMeta, now_ms: i64) -> bool {
    meta.slug != slug || meta.title.trim().is_empty() || meta.updated_at > now_ms
}

impl<B: KvBackend> NoteStore<B> {
    /// The index is plain JSON (not run through the record codec) so it can
    /// be read without touching any note.
    pub(crate) async fn read_index(&self) -> MetaIndex {
        let json = match self.backend.get(&self.meta_key).await {
            Ok(Some(json)) => json,
            Ok(None) => return MetaIndex::new(),
            Err(e) => {
                log::warn!("metadata index read failed: {e}");
                return MetaIndex::new();
            }
        };

        // A corrupt index is rebuilt by the next listing.
        serde_json::from_str(&json)
            .map_err(StoreError::from)
            .unwrap_or_else(|e| {
                log::warn!("{e}, starting over");
                MetaIndex::new()
            })
    }

    async fn write_index(&self, index: &MetaIndex) {
        let json = match serde_json::to_string(index) {
            Ok(json) => json,
            Err(e) => {
                log::warn!("metadata index serialization failed: {e}");
                return;
            }
        };
        if let Err(e) = self.backend.set(&self.meta_key, &json).await {
            log::warn!("metadata index write failed: {e}");
        }
    }

    pub(crate) async fn upsert_meta(&self, slug: &str, title: String, now_ms: i64) {
        let mut index = self.read_index().await;
        index.insert(
            slug.to_string(),
            NoteMeta {
                slug: slug.to_string(),
                title,
                updated_at: now_ms,
            },
        );
        self.write_index(&index).await;
    }

    pub(crate) async fn remove_meta(&self, slug: &str) {
        let mut index = self.read_index().await;
        if index.remove(slug).is_some() {
            self.write_index(&index).await;
        }
    }

    /// Every stored note, newest first.
    ///
    /// Repairs the index on the way: records without an entry, or with a stale
    /// one, get a fresh entry (title derived from content, stamped `now_ms`);
    /// entries without a record are dropped. The index is only rewritten when
    /// something changed.
    pub async fn list_notes(&self, now_ms: i64) -> Vec<NoteMeta> {
        let _guard = self.write_lock.lock().await;

        let present: BTreeSet<String> = self
            .keys()
            .await
            .iter()
            .filter_map(|k| self.slug_of(k))
            .map(str::to_string)
            .collect();

        let stored = self.read_index().await;
        let mut index: MetaIndex = stored
            .iter()
            .filter(|(slug, _)| present.contains(*slug))
            .map(|(slug, meta)| (slug.clone(), meta.clone()))
            .collect();

        let missing: Vec<String> = present
            .iter()
            .filter(|s| index.get(*s).map_or(true, |meta| is_stale(s, meta, now_ms)))
            .cloned()
            .collect();
        for slug in missing {
            let Some(markup) = self.get(&self.key_of(&slug)).await else {
                continue;
            };
            index.insert(
                slug.clone(),
                NoteMeta {
                    slug,
                    title: derive_title(&markup),
                    updated_at: now_ms,
                },
            );
        }

        if index != stored {
            log::debug!("metadata index regenerated ({} notes)", index.len());
            self.write_index(&index).await;
        }

        let mut notes: Vec<NoteMeta> = index.into_values().collect();
        notes.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.slug.cmp(&b.slug))
        });
        notes
    }

    /// Title of a stored note, read from its content.
    pub async fn read_title(&self, slug: &str) -> Option<String> {
        let stored = self.backend.get(&self.key_of(slug)).await.ok()??;
        Some(derive_title(&codec::decode_record(&stored)))
    }
}

#[cfg(test)]
mod tests {
    use crate::config::SyncConfig;
    use crate::models::NoteIdentity;
    use crate::storage::{codec, MemoryBackend, NoteStore};
    use futures::executor::block_on;

    #[test]
    fn test_list_regenerates_missing_entries_and_drops_orphans() {
        let cfg = SyncConfig::default();
        let backend = MemoryBackend::default();
        let store = NoteStore::new(backend.clone(), &cfg);

        let kept = NoteIdentity::new(Some("kept"), &cfg);
        block_on(store.save_note(&kept, "<div>kept</div>", "kept".to_string(), 5));
        // Record written by an older build, no index entry.
        backend.insert_raw(
            "scratchnote::legacy",
            &codec::compress("<div>Shopping</div><div>milk</div>"),
        );
        // Index entry whose record vanished.
        let gone = NoteIdentity::new(Some("gone"), &cfg);
        block_on(store.save_note(&gone, "<div>gone</div>", "gone".to_string(), 7));
        backend.insert_raw("unrelated", "x");
        block_on(async {
            use crate::storage::KvBackend;
            backend.remove("scratchnote::gone").await.expect("remove");
        });

        let notes = block_on(store.list_notes(100));
        let slugs: Vec<&str> = notes.iter().map(|m| m.slug.as_str()).collect();
        assert_eq!(slugs, vec!["legacy", "kept"]);
        assert_eq!(notes[0].title, "Shopping");
        assert_eq!(notes[0].updated_at, 100);

        let index = block_on(store.read_index());
        assert!(index.contains_key("legacy"));
        assert!(!index.contains_key("gone"));
    }

    #[test]
    fn test_list_regenerates_stale_entries() {
        let cfg = SyncConfig::default();
        let backend = MemoryBackend::default();
        let store = NoteStore::new(backend.clone(), &cfg);
        backend.insert_raw("scratchnote::blank", &codec::compress("<div>Blank</div>"));
        backend.insert_raw("scratchnote::ahead", &codec::compress("<div>Ahead</div>"));
        backend.insert_raw("scratchnote::fine", &codec::compress("<div>Fine</div>"));
        backend.insert_raw(
            &cfg.meta_index_key,
            r#"{
                "blank": {"slug": "blank", "updatedAt": 4},
                "ahead": {"slug": "ahead", "title": "old", "updatedAt": 9000},
                "fine": {"slug": "fine", "title": "Fine", "updatedAt": 2}
            }"#,
        );

        let notes = block_on(store.list_notes(10));
        let listed: Vec<(&str, &str, i64)> = notes
            .iter()
            .map(|m| (m.slug.as_str(), m.title.as_str(), m.updated_at))
            .collect();
        assert_eq!(
            listed,
            vec![("ahead", "Ahead", 10), ("blank", "Blank", 10), ("fine", "Fine", 2)]
        );
        assert_eq!(block_on(store.read_index()).get("blank").map(|m| m.updated_at), Some(10));
    }

    #[test]
    fn test_list_does_not_rewrite_a_clean_index() {
        let cfg = SyncConfig::default();
        let backend = MemoryBackend::default();
        let store = NoteStore::new(backend.clone(), &cfg);
        let note = NoteIdentity::new(None, &cfg);
        block_on(store.save_note(&note, "<div>a</div>", "a".to_string(), 1));

        let before = backend.writes_to(&cfg.meta_index_key);
        let notes = block_on(store.list_notes(50));
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].updated_at, 1);
        assert_eq!(backend.writes_to(&cfg.meta_index_key), before);
    }

    #[test]
    fn test_corrupt_index_is_rebuilt() {
        let cfg = SyncConfig::default();
        let backend = MemoryBackend::default();
        let store = NoteStore::new(backend.clone(), &cfg);
        backend.insert_raw(&cfg.meta_index_key, "{not json");
        backend.insert_raw("scratchnote::root", &codec::compress("<div>hi</div>"));

        let notes = block_on(store.list_notes(3));
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "hi");
    }

    #[test]
    fn test_read_title_uses_first_line() {
        let cfg = SyncConfig::default();
        let backend = MemoryBackend::default();
        let store = NoteStore::new(backend.clone(), &cfg);
        backend.insert_raw("scratchnote::root", "<div><br></div><div>Plan</div>");
        assert_eq!(block_on(store.read_title("root")).as_deref(), Some("Plan"));
        assert_eq!(block_on(store.read_title("nope")), None);
    }
}
