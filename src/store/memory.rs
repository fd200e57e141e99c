//! In-process document store with optional snapshot persistence.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write as _};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::store::{DocumentStore, Query, StoreError, StoreResult, Write};

type Collections = HashMap<String, BTreeMap<String, Value>>;

/// A document store held in memory.
///
/// When a snapshot path is set every mutation rewrites the snapshot before
/// returning, so a write that returned is a write that survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryStore {
    /// Create an empty store with no persistence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store backed by a snapshot file, loading it if it exists.
    pub fn with_snapshot(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut collections = Collections::new();

        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            collections = serde_json::from_reader(reader)?;
            let documents: usize = collections.values().map(|c| c.len()).sum();
            tracing::info!(
                path = %path.display(),
                collections = collections.len(),
                documents,
                "Loaded store snapshot"
            );
        }

        Ok(Self {
            inner: RwLock::new(collections),
            snapshot_path: Some(path),
        })
    }

    /// Write the snapshot now.
    pub async fn flush(&self) -> StoreResult<()> {
        let guard = self.inner.read().await;
        self.persist(&guard)
    }

    /// Number of documents in a collection.
    pub async fn count(&self, collection: &str) -> usize {
        self.inner
            .read()
            .await
            .get(collection)
            .map(|c| c.len())
            .unwrap_or(0)
    }

    fn persist(&self, collections: &Collections) -> StoreResult<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let tmp = path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer(&mut writer, collections)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

fn merge_into(
    collections: &mut Collections,
    collection: &str,
    id: &str,
    patch: Value,
) -> StoreResult<bool> {
    let Some(existing) = collections.get_mut(collection).and_then(|c| c.get_mut(id)) else {
        return Ok(false);
    };
    let not_an_object = || StoreError::NotAnObject {
        collection: collection.to_string(),
        id: id.to_string(),
    };
    let target: &mut Map<String, Value> = existing.as_object_mut().ok_or_else(not_an_object)?;
    let Value::Object(fields) = patch else {
        return Err(not_an_object());
    };
    for (k, v) in fields {
        target.insert(k, v);
    }
    Ok(true)
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        Ok(self
            .inner
            .read()
            .await
            .get(collection)
            .and_then(|c| c.get(id))
            .cloned())
    }

    async fn put(&self, collection: &str, id: &str, doc: Value) -> StoreResult<()> {
        let mut guard = self.inner.write().await;
        guard
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), doc);
        self.persist(&guard)
    }

    async fn insert_if_absent(&self, collection: &str, id: &str, doc: Value) -> StoreResult<bool> {
        let mut guard = self.inner.write().await;
        let docs = guard.entry(collection.to_string()).or_default();
        if docs.contains_key(id) {
            return Ok(false);
        }
        docs.insert(id.to_string(), doc);
        self.persist(&guard)?;
        Ok(true)
    }

    async fn merge(&self, collection: &str, id: &str, patch: Value) -> StoreResult<bool> {
        let mut guard = self.inner.write().await;
        let merged = merge_into(&mut guard, collection, id, patch)?;
        if merged {
            self.persist(&guard)?;
        }
        Ok(merged)
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        let mut guard = self.inner.write().await;
        let removed = guard
            .get_mut(collection)
            .and_then(|c| c.remove(id))
            .is_some();
        if removed {
            self.persist(&guard)?;
        }
        Ok(removed)
    }

    async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<(String, Value)>> {
        let guard = self.inner.read().await;
        let Some(docs) = guard.get(collection) else {
            return Ok(Vec::new());
        };
        let matching = docs
            .iter()
            .filter(|(_, doc)| query.matches(doc))
            .map(|(id, doc)| (id.clone(), doc.clone()));
        Ok(match query.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }

    async fn batch(&self, writes: Vec<Write>) -> StoreResult<bool> {
        let mut guard = self.inner.write().await;

        // Stage on a copy so a failing write leaves nothing applied
        let mut staged = guard.clone();
        for write in writes {
            match write {
                Write::Check {
                    collection,
                    id,
                    expect,
                } => {
                    let current = staged.get(&collection).and_then(|docs| docs.get(&id));
                    if !expect.holds(current) {
                        return Ok(false);
                    }
                }
                Write::Put { collection, id, doc } => {
                    staged.entry(collection).or_default().insert(id, doc);
                }
                Write::Merge {
                    collection,
                    id,
                    patch,
                } => {
                    merge_into(&mut staged, &collection, &id, patch)?;
                }
                Write::Delete { collection, id } => {
                    if let Some(docs) = staged.get_mut(&collection) {
                        docs.remove(&id);
                    }
                }
            }
        }

        self.persist(&staged)?;
        *guard = staged;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DocumentStoreExt;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        status: String,
        n: u64,
    }

    #[tokio::test]
    async fn test_point_operations() {
        let store = MemoryStore::new();
        assert!(store.get("c", "a").await.unwrap().is_none());

        store.put("c", "a", json!({ "status": "active", "n": 1 })).await.unwrap();
        assert_eq!(store.get("c", "a").await.unwrap().unwrap()["n"], 1);

        assert!(store.merge("c", "a", json!({ "n": 2 })).await.unwrap());
        let doc: Doc = store.get_as("c", "a").await.unwrap().unwrap();
        assert_eq!(doc, Doc { status: "active".into(), n: 2 });

        assert!(!store.merge("c", "missing", json!({ "n": 2 })).await.unwrap());
        assert!(store.delete("c", "a").await.unwrap());
        assert!(!store.delete("c", "a").await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_if_absent() {
        let store = MemoryStore::new();
        assert!(store.insert_if_absent("c", "k", json!({ "n": 1 })).await.unwrap());
        assert!(!store.insert_if_absent("c", "k", json!({ "n": 2 })).await.unwrap());
        assert_eq!(store.get("c", "k").await.unwrap().unwrap()["n"], 1);
    }

    #[tokio::test]
    async fn test_query_filters_and_limit() {
        let store = MemoryStore::new();
        for (id, status, n) in [("a", "active", 1u64), ("b", "failed", 2), ("c", "active", 3)] {
            store
                .put_as("docs", id, &Doc { status: status.into(), n })
                .await
                .unwrap();
        }

        let active: Vec<Doc> = store
            .query_as("docs", &Query::new().equals("status", "active"))
            .await
            .unwrap();
        assert_eq!(active.len(), 2);

        let limited = store
            .query("docs", &Query::new().equals("status", "active").limit(1))
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].0, "a");

        let empty = store.query("nothing", &Query::new()).await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        let store = MemoryStore::new();
        store.put("c", "a", json!({ "n": 1 })).await.unwrap();
        store.put("c", "scalar", json!(5)).await.unwrap();

        let result = store
            .batch(vec![
                Write::merge("c", "a", json!({ "n": 9 })),
                Write::merge("c", "scalar", json!({ "n": 9 })),
            ])
            .await;
        assert!(matches!(result, Err(StoreError::NotAnObject { .. })));
        assert_eq!(store.get("c", "a").await.unwrap().unwrap()["n"], 1);

        store
            .batch(vec![
                Write::merge("c", "a", json!({ "n": 9 })),
                Write::delete("c", "scalar"),
                Write::put("d", "x", json!({})),
            ])
            .await
            .unwrap();
        assert_eq!(store.get("c", "a").await.unwrap().unwrap()["n"], 9);
        assert!(store.get("c", "scalar").await.unwrap().is_none());
        assert_eq!(store.count("d").await, 1);
    }

    #[tokio::test]
    async fn test_batch_checks_gate_every_write() {
        let store = MemoryStore::new();
        store.put("c", "a", json!({ "status": "active", "n": 1 })).await.unwrap();

        let applied = store
            .batch(vec![
                Write::expect_field("c", "a", "status", "failed"),
                Write::merge("c", "a", json!({ "n": 2 })),
                Write::put("d", "x", json!({})),
            ])
            .await
            .unwrap();
        assert!(!applied);
        assert_eq!(store.get("c", "a").await.unwrap().unwrap()["n"], 1);
        assert_eq!(store.count("d").await, 0);

        let applied = store
            .batch(vec![
                Write::expect_field("c", "a", "status", "active"),
                Write::merge("c", "a", json!({ "status": "funded" })),
                Write::expect_absent("d", "x"),
                Write::put("d", "x", json!({})),
            ])
            .await
            .unwrap();
        assert!(applied);
        assert_eq!(store.get("c", "a").await.unwrap().unwrap()["status"], "funded");

        // Checks see writes staged earlier in the same batch
        let applied = store
            .batch(vec![
                Write::put("d", "y", json!({})),
                Write::expect_absent("d", "y"),
            ])
            .await
            .unwrap();
        assert!(!applied);
        assert!(store.get("d", "y").await.unwrap().is_none());
        assert!(!store
            .batch(vec![Write::expect_field("c", "missing", "status", "active")])
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_snapshot_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        {
            let store = MemoryStore::with_snapshot(&path).unwrap();
            store.put("events", "100", json!({ "status": "processing" })).await.unwrap();
        }

        // Every write is already on disk, no flush needed
        let reopened = MemoryStore::with_snapshot(&path).unwrap();
        let doc = reopened.get("events", "100").await.unwrap().unwrap();
        assert_eq!(doc["status"], "processing");
    }
}
