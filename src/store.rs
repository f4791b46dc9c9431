/*
 *   Copyright (c) 2025 R3BL LLC
 *   All rights reserved.
 *
 *   Licensed under the Apache License, Version 2.0 (the "License");
 *   you may not use this file except in compliance with the License.
 *   You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 *   Unless required by applicable law or agreed to in writing, software
 *   distributed under the License is distributed on an "AS IS" BASIS,
 *   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *   See the License for the specific language governing permissions and
 *   limitations under the License.
 */

//! The persistence seam named out of scope in §1: a key-addressed store with atomic
//! batch upsert and two indexed queries. [`InMemoryStore`] is a concrete implementation
//! good enough to exercise [`crate::coordinator::FetchCoordinator`] end-to-end in tests;
//! a real backend (sqlx, sled, …) plugs in at the same [`Store`] trait.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// One stored record: an item's id, the source it came from, a free-form JSON body, and
/// the instant it was written. `since`/`by_id` are the only two query shapes the
/// coordinator needs (§6); anything richer belongs to the real backend this stands in
/// for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredItem {
    pub id: String,
    pub source: String,
    pub body: serde_json::Value,
    pub stored_at: DateTime<Utc>,
}

/// Failure performing a store operation.
#[derive(Debug, Clone, thiserror::Error, miette::Diagnostic)]
pub enum StoreError {
    #[error("store backend unavailable: {0}")]
    #[diagnostic(code(feedwatch::store::unavailable))]
    Unavailable(String),
}

/// Minimal persistence contract the fetch coordinator depends on.
///
/// `upsert_batch` must be atomic: either every item in the batch lands, or none do, so a
/// sweep's "N items (M new)" summary is never computed against a half-written batch.
#[async_trait]
pub trait Store: Send + Sync {
    /// Inserts or overwrites every item in `items` by id. Returns the count of ids that
    /// were not already present (the "M new" half of the sweep summary).
    async fn upsert_batch(&self, items: Vec<StoredItem>) -> Result<usize, StoreError>;

    /// All items stored at or after `since`, in no particular order.
    async fn since(&self, since: DateTime<Utc>) -> Result<Vec<StoredItem>, StoreError>;

    /// A single item by id, if present.
    async fn by_id(&self, id: &str) -> Result<Option<StoredItem>, StoreError>;
}

/// `tokio::sync::Mutex`-guarded in-process [`Store`]. Sufficient for tests; not durable
/// across process restarts (persistence across restarts is a named non-goal, §1).
#[derive(Default)]
pub struct InMemoryStore {
    items: Mutex<HashMap<String, StoredItem>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn upsert_batch(&self, items: Vec<StoredItem>) -> Result<usize, StoreError> {
        let mut guard = self.items.lock().await;
        let mut new_count = 0;
        for item in items {
            if guard.insert(item.id.clone(), item).is_none() {
                new_count += 1;
            }
        }
        Ok(new_count)
    }

    async fn since(&self, since: DateTime<Utc>) -> Result<Vec<StoredItem>, StoreError> {
        let guard = self.items.lock().await;
        Ok(guard.values().filter(|item| item.stored_at >= since).cloned().collect())
    }

    async fn by_id(&self, id: &str) -> Result<Option<StoredItem>, StoreError> {
        let guard = self.items.lock().await;
        Ok(guard.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, source: &str) -> StoredItem {
        StoredItem {
            id: id.to_string(),
            source: source.to_string(),
            body: serde_json::json!({"title": id}),
            stored_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_batch_reports_only_new_ids() {
        let store = InMemoryStore::new();
        assert_eq!(store.upsert_batch(vec![item("a", "rss")]).await.unwrap(), 1);
        // "a" already exists, "b" is new: one new item this round.
        assert_eq!(
            store.upsert_batch(vec![item("a", "rss"), item("b", "rss")]).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn by_id_finds_stored_item() {
        let store = InMemoryStore::new();
        store.upsert_batch(vec![item("x", "rss")]).await.unwrap();
        let found = store.by_id("x").await.unwrap();
        assert_eq!(found.unwrap().source, "rss");
        assert!(store.by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn since_filters_by_timestamp() {
        let store = InMemoryStore::new();
        let cutoff = Utc::now();
        let mut later = item("y", "rss");
        later.stored_at = cutoff + chrono::Duration::seconds(1);
        store.upsert_batch(vec![later]).await.unwrap();
        assert_eq!(store.since(cutoff).await.unwrap().len(), 1);
        assert_eq!(store.since(cutoff + chrono::Duration::seconds(10)).await.unwrap().len(), 0);
    }
}
