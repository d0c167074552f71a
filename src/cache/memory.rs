//! Process-local [`KeyValueStore`].
//!
//! Mirrors the Redis data model (strings, lists, hashes) closely enough for
//! single-process deployments and tests. Every operation takes the store lock
//! once, so list push+trim is atomic with respect to other callers.

use std::collections::{HashMap, VecDeque};
use async_trait::async_trait;

use super::kv::{CacheError, KeyValueStore};
use super::lock::StoreLock;

const SOURCE: &str = "cache::memory";

#[derive(Debug, Clone)]
enum Slot {
    Value(String),
    List(VecDeque<String>),
    Hash(HashMap<String, String>),
}

pub struct MemoryStore {
    slots: StoreLock<HashMap<String, Slot>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            slots: StoreLock::new(SOURCE, HashMap::new()),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every key.
    pub fn clear(&self) {
        self.slots.write("clear").clear();
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.slots.read("len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn wrong_type(key: &str) -> CacheError {
    CacheError::WrongType {
        key: key.to_string(),
    }
}

/// Resolve an inclusive Redis-style range against a list of `len` elements.
fn resolve_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = isize::try_from(len).ok()?;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        match self.slots.read("get").get(key) {
            None => Ok(None),
            Some(Slot::Value(value)) => Ok(Some(value.clone())),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.slots.write("set").insert(key.to_string(), Slot::Value(value.to_string()));
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.slots.read("exists").contains_key(key))
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.slots.write("delete").remove(key);
        Ok(())
    }

    async fn list_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, CacheError> {
        let slots = self.slots.read("list_range");
        let list = match slots.get(key) {
            None => return Ok(Vec::new()),
            Some(Slot::List(list)) => list,
            Some(_) => return Err(wrong_type(key)),
        };
        Ok(match resolve_range(list.len(), start, stop) {
            Some((from, to)) => list.range(from..=to).cloned().collect(),
            None => Vec::new(),
        })
    }

    async fn list_replace(&self, key: &str, values: &[String]) -> Result<(), CacheError> {
        let mut slots = self.slots.write("list_replace");
        if values.is_empty() {
            slots.remove(key);
        } else {
            slots.insert(key.to_string(), Slot::List(values.iter().cloned().collect()));
        }
        Ok(())
    }

    async fn list_push_existing_trim(
        &self,
        key: &str,
        value: &str,
        max_len: usize,
    ) -> Result<bool, CacheError> {
        let mut slots = self.slots.write("list_push_existing_trim");
        let list = match slots.get_mut(key) {
            None => return Ok(false),
            Some(Slot::List(list)) => list,
            Some(_) => return Err(wrong_type(key)),
        };
        list.push_front(value.to_string());
        list.truncate(max_len);
        if list.is_empty() {
            slots.remove(key);
        }
        Ok(true)
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, CacheError> {
        match self.slots.read("hash_get_all").get(key) {
            None => Ok(HashMap::new()),
            Some(Slot::Hash(fields)) => Ok(fields.clone()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), CacheError> {
        let mut slots = self.slots.write("hash_set");
        let slot = slots
            .entry(key.to_string())
            .or_insert_with(|| Slot::Hash(HashMap::new()));
        match slot {
            Slot::Hash(fields) => {
                fields.insert(field.to_string(), value.to_string());
                Ok(())
            }
            _ => Err(wrong_type(key)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;

    fn values(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[tokio::test]
    async fn list_push_only_applies_to_existing_lists() {
        let store = MemoryStore::new();

        let pushed = store
            .list_push_existing_trim("feed:1", "a", 3)
            .await
            .expect("push succeeds");
        assert!(!pushed);
        assert!(!store.exists("feed:1").await.expect("exists"));

        store
            .list_replace("feed:1", &values(&["b", "c"]))
            .await
            .expect("replace");
        let pushed = store
            .list_push_existing_trim("feed:1", "a", 3)
            .await
            .expect("push succeeds");
        assert!(pushed);
        assert_eq!(
            store.list_range("feed:1", 0, -1).await.expect("range"),
            values(&["a", "b", "c"])
        );
    }

    #[tokio::test]
    async fn list_push_trims_oldest_entries() {
        let store = MemoryStore::new();
        store
            .list_replace("feed:1", &values(&["b", "c", "d"]))
            .await
            .expect("replace");

        store
            .list_push_existing_trim("feed:1", "a", 3)
            .await
            .expect("push");

        assert_eq!(
            store.list_range("feed:1", 0, -1).await.expect("range"),
            values(&["a", "b", "c"])
        );
    }

    #[tokio::test]
    async fn list_range_follows_redis_index_rules() {
        let store = MemoryStore::new();
        store
            .list_replace("l", &values(&["a", "b", "c", "d"]))
            .await
            .expect("replace");

        assert_eq!(
            store.list_range("l", 1, 2).await.expect("range"),
            values(&["b", "c"])
        );
        assert_eq!(
            store.list_range("l", -2, -1).await.expect("range"),
            values(&["c", "d"])
        );
        assert_eq!(
            store.list_range("l", 0, 100).await.expect("range"),
            values(&["a", "b", "c", "d"])
        );
        assert!(store.list_range("l", 5, 9).await.expect("range").is_empty());
        assert!(store.list_range("missing", 0, -1).await.expect("range").is_empty());
    }

    #[tokio::test]
    async fn replacing_with_no_values_removes_the_list() {
        let store = MemoryStore::new();
        store
            .list_replace("l", &values(&["a"]))
            .await
            .expect("replace");
        store.list_replace("l", &[]).await.expect("replace");
        assert!(!store.exists("l").await.expect("exists"));
    }

    #[tokio::test]
    async fn type_confusion_is_reported() {
        let store = MemoryStore::new();
        store.set("k", "v").await.expect("set");

        let err = store
            .list_push_existing_trim("k", "a", 3)
            .await
            .expect_err("string is not a list");
        assert!(matches!(err, CacheError::WrongType { .. }));

        let err = store
            .hash_set("k", "percent", "1")
            .await
            .expect_err("string is not a hash");
        assert!(matches!(err, CacheError::WrongType { .. }));
    }

    #[tokio::test]
    async fn hash_fields_upsert_independently() {
        let store = MemoryStore::new();
        store.hash_set("h", "percent", "10").await.expect("hset");
        store
            .hash_set("h", "description", "rollout")
            .await
            .expect("hset");
        store.hash_set("h", "percent", "20").await.expect("hset");

        let fields = store.hash_get_all("h").await.expect("hgetall");
        assert_eq!(fields.get("percent").map(String::as_str), Some("20"));
        assert_eq!(
            fields.get("description").map(String::as_str),
            Some("rollout")
        );
    }

    #[tokio::test]
    async fn store_recovers_from_poisoned_lock() {
        let store = MemoryStore::new();

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = store
                .slots
                .raw()
                .write()
                .expect("slots lock should be acquired");
            panic!("poison slots lock");
        }));

        store.set("k", "v").await.expect("set after poison");
        assert_eq!(store.get("k").await.expect("get"), Some("v".to_string()));
        store.clear();
        assert!(store.is_empty());
    }
}
