use super::TokenStore;
use crate::error::StoreError;
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;

/// Process-local token store
///
/// Readers take a snapshot without locking; writers publish a new map
/// (last write wins).
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    entries: ArcSwap<HashMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.load().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(key.to_string(), value.to_string());
            Arc::new(next)
        });
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        if self.entries.load().contains_key(key) {
            self.entries.rcu(|current| {
                let mut next = HashMap::clone(current);
                next.remove(key);
                Arc::new(next)
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set_remove() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.get("accessToken").unwrap(), None);

        store.set("accessToken", "A1").unwrap();
        store.set("accessToken", "A2").unwrap();
        assert_eq!(store.get("accessToken").unwrap().as_deref(), Some("A2"));

        store.remove("accessToken").unwrap();
        store.remove("accessToken").unwrap();
        assert_eq!(store.get("accessToken").unwrap(), None);
    }

    #[test]
    fn test_concurrent_writers_keep_every_key() {
        let store = Arc::new(MemoryTokenStore::new());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.set(&format!("key-{i}"), "v").unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for i in 0..8 {
            assert!(store.get(&format!("key-{i}")).unwrap().is_some());
        }
    }
}
