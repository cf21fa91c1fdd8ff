//! A map-backed document store standing in for the datastore traits.

use async_trait::async_trait;
use cloud_iface::datastore::iface::Client;
use cloud_iface::datastore::{Entity, Key};
use cloud_iface::{Error, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Default)]
struct MemoryStore {
    entities: Mutex<HashMap<Key, Entity>>,
    next_id: AtomicI64,
}

#[async_trait]
impl Client for MemoryStore {
    async fn get(&self, key: &Key) -> Result<Entity> {
        self.entities
            .lock()
            .get(key)
            .cloned()
            .ok_or(Error::NoSuchEntity)
    }

    async fn put(&self, mut key: Key, src: Entity) -> Result<Key> {
        if key.is_incomplete() {
            key.id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        }
        self.entities.lock().insert(key.clone(), src);
        Ok(key)
    }

    async fn delete(&self, key: &Key) -> Result<()> {
        self.entities.lock().remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Task {
    description: String,
    done: bool,
    priority: i64,
}

#[tokio::test]
async fn test_put_get_delete_then_not_found() {
    let store = MemoryStore::default();
    let client: &dyn Client = &store;
    let task = Task {
        description: "write docs".to_string(),
        done: false,
        priority: 4,
    };

    let key = client
        .put(Key::incomplete("Task", None), Entity::from_serializable(&task).unwrap())
        .await
        .unwrap();
    assert!(!key.is_incomplete());
    assert_eq!(key.to_string(), "/Task,1");

    let loaded: Task = client.get(&key).await.unwrap().deserialize().unwrap();
    assert_eq!(loaded, task);

    client.delete(&key).await.unwrap();
    let err = client.get(&key).await.unwrap_err();
    assert!(matches!(err, Error::NoSuchEntity));
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_named_keys_are_kept() {
    let store = MemoryStore::default();
    let key = Key::with_name("Task", "sample", None);
    let mut entity = Entity::new();
    entity.set("description", "named").set("done", true);

    let stored = store.put(key.clone(), entity).await.unwrap();
    assert_eq!(stored, key);
    assert_eq!(store.get(&key).await.unwrap().get("done"), Some(&true.into()));
}

#[tokio::test]
async fn test_methods_the_fake_skips_still_fail_cleanly() {
    let store = MemoryStore::default();
    assert!(matches!(
        store.allocate_ids(&[]).await,
        Err(Error::Unimplemented {
            method: "Client::allocate_ids"
        })
    ));
    assert!(store.close().is_err());
}
