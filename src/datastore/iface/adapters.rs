use super::{Client, Commit, QueryIterator, Transaction, TransactionFn};
use crate::datastore::{self, Cursor, Entity, Key, Mutation, PendingKey, Query, TransactionOptions};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Adapts a [`datastore::Client`] so that it satisfies the [`Client`] trait.
pub fn adapt_client(client: datastore::Client) -> Box<dyn Client> {
    Box::new(ClientAdapter(Arc::new(client)))
}

struct ClientAdapter(Arc<datastore::Client>);
struct TransactionAdapter(Arc<datastore::Transaction>);
struct IteratorAdapter(datastore::QueryIterator);
struct CommitAdapter(datastore::Commit);

#[async_trait]
impl Client for ClientAdapter {
    fn close(&self) -> Result<()> {
        self.0.close()
    }

    async fn allocate_ids(&self, keys: &[Key]) -> Result<Vec<Key>> {
        self.0.allocate_ids(keys).await
    }

    async fn count(&self, query: &Query) -> Result<usize> {
        self.0.count(query).await
    }

    async fn delete(&self, key: &Key) -> Result<()> {
        self.0.delete(key).await
    }

    async fn delete_multi(&self, keys: &[Key]) -> Result<()> {
        self.0.delete_multi(keys).await
    }

    async fn get(&self, key: &Key) -> Result<Entity> {
        self.0.get(key).await
    }

    async fn get_all(&self, query: &Query) -> Result<(Vec<Key>, Vec<Entity>)> {
        self.0.get_all(query).await
    }

    async fn get_multi(&self, keys: &[Key]) -> Result<Vec<Option<Entity>>> {
        self.0.get_multi(keys).await
    }

    async fn mutate(&self, mutations: Vec<Mutation>) -> Result<Vec<Key>> {
        self.0.mutate(mutations).await
    }

    async fn new_transaction(&self, options: TransactionOptions) -> Result<Box<dyn Transaction>> {
        let tx = self.0.new_transaction(options).await?;
        Ok(Box::new(TransactionAdapter(Arc::new(tx))))
    }

    async fn put(&self, key: Key, src: Entity) -> Result<Key> {
        self.0.put(key, src).await
    }

    async fn put_multi(&self, keys: Vec<Key>, src: Vec<Entity>) -> Result<Vec<Key>> {
        self.0.put_multi(keys, src).await
    }

    fn run(&self, query: Query) -> Box<dyn QueryIterator> {
        Box::new(IteratorAdapter(self.0.run(query)))
    }

    async fn run_in_transaction(
        &self,
        f: TransactionFn,
        options: TransactionOptions,
    ) -> Result<Box<dyn Commit>> {
        let commit = self
            .0
            .run_in_transaction(
                move |tx| {
                    let tx: Arc<dyn Transaction> = Arc::new(TransactionAdapter(tx));
                    f(tx)
                },
                options,
            )
            .await?;
        Ok(Box::new(CommitAdapter(commit)))
    }
}

#[async_trait]
impl Transaction for TransactionAdapter {
    async fn commit(&self) -> Result<Box<dyn Commit>> {
        let commit = self.0.commit().await?;
        Ok(Box::new(CommitAdapter(commit)))
    }

    fn delete(&self, key: Key) -> Result<()> {
        self.0.delete(key)
    }

    fn delete_multi(&self, keys: Vec<Key>) -> Result<()> {
        self.0.delete_multi(keys)
    }

    async fn get(&self, key: &Key) -> Result<Entity> {
        self.0.get(key).await
    }

    async fn get_multi(&self, keys: &[Key]) -> Result<Vec<Option<Entity>>> {
        self.0.get_multi(keys).await
    }

    fn mutate(&self, mutations: Vec<Mutation>) -> Result<Vec<PendingKey>> {
        self.0.mutate(mutations)
    }

    fn put(&self, key: Key, src: Entity) -> Result<PendingKey> {
        self.0.put(key, src)
    }

    fn put_multi(&self, keys: Vec<Key>, src: Vec<Entity>) -> Result<Vec<PendingKey>> {
        self.0.put_multi(keys, src)
    }

    async fn rollback(&self) -> Result<()> {
        self.0.rollback().await
    }
}

#[async_trait]
impl QueryIterator for IteratorAdapter {
    fn cursor(&self) -> Result<Cursor> {
        self.0.cursor()
    }

    async fn next(&mut self) -> Result<Option<(Key, Entity)>> {
        self.0.next().await
    }
}

impl Commit for CommitAdapter {
    fn key(&self, pending: &PendingKey) -> Option<Key> {
        self.0.key(pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::iface::transaction_fn;
    use crate::transport::HttpTransport;
    use crate::Error;
    use httpmock::prelude::*;
    use serde_json::json;

    fn adapted(server: &MockServer) -> Box<dyn Client> {
        adapt_client(datastore::Client::new(
            "proj",
            HttpTransport::new(&server.url("/v1/")).unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_service_errors_pass_through_unchanged() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/projects/proj:lookup");
            then.status(403).json_body(json!({"error": {
                "code": 403, "message": "missing permission", "status": "PERMISSION_DENIED"
            }}));
        });

        let err = adapted(&server)
            .get(&Key::with_id("Task", 1, None))
            .await
            .unwrap_err();
        match err {
            Error::Api { status, code, message } => {
                assert_eq!(status, 403);
                assert_eq!(code, "PERMISSION_DENIED");
                assert_eq!(message, "missing permission");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_in_transaction_resolves_pending_keys() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/projects/proj:beginTransaction");
            then.status(200).json_body(json!({"transaction": "dHgx"}));
        });
        let commit = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/projects/proj:commit")
                .body_contains("\"transaction\":\"dHgx\"");
            then.status(200).json_body(json!({"mutationResults": [{
                "key": {"partitionId": {"projectId": "proj"}, "path": [{"kind": "Task", "id": "5"}]}
            }]}));
        });

        let pending = Arc::new(parking_lot::Mutex::new(None));
        let slot = pending.clone();
        let body = transaction_fn(move |tx| {
            let slot = slot.clone();
            async move {
                let key = tx.put(Key::incomplete("Task", None), Entity::new())?;
                *slot.lock() = Some(key);
                Ok::<(), Error>(())
            }
        });

        let result = adapted(&server)
            .run_in_transaction(body, TransactionOptions::default())
            .await
            .unwrap();

        commit.assert();
        let pending = pending.lock().clone().unwrap();
        assert_eq!(result.key(&pending), Some(Key::with_id("Task", 5, None)));
    }
}
