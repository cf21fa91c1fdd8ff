//! Document store client over the Datastore REST v1 API.
//!
//! Entities are schemaless property maps ([`Entity`]); typed structs move in
//! and out of them through serde with [`Entity::from_serializable`] and
//! [`Entity::deserialize`].

pub mod iface;
mod key;
mod query;
mod transaction;
mod value;

pub use key::Key;
pub use query::{Cursor, Filter, FilterOp, Order, Query, QueryIterator};
pub use transaction::{Commit, Mutation, PendingKey, Transaction, TransactionOptions};
pub use value::{Entity, Value};

use crate::config::{ClientConfig, ServiceKind};
use crate::transport::HttpTransport;
use crate::utils::error::{Error, Result};
use serde_json::{json, Value as Json};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use transaction::commit_mutations;

#[derive(Debug, Clone)]
pub struct Client {
    project_id: String,
    transport: HttpTransport,
}

impl Client {
    pub fn new(project_id: impl Into<String>, transport: HttpTransport) -> Self {
        Self {
            project_id: project_id.into(),
            transport,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let transport = HttpTransport::from_config(config, ServiceKind::Datastore)?;
        Ok(Self::new(config.project_id.clone(), transport))
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Nothing is held open between calls, so closing only exists for parity
    /// with clients that do hold connections.
    pub fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Asks the service to assign IDs to incomplete keys without writing
    /// anything.
    pub async fn allocate_ids(&self, keys: &[Key]) -> Result<Vec<Key>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let body = json!({
            "keys": keys.iter().map(|k| k.to_wire(&self.project_id)).collect::<Vec<_>>(),
        });
        let response: Json = self
            .transport
            .post(&format!("projects/{}:allocateIds", self.project_id), &[], &body)
            .await?;

        response
            .get("keys")
            .and_then(Json::as_array)
            .map(|keys| keys.iter().map(Key::from_wire).collect())
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    /// Number of results `query` would return, counted over a keys-only run.
    pub async fn count(&self, query: &Query) -> Result<usize> {
        let mut it = self.run(query.clone().keys_only());
        let mut n = 0;
        while it.next().await?.is_some() {
            n += 1;
        }
        Ok(n)
    }

    pub async fn delete(&self, key: &Key) -> Result<()> {
        self.delete_multi(std::slice::from_ref(key)).await
    }

    pub async fn delete_multi(&self, keys: &[Key]) -> Result<()> {
        let mutations: Vec<Mutation> = keys.iter().cloned().map(Mutation::Delete).collect();
        self.mutate(mutations).await.map(|_| ())
    }

    /// Fails with [`Error::NoSuchEntity`] when nothing is stored under `key`.
    pub async fn get(&self, key: &Key) -> Result<Entity> {
        let mut found = self.get_multi(std::slice::from_ref(key)).await?;
        found.pop().flatten().ok_or(Error::NoSuchEntity)
    }

    /// Runs `query` to completion, returning keys and entities in result
    /// order.
    pub async fn get_all(&self, query: &Query) -> Result<(Vec<Key>, Vec<Entity>)> {
        let mut it = self.run(query.clone());
        let mut keys = Vec::new();
        let mut entities = Vec::new();
        while let Some((key, entity)) = it.next().await? {
            keys.push(key);
            entities.push(entity);
        }
        Ok((keys, entities))
    }

    /// One slot per key, `None` where the entity does not exist.
    pub async fn get_multi(&self, keys: &[Key]) -> Result<Vec<Option<Entity>>> {
        lookup(&self.transport, &self.project_id, keys, None).await
    }

    /// Applies the mutations atomically and returns their keys, completed
    /// where the service allocated an ID.
    pub async fn mutate(&self, mutations: Vec<Mutation>) -> Result<Vec<Key>> {
        if mutations.is_empty() {
            return Ok(Vec::new());
        }
        let allocated = commit_mutations(&self.transport, &self.project_id, &mutations, None).await?;
        Ok(mutations
            .iter()
            .zip(allocated)
            .map(|(m, key)| key.unwrap_or_else(|| m.key().clone()))
            .collect())
    }

    pub async fn new_transaction(&self, options: TransactionOptions) -> Result<Transaction> {
        Transaction::begin(self, options).await
    }

    pub async fn put(&self, key: Key, src: Entity) -> Result<Key> {
        let mut keys = self.mutate(vec![Mutation::Upsert(key, src)]).await?;
        keys.pop()
            .ok_or_else(|| Error::invalid_response("commit returned no key"))
    }

    pub async fn put_multi(&self, keys: Vec<Key>, src: Vec<Entity>) -> Result<Vec<Key>> {
        if keys.len() != src.len() {
            return Err(Error::InvalidConfigValue {
                field: "src".to_string(),
                value: src.len().to_string(),
                reason: format!("expected {} entities, one per key", keys.len()),
            });
        }
        self.mutate(
            keys.into_iter()
                .zip(src)
                .map(|(key, entity)| Mutation::Upsert(key, entity))
                .collect(),
        )
        .await
    }

    /// Starts `query`; results are fetched lazily by the iterator.
    pub fn run(&self, query: Query) -> QueryIterator {
        QueryIterator::new(self.transport.clone(), &self.project_id, query)
    }

    /// Runs `f` inside a fresh transaction and commits it, starting over
    /// when the service reports contention. An error from `f` rolls the
    /// transaction back and is returned as is.
    pub async fn run_in_transaction<F, Fut>(&self, f: F, options: TransactionOptions) -> Result<Commit>
    where
        F: Fn(Arc<Transaction>) -> Fut + Send + Sync,
        Fut: Future<Output = Result<()>> + Send,
    {
        let attempts = options.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let tx = Arc::new(self.new_transaction(options).await?);

            let outcome = match f(tx.clone()).await {
                Ok(()) => tx.commit().await,
                Err(e) => {
                    if let Err(rollback) = tx.rollback().await {
                        tracing::debug!(error = %rollback, "rollback after failed transaction body");
                    }
                    Err(e)
                }
            };

            match outcome {
                Err(e) if e.is_aborted() && attempt < attempts => {
                    tracing::warn!(attempt, "transaction aborted by contention, retrying");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

/// Lookup results are matched back to requested keys through their wire
/// form, which tells numeric IDs from names that read alike.
fn identity(project_id: &str, key: &Key) -> String {
    key.to_wire(project_id).to_string()
}

/// Looks up `keys`, following deferred keys until every key is either found
/// or reported missing.
pub(crate) async fn lookup(
    transport: &HttpTransport,
    project_id: &str,
    keys: &[Key],
    transaction: Option<&str>,
) -> Result<Vec<Option<Entity>>> {
    let mut found: HashMap<String, Entity> = HashMap::new();
    let mut remaining: Vec<Json> = keys.iter().map(|k| k.to_wire(project_id)).collect();

    while !remaining.is_empty() {
        let mut body = json!({ "keys": remaining });
        if let Some(tx) = transaction {
            body["readOptions"] = json!({ "transaction": tx });
        }
        let response: Json = transport
            .post(&format!("projects/{}:lookup", project_id), &[], &body)
            .await?;

        for result in response
            .get("found")
            .and_then(Json::as_array)
            .into_iter()
            .flatten()
        {
            if let Some(wire) = result.get("entity") {
                let entity = Entity::from_wire(wire)?;
                if let Some(key) = &entity.key {
                    found.insert(identity(project_id, key), entity.clone());
                }
            }
        }

        remaining = response
            .get("deferred")
            .and_then(Json::as_array)
            .cloned()
            .unwrap_or_default();
        if !remaining.is_empty() {
            tracing::debug!(deferred = remaining.len(), "lookup deferred keys");
        }
    }

    Ok(keys
        .iter()
        .map(|k| found.get(&identity(project_id, k)).cloned())
        .collect())
}
