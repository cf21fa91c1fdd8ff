use super::key::Key;
use super::value::Entity;
use super::{lookup, Client};
use crate::transport::HttpTransport;
use crate::utils::error::{Error, Result};
use parking_lot::Mutex;
use serde_json::{json, Value as Json};

/// A single write, applied through [`Client::mutate`] or
/// [`Transaction::mutate`].
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Fails if the entity already exists.
    Insert(Key, Entity),
    Upsert(Key, Entity),
    /// Fails if the entity does not exist.
    Update(Key, Entity),
    Delete(Key),
}

impl Mutation {
    pub fn key(&self) -> &Key {
        match self {
            Mutation::Insert(key, _)
            | Mutation::Upsert(key, _)
            | Mutation::Update(key, _)
            | Mutation::Delete(key) => key,
        }
    }

    pub(crate) fn to_wire(&self, project_id: &str) -> Json {
        let with_key = |key: &Key, entity: &Entity| {
            let mut entity = entity.clone();
            entity.key = Some(key.clone());
            entity.to_wire(project_id)
        };
        match self {
            Mutation::Insert(key, entity) => json!({ "insert": with_key(key, entity) }),
            Mutation::Upsert(key, entity) => json!({ "upsert": with_key(key, entity) }),
            Mutation::Update(key, entity) => json!({ "update": with_key(key, entity) }),
            Mutation::Delete(key) => json!({ "delete": key.to_wire(project_id) }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionOptions {
    pub read_only: bool,
    /// Attempts made by [`Client::run_in_transaction`] before giving up on
    /// contention.
    pub max_attempts: u32,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            read_only: false,
            max_attempts: 3,
        }
    }
}

/// A key written inside a transaction. Incomplete keys are only resolved
/// once the transaction commits, through [`Commit::key`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingKey {
    index: usize,
    key: Key,
    tx_id: String,
}

/// The outcome of a committed transaction.
#[derive(Debug, Clone, Default)]
pub struct Commit {
    tx_id: String,
    keys: Vec<Option<Key>>,
}

impl Commit {
    /// The final key of a pending key, or `None` when the pending key came
    /// from another transaction.
    pub fn key(&self, pending: &PendingKey) -> Option<Key> {
        if pending.tx_id != self.tx_id {
            return None;
        }
        match self.keys.get(pending.index).cloned().flatten() {
            Some(key) => Some(key),
            None if !pending.key.is_incomplete() => Some(pending.key.clone()),
            None => None,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    mutations: Vec<Mutation>,
    finished: bool,
}

/// A read-write (or read-only) transaction. Reads go to the service at once;
/// writes are buffered and sent together by [`commit`](Self::commit).
#[derive(Debug)]
pub struct Transaction {
    transport: HttpTransport,
    project_id: String,
    id: String,
    state: Mutex<State>,
}

impl Transaction {
    pub(crate) async fn begin(client: &Client, options: TransactionOptions) -> Result<Self> {
        let mode = if options.read_only {
            json!({ "readOnly": {} })
        } else {
            json!({ "readWrite": {} })
        };
        let response: Json = client
            .transport
            .post(
                &format!("projects/{}:beginTransaction", client.project_id),
                &[],
                &json!({ "transactionOptions": mode }),
            )
            .await?;
        let id = response
            .get("transaction")
            .and_then(Json::as_str)
            .ok_or_else(|| Error::invalid_response("beginTransaction response without an id"))?
            .to_string();
        tracing::debug!(transaction = %id, read_only = options.read_only, "began transaction");

        Ok(Self {
            transport: client.transport.clone(),
            project_id: client.project_id.clone(),
            id,
            state: Mutex::new(State::default()),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn get(&self, key: &Key) -> Result<Entity> {
        self.ensure_open()?;
        let mut found = self.get_multi(std::slice::from_ref(key)).await?;
        found.pop().flatten().ok_or(Error::NoSuchEntity)
    }

    pub async fn get_multi(&self, keys: &[Key]) -> Result<Vec<Option<Entity>>> {
        self.ensure_open()?;
        lookup(&self.transport, &self.project_id, keys, Some(&self.id)).await
    }

    pub fn put(&self, key: Key, src: Entity) -> Result<PendingKey> {
        self.mutate(vec![Mutation::Upsert(key, src)])
            .map(|mut keys| keys.remove(0))
    }

    pub fn put_multi(&self, keys: Vec<Key>, src: Vec<Entity>) -> Result<Vec<PendingKey>> {
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
    }

    pub fn delete(&self, key: Key) -> Result<()> {
        self.mutate(vec![Mutation::Delete(key)]).map(|_| ())
    }

    pub fn delete_multi(&self, keys: Vec<Key>) -> Result<()> {
        self.mutate(keys.into_iter().map(Mutation::Delete).collect())
            .map(|_| ())
    }

    /// Buffers the mutations until commit.
    pub fn mutate(&self, mutations: Vec<Mutation>) -> Result<Vec<PendingKey>> {
        let mut state = self.state.lock();
        if state.finished {
            return Err(Error::TransactionFinished);
        }
        let start = state.mutations.len();
        let pending = mutations
            .iter()
            .enumerate()
            .map(|(i, m)| PendingKey {
                index: start + i,
                key: m.key().clone(),
                tx_id: self.id.clone(),
            })
            .collect();
        state.mutations.extend(mutations);
        Ok(pending)
    }

    pub async fn commit(&self) -> Result<Commit> {
        let mutations = {
            let mut state = self.state.lock();
            if state.finished {
                return Err(Error::TransactionFinished);
            }
            state.finished = true;
            std::mem::take(&mut state.mutations)
        };

        let keys = commit_mutations(&self.transport, &self.project_id, &mutations, Some(&self.id)).await?;
        tracing::debug!(transaction = %self.id, mutations = mutations.len(), "committed transaction");
        Ok(Commit {
            tx_id: self.id.clone(),
            keys,
        })
    }

    pub async fn rollback(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.finished {
                return Err(Error::TransactionFinished);
            }
            state.finished = true;
            state.mutations.clear();
        }
        self.transport
            .post_empty(
                &format!("projects/{}:rollback", self.project_id),
                &[],
                &json!({ "transaction": self.id }),
            )
            .await
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state.lock().finished {
            return Err(Error::TransactionFinished);
        }
        Ok(())
    }
}

/// Sends one commit request. The returned keys line up with `mutations`;
/// an entry is `Some` only where the service allocated an ID.
pub(crate) async fn commit_mutations(
    transport: &HttpTransport,
    project_id: &str,
    mutations: &[Mutation],
    transaction: Option<&str>,
) -> Result<Vec<Option<Key>>> {
    let mut body = json!({
        "mode": if transaction.is_some() { "TRANSACTIONAL" } else { "NON_TRANSACTIONAL" },
        "mutations": mutations.iter().map(|m| m.to_wire(project_id)).collect::<Vec<_>>(),
    });
    if let Some(tx) = transaction {
        body["transaction"] = json!(tx);
    }

    let response: Json = transport
        .post(&format!("projects/{}:commit", project_id), &[], &body)
        .await?;
    let results = response
        .get("mutationResults")
        .and_then(Json::as_array)
        .cloned()
        .unwrap_or_default();

    let mut keys = Vec::with_capacity(mutations.len());
    for i in 0..mutations.len() {
        let key = results
            .get(i)
            .and_then(|r| r.get("key"))
            .map(Key::from_wire)
            .transpose()?;
        keys.push(key);
    }
    Ok(keys)
}
