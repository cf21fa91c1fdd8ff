//! Trait-shaped view of the [`datastore`](crate::datastore) client.
//!
//! Keys, entities, queries, mutations and pending keys are plain data and
//! are shared with the concrete client; only the objects that talk to the
//! service are traits. Default bodies fail with
//! [`Error::Unimplemented`](crate::Error::Unimplemented).

mod adapters;

pub use adapters::adapt_client;

use crate::datastore::{Cursor, Entity, Key, Mutation, PendingKey, Query, TransactionOptions};
use crate::utils::error::{unimplemented, unimplemented_default, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

/// Body of [`Client::run_in_transaction`]. It may run more than once.
pub type TransactionFn = Arc<dyn Fn(Arc<dyn Transaction>) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Boxes an async closure into a [`TransactionFn`].
pub fn transaction_fn<F, Fut>(f: F) -> TransactionFn
where
    F: Fn(Arc<dyn Transaction>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |tx| Box::pin(f(tx)))
}

#[async_trait]
pub trait Client: Send + Sync {
    fn close(&self) -> Result<()> {
        unimplemented("Client::close")
    }

    async fn allocate_ids(&self, _keys: &[Key]) -> Result<Vec<Key>> {
        unimplemented("Client::allocate_ids")
    }

    async fn count(&self, _query: &Query) -> Result<usize> {
        unimplemented("Client::count")
    }

    async fn delete(&self, _key: &Key) -> Result<()> {
        unimplemented("Client::delete")
    }

    async fn delete_multi(&self, _keys: &[Key]) -> Result<()> {
        unimplemented("Client::delete_multi")
    }

    async fn get(&self, _key: &Key) -> Result<Entity> {
        unimplemented("Client::get")
    }

    async fn get_all(&self, _query: &Query) -> Result<(Vec<Key>, Vec<Entity>)> {
        unimplemented("Client::get_all")
    }

    async fn get_multi(&self, _keys: &[Key]) -> Result<Vec<Option<Entity>>> {
        unimplemented("Client::get_multi")
    }

    async fn mutate(&self, _mutations: Vec<Mutation>) -> Result<Vec<Key>> {
        unimplemented("Client::mutate")
    }

    async fn new_transaction(&self, _options: TransactionOptions) -> Result<Box<dyn Transaction>> {
        unimplemented("Client::new_transaction")
    }

    async fn put(&self, _key: Key, _src: Entity) -> Result<Key> {
        unimplemented("Client::put")
    }

    async fn put_multi(&self, _keys: Vec<Key>, _src: Vec<Entity>) -> Result<Vec<Key>> {
        unimplemented("Client::put_multi")
    }

    fn run(&self, _query: Query) -> Box<dyn QueryIterator> {
        Box::new(placeholder("Client::run"))
    }

    async fn run_in_transaction(
        &self,
        _f: TransactionFn,
        _options: TransactionOptions,
    ) -> Result<Box<dyn Commit>> {
        unimplemented("Client::run_in_transaction")
    }
}

#[async_trait]
pub trait Transaction: Send + Sync {
    async fn commit(&self) -> Result<Box<dyn Commit>> {
        unimplemented("Transaction::commit")
    }

    fn delete(&self, _key: Key) -> Result<()> {
        unimplemented("Transaction::delete")
    }

    fn delete_multi(&self, _keys: Vec<Key>) -> Result<()> {
        unimplemented("Transaction::delete_multi")
    }

    async fn get(&self, _key: &Key) -> Result<Entity> {
        unimplemented("Transaction::get")
    }

    async fn get_multi(&self, _keys: &[Key]) -> Result<Vec<Option<Entity>>> {
        unimplemented("Transaction::get_multi")
    }

    fn mutate(&self, _mutations: Vec<Mutation>) -> Result<Vec<PendingKey>> {
        unimplemented("Transaction::mutate")
    }

    fn put(&self, _key: Key, _src: Entity) -> Result<PendingKey> {
        unimplemented("Transaction::put")
    }

    fn put_multi(&self, _keys: Vec<Key>, _src: Vec<Entity>) -> Result<Vec<PendingKey>> {
        unimplemented("Transaction::put_multi")
    }

    async fn rollback(&self) -> Result<()> {
        unimplemented("Transaction::rollback")
    }
}

#[async_trait]
pub trait QueryIterator: Send {
    fn cursor(&self) -> Result<Cursor> {
        unimplemented("QueryIterator::cursor")
    }

    async fn next(&mut self) -> Result<Option<(Key, Entity)>> {
        unimplemented("QueryIterator::next")
    }
}

pub trait Commit: Send + Sync {
    fn key(&self, _pending: &PendingKey) -> Option<Key> {
        unimplemented_default("Commit::key")
    }
}

/// Returned by default factory methods; implements every trait of this
/// module with nothing but the defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unimplemented;

impl Client for Unimplemented {}
impl Transaction for Unimplemented {}
impl QueryIterator for Unimplemented {}
impl Commit for Unimplemented {}

fn placeholder(method: &'static str) -> Unimplemented {
    unimplemented_default::<()>(method);
    Unimplemented
}
