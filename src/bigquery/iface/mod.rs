//! Trait-shaped view of the [`bigquery`](crate::bigquery) client.
//!
//! [`adapt_client`] wraps a real client; tests can implement the traits on
//! fakes instead. Defaults fail with
//! [`Error::Unimplemented`](crate::Error::Unimplemented) or return empty
//! values, so a fake only implements what it needs.
//!
//! Configuration types that refer to tables ([`CopyConfig`],
//! [`QueryConfig`], ...) shadow those fields with [`Table`] trait objects.

mod adapters;
mod structs;

pub use adapters::adapt_client;
pub use structs::{
    AccessEntry, CopyConfig, DatasetMetadata, DatasetMetadataToUpdate, ExtractConfig, LoadConfig,
    QueryConfig,
};

use crate::bigquery::{
    self, decode_row_into, GcsReference, InsertRow, JobConfig, JobIdConfig, JobStatus, LoadSource,
    PageInfo, Schema, State, TableMetadata, TableMetadataToUpdate, Value,
};
use crate::utils::error::{unimplemented, unimplemented_default, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;

#[async_trait]
pub trait Client: Send + Sync {
    fn location(&self) -> String {
        unimplemented_default("Client::location")
    }

    fn set_location(&self, _location: &str) {
        unimplemented_default::<()>("Client::set_location")
    }

    fn close(&self) -> Result<()> {
        unimplemented("Client::close")
    }

    fn dataset(&self, _id: &str) -> Box<dyn Dataset> {
        Box::new(placeholder("Client::dataset"))
    }

    fn dataset_in_project(&self, _project_id: &str, _dataset_id: &str) -> Box<dyn Dataset> {
        Box::new(placeholder("Client::dataset_in_project"))
    }

    fn datasets(&self) -> Box<dyn DatasetIterator> {
        Box::new(placeholder("Client::datasets"))
    }

    fn datasets_in_project(&self, _project_id: &str) -> Box<dyn DatasetIterator> {
        Box::new(placeholder("Client::datasets_in_project"))
    }

    fn query(&self, _q: &str) -> Box<dyn Query> {
        Box::new(placeholder("Client::query"))
    }

    async fn job_from_id(&self, _id: &str) -> Result<Box<dyn Job>> {
        unimplemented("Client::job_from_id")
    }

    async fn job_from_id_location(&self, _id: &str, _location: &str) -> Result<Box<dyn Job>> {
        unimplemented("Client::job_from_id_location")
    }

    fn jobs(&self) -> Box<dyn JobIterator> {
        Box::new(placeholder("Client::jobs"))
    }
}

#[async_trait]
pub trait Copier: Send + Sync {
    fn job_id_config(&self) -> JobIdConfig {
        unimplemented_default("Copier::job_id_config")
    }

    fn set_job_id_config(&mut self, _config: JobIdConfig) {
        unimplemented_default::<()>("Copier::set_job_id_config")
    }

    fn set_copy_config(&mut self, _config: CopyConfig) -> Result<()> {
        unimplemented("Copier::set_copy_config")
    }

    async fn run(&self) -> Result<Box<dyn Job>> {
        unimplemented("Copier::run")
    }
}

#[async_trait]
pub trait Dataset: Send + Sync {
    fn project_id(&self) -> String {
        unimplemented_default("Dataset::project_id")
    }

    fn dataset_id(&self) -> String {
        unimplemented_default("Dataset::dataset_id")
    }

    async fn create(&self, _metadata: &DatasetMetadata) -> Result<()> {
        unimplemented("Dataset::create")
    }

    async fn delete(&self) -> Result<()> {
        unimplemented("Dataset::delete")
    }

    async fn delete_with_contents(&self) -> Result<()> {
        unimplemented("Dataset::delete_with_contents")
    }

    async fn metadata(&self) -> Result<DatasetMetadata> {
        unimplemented("Dataset::metadata")
    }

    async fn update(&self, _update: DatasetMetadataToUpdate, _etag: &str) -> Result<DatasetMetadata> {
        unimplemented("Dataset::update")
    }

    fn table(&self, _id: &str) -> Box<dyn Table> {
        Box::new(placeholder("Dataset::table"))
    }

    fn tables(&self) -> Box<dyn TableIterator> {
        Box::new(placeholder("Dataset::tables"))
    }
}

#[async_trait]
pub trait DatasetIterator: Send + Sync {
    fn set_list_hidden(&mut self, _list_hidden: bool) {
        unimplemented_default::<()>("DatasetIterator::set_list_hidden")
    }

    fn set_filter(&mut self, _filter: &str) {
        unimplemented_default::<()>("DatasetIterator::set_filter")
    }

    fn set_project_id(&mut self, _project_id: &str) {
        unimplemented_default::<()>("DatasetIterator::set_project_id")
    }

    /// `Ok(None)` once every dataset has been returned.
    async fn next(&mut self) -> Result<Option<Box<dyn Dataset>>> {
        unimplemented("DatasetIterator::next")
    }

    fn page_info(&self) -> PageInfo {
        unimplemented_default("DatasetIterator::page_info")
    }

    /// Sets the page token and size used by the next fetch.
    fn set_page_info(&mut self, _info: PageInfo) {
        unimplemented_default::<()>("DatasetIterator::set_page_info")
    }
}

#[async_trait]
pub trait Extractor: Send + Sync {
    fn job_id_config(&self) -> JobIdConfig {
        unimplemented_default("Extractor::job_id_config")
    }

    fn set_job_id_config(&mut self, _config: JobIdConfig) {
        unimplemented_default::<()>("Extractor::set_job_id_config")
    }

    fn set_extract_config(&mut self, _config: ExtractConfig) -> Result<()> {
        unimplemented("Extractor::set_extract_config")
    }

    async fn run(&self) -> Result<Box<dyn Job>> {
        unimplemented("Extractor::run")
    }
}

#[async_trait]
pub trait Loader: Send + Sync {
    fn job_id_config(&self) -> JobIdConfig {
        unimplemented_default("Loader::job_id_config")
    }

    fn set_job_id_config(&mut self, _config: JobIdConfig) {
        unimplemented_default::<()>("Loader::set_job_id_config")
    }

    fn set_load_config(&mut self, _config: LoadConfig) -> Result<()> {
        unimplemented("Loader::set_load_config")
    }

    async fn run(&self) -> Result<Box<dyn Job>> {
        unimplemented("Loader::run")
    }
}

#[async_trait]
pub trait Job: Send + Sync {
    fn id(&self) -> String {
        unimplemented_default("Job::id")
    }

    fn location(&self) -> String {
        unimplemented_default("Job::location")
    }

    fn config(&self) -> Result<JobConfig> {
        unimplemented("Job::config")
    }

    async fn status(&self) -> Result<JobStatus> {
        unimplemented("Job::status")
    }

    fn last_status(&self) -> Option<JobStatus> {
        unimplemented_default("Job::last_status")
    }

    async fn cancel(&self) -> Result<()> {
        unimplemented("Job::cancel")
    }

    async fn wait(&self) -> Result<JobStatus> {
        unimplemented("Job::wait")
    }

    async fn read(&self) -> Result<Box<dyn RowIterator>> {
        unimplemented("Job::read")
    }
}

#[async_trait]
pub trait JobIterator: Send + Sync {
    fn set_project_id(&mut self, _project_id: &str) {
        unimplemented_default::<()>("JobIterator::set_project_id")
    }

    fn set_all_users(&mut self, _all_users: bool) {
        unimplemented_default::<()>("JobIterator::set_all_users")
    }

    fn set_state(&mut self, _state: State) {
        unimplemented_default::<()>("JobIterator::set_state")
    }

    async fn next(&mut self) -> Result<Option<Box<dyn Job>>> {
        unimplemented("JobIterator::next")
    }

    fn page_info(&self) -> PageInfo {
        unimplemented_default("JobIterator::page_info")
    }

    fn set_page_info(&mut self, _info: PageInfo) {
        unimplemented_default::<()>("JobIterator::set_page_info")
    }
}

#[async_trait]
pub trait Query: Send + Sync {
    fn job_id_config(&self) -> JobIdConfig {
        unimplemented_default("Query::job_id_config")
    }

    fn set_job_id_config(&mut self, _config: JobIdConfig) {
        unimplemented_default::<()>("Query::set_job_id_config")
    }

    fn set_query_config(&mut self, _config: QueryConfig) -> Result<()> {
        unimplemented("Query::set_query_config")
    }

    async fn run(&self) -> Result<Box<dyn Job>> {
        unimplemented("Query::run")
    }

    async fn read(&self) -> Result<Box<dyn RowIterator>> {
        unimplemented("Query::read")
    }
}

#[async_trait]
pub trait RowIterator: Send + Sync {
    fn set_start_index(&mut self, _index: u64) {
        unimplemented_default::<()>("RowIterator::set_start_index")
    }

    /// Known once the first row has been fetched.
    fn schema(&self) -> Schema {
        unimplemented_default("RowIterator::schema")
    }

    fn total_rows(&self) -> u64 {
        unimplemented_default("RowIterator::total_rows")
    }

    async fn next(&mut self) -> Result<Option<Vec<Value>>> {
        unimplemented("RowIterator::next")
    }

    fn page_info(&self) -> PageInfo {
        unimplemented_default("RowIterator::page_info")
    }

    fn set_page_info(&mut self, _info: PageInfo) {
        unimplemented_default::<()>("RowIterator::set_page_info")
    }
}

impl dyn RowIterator {
    /// Decodes the next row into `T` by column name.
    pub async fn next_into<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        match self.next().await? {
            Some(row) => decode_row_into(&self.schema(), &row).map(Some),
            None => Ok(None),
        }
    }
}

#[async_trait]
pub trait Table: Send + Sync {
    fn project_id(&self) -> String {
        unimplemented_default("Table::project_id")
    }

    fn dataset_id(&self) -> String {
        unimplemented_default("Table::dataset_id")
    }

    fn table_id(&self) -> String {
        unimplemented_default("Table::table_id")
    }

    /// `project:dataset.table`
    fn fully_qualified_name(&self) -> String {
        unimplemented_default("Table::fully_qualified_name")
    }

    async fn create(&self, _metadata: &TableMetadata) -> Result<()> {
        unimplemented("Table::create")
    }

    async fn delete(&self) -> Result<()> {
        unimplemented("Table::delete")
    }

    async fn metadata(&self) -> Result<TableMetadata> {
        unimplemented("Table::metadata")
    }

    async fn update(&self, _update: TableMetadataToUpdate, _etag: &str) -> Result<TableMetadata> {
        unimplemented("Table::update")
    }

    fn read(&self) -> Box<dyn RowIterator> {
        Box::new(placeholder("Table::read"))
    }

    fn uploader(&self) -> Box<dyn Uploader> {
        Box::new(placeholder("Table::uploader"))
    }

    fn copier_from(&self, _srcs: &[Arc<dyn Table>]) -> Result<Box<dyn Copier>> {
        unimplemented("Table::copier_from")
    }

    fn extractor_to(&self, _dst: GcsReference) -> Box<dyn Extractor> {
        Box::new(placeholder("Table::extractor_to"))
    }

    fn loader_from(&self, _src: LoadSource) -> Box<dyn Loader> {
        Box::new(placeholder("Table::loader_from"))
    }

    #[doc(hidden)]
    fn as_adapted(&self) -> Option<&Arc<bigquery::Table>> {
        None
    }
}

#[async_trait]
pub trait TableIterator: Send + Sync {
    async fn next(&mut self) -> Result<Option<Box<dyn Table>>> {
        unimplemented("TableIterator::next")
    }

    fn page_info(&self) -> PageInfo {
        unimplemented_default("TableIterator::page_info")
    }

    fn set_page_info(&mut self, _info: PageInfo) {
        unimplemented_default::<()>("TableIterator::set_page_info")
    }
}

#[async_trait]
pub trait Uploader: Send + Sync {
    fn set_skip_invalid_rows(&mut self, _skip: bool) {
        unimplemented_default::<()>("Uploader::set_skip_invalid_rows")
    }

    fn set_ignore_unknown_values(&mut self, _ignore: bool) {
        unimplemented_default::<()>("Uploader::set_ignore_unknown_values")
    }

    fn set_table_template_suffix(&mut self, _suffix: &str) {
        unimplemented_default::<()>("Uploader::set_table_template_suffix")
    }

    /// Streams rows into the table. Rows the service rejects come back as
    /// [`Error::PutMulti`](crate::Error::PutMulti).
    async fn put(&self, _rows: &[InsertRow]) -> Result<()> {
        unimplemented("Uploader::put")
    }
}

/// Returned by default factory methods; implements every trait of this
/// module with nothing but the defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unimplemented;

impl Client for Unimplemented {}
impl Copier for Unimplemented {}
impl Dataset for Unimplemented {}
impl DatasetIterator for Unimplemented {}
impl Extractor for Unimplemented {}
impl Loader for Unimplemented {}
impl Job for Unimplemented {}
impl JobIterator for Unimplemented {}
impl Query for Unimplemented {}
impl RowIterator for Unimplemented {}
impl Table for Unimplemented {}
impl TableIterator for Unimplemented {}
impl Uploader for Unimplemented {}

fn placeholder(method: &'static str) -> Unimplemented {
    unimplemented_default::<()>(method);
    Unimplemented
}
