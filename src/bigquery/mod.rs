//! BigQuery client over the REST v2 API.
//!
//! A [`Client`] hands out [`Dataset`] and [`Table`] handles without making
//! RPCs, builds query, copy, extract and load jobs, and lists datasets and
//! jobs. Rows come back as [`Value`]s decoded with the table or result
//! schema.

mod dataset;
pub mod iface;
mod job;
mod query;
mod rows;
mod schema;
mod table;
mod transfer;
mod uploader;
mod value;
mod wire;

pub use dataset::{
    AccessEntry, AccessRole, Dataset, DatasetIterator, DatasetMetadata, DatasetMetadataToUpdate,
    EntityType,
};
pub use job::{
    Job, JobConfig, JobError, JobIdConfig, JobIterator, JobStatistics, JobStatus, State,
    TableCreateDisposition, TableWriteDisposition,
};
pub use query::{Query, QueryConfig, QueryParameter};
pub use rows::RowIterator;
pub use schema::{FieldSchema, FieldType, Schema};
pub use table::{Table, TableIterator, TableMetadata, TableMetadataToUpdate};
pub use transfer::{
    Compression, Copier, CopyConfig, DataFormat, ExtractConfig, Extractor, GcsReference,
    LoadConfig, LoadSource, Loader,
};
pub use uploader::{InsertRow, Uploader};
pub use value::{decode_row_into, row_to_json, Value};

use crate::config::{ClientConfig, ServiceKind};
use crate::transport::HttpTransport;
use crate::utils::error::Result;
use parking_lot::RwLock;
use std::sync::Arc;

/// State shared by a client and every handle it creates.
#[derive(Debug, Clone)]
pub(crate) struct Connection {
    pub(crate) transport: HttpTransport,
    pub(crate) project_id: String,
    location: Arc<RwLock<String>>,
}

impl Connection {
    pub(crate) fn new(transport: HttpTransport, project_id: &str) -> Self {
        Self {
            transport,
            project_id: project_id.to_string(),
            location: Arc::new(RwLock::new(String::new())),
        }
    }

    /// Default location for new jobs and job lookups.
    pub(crate) fn location(&self) -> String {
        self.location.read().clone()
    }
}

/// Paging state of a list iterator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageInfo {
    /// Token of the next page to fetch; empty before the first page and
    /// after the last.
    pub token: String,
    /// Page size hint; zero lets the service decide.
    pub max_size: i32,
    pub(crate) remaining: usize,
}

impl PageInfo {
    /// Items already fetched but not yet returned.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub(crate) fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if !self.token.is_empty() {
            query.push(("pageToken", self.token.clone()));
        }
        if self.max_size > 0 {
            query.push(("maxResults", self.max_size.to_string()));
        }
        query
    }
}

#[derive(Debug, Clone)]
pub struct Client {
    conn: Connection,
}

impl Client {
    pub fn new(project_id: &str, transport: HttpTransport) -> Self {
        Self {
            conn: Connection::new(transport, project_id),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let transport = HttpTransport::from_config(config, ServiceKind::BigQuery)?;
        let client = Self::new(&config.project_id, transport);
        if let Some(location) = &config.location {
            client.set_location(location);
        }
        Ok(client)
    }

    pub fn project_id(&self) -> &str {
        &self.conn.project_id
    }

    /// The location jobs run in unless their [`JobIdConfig`] says otherwise.
    pub fn location(&self) -> String {
        self.conn.location()
    }

    /// Changes the default location for this client and every handle
    /// created from it.
    pub fn set_location(&self, location: &str) {
        *self.conn.location.write() = location.to_string();
    }

    /// Releases the client. Requests in flight are not affected.
    pub fn close(&self) -> Result<()> {
        tracing::debug!("Closing BigQuery client");
        Ok(())
    }

    pub fn dataset(&self, dataset_id: &str) -> Dataset {
        self.dataset_in_project(&self.conn.project_id, dataset_id)
    }

    pub fn dataset_in_project(&self, project_id: &str, dataset_id: &str) -> Dataset {
        Dataset::new(self.conn.clone(), project_id, dataset_id)
    }

    pub fn datasets(&self) -> DatasetIterator {
        self.datasets_in_project(&self.conn.project_id)
    }

    pub fn datasets_in_project(&self, project_id: &str) -> DatasetIterator {
        DatasetIterator::new(self.conn.clone(), project_id)
    }

    pub fn query(&self, q: &str) -> Query {
        Query::new(self.conn.clone(), q)
    }

    pub async fn job_from_id(&self, job_id: &str) -> Result<Job> {
        self.job_from_id_location(job_id, &self.location()).await
    }

    pub async fn job_from_id_location(&self, job_id: &str, location: &str) -> Result<Job> {
        Job::fetch(self.conn.clone(), &self.conn.project_id, job_id, location).await
    }

    pub fn jobs(&self) -> JobIterator {
        JobIterator::new(self.conn.clone())
    }
}
