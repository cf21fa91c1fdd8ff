use super::rows::RowIterator;
use super::schema::{schema_from_wire, schema_to_wire, Schema, WireTableSchema};
use super::transfer::{Copier, Extractor, GcsReference, LoadSource, Loader};
use super::uploader::Uploader;
use super::wire::{millis_to_time, opt_i64, time_to_millis, TableReference};
use super::{Connection, PageInfo};
use crate::utils::error::{Error, Result};
use crate::utils::validation::validate_resource_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as Json};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

/// A reference to a table; no RPC is made until one of its methods runs.
#[derive(Clone)]
pub struct Table {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
    pub(crate) conn: Connection,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableMetadata {
    pub name: String,
    pub description: String,
    pub schema: Schema,
    /// Set to create a logical view instead of a table.
    pub view_query: String,
    pub use_legacy_sql: bool,
    pub expiration_time: Option<DateTime<Utc>>,
    pub labels: HashMap<String, String>,

    // Output only.
    pub full_id: String,
    pub table_type: String,
    pub location: String,
    pub num_bytes: i64,
    pub num_rows: u64,
    pub creation_time: Option<DateTime<Utc>>,
    pub last_modified_time: Option<DateTime<Utc>>,
    pub etag: String,
}

/// Fields to change on a table; `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableMetadataToUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub schema: Option<Schema>,
    pub view_query: Option<String>,
    pub expiration_time: Option<DateTime<Utc>>,
    pub labels_to_set: HashMap<String, String>,
    pub labels_to_delete: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireTable {
    #[serde(default)]
    table_reference: TableReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    friendly_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    schema: Option<WireTableSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    view: Option<WireView>,
    #[serde(default, with = "opt_i64", skip_serializing_if = "Option::is_none")]
    expiration_time: Option<i64>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    labels: HashMap<String, String>,
    #[serde(default, skip_serializing)]
    id: String,
    #[serde(default, rename = "type", skip_serializing)]
    table_type: String,
    #[serde(default, skip_serializing)]
    location: String,
    #[serde(default, with = "opt_i64", skip_serializing)]
    num_bytes: Option<i64>,
    #[serde(default, with = "opt_i64", skip_serializing)]
    num_rows: Option<i64>,
    #[serde(default, with = "opt_i64", skip_serializing)]
    creation_time: Option<i64>,
    #[serde(default, with = "opt_i64", skip_serializing)]
    last_modified_time: Option<i64>,
    #[serde(default, skip_serializing)]
    etag: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireView {
    query: String,
    #[serde(default)]
    use_legacy_sql: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableList {
    #[serde(default)]
    tables: Vec<WireTableListEntry>,
    #[serde(default)]
    next_page_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTableListEntry {
    table_reference: TableReference,
}

impl TableMetadata {
    fn to_wire(&self, table: &Table) -> WireTable {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        WireTable {
            table_reference: table.reference(),
            friendly_name: non_empty(&self.name),
            description: non_empty(&self.description),
            schema: (!self.schema.is_empty()).then(|| schema_to_wire(&self.schema)),
            view: non_empty(&self.view_query).map(|query| WireView {
                query,
                use_legacy_sql: self.use_legacy_sql,
            }),
            expiration_time: time_to_millis(self.expiration_time),
            labels: self.labels.clone(),
            ..WireTable::default()
        }
    }

    fn from_wire(wire: WireTable) -> Self {
        let (view_query, use_legacy_sql) = wire
            .view
            .map(|v| (v.query, v.use_legacy_sql))
            .unwrap_or_default();
        Self {
            name: wire.friendly_name.unwrap_or_default(),
            description: wire.description.unwrap_or_default(),
            schema: wire.schema.as_ref().map(schema_from_wire).unwrap_or_default(),
            view_query,
            use_legacy_sql,
            expiration_time: millis_to_time(wire.expiration_time),
            labels: wire.labels,
            full_id: wire.id,
            table_type: wire.table_type,
            location: wire.location,
            num_bytes: wire.num_bytes.unwrap_or_default(),
            num_rows: wire.num_rows.unwrap_or_default().max(0) as u64,
            creation_time: millis_to_time(wire.creation_time),
            last_modified_time: millis_to_time(wire.last_modified_time),
            etag: wire.etag,
        }
    }
}

impl TableMetadataToUpdate {
    fn to_wire(&self) -> Json {
        let mut body = Map::new();
        if let Some(name) = &self.name {
            body.insert("friendlyName".into(), json!(name));
        }
        if let Some(description) = &self.description {
            body.insert("description".into(), json!(description));
        }
        if let Some(schema) = &self.schema {
            body.insert("schema".into(), json!(schema_to_wire(schema)));
        }
        if let Some(query) = &self.view_query {
            body.insert("view".into(), json!({ "query": query }));
        }
        if let Some(t) = self.expiration_time {
            body.insert("expirationTime".into(), json!(t.timestamp_millis().to_string()));
        }
        if !self.labels_to_set.is_empty() || !self.labels_to_delete.is_empty() {
            let mut labels: Map<String, Json> = self
                .labels_to_set
                .iter()
                .map(|(k, v)| (k.clone(), json!(v)))
                .collect();
            for k in &self.labels_to_delete {
                labels.insert(k.clone(), Json::Null);
            }
            body.insert("labels".into(), Json::Object(labels));
        }
        Json::Object(body)
    }
}

impl Table {
    pub(crate) fn new(conn: Connection, project_id: &str, dataset_id: &str, table_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            dataset_id: dataset_id.to_string(),
            table_id: table_id.to_string(),
            conn,
        }
    }

    pub(crate) fn from_reference(conn: Connection, reference: &TableReference) -> Self {
        Self::new(
            conn,
            &reference.project_id,
            &reference.dataset_id,
            &reference.table_id,
        )
    }

    pub(crate) fn reference(&self) -> TableReference {
        TableReference {
            project_id: self.project_id.clone(),
            dataset_id: self.dataset_id.clone(),
            table_id: self.table_id.clone(),
        }
    }

    pub(crate) fn path(&self) -> String {
        format!(
            "projects/{}/datasets/{}/tables/{}",
            self.project_id, self.dataset_id, self.table_id
        )
    }

    /// `project:dataset.table`, the form legacy SQL expects.
    pub fn fully_qualified_name(&self) -> String {
        format!("{}:{}.{}", self.project_id, self.dataset_id, self.table_id)
    }

    pub async fn create(&self, metadata: &TableMetadata) -> Result<()> {
        validate_resource_id("table_id", &self.table_id)?;
        let _: WireTable = self
            .conn
            .transport
            .post(
                &format!("projects/{}/datasets/{}/tables", self.project_id, self.dataset_id),
                &[],
                &metadata.to_wire(self),
            )
            .await?;
        tracing::info!("Created table {}", self.fully_qualified_name());
        Ok(())
    }

    pub async fn delete(&self) -> Result<()> {
        self.conn.transport.delete(&self.path(), &[]).await
    }

    pub async fn metadata(&self) -> Result<TableMetadata> {
        let wire: WireTable = self.conn.transport.get(&self.path(), &[]).await?;
        Ok(TableMetadata::from_wire(wire))
    }

    /// Applies `update`; a non-empty `etag` makes the write conditional.
    pub async fn update(&self, update: &TableMetadataToUpdate, etag: &str) -> Result<TableMetadata> {
        let wire: WireTable = self
            .conn
            .transport
            .patch(&self.path(), &[], &update.to_wire(), Some(etag))
            .await?;
        Ok(TableMetadata::from_wire(wire))
    }

    pub fn read(&self) -> RowIterator {
        RowIterator::for_table(self.clone())
    }

    pub fn uploader(&self) -> Uploader {
        Uploader::new(self.clone())
    }

    /// A copy job writing into this table.
    pub fn copier_from(self: &Arc<Self>, srcs: Vec<Arc<Table>>) -> Copier {
        Copier::new(self.conn.clone(), srcs, self.clone())
    }

    /// An extract job reading from this table.
    pub fn extractor_to(self: &Arc<Self>, dst: GcsReference) -> Extractor {
        Extractor::new(self.conn.clone(), self.clone(), dst)
    }

    /// A load job writing into this table.
    pub fn loader_from(self: &Arc<Self>, src: impl Into<LoadSource>) -> Loader {
        Loader::new(self.conn.clone(), src.into(), self.clone())
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("project_id", &self.project_id)
            .field("dataset_id", &self.dataset_id)
            .field("table_id", &self.table_id)
            .finish()
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.project_id == other.project_id
            && self.dataset_id == other.dataset_id
            && self.table_id == other.table_id
    }
}

/// Lists the tables of a dataset.
pub struct TableIterator {
    conn: Connection,
    project_id: String,
    dataset_id: String,
    buffered: VecDeque<Table>,
    page_info: PageInfo,
    exhausted: bool,
}

impl TableIterator {
    pub(crate) fn new(conn: Connection, project_id: &str, dataset_id: &str) -> Self {
        Self {
            conn,
            project_id: project_id.to_string(),
            dataset_id: dataset_id.to_string(),
            buffered: VecDeque::new(),
            page_info: PageInfo::default(),
            exhausted: false,
        }
    }

    pub async fn next(&mut self) -> Result<Option<Table>> {
        while self.buffered.is_empty() && !self.exhausted {
            self.fetch().await?;
        }
        let next = self.buffered.pop_front();
        self.page_info.remaining = self.buffered.len();
        Ok(next)
    }

    pub fn page_info(&self) -> &PageInfo {
        &self.page_info
    }

    pub fn page_info_mut(&mut self) -> &mut PageInfo {
        &mut self.page_info
    }

    async fn fetch(&mut self) -> Result<()> {
        let list: TableList = self
            .conn
            .transport
            .get(
                &format!("projects/{}/datasets/{}/tables", self.project_id, self.dataset_id),
                &self.page_info.query(),
            )
            .await?;
        for entry in list.tables {
            self.buffered
                .push_back(Table::from_reference(self.conn.clone(), &entry.table_reference));
        }
        self.exhausted = list.next_page_token.is_empty();
        self.page_info.token = list.next_page_token;
        self.page_info.remaining = self.buffered.len();
        Ok(())
    }
}

pub(crate) fn require_table(table: &Option<Arc<Table>>, field: &str) -> Result<TableReference> {
    table
        .as_ref()
        .map(|t| t.reference())
        .ok_or_else(|| Error::InvalidConfigValue {
            field: field.to_string(),
            value: String::new(),
            reason: "a table is required".to_string(),
        })
}
