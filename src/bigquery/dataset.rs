use super::table::{Table, TableIterator};
use super::wire::{millis_to_time, opt_i64, DatasetReference, TableReference};
use super::{Connection, PageInfo};
use crate::utils::error::Result;
use crate::utils::validation::validate_resource_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as Json};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AccessRole {
    Owner,
    #[default]
    Reader,
    Writer,
    /// A predefined or custom IAM role name.
    Other(String),
}

impl AccessRole {
    fn as_str(&self) -> &str {
        match self {
            AccessRole::Owner => "OWNER",
            AccessRole::Reader => "READER",
            AccessRole::Writer => "WRITER",
            AccessRole::Other(role) => role,
        }
    }

    fn parse(role: &str) -> Self {
        match role {
            "OWNER" => AccessRole::Owner,
            "READER" => AccessRole::Reader,
            "WRITER" => AccessRole::Writer,
            other => AccessRole::Other(other.to_string()),
        }
    }
}

/// The kind of principal an [`AccessEntry`] grants to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EntityType {
    #[default]
    User,
    Group,
    Domain,
    /// `projectOwners`, `projectReaders`, `projectWriters` or `allAuthenticatedUsers`.
    SpecialGroup,
    /// An authorized view; the entry's `view` names it.
    View,
    IamMember,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccessEntry {
    pub role: AccessRole,
    pub entity_type: EntityType,
    pub entity: String,
    pub view: Option<Arc<Table>>,
}

impl AccessEntry {
    fn to_wire(&self) -> Json {
        let mut entry = Map::new();
        let key = match self.entity_type {
            EntityType::User => "userByEmail",
            EntityType::Group => "groupByEmail",
            EntityType::Domain => "domain",
            EntityType::SpecialGroup => "specialGroup",
            EntityType::IamMember => "iamMember",
            EntityType::View => {
                if let Some(view) = &self.view {
                    entry.insert("view".into(), json!(view.reference()));
                }
                return Json::Object(entry);
            }
        };
        entry.insert("role".into(), json!(self.role.as_str()));
        entry.insert(key.into(), json!(self.entity));
        Json::Object(entry)
    }

    fn from_wire(conn: &Connection, entry: &Json) -> Self {
        let role = entry
            .get("role")
            .and_then(Json::as_str)
            .map(AccessRole::parse)
            .unwrap_or_default();
        if let Some(view) = entry
            .get("view")
            .and_then(|v| serde_json::from_value::<TableReference>(v.clone()).ok())
        {
            return Self {
                role,
                entity_type: EntityType::View,
                entity: String::new(),
                view: Some(Arc::new(Table::from_reference(conn.clone(), &view))),
            };
        }
        let (entity_type, entity) = [
            ("userByEmail", EntityType::User),
            ("groupByEmail", EntityType::Group),
            ("domain", EntityType::Domain),
            ("specialGroup", EntityType::SpecialGroup),
            ("iamMember", EntityType::IamMember),
        ]
        .into_iter()
        .find_map(|(key, kind)| entry.get(key).and_then(Json::as_str).map(|e| (kind, e.to_string())))
        .unwrap_or_default();
        Self {
            role,
            entity_type,
            entity,
            view: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetMetadata {
    pub name: String,
    pub description: String,
    /// Fixed at creation.
    pub location: String,
    pub default_table_expiration: Option<Duration>,
    pub labels: HashMap<String, String>,
    pub access: Vec<AccessEntry>,

    // Output only.
    pub full_id: String,
    pub creation_time: Option<DateTime<Utc>>,
    pub last_modified_time: Option<DateTime<Utc>>,
    pub etag: String,
}

/// Fields to change on a dataset; `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetMetadataToUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub default_table_expiration: Option<Duration>,
    pub access: Option<Vec<AccessEntry>>,
    pub labels_to_set: HashMap<String, String>,
    pub labels_to_delete: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireDataset {
    dataset_reference: DatasetReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    friendly_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    location: String,
    #[serde(default, with = "opt_i64", skip_serializing_if = "Option::is_none")]
    default_table_expiration_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    labels: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    access: Vec<Json>,
    #[serde(default, skip_serializing)]
    id: String,
    #[serde(default, with = "opt_i64", skip_serializing)]
    creation_time: Option<i64>,
    #[serde(default, with = "opt_i64", skip_serializing)]
    last_modified_time: Option<i64>,
    #[serde(default, skip_serializing)]
    etag: String,
}

impl DatasetMetadata {
    fn to_wire(&self, dataset: &Dataset) -> WireDataset {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        WireDataset {
            dataset_reference: dataset.reference(),
            friendly_name: non_empty(&self.name),
            description: non_empty(&self.description),
            location: self.location.clone(),
            default_table_expiration_ms: self.default_table_expiration.map(|d| d.as_millis() as i64),
            labels: self.labels.clone(),
            access: self.access.iter().map(AccessEntry::to_wire).collect(),
            ..WireDataset::default()
        }
    }

    fn from_wire(conn: &Connection, wire: WireDataset) -> Self {
        Self {
            name: wire.friendly_name.unwrap_or_default(),
            description: wire.description.unwrap_or_default(),
            location: wire.location,
            default_table_expiration: wire
                .default_table_expiration_ms
                .map(|ms| Duration::from_millis(ms.max(0) as u64)),
            labels: wire.labels,
            access: wire.access.iter().map(|e| AccessEntry::from_wire(conn, e)).collect(),
            full_id: wire.id,
            creation_time: millis_to_time(wire.creation_time),
            last_modified_time: millis_to_time(wire.last_modified_time),
            etag: wire.etag,
        }
    }
}

impl DatasetMetadataToUpdate {
    fn to_wire(&self) -> Json {
        let mut body = Map::new();
        if let Some(name) = &self.name {
            body.insert("friendlyName".into(), json!(name));
        }
        if let Some(description) = &self.description {
            body.insert("description".into(), json!(description));
        }
        if let Some(expiration) = self.default_table_expiration {
            // Zero clears the default.
            let value = if expiration.is_zero() {
                Json::Null
            } else {
                json!(expiration.as_millis().to_string())
            };
            body.insert("defaultTableExpirationMs".into(), value);
        }
        if let Some(access) = &self.access {
            body.insert(
                "access".into(),
                Json::Array(access.iter().map(AccessEntry::to_wire).collect()),
            );
        }
        if !self.labels_to_set.is_empty() || !self.labels_to_delete.is_empty() {
            let mut labels: Map<String, Json> = self
                .labels_to_set
                .iter()
                .map(|(k, v)| (k.clone(), json!(v)))
                .collect();
            for key in &self.labels_to_delete {
                labels.insert(key.clone(), Json::Null);
            }
            body.insert("labels".into(), Json::Object(labels));
        }
        Json::Object(body)
    }
}

/// A handle to a dataset. Creating one makes no RPC.
#[derive(Clone)]
pub struct Dataset {
    pub project_id: String,
    pub dataset_id: String,
    conn: Connection,
}

impl Dataset {
    pub(crate) fn new(conn: Connection, project_id: &str, dataset_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            dataset_id: dataset_id.to_string(),
            conn,
        }
    }

    fn reference(&self) -> DatasetReference {
        DatasetReference {
            project_id: self.project_id.clone(),
            dataset_id: self.dataset_id.clone(),
        }
    }

    fn path(&self) -> String {
        format!("projects/{}/datasets/{}", self.project_id, self.dataset_id)
    }

    pub async fn create(&self, metadata: &DatasetMetadata) -> Result<()> {
        validate_resource_id("dataset_id", &self.dataset_id)?;
        let _: Json = self
            .conn
            .transport
            .post(
                &format!("projects/{}/datasets", self.project_id),
                &[],
                &metadata.to_wire(self),
            )
            .await?;
        tracing::info!("Created dataset {}:{}", self.project_id, self.dataset_id);
        Ok(())
    }

    /// Deletes the dataset, which must be empty.
    pub async fn delete(&self) -> Result<()> {
        self.conn.transport.delete(&self.path(), &[]).await
    }

    /// Deletes the dataset along with every table in it.
    pub async fn delete_with_contents(&self) -> Result<()> {
        self.conn
            .transport
            .delete(&self.path(), &[("deleteContents", "true".to_string())])
            .await
    }

    pub async fn metadata(&self) -> Result<DatasetMetadata> {
        let wire: WireDataset = self.conn.transport.get(&self.path(), &[]).await?;
        Ok(DatasetMetadata::from_wire(&self.conn, wire))
    }

    /// Applies `update`; a non-empty `etag` makes the write conditional.
    pub async fn update(&self, update: &DatasetMetadataToUpdate, etag: &str) -> Result<DatasetMetadata> {
        let wire: WireDataset = self
            .conn
            .transport
            .patch(&self.path(), &[], &update.to_wire(), Some(etag))
            .await?;
        Ok(DatasetMetadata::from_wire(&self.conn, wire))
    }

    pub fn table(&self, table_id: &str) -> Table {
        Table::new(self.conn.clone(), &self.project_id, &self.dataset_id, table_id)
    }

    pub fn tables(&self) -> TableIterator {
        TableIterator::new(self.conn.clone(), &self.project_id, &self.dataset_id)
    }
}

impl fmt::Debug for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataset")
            .field("project_id", &self.project_id)
            .field("dataset_id", &self.dataset_id)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatasetList {
    #[serde(default)]
    datasets: Vec<DatasetListEntry>,
    #[serde(default)]
    next_page_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatasetListEntry {
    dataset_reference: DatasetReference,
}

/// Lists the datasets of a project.
pub struct DatasetIterator {
    conn: Connection,
    /// Include datasets whose names start with an underscore.
    pub list_hidden: bool,
    /// A label filter such as `labels.env:prod`.
    pub filter: String,
    pub project_id: String,
    buffered: VecDeque<Dataset>,
    page_info: PageInfo,
    exhausted: bool,
}

impl DatasetIterator {
    pub(crate) fn new(conn: Connection, project_id: &str) -> Self {
        Self {
            conn,
            list_hidden: false,
            filter: String::new(),
            project_id: project_id.to_string(),
            buffered: VecDeque::new(),
            page_info: PageInfo::default(),
            exhausted: false,
        }
    }

    pub async fn next(&mut self) -> Result<Option<Dataset>> {
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
        let mut query = self.page_info.query();
        if self.list_hidden {
            query.push(("all", "true".to_string()));
        }
        if !self.filter.is_empty() {
            query.push(("filter", self.filter.clone()));
        }
        let list: DatasetList = self
            .conn
            .transport
            .get(&format!("projects/{}/datasets", self.project_id), &query)
            .await?;
        for entry in list.datasets {
            let reference = entry.dataset_reference;
            self.buffered.push_back(Dataset::new(
                self.conn.clone(),
                &reference.project_id,
                &reference.dataset_id,
            ));
        }
        self.exhausted = list.next_page_token.is_empty();
        self.page_info.token = list.next_page_token;
        self.page_info.remaining = self.buffered.len();
        Ok(())
    }
}
