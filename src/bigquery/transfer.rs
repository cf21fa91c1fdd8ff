//! Copy, extract and load jobs.

use super::job::{Job, JobIdConfig, TableCreateDisposition, TableWriteDisposition};
use super::query::{from_field, labels_from_wire, table_from_wire, text};
use super::schema::{schema_from_wire, schema_to_wire, Schema, WireTableSchema};
use super::table::{require_table, Table};
use super::Connection;
use crate::utils::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as Json};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataFormat {
    #[serde(rename = "CSV")]
    Csv,
    #[serde(rename = "NEWLINE_DELIMITED_JSON")]
    Json,
    #[serde(rename = "AVRO")]
    Avro,
    #[serde(rename = "PARQUET")]
    Parquet,
    #[serde(rename = "ORC")]
    Orc,
    #[serde(rename = "DATASTORE_BACKUP")]
    DatastoreBackup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Compression {
    Gzip,
    Deflate,
    Snappy,
}

/// Files in Cloud Storage, read by load jobs and written by extract jobs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GcsReference {
    pub uris: Vec<String>,
    /// Format of the files a load job reads; CSV when `None`.
    pub source_format: Option<DataFormat>,
    /// Format an extract job writes; CSV when `None`.
    pub destination_format: Option<DataFormat>,
    pub compression: Option<Compression>,
    pub field_delimiter: String,
    pub skip_leading_rows: i64,
    pub allow_jagged_rows: bool,
    pub allow_quoted_newlines: bool,
    pub ignore_unknown_values: bool,
    pub max_bad_records: i64,
    pub autodetect: bool,
    pub schema: Schema,
}

impl GcsReference {
    pub fn new<I, S>(uris: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            uris: uris.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

/// Where a load job reads its data from.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadSource {
    Gcs(GcsReference),
}

impl Default for LoadSource {
    fn default() -> Self {
        LoadSource::Gcs(GcsReference::default())
    }
}

impl From<GcsReference> for LoadSource {
    fn from(gcs: GcsReference) -> Self {
        LoadSource::Gcs(gcs)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CopyConfig {
    pub srcs: Vec<Arc<Table>>,
    pub dst: Option<Arc<Table>>,
    pub create_disposition: Option<TableCreateDisposition>,
    pub write_disposition: Option<TableWriteDisposition>,
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractConfig {
    pub src: Option<Arc<Table>>,
    pub dst: GcsReference,
    /// Omit the header row from CSV output.
    pub disable_header: bool,
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadConfig {
    pub src: LoadSource,
    pub dst: Option<Arc<Table>>,
    pub create_disposition: Option<TableCreateDisposition>,
    pub write_disposition: Option<TableWriteDisposition>,
    pub labels: HashMap<String, String>,
}

fn with_labels(kind: &str, body: Map<String, Json>, labels: &HashMap<String, String>) -> Json {
    let mut configuration = Map::new();
    configuration.insert(kind.to_string(), Json::Object(body));
    if !labels.is_empty() {
        configuration.insert("labels".into(), json!(labels));
    }
    Json::Object(configuration)
}

fn insert_dispositions(
    body: &mut Map<String, Json>,
    create: Option<TableCreateDisposition>,
    write: Option<TableWriteDisposition>,
) -> Result<()> {
    if let Some(d) = create {
        body.insert("createDisposition".into(), serde_json::to_value(d)?);
    }
    if let Some(d) = write {
        body.insert("writeDisposition".into(), serde_json::to_value(d)?);
    }
    Ok(())
}

impl CopyConfig {
    pub(crate) fn to_wire(&self) -> Result<Json> {
        let mut body = Map::new();
        body.insert(
            "sourceTables".into(),
            json!(self.srcs.iter().map(|t| t.reference()).collect::<Vec<_>>()),
        );
        body.insert("destinationTable".into(), json!(require_table(&self.dst, "dst")?));
        insert_dispositions(&mut body, self.create_disposition, self.write_disposition)?;
        Ok(with_labels("copy", body, &self.labels))
    }

    pub(crate) fn from_wire(conn: &Connection, copy: &Json, configuration: &Json) -> Self {
        let mut srcs: Vec<Arc<Table>> = copy
            .get("sourceTables")
            .and_then(Json::as_array)
            .map(|refs| refs.iter().filter_map(|r| table_from_wire(conn, Some(r))).collect())
            .unwrap_or_default();
        // Older jobs carry a single source table.
        if srcs.is_empty() {
            srcs.extend(table_from_wire(conn, copy.get("sourceTable")));
        }
        Self {
            srcs,
            dst: table_from_wire(conn, copy.get("destinationTable")),
            create_disposition: from_field(copy, "createDisposition"),
            write_disposition: from_field(copy, "writeDisposition"),
            labels: labels_from_wire(configuration),
        }
    }
}

impl ExtractConfig {
    pub(crate) fn to_wire(&self) -> Result<Json> {
        let mut body = Map::new();
        body.insert("sourceTable".into(), json!(require_table(&self.src, "src")?));
        body.insert("destinationUris".into(), json!(self.dst.uris));
        if let Some(format) = self.dst.destination_format {
            body.insert("destinationFormat".into(), serde_json::to_value(format)?);
        }
        if let Some(compression) = self.dst.compression {
            body.insert("compression".into(), serde_json::to_value(compression)?);
        }
        if !self.dst.field_delimiter.is_empty() {
            body.insert("fieldDelimiter".into(), json!(self.dst.field_delimiter));
        }
        body.insert("printHeader".into(), json!(!self.disable_header));
        Ok(with_labels("extract", body, &self.labels))
    }

    pub(crate) fn from_wire(conn: &Connection, extract: &Json, configuration: &Json) -> Self {
        Self {
            src: table_from_wire(conn, extract.get("sourceTable")),
            dst: GcsReference {
                uris: from_field(extract, "destinationUris").unwrap_or_default(),
                destination_format: from_field(extract, "destinationFormat"),
                compression: from_field(extract, "compression"),
                field_delimiter: text(extract, "fieldDelimiter"),
                ..GcsReference::default()
            },
            disable_header: extract.get("printHeader").and_then(Json::as_bool) == Some(false),
            labels: labels_from_wire(configuration),
        }
    }
}

impl LoadConfig {
    pub(crate) fn to_wire(&self) -> Result<Json> {
        let LoadSource::Gcs(gcs) = &self.src;
        let mut body = Map::new();
        body.insert("sourceUris".into(), json!(gcs.uris));
        body.insert("destinationTable".into(), json!(require_table(&self.dst, "dst")?));
        if let Some(format) = gcs.source_format {
            body.insert("sourceFormat".into(), serde_json::to_value(format)?);
        }
        if !gcs.field_delimiter.is_empty() {
            body.insert("fieldDelimiter".into(), json!(gcs.field_delimiter));
        }
        if gcs.skip_leading_rows > 0 {
            body.insert("skipLeadingRows".into(), json!(gcs.skip_leading_rows));
        }
        if gcs.max_bad_records > 0 {
            body.insert("maxBadRecords".into(), json!(gcs.max_bad_records));
        }
        for (flag, name) in [
            (gcs.allow_jagged_rows, "allowJaggedRows"),
            (gcs.allow_quoted_newlines, "allowQuotedNewlines"),
            (gcs.ignore_unknown_values, "ignoreUnknownValues"),
            (gcs.autodetect, "autodetect"),
        ] {
            if flag {
                body.insert(name.into(), json!(true));
            }
        }
        if !gcs.schema.is_empty() {
            body.insert("schema".into(), serde_json::to_value(schema_to_wire(&gcs.schema))?);
        }
        insert_dispositions(&mut body, self.create_disposition, self.write_disposition)?;
        Ok(with_labels("load", body, &self.labels))
    }

    pub(crate) fn from_wire(conn: &Connection, load: &Json, configuration: &Json) -> Self {
        let flag = |name: &str| load.get(name).and_then(Json::as_bool).unwrap_or(false);
        let gcs = GcsReference {
            uris: from_field(load, "sourceUris").unwrap_or_default(),
            source_format: from_field(load, "sourceFormat"),
            field_delimiter: text(load, "fieldDelimiter"),
            skip_leading_rows: load.get("skipLeadingRows").and_then(Json::as_i64).unwrap_or(0),
            max_bad_records: load.get("maxBadRecords").and_then(Json::as_i64).unwrap_or(0),
            allow_jagged_rows: flag("allowJaggedRows"),
            allow_quoted_newlines: flag("allowQuotedNewlines"),
            ignore_unknown_values: flag("ignoreUnknownValues"),
            autodetect: flag("autodetect"),
            schema: from_field::<WireTableSchema>(load, "schema")
                .map(|s| schema_from_wire(&s))
                .unwrap_or_default(),
            ..GcsReference::default()
        };
        Self {
            src: LoadSource::Gcs(gcs),
            dst: table_from_wire(conn, load.get("destinationTable")),
            create_disposition: from_field(load, "createDisposition"),
            write_disposition: from_field(load, "writeDisposition"),
            labels: labels_from_wire(configuration),
        }
    }
}

/// Copies one or more tables into a destination table.
pub struct Copier {
    conn: Connection,
    pub job_id_config: JobIdConfig,
    pub config: CopyConfig,
}

impl Copier {
    pub(crate) fn new(conn: Connection, srcs: Vec<Arc<Table>>, dst: Arc<Table>) -> Self {
        Self {
            conn,
            job_id_config: JobIdConfig::default(),
            config: CopyConfig {
                srcs,
                dst: Some(dst),
                ..CopyConfig::default()
            },
        }
    }

    pub async fn run(&self) -> Result<Job> {
        Job::insert(&self.conn, &self.job_id_config, self.config.to_wire()?).await
    }
}

/// Exports a table to Cloud Storage.
pub struct Extractor {
    conn: Connection,
    pub job_id_config: JobIdConfig,
    pub config: ExtractConfig,
}

impl Extractor {
    pub(crate) fn new(conn: Connection, src: Arc<Table>, dst: GcsReference) -> Self {
        Self {
            conn,
            job_id_config: JobIdConfig::default(),
            config: ExtractConfig {
                src: Some(src),
                dst,
                ..ExtractConfig::default()
            },
        }
    }

    pub async fn run(&self) -> Result<Job> {
        Job::insert(&self.conn, &self.job_id_config, self.config.to_wire()?).await
    }
}

/// Loads data into a table.
pub struct Loader {
    conn: Connection,
    pub job_id_config: JobIdConfig,
    pub config: LoadConfig,
}

impl Loader {
    pub(crate) fn new(conn: Connection, src: LoadSource, dst: Arc<Table>) -> Self {
        Self {
            conn,
            job_id_config: JobIdConfig::default(),
            config: LoadConfig {
                src,
                dst: Some(dst),
                ..LoadConfig::default()
            },
        }
    }

    pub async fn run(&self) -> Result<Job> {
        Job::insert(&self.conn, &self.job_id_config, self.config.to_wire()?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bigquery::job::JobConfig;
    use crate::bigquery::schema::{FieldSchema, FieldType};
    use crate::transport::HttpTransport;
    use httpmock::prelude::*;

    fn conn(server: &MockServer) -> Connection {
        Connection::new(HttpTransport::new(&server.url("/v2/")).unwrap(), "proj")
    }

    fn table(conn: &Connection, id: &str) -> Arc<Table> {
        Arc::new(Table::new(conn.clone(), "proj", "d", id))
    }

    #[tokio::test]
    async fn test_copier_runs_with_job_id_and_location() {
        let server = MockServer::start();
        let conn = conn(&server);
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v2/projects/proj/jobs")
                .json_body_partial(
                    r#"{
                        "jobReference": {"projectId": "proj", "jobId": "copy-1", "location": "EU"},
                        "configuration": {"copy": {
                            "sourceTables": [{"projectId": "proj", "datasetId": "d", "tableId": "a"}],
                            "destinationTable": {"projectId": "proj", "datasetId": "d", "tableId": "b"},
                            "writeDisposition": "WRITE_TRUNCATE"
                        }}
                    }"#,
                );
            then.status(200).json_body(json!({
                "jobReference": {"projectId": "proj", "jobId": "copy-1", "location": "EU"},
                "configuration": {"copy": {
                    "sourceTables": [{"projectId": "proj", "datasetId": "d", "tableId": "a"}],
                    "destinationTable": {"projectId": "proj", "datasetId": "d", "tableId": "b"}
                }}
            }));
        });

        let mut copier = table(&conn, "b").copier_from(vec![table(&conn, "a")]);
        copier.job_id_config.job_id = "copy-1".to_string();
        copier.job_id_config.location = "EU".to_string();
        copier.config.write_disposition = Some(TableWriteDisposition::WriteTruncate);

        let job = copier.run().await.unwrap();
        mock.assert();
        assert_eq!(job.location(), "EU");
        match job.config().unwrap() {
            JobConfig::Copy(config) => {
                assert_eq!(config.srcs[0].table_id, "a");
                assert_eq!(config.dst.unwrap().table_id, "b");
            }
            other => panic!("unexpected config: {:?}", other),
        }
    }

    #[test]
    fn test_copy_without_destination_is_rejected() {
        let config = CopyConfig::default();
        assert!(config.to_wire().is_err());
    }

    #[test]
    fn test_extract_wire_form() {
        let server = MockServer::start();
        let conn = conn(&server);
        let extractor = table(&conn, "t").extractor_to(GcsReference {
            destination_format: Some(DataFormat::Json),
            compression: Some(Compression::Gzip),
            ..GcsReference::new(["gs://bucket/out-*.json"])
        });
        let wire = extractor.config.to_wire().unwrap();
        assert_eq!(wire["extract"]["destinationFormat"], "NEWLINE_DELIMITED_JSON");
        assert_eq!(wire["extract"]["compression"], "GZIP");
        assert_eq!(wire["extract"]["printHeader"], true);

        let decoded = ExtractConfig::from_wire(&conn, &wire["extract"], &wire);
        assert_eq!(decoded, extractor.config);
    }

    #[test]
    fn test_load_config_survives_the_wire() {
        let server = MockServer::start();
        let conn = conn(&server);
        let mut loader = table(&conn, "t").loader_from(GcsReference {
            source_format: Some(DataFormat::Csv),
            skip_leading_rows: 1,
            allow_quoted_newlines: true,
            schema: vec![FieldSchema::new("name", FieldType::String)],
            ..GcsReference::new(["gs://bucket/in.csv"])
        });
        loader.config.create_disposition = Some(TableCreateDisposition::CreateNever);
        loader.config.labels.insert("env".to_string(), "test".to_string());

        let wire = loader.config.to_wire().unwrap();
        assert_eq!(wire["load"]["skipLeadingRows"], 1);
        assert_eq!(wire["labels"]["env"], "test");
        let decoded = LoadConfig::from_wire(&conn, &wire["load"], &wire);
        assert_eq!(decoded, loader.config);
    }
}
