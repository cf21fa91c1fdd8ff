use super::job::{Job, JobIdConfig, TableCreateDisposition, TableWriteDisposition};
use super::rows::RowIterator;
use super::table::Table;
use super::value::Value;
use super::wire::TableReference;
use super::Connection;
use crate::utils::error::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::{json, Map, Value as Json};
use std::collections::HashMap;
use std::sync::Arc;

/// A named parameter referenced as `@name` in the query text.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParameter {
    pub name: String,
    pub value: Value,
}

impl QueryParameter {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryConfig {
    /// The query text.
    pub q: String,
    /// Table the results are written to; a temporary table when `None`.
    pub dst: Option<Arc<Table>>,
    /// Dataset used for unqualified table names.
    pub default_project_id: String,
    pub default_dataset_id: String,
    pub create_disposition: Option<TableCreateDisposition>,
    pub write_disposition: Option<TableWriteDisposition>,
    pub use_legacy_sql: bool,
    pub disable_query_cache: bool,
    pub dry_run: bool,
    pub max_bytes_billed: Option<i64>,
    pub labels: HashMap<String, String>,
    pub parameters: Vec<QueryParameter>,
}

impl QueryConfig {
    pub(crate) fn to_wire(&self) -> Result<Json> {
        let mut query = Map::new();
        query.insert("query".into(), json!(self.q));
        query.insert("useLegacySql".into(), json!(self.use_legacy_sql));
        if let Some(dst) = &self.dst {
            query.insert("destinationTable".into(), json!(dst.reference()));
        }
        if !self.default_dataset_id.is_empty() {
            query.insert(
                "defaultDataset".into(),
                json!({ "projectId": self.default_project_id, "datasetId": self.default_dataset_id }),
            );
        }
        if let Some(d) = self.create_disposition {
            query.insert("createDisposition".into(), serde_json::to_value(d)?);
        }
        if let Some(d) = self.write_disposition {
            query.insert("writeDisposition".into(), serde_json::to_value(d)?);
        }
        if self.disable_query_cache {
            query.insert("useQueryCache".into(), json!(false));
        }
        if let Some(max) = self.max_bytes_billed {
            query.insert("maximumBytesBilled".into(), json!(max.to_string()));
        }
        if !self.parameters.is_empty() {
            let params = self
                .parameters
                .iter()
                .map(|p| {
                    Ok(json!({
                        "name": p.name,
                        "parameterType": parameter_type(&p.value)?,
                        "parameterValue": parameter_value(&p.value),
                    }))
                })
                .collect::<Result<Vec<_>>>()?;
            query.insert("parameterMode".into(), json!("NAMED"));
            query.insert("queryParameters".into(), Json::Array(params));
        }

        let mut configuration = json!({ "query": query });
        if !self.labels.is_empty() {
            configuration["labels"] = json!(self.labels);
        }
        if self.dry_run {
            configuration["dryRun"] = json!(true);
        }
        Ok(configuration)
    }

    pub(crate) fn from_wire(conn: &Connection, query: &Json, configuration: &Json) -> Self {
        let default_dataset = query.get("defaultDataset");
        Self {
            q: text(query, "query"),
            dst: table_from_wire(conn, query.get("destinationTable")),
            default_project_id: default_dataset.map(|d| text(d, "projectId")).unwrap_or_default(),
            default_dataset_id: default_dataset.map(|d| text(d, "datasetId")).unwrap_or_default(),
            create_disposition: from_field(query, "createDisposition"),
            write_disposition: from_field(query, "writeDisposition"),
            use_legacy_sql: query.get("useLegacySql").and_then(Json::as_bool).unwrap_or(false),
            disable_query_cache: query.get("useQueryCache").and_then(Json::as_bool) == Some(false),
            dry_run: configuration.get("dryRun").and_then(Json::as_bool).unwrap_or(false),
            max_bytes_billed: query
                .get("maximumBytesBilled")
                .and_then(Json::as_str)
                .and_then(|s| s.parse().ok()),
            labels: labels_from_wire(configuration),
            parameters: query
                .get("queryParameters")
                .and_then(Json::as_array)
                .map(|params| {
                    params
                        .iter()
                        .map(|p| QueryParameter {
                            name: text(p, "name"),
                            value: parameter_from_wire(
                                p.get("parameterType").unwrap_or(&Json::Null),
                                p.get("parameterValue").unwrap_or(&Json::Null),
                            ),
                        })
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

fn parameter_type(value: &Value) -> Result<Json> {
    let name = match value {
        Value::Bool(_) => "BOOL",
        Value::Int64(_) => "INT64",
        Value::Float64(_) => "FLOAT64",
        Value::Numeric(_) => "NUMERIC",
        Value::String(_) => "STRING",
        Value::Bytes(_) => "BYTES",
        Value::Timestamp(_) => "TIMESTAMP",
        Value::Date(_) => "DATE",
        Value::Time(_) => "TIME",
        Value::DateTime(_) => "DATETIME",
        Value::Geography(_) => "GEOGRAPHY",
        Value::Json(_) => "JSON",
        Value::Repeated(items) => {
            let first = items.first().ok_or_else(|| unsupported("an empty array"))?;
            return Ok(json!({ "type": "ARRAY", "arrayType": parameter_type(first)? }));
        }
        Value::Null => return Err(unsupported("NULL")),
        Value::Record(_) => return Err(unsupported("a RECORD")),
    };
    Ok(json!({ "type": name }))
}

fn unsupported(what: &str) -> Error {
    Error::InvalidConfigValue {
        field: "parameters".to_string(),
        value: what.to_string(),
        reason: "cannot be sent as a query parameter".to_string(),
    }
}

fn parameter_value(value: &Value) -> Json {
    match value {
        Value::Repeated(items) => json!({ "arrayValues": items.iter().map(parameter_value).collect::<Vec<_>>() }),
        Value::Timestamp(t) => json!({ "value": t.format("%Y-%m-%d %H:%M:%S%.6f%:z").to_string() }),
        Value::Json(j) => json!({ "value": j.to_string() }),
        other => match other.to_json() {
            Json::String(s) => json!({ "value": s }),
            scalar => json!({ "value": scalar.to_string() }),
        },
    }
}

fn parameter_from_wire(param_type: &Json, param_value: &Json) -> Value {
    if param_type.get("type").and_then(Json::as_str) == Some("ARRAY") {
        let item_type = param_type.get("arrayType").unwrap_or(&Json::Null);
        let items = param_value
            .get("arrayValues")
            .and_then(Json::as_array)
            .map(|values| values.iter().map(|v| parameter_from_wire(item_type, v)).collect())
            .unwrap_or_default();
        return Value::Repeated(items);
    }

    let raw = text(param_value, "value");
    let parsed = match param_type.get("type").and_then(Json::as_str).unwrap_or("STRING") {
        "BOOL" => raw.parse().ok().map(Value::Bool),
        "INT64" => raw.parse().ok().map(Value::Int64),
        "FLOAT64" => raw.parse().ok().map(Value::Float64),
        "NUMERIC" | "BIGNUMERIC" => Some(Value::Numeric(raw.clone())),
        "TIMESTAMP" => DateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S%.f%:z")
            .ok()
            .map(|t| Value::Timestamp(t.with_timezone(&Utc))),
        "DATE" => NaiveDate::parse_from_str(&raw, "%Y-%m-%d").ok().map(Value::Date),
        "TIME" => NaiveTime::parse_from_str(&raw, "%H:%M:%S%.f").ok().map(Value::Time),
        "DATETIME" => NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(Value::DateTime),
        "GEOGRAPHY" => Some(Value::Geography(raw.clone())),
        _ => None,
    };
    parsed.unwrap_or(Value::String(raw))
}

pub(crate) fn text(value: &Json, field: &str) -> String {
    value
        .get(field)
        .and_then(Json::as_str)
        .unwrap_or_default()
        .to_string()
}

pub(crate) fn from_field<T: serde::de::DeserializeOwned>(value: &Json, field: &str) -> Option<T> {
    value
        .get(field)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

pub(crate) fn table_from_wire(conn: &Connection, reference: Option<&Json>) -> Option<Arc<Table>> {
    reference
        .and_then(|r| serde_json::from_value::<TableReference>(r.clone()).ok())
        .map(|r| Arc::new(Table::from_reference(conn.clone(), &r)))
}

pub(crate) fn labels_from_wire(configuration: &Json) -> HashMap<String, String> {
    from_field(configuration, "labels").unwrap_or_default()
}

/// A query job waiting to be run.
pub struct Query {
    conn: Connection,
    pub job_id_config: JobIdConfig,
    pub config: QueryConfig,
}

impl Query {
    pub(crate) fn new(conn: Connection, q: &str) -> Self {
        Self {
            conn,
            job_id_config: JobIdConfig::default(),
            config: QueryConfig {
                q: q.to_string(),
                ..QueryConfig::default()
            },
        }
    }

    /// Starts the query job.
    pub async fn run(&self) -> Result<Job> {
        Job::insert(&self.conn, &self.job_id_config, self.config.to_wire()?).await
    }

    /// Runs the query and returns an iterator over its results.
    pub async fn read(&self) -> Result<RowIterator> {
        self.run().await?.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::HttpTransport;
    use chrono::TimeZone;
    use httpmock::prelude::*;

    fn conn(server: &MockServer) -> Connection {
        Connection::new(HttpTransport::new(&server.url("/v2/")).unwrap(), "proj")
    }

    #[test]
    fn test_parameters_are_named_and_typed() {
        let config = QueryConfig {
            q: "SELECT * FROM t WHERE a = @a AND ts < @ts AND id IN UNNEST(@ids)".to_string(),
            parameters: vec![
                QueryParameter::new("a", "x"),
                QueryParameter::new("ts", Value::Timestamp(chrono::Utc.timestamp_opt(0, 0).unwrap())),
                QueryParameter::new("ids", Value::Repeated(vec![1i64.into(), 2i64.into()])),
            ],
            ..QueryConfig::default()
        };
        let wire = config.to_wire().unwrap();
        let params = &wire["query"]["queryParameters"];
        assert_eq!(wire["query"]["parameterMode"], "NAMED");
        assert_eq!(params[0]["parameterValue"]["value"], "x");
        assert_eq!(params[1]["parameterValue"]["value"], "1970-01-01 00:00:00.000000+00:00");
        assert_eq!(params[2]["parameterType"]["arrayType"]["type"], "INT64");
        assert_eq!(params[2]["parameterValue"]["arrayValues"][1]["value"], "2");
    }

    #[test]
    fn test_null_parameter_is_rejected() {
        let config = QueryConfig {
            parameters: vec![QueryParameter::new("n", Value::Null)],
            ..QueryConfig::default()
        };
        assert!(matches!(config.to_wire(), Err(Error::InvalidConfigValue { .. })));
    }

    #[test]
    fn test_config_survives_the_wire() {
        let server = MockServer::start();
        let conn = conn(&server);
        let config = QueryConfig {
            q: "SELECT 1".to_string(),
            dst: Some(Arc::new(Table::new(conn.clone(), "proj", "d", "out"))),
            default_project_id: "proj".to_string(),
            default_dataset_id: "d".to_string(),
            write_disposition: Some(TableWriteDisposition::WriteTruncate),
            disable_query_cache: true,
            max_bytes_billed: Some(1 << 30),
            labels: HashMap::from([("team".to_string(), "data".to_string())]),
            parameters: vec![QueryParameter::new("flag", true)],
            ..QueryConfig::default()
        };
        let wire = config.to_wire().unwrap();
        let decoded = QueryConfig::from_wire(&conn, &wire["query"], &wire);
        assert_eq!(decoded, config);
    }

    #[tokio::test]
    async fn test_read_runs_then_fetches_results() {
        let server = MockServer::start();
        let insert = server.mock(|when, then| {
            when.method(POST)
                .path("/v2/projects/proj/jobs")
                .json_body_partial(r#"{"configuration": {"query": {"query": "SELECT 17 AS n"}}}"#);
            then.status(200).json_body(json!({
                "jobReference": {"projectId": "proj", "jobId": "q1"},
                "configuration": {"query": {"query": "SELECT 17 AS n"}},
                "status": {"state": "RUNNING"}
            }));
        });
        let results = server.mock(|when, then| {
            when.method(GET).path("/v2/projects/proj/queries/q1");
            then.status(200).json_body(json!({
                "jobComplete": true,
                "schema": {"fields": [{"name": "n", "type": "INTEGER"}]},
                "totalRows": "1",
                "rows": [{"f": [{"v": "17"}]}]
            }));
        });

        let query = Query::new(conn(&server), "SELECT 17 AS n");
        let mut rows = query.read().await.unwrap();
        assert_eq!(rows.next().await.unwrap(), Some(vec![Value::Int64(17)]));
        assert!(rows.next().await.unwrap().is_none());
        insert.assert();
        results.assert();
    }
}
