use super::schema::FieldSchema;
use super::table::Table;
use super::value::{row_to_json, Value};
use crate::utils::error::{Error, Result, RowInsertionError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

/// One row for a streaming insert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertRow {
    /// Lets the service drop retried duplicates on a best-effort basis.
    pub insert_id: Option<String>,
    pub values: Map<String, Json>,
}

impl InsertRow {
    /// A row from any struct that serializes to a JSON object.
    pub fn from_serializable<T: Serialize + ?Sized>(insert_id: Option<String>, src: &T) -> Result<Self> {
        match serde_json::to_value(src)? {
            Json::Object(values) => Ok(Self { insert_id, values }),
            other => Err(Error::invalid_response(format!(
                "rows must serialize to an object, got {}",
                other
            ))),
        }
    }

    /// A row from positional values laid out like `schema`.
    pub fn from_values(insert_id: Option<String>, schema: &[FieldSchema], row: &[Value]) -> Self {
        let values = match row_to_json(schema, row) {
            Json::Object(values) => values,
            _ => Map::new(),
        };
        Self { insert_id, values }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllRequest<'a> {
    rows: Vec<WireRow<'a>>,
    skip_invalid_rows: bool,
    ignore_unknown_values: bool,
    #[serde(skip_serializing_if = "str::is_empty")]
    template_suffix: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRow<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    insert_id: Option<&'a str>,
    json: &'a Map<String, Json>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllResponse {
    #[serde(default)]
    insert_errors: Vec<WireInsertError>,
}

#[derive(Debug, Deserialize)]
struct WireInsertError {
    index: usize,
    #[serde(default)]
    errors: Vec<WireErrorProto>,
}

#[derive(Debug, Deserialize)]
struct WireErrorProto {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    message: String,
}

/// Streams rows into a table through `insertAll`.
#[derive(Debug, Clone)]
pub struct Uploader {
    table: Table,
    /// Insert the valid rows of a request even if some are invalid.
    pub skip_invalid_rows: bool,
    /// Accept rows with values that match no column, dropping those values.
    pub ignore_unknown_values: bool,
    /// Insert into `<table><suffix>`, created from this table's schema on
    /// first use.
    pub table_template_suffix: String,
}

impl Uploader {
    pub(crate) fn new(table: Table) -> Self {
        Self {
            table,
            skip_invalid_rows: false,
            ignore_unknown_values: false,
            table_template_suffix: String::new(),
        }
    }

    /// Inserts `rows`; rows the service rejects are reported together as
    /// [`Error::PutMulti`].
    pub async fn put(&self, rows: &[InsertRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let request = InsertAllRequest {
            rows: rows
                .iter()
                .map(|r| WireRow {
                    insert_id: r.insert_id.as_deref(),
                    json: &r.values,
                })
                .collect(),
            skip_invalid_rows: self.skip_invalid_rows,
            ignore_unknown_values: self.ignore_unknown_values,
            template_suffix: &self.table_template_suffix,
        };

        let response: InsertAllResponse = self
            .table
            .conn
            .transport
            .post(&format!("{}/insertAll", self.table.path()), &[], &request)
            .await?;
        tracing::debug!(
            table = %self.table.fully_qualified_name(),
            rows = rows.len(),
            failed = response.insert_errors.len(),
            "streamed rows"
        );
        if response.insert_errors.is_empty() {
            return Ok(());
        }

        Err(Error::PutMulti(
            response
                .insert_errors
                .into_iter()
                .map(|e| RowInsertionError {
                    insert_id: rows.get(e.index).and_then(|r| r.insert_id.clone()),
                    row_index: e.index,
                    reasons: e
                        .errors
                        .into_iter()
                        .map(|p| {
                            if p.location.is_empty() {
                                format!("{}: {}", p.reason, p.message)
                            } else {
                                format!("{} at {}: {}", p.reason, p.location, p.message)
                            }
                        })
                        .collect(),
                })
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bigquery::schema::FieldType;
    use crate::bigquery::Connection;
    use crate::transport::HttpTransport;
    use httpmock::prelude::*;
    use serde_json::json;

    fn uploader(server: &MockServer) -> Uploader {
        let conn = Connection::new(HttpTransport::new(&server.url("/v2/")).unwrap(), "proj");
        Table::new(conn, "proj", "ds", "t").uploader()
    }

    #[tokio::test]
    async fn test_put_sends_rows_and_options() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v2/projects/proj/datasets/ds/tables/t/insertAll")
                .json_body(json!({
                    "rows": [{"insertId": "a", "json": {"name": "a", "score": 0}}],
                    "skipInvalidRows": true,
                    "ignoreUnknownValues": false
                }));
            then.status(200).json_body(json!({"kind": "bigquery#tableDataInsertAllResponse"}));
        });

        let schema = vec![
            FieldSchema::new("name", FieldType::String),
            FieldSchema::new("score", FieldType::Integer),
        ];
        let mut up = uploader(&server);
        up.skip_invalid_rows = true;
        up.put(&[InsertRow::from_values(
            Some("a".to_string()),
            &schema,
            &[Value::from("a"), Value::Int64(0)],
        )])
        .await
        .unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn test_rejected_rows_become_put_multi() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST)
                .path("/v2/projects/proj/datasets/ds/tables/t/insertAll");
            then.status(200).json_body(json!({"insertErrors": [{
                "index": 1,
                "errors": [{"reason": "invalid", "location": "score", "message": "not an integer"}]
            }]}));
        });

        let rows = vec![
            InsertRow::from_serializable(Some("a".to_string()), &json!({"score": 1})).unwrap(),
            InsertRow::from_serializable(Some("b".to_string()), &json!({"score": "x"})).unwrap(),
        ];
        match uploader(&server).put(&rows).await.unwrap_err() {
            Error::PutMulti(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].row_index, 1);
                assert_eq!(errors[0].insert_id.as_deref(), Some("b"));
                assert_eq!(errors[0].reasons, vec!["invalid at score: not an integer"]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
