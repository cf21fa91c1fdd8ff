use super::schema::{schema_from_wire, Schema, WireTableSchema};
use super::table::Table;
use super::value::{decode_row, decode_row_into, Value};
use super::wire::opt_i64;
use super::{Connection, PageInfo};
use crate::utils::error::Result;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as Json;
use std::collections::VecDeque;

enum Source {
    Table(Table),
    Query {
        conn: Connection,
        project_id: String,
        job_id: String,
        location: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RowsPage {
    #[serde(default = "complete")]
    job_complete: bool,
    #[serde(default)]
    schema: Option<WireTableSchema>,
    #[serde(default, with = "opt_i64")]
    total_rows: Option<i64>,
    #[serde(default)]
    page_token: String,
    #[serde(default)]
    rows: Vec<Json>,
}

fn complete() -> bool {
    true
}

/// Rows of a table or of a query's results, fetched a page at a time.
///
/// [`schema`](Self::schema) and [`total_rows`](Self::total_rows) are only
/// known once the first page has been fetched.
pub struct RowIterator {
    source: Source,
    start_index: u64,
    schema: Schema,
    total_rows: u64,
    buffered: VecDeque<Vec<Value>>,
    page_info: PageInfo,
    started: bool,
    exhausted: bool,
}

impl RowIterator {
    fn with_source(source: Source) -> Self {
        Self {
            source,
            start_index: 0,
            schema: Schema::new(),
            total_rows: 0,
            buffered: VecDeque::new(),
            page_info: PageInfo::default(),
            started: false,
            exhausted: false,
        }
    }

    pub(crate) fn for_table(table: Table) -> Self {
        Self::with_source(Source::Table(table))
    }

    pub(crate) fn for_query(conn: Connection, project_id: &str, job_id: &str, location: &str) -> Self {
        Self::with_source(Source::Query {
            conn,
            project_id: project_id.to_string(),
            job_id: job_id.to_string(),
            location: location.to_string(),
        })
    }

    /// Row to start reading from; only honored before the first fetch.
    pub fn set_start_index(&mut self, index: u64) {
        self.start_index = index;
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn total_rows(&self) -> u64 {
        self.total_rows
    }

    pub fn page_info(&self) -> &PageInfo {
        &self.page_info
    }

    pub fn page_info_mut(&mut self) -> &mut PageInfo {
        &mut self.page_info
    }

    pub async fn next(&mut self) -> Result<Option<Vec<Value>>> {
        while self.buffered.is_empty() && !self.exhausted {
            self.fetch().await?;
        }
        let row = self.buffered.pop_front();
        self.page_info.remaining = self.buffered.len();
        Ok(row)
    }

    /// Like [`next`](Self::next), loading the row into a struct whose fields
    /// are named after the columns.
    pub async fn next_into<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        match self.next().await? {
            Some(row) => decode_row_into(&self.schema, &row).map(Some),
            None => Ok(None),
        }
    }

    fn page_query(&self) -> Vec<(&'static str, String)> {
        let mut query = self.page_info.query();
        if !self.started && self.page_info.token.is_empty() && self.start_index > 0 {
            query.push(("startIndex", self.start_index.to_string()));
        }
        query
    }

    async fn fetch(&mut self) -> Result<()> {
        let query = self.page_query();
        let page: RowsPage = match &self.source {
            Source::Table(table) => {
                if !self.started {
                    self.schema = table.metadata().await?.schema;
                }
                table
                    .conn
                    .transport
                    .get(&format!("{}/data", table.path()), &query)
                    .await?
            }
            Source::Query {
                conn,
                project_id,
                job_id,
                location,
            } => {
                let mut query = query;
                if !location.is_empty() {
                    query.push(("location", location.clone()));
                }
                loop {
                    let page: RowsPage = conn
                        .transport
                        .get(&format!("projects/{}/queries/{}", project_id, job_id), &query)
                        .await?;
                    if page.job_complete {
                        break page;
                    }
                    tracing::debug!(job = %job_id, "query results not ready yet");
                }
            }
        };

        if let Some(schema) = &page.schema {
            self.schema = schema_from_wire(schema);
        }
        self.total_rows = page.total_rows.unwrap_or_default().max(0) as u64;
        for row in &page.rows {
            self.buffered.push_back(decode_row(&self.schema, row)?);
        }
        self.started = true;
        self.exhausted = page.page_token.is_empty();
        self.page_info.token = page.page_token;
        self.page_info.remaining = self.buffered.len();
        Ok(())
    }
}
