use super::key::Key;
use super::value::{Entity, Value};
use crate::transport::HttpTransport;
use crate::utils::error::{Error, Result};
use serde_json::{json, Value as Json};
use std::collections::VecDeque;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Equal,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    NotEqual,
    In,
}

impl FilterOp {
    fn wire_name(self) -> &'static str {
        match self {
            FilterOp::Equal => "EQUAL",
            FilterOp::LessThan => "LESS_THAN",
            FilterOp::LessThanOrEqual => "LESS_THAN_OR_EQUAL",
            FilterOp::GreaterThan => "GREATER_THAN",
            FilterOp::GreaterThanOrEqual => "GREATER_THAN_OR_EQUAL",
            FilterOp::NotEqual => "NOT_EQUAL",
            FilterOp::In => "IN",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub property: String,
    pub op: FilterOp,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub property: String,
    pub descending: bool,
}

/// Opaque position in a query's result set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Cursor(pub String);

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A query over one kind, built up with the chaining methods below.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub kind: String,
    pub namespace: String,
    pub filters: Vec<Filter>,
    pub orders: Vec<Order>,
    pub ancestor: Option<Key>,
    pub limit: Option<i32>,
    pub offset: i32,
    pub keys_only: bool,
    pub start: Option<Cursor>,
}

impl Query {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    pub fn filter(mut self, property: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            property: property.into(),
            op,
            value: value.into(),
        });
        self
    }

    /// Orders by `property`; a leading `-` sorts descending.
    pub fn order(mut self, property: &str) -> Self {
        let (property, descending) = match property.strip_prefix('-') {
            Some(rest) => (rest.trim(), true),
            None => (property.trim(), false),
        };
        self.orders.push(Order {
            property: property.to_string(),
            descending,
        });
        self
    }

    pub fn ancestor(mut self, key: Key) -> Self {
        self.ancestor = Some(key);
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn limit(mut self, limit: i32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i32) -> Self {
        self.offset = offset;
        self
    }

    pub fn keys_only(mut self) -> Self {
        self.keys_only = true;
        self
    }

    pub fn start(mut self, cursor: Cursor) -> Self {
        self.start = Some(cursor);
        self
    }

    pub(crate) fn to_wire(&self, project_id: &str) -> Json {
        let mut filters: Vec<Json> = self
            .filters
            .iter()
            .map(|f| {
                json!({"propertyFilter": {
                    "property": {"name": f.property},
                    "op": f.op.wire_name(),
                    "value": f.value.to_wire(project_id),
                }})
            })
            .collect();
        if let Some(ancestor) = &self.ancestor {
            filters.push(json!({"propertyFilter": {
                "property": {"name": "__key__"},
                "op": "HAS_ANCESTOR",
                "value": {"keyValue": ancestor.to_wire(project_id)},
            }}));
        }

        let mut query = json!({});
        if !self.kind.is_empty() {
            query["kind"] = json!([{ "name": self.kind }]);
        }
        match filters.len() {
            0 => {}
            1 => query["filter"] = filters.remove(0),
            _ => query["filter"] = json!({"compositeFilter": {"op": "AND", "filters": filters}}),
        }
        if !self.orders.is_empty() {
            query["order"] = self
                .orders
                .iter()
                .map(|o| {
                    json!({
                        "property": {"name": o.property},
                        "direction": if o.descending { "DESCENDING" } else { "ASCENDING" },
                    })
                })
                .collect();
        }
        if self.keys_only {
            query["projection"] = json!([{ "property": {"name": "__key__"} }]);
        }
        if let Some(limit) = self.limit {
            query["limit"] = json!(limit);
        }
        if self.offset > 0 {
            query["offset"] = json!(self.offset);
        }
        if let Some(start) = &self.start {
            query["startCursor"] = json!(start.0);
        }
        query
    }
}

/// Walks the results of a query, fetching further batches on demand.
pub struct QueryIterator {
    transport: HttpTransport,
    project_id: String,
    query: Query,
    buffered: VecDeque<(Key, Entity, Option<Cursor>)>,
    cursor: Option<Cursor>,
    exhausted: bool,
}

impl QueryIterator {
    pub(crate) fn new(transport: HttpTransport, project_id: &str, query: Query) -> Self {
        let cursor = query.start.clone();
        Self {
            transport,
            project_id: project_id.to_string(),
            query,
            buffered: VecDeque::new(),
            cursor,
            exhausted: false,
        }
    }

    /// The next result, or `None` once the query is exhausted. For keys-only
    /// queries the entity carries the key and no properties.
    pub async fn next(&mut self) -> Result<Option<(Key, Entity)>> {
        while self.buffered.is_empty() && !self.exhausted {
            self.fetch().await?;
        }

        Ok(self.buffered.pop_front().map(|(key, entity, cursor)| {
            if cursor.is_some() {
                self.cursor = cursor;
            }
            (key, entity)
        }))
    }

    /// Position just after the last result returned by [`next`](Self::next).
    pub fn cursor(&self) -> Result<Cursor> {
        self.cursor.clone().ok_or_else(|| Error::InvalidResponse {
            message: "no cursor is available for this query yet".to_string(),
        })
    }

    async fn fetch(&mut self) -> Result<()> {
        if self.query.limit == Some(0) {
            self.exhausted = true;
            return Ok(());
        }

        let mut partition = json!({ "projectId": self.project_id });
        if !self.query.namespace.is_empty() {
            partition["namespaceId"] = json!(self.query.namespace);
        }
        let body = json!({
            "partitionId": partition,
            "query": self.query.to_wire(&self.project_id),
        });

        let response: Json = self
            .transport
            .post(&format!("projects/{}:runQuery", self.project_id), &[], &body)
            .await?;
        let batch = response
            .get("batch")
            .ok_or_else(|| Error::invalid_response("runQuery response without a batch"))?;

        let results = batch
            .get("entityResults")
            .and_then(Json::as_array)
            .cloned()
            .unwrap_or_default();
        for result in &results {
            let wire = result
                .get("entity")
                .ok_or_else(|| Error::invalid_response("entity result without an entity"))?;
            let entity = Entity::from_wire(wire)?;
            let key = entity
                .key
                .clone()
                .ok_or_else(|| Error::invalid_response("query result without a key"))?;
            let cursor = result
                .get("cursor")
                .and_then(Json::as_str)
                .map(|c| Cursor(c.to_string()));
            self.buffered.push_back((key, entity, cursor));
        }

        let end_cursor = batch
            .get("endCursor")
            .and_then(Json::as_str)
            .map(|c| Cursor(c.to_string()));
        let skipped = batch
            .get("skippedResults")
            .and_then(Json::as_i64)
            .unwrap_or_default() as i32;
        let more = batch
            .get("moreResults")
            .and_then(Json::as_str)
            .unwrap_or("NO_MORE_RESULTS");

        // The last entity of a batch may not carry its own cursor.
        if let (Some(last), Some(end)) = (self.buffered.back_mut(), end_cursor.clone()) {
            if last.2.is_none() {
                last.2 = Some(end);
            }
        }
        if results.is_empty() && end_cursor.is_some() {
            self.cursor = end_cursor.clone();
        }

        if more == "NOT_FINISHED" {
            self.query.offset = (self.query.offset - skipped).max(0);
            if let Some(limit) = self.query.limit.as_mut() {
                *limit -= results.len() as i32;
            }
            self.query.start = end_cursor;
        } else {
            self.exhausted = true;
        }
        tracing::debug!(
            kind = %self.query.kind,
            returned = results.len(),
            more,
            "fetched query batch"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn test_query_wire_form() {
        let query = Query::new("Task")
            .filter("done", FilterOp::Equal, false)
            .filter("priority", FilterOp::GreaterThan, 3)
            .order("-created")
            .limit(5)
            .keys_only();

        let wire = query.to_wire("proj");
        assert_eq!(wire["kind"][0]["name"], "Task");
        assert_eq!(wire["filter"]["compositeFilter"]["filters"][1]["propertyFilter"]["op"], "GREATER_THAN");
        assert_eq!(wire["order"][0]["direction"], "DESCENDING");
        assert_eq!(wire["order"][0]["property"]["name"], "created");
        assert_eq!(wire["projection"][0]["property"]["name"], "__key__");
        assert_eq!(wire["limit"], 5);
    }

    #[test]
    fn test_single_filter_is_not_composite() {
        let wire = Query::new("Task")
            .ancestor(Key::with_name("List", "inbox", None))
            .to_wire("proj");
        assert_eq!(wire["filter"]["propertyFilter"]["op"], "HAS_ANCESTOR");
    }

    #[tokio::test]
    async fn test_iterator_follows_batches() {
        let server = MockServer::start();
        let second = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/projects/proj:runQuery")
                .body_contains("\"startCursor\":\"c1\"");
            then.status(200).json_body(json!({"batch": {
                "entityResults": [{"entity": {
                    "key": {"partitionId": {"projectId": "proj"}, "path": [{"kind": "Task", "id": "2"}]},
                    "properties": {}
                }, "cursor": "c2"}],
                "endCursor": "c2",
                "moreResults": "NO_MORE_RESULTS"
            }}));
        });
        let first = server.mock(|when, then| {
            when.method(POST).path("/v1/projects/proj:runQuery");
            then.status(200).json_body(json!({"batch": {
                "entityResults": [{"entity": {
                    "key": {"partitionId": {"projectId": "proj"}, "path": [{"kind": "Task", "id": "1"}]},
                    "properties": {"n": {"integerValue": "1"}}
                }}],
                "endCursor": "c1",
                "moreResults": "NOT_FINISHED"
            }}));
        });

        let transport = HttpTransport::new(&server.url("/v1/")).unwrap();
        let mut it = QueryIterator::new(transport, "proj", Query::new("Task"));

        let (key, entity) = it.next().await.unwrap().unwrap();
        assert_eq!(key.id, 1);
        assert_eq!(entity.get("n"), Some(&Value::Integer(1)));
        assert_eq!(it.cursor().unwrap(), Cursor("c1".to_string()));

        let (key, _) = it.next().await.unwrap().unwrap();
        assert_eq!(key.id, 2);
        assert!(it.next().await.unwrap().is_none());
        assert_eq!(it.cursor().unwrap().to_string(), "c2");

        first.assert_hits(1);
        second.assert_hits(1);
    }
}
