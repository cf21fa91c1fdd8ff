use crate::utils::error::{Error, Result};
use serde_json::{json, Value as Json};
use std::fmt;

/// Identifies an entity: a kind plus either a numeric ID or a string name,
/// optionally nested under a parent key.
///
/// A key with neither ID nor name is incomplete; the service assigns an ID
/// when such a key is written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Key {
    pub kind: String,
    pub id: i64,
    pub name: String,
    pub parent: Option<Box<Key>>,
    pub namespace: String,
}

impl Key {
    pub fn incomplete(kind: impl Into<String>, parent: Option<Key>) -> Self {
        Self {
            kind: kind.into(),
            parent: parent.map(Box::new),
            ..Self::default()
        }
    }

    pub fn with_id(kind: impl Into<String>, id: i64, parent: Option<Key>) -> Self {
        Self {
            kind: kind.into(),
            id,
            parent: parent.map(Box::new),
            ..Self::default()
        }
    }

    pub fn with_name(kind: impl Into<String>, name: impl Into<String>, parent: Option<Key>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            parent: parent.map(Box::new),
            ..Self::default()
        }
    }

    pub fn is_incomplete(&self) -> bool {
        self.name.is_empty() && self.id == 0
    }

    /// Path elements from the root ancestor down to this key.
    fn path(&self) -> Vec<&Key> {
        let mut path = vec![self];
        let mut current = self;
        while let Some(parent) = current.parent.as_deref() {
            path.push(parent);
            current = parent;
        }
        path.reverse();
        path
    }

    pub(crate) fn to_wire(&self, project_id: &str) -> Json {
        let path: Vec<Json> = self
            .path()
            .into_iter()
            .map(|element| {
                if !element.name.is_empty() {
                    json!({"kind": element.kind, "name": element.name})
                } else if element.id != 0 {
                    json!({"kind": element.kind, "id": element.id.to_string()})
                } else {
                    json!({"kind": element.kind})
                }
            })
            .collect();

        let mut partition = json!({ "projectId": project_id });
        if !self.namespace.is_empty() {
            partition["namespaceId"] = Json::String(self.namespace.clone());
        }
        json!({"partitionId": partition, "path": path})
    }

    pub(crate) fn from_wire(wire: &Json) -> Result<Self> {
        let namespace = wire
            .pointer("/partitionId/namespaceId")
            .and_then(Json::as_str)
            .unwrap_or_default()
            .to_string();
        let path = wire
            .get("path")
            .and_then(Json::as_array)
            .ok_or_else(|| Error::invalid_response("key without a path"))?;

        let mut key: Option<Key> = None;
        for element in path {
            let kind = element
                .get("kind")
                .and_then(Json::as_str)
                .ok_or_else(|| Error::invalid_response("key path element without a kind"))?;
            let id = match element.get("id") {
                Some(Json::String(s)) => s
                    .parse::<i64>()
                    .map_err(|_| Error::invalid_response(format!("invalid key id {}", s)))?,
                Some(Json::Number(n)) => n.as_i64().unwrap_or_default(),
                _ => 0,
            };
            let name = element
                .get("name")
                .and_then(Json::as_str)
                .unwrap_or_default()
                .to_string();
            key = Some(Key {
                kind: kind.to_string(),
                id,
                name,
                parent: key.map(Box::new),
                namespace: namespace.clone(),
            });
        }
        key.ok_or_else(|| Error::invalid_response("key with an empty path"))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for element in self.path() {
            if element.name.is_empty() {
                write!(f, "/{},{}", element.kind, element.id)?;
            } else {
                write!(f, "/{},{}", element.kind, element.name)?;
            }
        }
        Ok(())
    }
}
