use super::key::Key;
use crate::utils::error::{Error, Result};
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value as Json};
use std::collections::{BTreeMap, BTreeSet};

/// A property value as stored by the document store.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Timestamp(DateTime<Utc>),
    Key(Key),
    String(String),
    Blob(Vec<u8>),
    Array(Vec<Value>),
    Entity(Entity),
}

/// A set of named properties, optionally carrying the key it is stored under.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entity {
    pub key: Option<Key>,
    pub properties: BTreeMap<String, Value>,
    /// Properties left out of the service's indexes (needed for long strings).
    pub unindexed: BTreeSet<String>,
}

impl Entity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(key: Key) -> Self {
        Self {
            key: Some(key),
            ..Self::default()
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Builds an entity from any struct that serializes to a JSON object.
    /// Integers become [`Value::Integer`], other numbers [`Value::Double`] and
    /// nested objects embedded entities.
    pub fn from_serializable<T: Serialize + ?Sized>(src: &T) -> Result<Self> {
        match serde_json::to_value(src)? {
            Json::Object(map) => Ok(Self {
                key: None,
                properties: map
                    .into_iter()
                    .map(|(name, value)| (name, Value::from_json(value)))
                    .collect(),
                unindexed: BTreeSet::new(),
            }),
            other => Err(Error::invalid_response(format!(
                "entities must serialize to an object, got {}",
                other
            ))),
        }
    }

    /// Loads the entity's properties into `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.to_json())?)
    }

    fn to_json(&self) -> Json {
        Json::Object(
            self.properties
                .iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect::<Map<String, Json>>(),
        )
    }

    pub(crate) fn to_wire(&self, project_id: &str) -> Json {
        let properties: Map<String, Json> = self
            .properties
            .iter()
            .map(|(name, value)| {
                let mut wire = value.to_wire(project_id);
                if self.unindexed.contains(name) {
                    wire["excludeFromIndexes"] = Json::Bool(true);
                }
                (name.clone(), wire)
            })
            .collect();

        let mut wire = json!({ "properties": properties });
        if let Some(key) = &self.key {
            wire["key"] = key.to_wire(project_id);
        }
        wire
    }

    pub(crate) fn from_wire(wire: &Json) -> Result<Self> {
        let key = wire.get("key").map(Key::from_wire).transpose()?;
        let mut entity = Entity {
            key,
            ..Entity::default()
        };
        if let Some(properties) = wire.get("properties").and_then(Json::as_object) {
            for (name, value) in properties {
                if value
                    .get("excludeFromIndexes")
                    .and_then(Json::as_bool)
                    .unwrap_or(false)
                {
                    entity.unindexed.insert(name.clone());
                }
                entity
                    .properties
                    .insert(name.clone(), Value::from_wire(value)?);
            }
        }
        Ok(entity)
    }
}

impl Value {
    fn from_json(json: Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Boolean(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Double(n.as_f64().unwrap_or_default()),
            },
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::Array(items.into_iter().map(Value::from_json).collect()),
            Json::Object(map) => Value::Entity(Entity {
                key: None,
                properties: map
                    .into_iter()
                    .map(|(name, value)| (name, Value::from_json(value)))
                    .collect(),
                unindexed: BTreeSet::new(),
            }),
        }
    }

    fn to_json(&self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Boolean(b) => Json::Bool(*b),
            Value::Integer(i) => json!(i),
            Value::Double(d) => json!(d),
            Value::Timestamp(t) => Json::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::Key(k) => Json::String(k.to_string()),
            Value::String(s) => Json::String(s.clone()),
            Value::Blob(bytes) => json!(bytes),
            Value::Array(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Entity(entity) => entity.to_json(),
        }
    }

    pub(crate) fn to_wire(&self, project_id: &str) -> Json {
        match self {
            Value::Null => json!({ "nullValue": null }),
            Value::Boolean(b) => json!({ "booleanValue": b }),
            Value::Integer(i) => json!({ "integerValue": i.to_string() }),
            Value::Double(d) => json!({ "doubleValue": d }),
            Value::Timestamp(t) => {
                json!({ "timestampValue": t.to_rfc3339_opts(SecondsFormat::AutoSi, true) })
            }
            Value::Key(k) => json!({ "keyValue": k.to_wire(project_id) }),
            Value::String(s) => json!({ "stringValue": s }),
            Value::Blob(bytes) => {
                json!({ "blobValue": base64::engine::general_purpose::STANDARD.encode(bytes) })
            }
            Value::Array(items) => json!({
                "arrayValue": {
                    "values": items.iter().map(|v| v.to_wire(project_id)).collect::<Vec<_>>()
                }
            }),
            Value::Entity(entity) => json!({ "entityValue": entity.to_wire(project_id) }),
        }
    }

    pub(crate) fn from_wire(wire: &Json) -> Result<Self> {
        if let Some(b) = wire.get("booleanValue").and_then(Json::as_bool) {
            return Ok(Value::Boolean(b));
        }
        if let Some(i) = wire.get("integerValue") {
            let parsed = match i {
                Json::String(s) => s.parse::<i64>().ok(),
                other => other.as_i64(),
            };
            return parsed
                .map(Value::Integer)
                .ok_or_else(|| Error::invalid_response(format!("invalid integerValue {}", i)));
        }
        if let Some(d) = wire.get("doubleValue") {
            // Non-finite doubles travel as strings.
            let parsed = match d {
                Json::String(s) => match s.as_str() {
                    "NaN" => Some(f64::NAN),
                    "Infinity" => Some(f64::INFINITY),
                    "-Infinity" => Some(f64::NEG_INFINITY),
                    other => other.parse::<f64>().ok(),
                },
                other => other.as_f64(),
            };
            return parsed
                .map(Value::Double)
                .ok_or_else(|| Error::invalid_response(format!("invalid doubleValue {}", d)));
        }
        if let Some(t) = wire.get("timestampValue").and_then(Json::as_str) {
            let parsed = DateTime::parse_from_rfc3339(t)
                .map_err(|e| Error::invalid_response(format!("invalid timestampValue {}: {}", t, e)))?;
            return Ok(Value::Timestamp(parsed.with_timezone(&Utc)));
        }
        if let Some(k) = wire.get("keyValue") {
            return Ok(Value::Key(Key::from_wire(k)?));
        }
        if let Some(s) = wire.get("stringValue").and_then(Json::as_str) {
            return Ok(Value::String(s.to_string()));
        }
        if let Some(b) = wire.get("blobValue").and_then(Json::as_str) {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(b)
                .map_err(|e| Error::invalid_response(format!("invalid blobValue: {}", e)))?;
            return Ok(Value::Blob(bytes));
        }
        if let Some(array) = wire.get("arrayValue") {
            let values = array
                .get("values")
                .and_then(Json::as_array)
                .map(|values| values.iter().map(Value::from_wire).collect::<Result<Vec<_>>>())
                .transpose()?
                .unwrap_or_default();
            return Ok(Value::Array(values));
        }
        if let Some(entity) = wire.get("entityValue") {
            return Ok(Value::Entity(Entity::from_wire(entity)?));
        }
        Ok(Value::Null)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<Key> for Value {
    fn from(v: Key) -> Self {
        Value::Key(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}
