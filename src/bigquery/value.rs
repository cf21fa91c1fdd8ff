use super::schema::{FieldSchema, FieldType};
use crate::utils::error::{Error, Result};
use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value as Json};

/// A single cell of a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(f64),
    /// NUMERIC and BIGNUMERIC, kept in their decimal text form.
    Numeric(String),
    String(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Geography(String),
    Json(Json),
    Repeated(Vec<Value>),
    /// Values of a RECORD, in the order of its nested schema.
    Record(Vec<Value>),
}

impl Value {
    /// JSON form used by streaming inserts and struct decoding.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => json!(b),
            Value::Int64(i) => json!(i),
            Value::Float64(f) => json!(f),
            Value::Numeric(s) | Value::String(s) | Value::Geography(s) => json!(s),
            Value::Bytes(b) => json!(base64::engine::general_purpose::STANDARD.encode(b)),
            Value::Timestamp(t) => json!(t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::Date(d) => json!(d.format("%Y-%m-%d").to_string()),
            Value::Time(t) => json!(t.format("%H:%M:%S%.f").to_string()),
            Value::DateTime(dt) => json!(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            Value::Json(j) => j.clone(),
            Value::Repeated(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            // Records need their schema for field names; see `row_to_json`.
            Value::Record(items) => Json::Array(items.iter().map(Value::to_json).collect()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
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

/// Decodes a `{"f": [{"v": ...}]}` row of the REST API using `schema`.
pub(crate) fn decode_row(schema: &[FieldSchema], row: &Json) -> Result<Vec<Value>> {
    let cells = row
        .get("f")
        .and_then(Json::as_array)
        .ok_or_else(|| Error::invalid_response("row without cells"))?;
    if cells.len() != schema.len() {
        return Err(Error::invalid_response(format!(
            "row has {} cells but the schema has {} fields",
            cells.len(),
            schema.len()
        )));
    }
    schema
        .iter()
        .zip(cells)
        .map(|(field, cell)| decode_field(field, cell.get("v").unwrap_or(&Json::Null)))
        .collect()
}

fn decode_field(field: &FieldSchema, v: &Json) -> Result<Value> {
    if v.is_null() {
        return Ok(if field.repeated {
            Value::Repeated(Vec::new())
        } else {
            Value::Null
        });
    }
    if field.repeated {
        let items = v
            .as_array()
            .ok_or_else(|| Error::invalid_response(format!("field {} is not repeated", field.name)))?;
        return items
            .iter()
            .map(|item| decode_scalar(field, item.get("v").unwrap_or(&Json::Null)))
            .collect::<Result<Vec<_>>>()
            .map(Value::Repeated);
    }
    decode_scalar(field, v)
}

fn decode_scalar(field: &FieldSchema, v: &Json) -> Result<Value> {
    if v.is_null() {
        return Ok(Value::Null);
    }
    if field.field_type == FieldType::Record {
        return decode_row(&field.schema, v).map(Value::Record);
    }
    if field.field_type == FieldType::Json {
        let text = v.as_str().unwrap_or_default();
        return Ok(Value::Json(serde_json::from_str(text)?));
    }

    let text = v
        .as_str()
        .ok_or_else(|| Error::invalid_response(format!("field {} is not a string cell", field.name)))?;
    let bad = |e: &dyn std::fmt::Display| {
        Error::invalid_response(format!("field {}: cannot parse {:?}: {}", field.name, text, e))
    };

    Ok(match field.field_type {
        FieldType::String => Value::String(text.to_string()),
        FieldType::Geography => Value::Geography(text.to_string()),
        FieldType::Numeric | FieldType::BigNumeric => Value::Numeric(text.to_string()),
        FieldType::Integer => Value::Int64(text.parse().map_err(|e| bad(&e))?),
        FieldType::Float => Value::Float64(text.parse().map_err(|e| bad(&e))?),
        FieldType::Boolean => Value::Bool(text.eq_ignore_ascii_case("true")),
        FieldType::Bytes => Value::Bytes(
            base64::engine::general_purpose::STANDARD
                .decode(text)
                .map_err(|e| bad(&e))?,
        ),
        FieldType::Timestamp => {
            // Seconds since the epoch, as a float in text form.
            let secs: f64 = text.parse().map_err(|e| bad(&e))?;
            let micros = (secs * 1_000_000.0).round() as i64;
            Value::Timestamp(
                DateTime::from_timestamp_micros(micros)
                    .ok_or_else(|| bad(&"timestamp out of range"))?,
            )
        }
        FieldType::Date => Value::Date(NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|e| bad(&e))?),
        FieldType::Time => Value::Time(NaiveTime::parse_from_str(text, "%H:%M:%S%.f").map_err(|e| bad(&e))?),
        FieldType::DateTime => Value::DateTime(
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
                .map_err(|e| bad(&e))?,
        ),
        FieldType::Record | FieldType::Json => return Err(bad(&"unexpected text cell")),
    })
}

/// Names each value of `row` after its field, recursing into records.
pub fn row_to_json(schema: &[FieldSchema], row: &[Value]) -> Json {
    Json::Object(
        schema
            .iter()
            .zip(row)
            .map(|(field, value)| (field.name.clone(), named_value(field, value)))
            .collect::<Map<String, Json>>(),
    )
}

fn named_value(field: &FieldSchema, value: &Value) -> Json {
    match value {
        Value::Record(items) => row_to_json(&field.schema, items),
        Value::Repeated(items) if field.field_type == FieldType::Record => Json::Array(
            items
                .iter()
                .map(|item| named_value(&FieldSchema { repeated: false, ..field.clone() }, item))
                .collect(),
        ),
        other => other.to_json(),
    }
}

/// Loads a row into a struct whose fields are named after the columns.
pub fn decode_row_into<T: DeserializeOwned>(schema: &[FieldSchema], row: &[Value]) -> Result<T> {
    Ok(serde_json::from_value(row_to_json(schema, row))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn schema() -> Vec<FieldSchema> {
        vec![
            FieldSchema::new("name", FieldType::String),
            FieldSchema::new("score", FieldType::Integer),
            FieldSchema::new("at", FieldType::Timestamp),
            FieldSchema::new("tags", FieldType::String).repeated(),
            FieldSchema::record("loc", vec![FieldSchema::new("lat", FieldType::Float)]),
        ]
    }

    fn row() -> Json {
        json!({"f": [
            {"v": "a"},
            {"v": "3"},
            {"v": "1.7E9"},
            {"v": [{"v": "x"}, {"v": "y"}]},
            {"v": {"f": [{"v": "51.5"}]}}
        ]})
    }

    #[test]
    fn test_decode_row() {
        let values = decode_row(&schema(), &row()).unwrap();
        assert_eq!(values[0], Value::String("a".to_string()));
        assert_eq!(values[1], Value::Int64(3));
        assert_eq!(
            values[2],
            Value::Timestamp(DateTime::from_timestamp(1_700_000_000, 0).unwrap())
        );
        assert_eq!(
            values[3],
            Value::Repeated(vec![Value::from("x"), Value::from("y")])
        );
        assert_eq!(values[4], Value::Record(vec![Value::Float64(51.5)]));
    }

    #[test]
    fn test_row_decodes_into_struct() {
        #[derive(Debug, Deserialize)]
        struct Loc {
            lat: f64,
        }
        #[derive(Debug, Deserialize)]
        struct Scored {
            name: String,
            score: i64,
            tags: Vec<String>,
            loc: Loc,
        }

        let values = decode_row(&schema(), &row()).unwrap();
        let scored: Scored = decode_row_into(&schema(), &values).unwrap();
        assert_eq!(scored.name, "a");
        assert_eq!(scored.score, 3);
        assert_eq!(scored.tags, vec!["x", "y"]);
        assert_eq!(scored.loc.lat, 51.5);
    }

    #[test]
    fn test_cell_count_mismatch_is_an_error() {
        let err = decode_row(&schema()[..1], &row()).unwrap_err();
        assert!(matches!(err, Error::InvalidResponse { .. }));
    }
}
