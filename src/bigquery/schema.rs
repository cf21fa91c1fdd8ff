use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    #[serde(rename = "STRING")]
    String,
    #[serde(rename = "BYTES")]
    Bytes,
    #[serde(rename = "INTEGER", alias = "INT64")]
    Integer,
    #[serde(rename = "FLOAT", alias = "FLOAT64")]
    Float,
    #[serde(rename = "BOOLEAN", alias = "BOOL")]
    Boolean,
    #[serde(rename = "TIMESTAMP")]
    Timestamp,
    #[serde(rename = "RECORD", alias = "STRUCT")]
    Record,
    #[serde(rename = "DATE")]
    Date,
    #[serde(rename = "TIME")]
    Time,
    #[serde(rename = "DATETIME")]
    DateTime,
    #[serde(rename = "NUMERIC")]
    Numeric,
    #[serde(rename = "BIGNUMERIC")]
    BigNumeric,
    #[serde(rename = "GEOGRAPHY")]
    Geography,
    #[serde(rename = "JSON")]
    Json,
}

/// One column of a table schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    pub name: String,
    pub description: String,
    pub field_type: FieldType,
    pub repeated: bool,
    pub required: bool,
    /// Nested fields of a `RECORD`.
    pub schema: Schema,
}

pub type Schema = Vec<FieldSchema>;

impl FieldSchema {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            field_type,
            repeated: false,
            required: false,
            schema: Vec::new(),
        }
    }

    pub fn repeated(mut self) -> Self {
        self.repeated = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn record(name: impl Into<String>, fields: Schema) -> Self {
        Self {
            schema: fields,
            ..Self::new(name, FieldType::Record)
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireTableSchema {
    #[serde(default)]
    pub fields: Vec<WireField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<WireField>,
}

pub(crate) fn schema_to_wire(schema: &[FieldSchema]) -> WireTableSchema {
    WireTableSchema {
        fields: schema.iter().map(field_to_wire).collect(),
    }
}

fn field_to_wire(field: &FieldSchema) -> WireField {
    let mode = if field.repeated {
        Some("REPEATED".to_string())
    } else if field.required {
        Some("REQUIRED".to_string())
    } else {
        None
    };
    WireField {
        name: field.name.clone(),
        field_type: field.field_type,
        mode,
        description: field.description.clone(),
        fields: field.schema.iter().map(field_to_wire).collect(),
    }
}

pub(crate) fn schema_from_wire(wire: &WireTableSchema) -> Schema {
    wire.fields.iter().map(field_from_wire).collect()
}

fn field_from_wire(wire: &WireField) -> FieldSchema {
    let mode = wire.mode.as_deref().unwrap_or("NULLABLE");
    FieldSchema {
        name: wire.name.clone(),
        description: wire.description.clone(),
        field_type: wire.field_type,
        repeated: mode == "REPEATED",
        required: mode == "REQUIRED",
        schema: wire.fields.iter().map(field_from_wire).collect(),
    }
}
