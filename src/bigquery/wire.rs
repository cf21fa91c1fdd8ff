//! Shapes shared by several BigQuery REST resources.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DatasetReference {
    pub project_id: String,
    pub dataset_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TableReference {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobReference {
    pub project_id: String,
    pub job_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,
}

/// int64 fields travel as JSON strings.
pub(crate) mod opt_i64 {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_str(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(i64),
        }
        match Option::<Repr>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Repr::Number(n)) => Ok(Some(n)),
            Some(Repr::Text(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
        }
    }
}

pub(crate) fn millis_to_time(ms: Option<i64>) -> Option<DateTime<Utc>> {
    ms.and_then(DateTime::from_timestamp_millis)
}

pub(crate) fn time_to_millis(t: Option<DateTime<Utc>>) -> Option<i64> {
    t.map(|t| t.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct RowCount {
        #[serde(default, with = "opt_i64", skip_serializing_if = "Option::is_none")]
        num_rows: Option<i64>,
    }

    #[test]
    fn test_int64_accepts_text_and_numbers() {
        let a: RowCount = serde_json::from_value(json!({"num_rows": "12"})).unwrap();
        let b: RowCount = serde_json::from_value(json!({"num_rows": 12})).unwrap();
        let c: RowCount = serde_json::from_value(json!({})).unwrap();
        assert_eq!(a.num_rows, Some(12));
        assert_eq!(a, b);
        assert_eq!(c.num_rows, None);
        assert_eq!(serde_json::to_value(&a).unwrap(), json!({"num_rows": "12"}));
    }

    #[test]
    fn test_millis_round_trip() {
        let t = millis_to_time(Some(1_700_000_000_123));
        assert_eq!(time_to_millis(t), Some(1_700_000_000_123));
    }
}
