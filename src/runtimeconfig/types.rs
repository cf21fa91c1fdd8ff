use crate::utils::error::{Error, Result};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A variable in a runtime config. Exactly one of `text` and `value` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    /// `projects/{project}/configs/{config}/variables/{path}`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Base64 encoded binary value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// `UPDATED`, `DELETED` or `VARIABLE_STATE_UNSPECIFIED`, reported by
    /// watch.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
}

impl Variable {
    pub fn with_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn with_value(name: impl Into<String>, value: &[u8]) -> Self {
        Self {
            name: name.into(),
            value: Some(base64::engine::general_purpose::STANDARD.encode(value)),
            ..Self::default()
        }
    }

    pub fn decoded_value(&self) -> Result<Option<Vec<u8>>> {
        self.value
            .as_deref()
            .map(|v| {
                base64::engine::general_purpose::STANDARD
                    .decode(v)
                    .map_err(|e| Error::invalid_response(format!("invalid variable value: {}", e)))
            })
            .transpose()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchVariableRequest {
    /// Return at once if the variable changed after this time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub newer_than: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListVariablesResponse {
    #[serde(default)]
    pub variables: Vec<Variable>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub next_page_token: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_variable_wire_form() {
        let var = Variable::with_text("projects/p/configs/c/variables/a/b", "hello");
        assert_eq!(
            serde_json::to_value(&var).unwrap(),
            json!({"name": "projects/p/configs/c/variables/a/b", "text": "hello"})
        );

        let parsed: Variable = serde_json::from_value(json!({
            "name": "projects/p/configs/c/variables/x",
            "value": "aGk=",
            "state": "UPDATED",
            "updateTime": "2024-01-02T03:04:05.123Z"
        }))
        .unwrap();
        assert_eq!(parsed.state, "UPDATED");
        assert_eq!(parsed.decoded_value().unwrap(), Some(b"hi".to_vec()));
        assert!(parsed.update_time.is_some());
    }

    #[test]
    fn test_list_response_tolerates_missing_fields() {
        let parsed: ListVariablesResponse = serde_json::from_value(json!({})).unwrap();
        assert!(parsed.variables.is_empty());
        assert!(parsed.next_page_token.is_empty());
    }
}
