use super::message::{Message, PublishResult};
use crate::transport::HttpTransport;
use crate::utils::error::{Error, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A reference to a Pub/Sub topic.
#[derive(Debug, Clone)]
pub struct Topic {
    transport: HttpTransport,
    project_id: String,
    id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PublishRequest {
    messages: Vec<WireMessage>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    data: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    attributes: HashMap<String, String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    ordering_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    #[serde(default)]
    message_ids: Vec<String>,
}

impl Topic {
    pub(crate) fn new(transport: HttpTransport, project_id: &str, id: &str) -> Self {
        Self {
            transport,
            project_id: project_id.to_string(),
            id: id.to_string(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Fully qualified name, `projects/{project}/topics/{id}`.
    pub fn name(&self) -> String {
        format!("projects/{}/topics/{}", self.project_id, self.id)
    }

    /// Publishes `msg` in the background. The returned [`PublishResult`]
    /// resolves to the server-assigned message ID.
    ///
    /// The request runs on the current Tokio runtime; without one this fails
    /// with [`Error::Config`].
    pub fn publish(&self, msg: &Message) -> Result<PublishResult> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| Error::Config {
            message: format!("publishing to {} needs a Tokio runtime: {}", self.name(), e),
        })?;
        let transport = self.transport.clone();
        let path = format!("{}:publish", self.name());
        let request = PublishRequest {
            messages: vec![WireMessage {
                data: base64::engine::general_purpose::STANDARD.encode(&msg.data),
                attributes: msg.attributes.clone(),
                ordering_key: msg.ordering_key.clone(),
            }],
        };

        let handle = runtime.spawn(async move {
            let response: PublishResponse = transport.post(&path, &[], &request).await?;
            let id = response
                .message_ids
                .into_iter()
                .next()
                .ok_or_else(|| Error::invalid_response("publish returned no message IDs"))?;
            tracing::debug!("Published message {} via {}", id, path);
            Ok(id)
        });

        Ok(PublishResult::pending(handle))
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_publish_resolves_server_id() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/projects/proj/topics/t:publish")
                .json_body(serde_json::json!({
                    "messages": [{"data": "aGVsbG8=", "attributes": {"k": "v"}}]
                }));
            then.status(200)
                .json_body(serde_json::json!({"messageIds": ["1234"]}));
        });

        let topic = Topic::new(
            HttpTransport::new(&server.url("/v1/")).unwrap(),
            "proj",
            "t",
        );
        let mut msg = Message::new(b"hello".to_vec());
        msg.attributes.insert("k".to_string(), "v".to_string());

        let mut result = topic.publish(&msg).unwrap();
        assert_eq!(result.get().await.unwrap(), "1234");
        // Resolved results are cached.
        assert_eq!(result.get().await.unwrap(), "1234");
        mock.assert_hits(1);
    }

    #[tokio::test]
    async fn test_publish_failure_is_reported_by_get() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/projects/proj/topics/missing:publish");
            then.status(404).json_body(serde_json::json!({
                "error": {"code": 404, "message": "Topic not found", "status": "NOT_FOUND"}
            }));
        });

        let topic = Topic::new(
            HttpTransport::new(&server.url("/v1/")).unwrap(),
            "proj",
            "missing",
        );
        let mut result = topic.publish(&Message::new(b"x".to_vec())).unwrap();
        let err = result.get().await.unwrap_err();
        assert!(err.is_not_found());
        // The same failure is reported again.
        let again = result.get().await.unwrap_err();
        assert!(again.is_not_found());
        assert_eq!(again.to_string(), err.to_string());
    }

    #[test]
    fn test_publish_without_runtime_is_an_error() {
        let topic = Topic::new(
            HttpTransport::new("http://localhost:8085/v1/").unwrap(),
            "proj",
            "t",
        );
        match topic.publish(&Message::new(b"hello".to_vec())) {
            Err(Error::Config { message }) => assert!(message.contains("projects/proj/topics/t")),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
