//! Pub/Sub client over the REST v1 API.
//!
//! The object graph mirrors the official clients: a [`Client`] hands out
//! [`Topic`] and [`Subscription`] handles, topics publish [`Message`]s and
//! return a [`PublishResult`], subscriptions deliver received messages to a
//! handler until cancelled.

pub mod iface;
mod message;
mod subscription;
mod topic;

pub use message::{Message, PublishResult};
pub use subscription::{PushConfig, ReceiveSettings, Subscription, SubscriptionConfig};
pub use topic::Topic;

use crate::config::{ClientConfig, ServiceKind};
use crate::transport::HttpTransport;
use crate::utils::error::{Error, Result};
use crate::utils::validation::validate_resource_id;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Client {
    project_id: String,
    transport: HttpTransport,
}

#[derive(Debug, Deserialize)]
struct ResourceName {
    name: String,
}

impl Client {
    pub fn new(project_id: impl Into<String>, transport: HttpTransport) -> Self {
        Self {
            project_id: project_id.into(),
            transport,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let transport = HttpTransport::from_config(config, ServiceKind::PubSub)?;
        Ok(Self::new(config.project_id.clone(), transport))
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Creates a topic on the service and returns a handle to it.
    pub async fn create_topic(&self, topic_id: &str) -> Result<Topic> {
        validate_resource_id("topic_id", topic_id)?;
        let topic = self.topic(topic_id);
        let created: ResourceName = self
            .transport
            .put(&topic.name(), &[], &serde_json::json!({}))
            .await?;
        tracing::info!("Created topic {}", created.name);
        Ok(topic)
    }

    /// A handle to a topic that may or may not exist; no RPC is made.
    pub fn topic(&self, id: &str) -> Topic {
        Topic::new(self.transport.clone(), &self.project_id, id)
    }

    pub async fn create_subscription(
        &self,
        id: &str,
        config: SubscriptionConfig,
    ) -> Result<Subscription> {
        validate_resource_id("subscription_id", id)?;
        let topic: Arc<Topic> = config.topic.clone().ok_or_else(|| Error::InvalidConfigValue {
            field: "topic".to_string(),
            value: String::new(),
            reason: "a subscription must name a topic".to_string(),
        })?;

        let subscription = self.subscription(id);
        let created: ResourceName = self
            .transport
            .put(&subscription.name(), &[], &config.to_wire(&topic))
            .await?;
        tracing::info!("Created subscription {} on {}", created.name, topic.name());
        Ok(subscription)
    }

    /// A handle to a subscription that may or may not exist; no RPC is made.
    pub fn subscription(&self, id: &str) -> Subscription {
        Subscription::new(self.transport.clone(), &self.project_id, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::time::Duration;

    fn client(server: &MockServer) -> Client {
        Client::new("proj", HttpTransport::new(&server.url("/v1/")).unwrap())
    }

    #[tokio::test]
    async fn test_create_topic_puts_fully_qualified_name() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(PUT).path("/v1/projects/proj/topics/my-topic");
            then.status(200)
                .json_body(serde_json::json!({"name": "projects/proj/topics/my-topic"}));
        });

        let topic = client(&server).create_topic("my-topic").await.unwrap();

        mock.assert();
        assert_eq!(topic.id(), "my-topic");
        assert_eq!(topic.to_string(), "projects/proj/topics/my-topic");
    }

    #[tokio::test]
    async fn test_create_subscription_sends_config() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(PUT)
                .path("/v1/projects/proj/subscriptions/sub")
                .json_body(serde_json::json!({
                    "topic": "projects/proj/topics/t",
                    "ackDeadlineSeconds": 30,
                    "retainAckedMessages": true,
                    "messageRetentionDuration": "3600s",
                    "labels": {"team": "data"}
                }));
            then.status(200)
                .json_body(serde_json::json!({"name": "projects/proj/subscriptions/sub"}));
        });

        let client = client(&server);
        let mut config = SubscriptionConfig::new(Arc::new(client.topic("t")));
        config.ack_deadline = Duration::from_secs(30);
        config.retain_acked_messages = true;
        config.retention_duration = Duration::from_secs(3600);
        config.labels.insert("team".to_string(), "data".to_string());

        let sub = client.create_subscription("sub", config).await.unwrap();

        mock.assert();
        assert_eq!(sub.name(), "projects/proj/subscriptions/sub");
    }

    #[tokio::test]
    async fn test_create_subscription_requires_topic() {
        let server = MockServer::start();
        let err = client(&server)
            .create_subscription("sub", SubscriptionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfigValue { .. }));
    }

    #[tokio::test]
    async fn test_create_topic_conflict_passes_through() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(PUT).path("/v1/projects/proj/topics/dup");
            then.status(409).json_body(serde_json::json!({
                "error": {"code": 409, "message": "Resource already exists in the project (resource=dup).", "status": "ALREADY_EXISTS"}
            }));
        });

        let err = client(&server).create_topic("dup").await.unwrap_err();
        match err {
            Error::Api { status, code, .. } => {
                assert_eq!(status, 409);
                assert_eq!(code, "ALREADY_EXISTS");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
