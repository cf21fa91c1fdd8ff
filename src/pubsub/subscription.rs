use super::message::{AckHandle, AckKind, Message};
use super::topic::Topic;
use crate::transport::HttpTransport;
use crate::utils::error::Result;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushConfig {
    pub endpoint: String,
    pub attributes: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct SubscriptionConfig {
    pub topic: Option<Arc<Topic>>,
    pub push_config: PushConfig,
    /// Zero leaves the service default (10s).
    pub ack_deadline: Duration,
    pub retain_acked_messages: bool,
    /// Zero leaves the service default (7 days).
    pub retention_duration: Duration,
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireSubscription {
    topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    push_config: Option<WirePushConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ack_deadline_seconds: Option<u64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    retain_acked_messages: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_retention_duration: Option<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    labels: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WirePushConfig {
    push_endpoint: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    attributes: HashMap<String, String>,
}

impl SubscriptionConfig {
    pub fn new(topic: Arc<Topic>) -> Self {
        Self {
            topic: Some(topic),
            ..Self::default()
        }
    }

    pub(crate) fn to_wire(&self, topic: &Topic) -> WireSubscription {
        let push_config = (!self.push_config.endpoint.is_empty()).then(|| WirePushConfig {
            push_endpoint: self.push_config.endpoint.clone(),
            attributes: self.push_config.attributes.clone(),
        });

        WireSubscription {
            topic: topic.name(),
            push_config,
            ack_deadline_seconds: (!self.ack_deadline.is_zero())
                .then(|| self.ack_deadline.as_secs()),
            retain_acked_messages: self.retain_acked_messages,
            message_retention_duration: (!self.retention_duration.is_zero())
                .then(|| format!("{}s", self.retention_duration.as_secs())),
            labels: self.labels.clone(),
        }
    }
}

/// Tunes the pull loop behind [`Subscription::receive`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiveSettings {
    pub max_messages: u32,
    /// Pause after an empty pull before asking again.
    pub poll_interval: Duration,
}

impl Default for ReceiveSettings {
    fn default() -> Self {
        Self {
            max_messages: 100,
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// A reference to a Pub/Sub subscription.
#[derive(Debug, Clone)]
pub struct Subscription {
    transport: HttpTransport,
    project_id: String,
    id: String,
    pub receive_settings: ReceiveSettings,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullResponse {
    #[serde(default)]
    received_messages: Vec<ReceivedMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceivedMessage {
    ack_id: String,
    message: PulledMessage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PulledMessage {
    #[serde(default)]
    data: String,
    #[serde(default)]
    attributes: HashMap<String, String>,
    #[serde(default)]
    message_id: String,
    #[serde(default)]
    publish_time: Option<DateTime<Utc>>,
    #[serde(default)]
    ordering_key: String,
}

impl Subscription {
    pub(crate) fn new(transport: HttpTransport, project_id: &str, id: &str) -> Self {
        Self {
            transport,
            project_id: project_id.to_string(),
            id: id.to_string(),
            receive_settings: ReceiveSettings::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Fully qualified name, `projects/{project}/subscriptions/{id}`.
    pub fn name(&self) -> String {
        format!("projects/{}/subscriptions/{}", self.project_id, self.id)
    }

    pub async fn exists(&self) -> Result<bool> {
        match self
            .transport
            .get::<serde_json::Value>(&self.name(), &[])
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn delete(&self) -> Result<()> {
        self.transport.delete(&self.name(), &[]).await
    }

    /// Pulls messages and calls `handler` for each one until `cancel` fires.
    ///
    /// Acks and nacks issued by the handler are sent in batches between
    /// pulls. Messages pulled but not yet handled when `cancel` fires are
    /// nacked so the service redelivers them. Returns `Ok(())` on
    /// cancellation; any service error ends the loop and is returned.
    pub async fn receive<F>(&self, cancel: CancellationToken, handler: F) -> Result<()>
    where
        F: Fn(&CancellationToken, Message) + Send + Sync,
    {
        let (sink, mut settled) = unbounded_channel();
        tracing::debug!("Receiving from {}", self.name());

        loop {
            self.flush_settled(&mut settled).await?;
            if cancel.is_cancelled() {
                break;
            }

            let pulled = tokio::select! {
                _ = cancel.cancelled() => break,
                pulled = self.pull() => pulled?,
            };

            if pulled.is_empty() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.receive_settings.poll_interval) => {}
                }
                continue;
            }

            for received in pulled {
                let mut message = received.message.into_message()?;
                message.ack = Some(AckHandle::new(received.ack_id, sink.clone()));
                if cancel.is_cancelled() {
                    message.nack();
                    continue;
                }
                handler(&cancel, message);
            }
        }

        drop(sink);
        self.flush_settled(&mut settled).await?;
        tracing::debug!("Stopped receiving from {}", self.name());
        Ok(())
    }

    async fn pull(&self) -> Result<Vec<ReceivedMessage>> {
        let response: PullResponse = self
            .transport
            .post(
                &format!("{}:pull", self.name()),
                &[],
                &serde_json::json!({ "maxMessages": self.receive_settings.max_messages }),
            )
            .await?;
        Ok(response.received_messages)
    }

    async fn flush_settled(&self, settled: &mut UnboundedReceiver<(AckKind, String)>) -> Result<()> {
        let mut acks = Vec::new();
        let mut nacks = Vec::new();
        while let Ok((kind, ack_id)) = settled.try_recv() {
            match kind {
                AckKind::Ack => acks.push(ack_id),
                AckKind::Nack => nacks.push(ack_id),
            }
        }

        if !acks.is_empty() {
            tracing::debug!("Acknowledging {} message(s)", acks.len());
            self.transport
                .post_empty(
                    &format!("{}:acknowledge", self.name()),
                    &[],
                    &serde_json::json!({ "ackIds": acks }),
                )
                .await?;
        }
        if !nacks.is_empty() {
            tracing::debug!("Nacking {} message(s)", nacks.len());
            self.transport
                .post_empty(
                    &format!("{}:modifyAckDeadline", self.name()),
                    &[],
                    &serde_json::json!({ "ackIds": nacks, "ackDeadlineSeconds": 0 }),
                )
                .await?;
        }
        Ok(())
    }
}

impl PulledMessage {
    fn into_message(self) -> Result<Message> {
        let data = base64::engine::general_purpose::STANDARD
            .decode(self.data.as_bytes())
            .map_err(|e| {
                crate::utils::error::Error::invalid_response(format!(
                    "message {} has invalid base64 data: {}",
                    self.message_id, e
                ))
            })?;
        Ok(Message {
            id: self.message_id,
            data,
            attributes: self.attributes,
            publish_time: self.publish_time,
            ordering_key: self.ordering_key,
            ack: None,
        })
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
