use super::{Client, Message, MessageHandler, PublishResult, Subscription, SubscriptionConfig, Topic};
use crate::pubsub;
use crate::utils::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Adapts a [`pubsub::Client`] so that it satisfies the [`Client`] trait.
pub fn adapt_client(client: pubsub::Client) -> Box<dyn Client> {
    Box::new(ClientAdapter(Arc::new(client)))
}

/// Adapts a [`pubsub::Message`] so that it satisfies the [`Message`] trait,
/// which is how messages to publish through an adapted client are built.
pub fn adapt_message(msg: pubsub::Message) -> Box<dyn Message> {
    Box::new(MessageAdapter(Arc::new(msg)))
}

struct ClientAdapter(Arc<pubsub::Client>);
pub(super) struct TopicAdapter(pub(super) Arc<pubsub::Topic>);
struct SubscriptionAdapter(Arc<pubsub::Subscription>);
struct MessageAdapter(Arc<pubsub::Message>);
struct PublishResultAdapter(pubsub::PublishResult);

#[async_trait]
impl Client for ClientAdapter {
    async fn create_topic(&self, topic_id: &str) -> Result<Box<dyn Topic>> {
        let topic = self.0.create_topic(topic_id).await?;
        Ok(Box::new(TopicAdapter(Arc::new(topic))))
    }

    fn topic(&self, id: &str) -> Box<dyn Topic> {
        Box::new(TopicAdapter(Arc::new(self.0.topic(id))))
    }

    async fn create_subscription(
        &self,
        id: &str,
        config: SubscriptionConfig,
    ) -> Result<Box<dyn Subscription>> {
        let sub = self.0.create_subscription(id, config.to_concrete()?).await?;
        Ok(Box::new(SubscriptionAdapter(Arc::new(sub))))
    }

    fn subscription(&self, id: &str) -> Box<dyn Subscription> {
        Box::new(SubscriptionAdapter(Arc::new(self.0.subscription(id))))
    }
}

impl Topic for TopicAdapter {
    fn name(&self) -> String {
        self.0.name()
    }

    fn publish(&self, msg: &dyn Message) -> Result<Box<dyn PublishResult>> {
        let msg = msg.as_adapted().ok_or(Error::AdapterMismatch {
            expected: "pubsub::Message",
        })?;
        Ok(Box::new(PublishResultAdapter(self.0.publish(msg)?)))
    }

    fn as_adapted(&self) -> Option<&Arc<pubsub::Topic>> {
        Some(&self.0)
    }
}

#[async_trait]
impl Subscription for SubscriptionAdapter {
    async fn exists(&self) -> Result<bool> {
        self.0.exists().await
    }

    async fn receive(&self, cancel: CancellationToken, handler: MessageHandler) -> Result<()> {
        self.0
            .receive(cancel, move |token, msg| {
                handler(token, adapt_message(msg));
            })
            .await
    }

    async fn delete(&self) -> Result<()> {
        self.0.delete().await
    }
}

impl Message for MessageAdapter {
    fn id(&self) -> String {
        self.0.id.clone()
    }

    fn data(&self) -> Vec<u8> {
        self.0.data.clone()
    }

    fn attributes(&self) -> HashMap<String, String> {
        self.0.attributes.clone()
    }

    fn publish_time(&self) -> Option<DateTime<Utc>> {
        self.0.publish_time
    }

    fn ack(&self) {
        self.0.ack()
    }

    fn nack(&self) {
        self.0.nack()
    }

    fn as_adapted(&self) -> Option<&Arc<pubsub::Message>> {
        Some(&self.0)
    }
}

#[async_trait]
impl PublishResult for PublishResultAdapter {
    async fn get(&mut self) -> Result<String> {
        self.0.get().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pubsub::iface::Unimplemented;
    use crate::transport::HttpTransport;

    fn concrete() -> pubsub::Client {
        pubsub::Client::new(
            "proj",
            HttpTransport::new("http://127.0.0.1:9/v1/").unwrap(),
        )
    }

    #[test]
    fn test_message_wrap_unwrap_is_identity() {
        let msg = Arc::new(pubsub::Message::new(b"hello".to_vec()));
        let adapted = MessageAdapter(msg.clone());
        assert!(Arc::ptr_eq(adapted.as_adapted().unwrap(), &msg));
        assert_eq!(adapted.data(), b"hello".to_vec());
    }

    #[test]
    fn test_topic_name_is_forwarded() {
        let client = adapt_client(concrete());
        assert_eq!(client.topic("t").name(), "projects/proj/topics/t");
    }

    #[tokio::test]
    async fn test_publishing_a_foreign_message_is_rejected() {
        let client = adapt_client(concrete());
        let err = client.topic("t").publish(&Unimplemented).err().unwrap();
        assert!(matches!(
            err,
            Error::AdapterMismatch {
                expected: "pubsub::Message"
            }
        ));
    }

    #[test]
    fn test_publish_outside_a_runtime_fails_cleanly() {
        let client = adapt_client(concrete());
        let msg = adapt_message(pubsub::Message::new(b"hello".to_vec()));
        let err = client.topic("t").publish(msg.as_ref()).err().unwrap();
        assert!(matches!(err, Error::Config { .. }));
    }
}
