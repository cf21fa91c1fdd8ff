//! Trait-shaped view of the [`pubsub`](crate::pubsub) client.
//!
//! Code written against these traits can run on the real client through
//! [`adapt_client`] or on an in-memory fake. Every method has a default
//! body, so a fake only implements what it uses and keeps compiling when a
//! trait gains methods: the defaults fail with
//! [`Error::Unimplemented`](crate::Error::Unimplemented) or return an empty
//! value, and never panic.

mod adapters;
mod structs;

pub use adapters::{adapt_client, adapt_message};
pub use structs::SubscriptionConfig;

use crate::pubsub;
use crate::utils::error::{unimplemented, unimplemented_default, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Callback invoked by [`Subscription::receive`] for every delivered message.
pub type MessageHandler = Arc<dyn Fn(&CancellationToken, Box<dyn Message>) + Send + Sync>;

#[async_trait]
pub trait Client: Send + Sync {
    async fn create_topic(&self, _topic_id: &str) -> Result<Box<dyn Topic>> {
        unimplemented("Client::create_topic")
    }

    fn topic(&self, _id: &str) -> Box<dyn Topic> {
        Box::new(placeholder("Client::topic"))
    }

    async fn create_subscription(
        &self,
        _id: &str,
        _config: SubscriptionConfig,
    ) -> Result<Box<dyn Subscription>> {
        unimplemented("Client::create_subscription")
    }

    fn subscription(&self, _id: &str) -> Box<dyn Subscription> {
        Box::new(placeholder("Client::subscription"))
    }
}

#[async_trait]
pub trait Topic: Send + Sync {
    /// The topic's fully qualified name.
    fn name(&self) -> String {
        unimplemented_default("Topic::name")
    }

    fn publish(&self, _msg: &dyn Message) -> Result<Box<dyn PublishResult>> {
        unimplemented("Topic::publish")
    }

    #[doc(hidden)]
    fn as_adapted(&self) -> Option<&Arc<pubsub::Topic>> {
        None
    }
}

#[async_trait]
pub trait Subscription: Send + Sync {
    async fn exists(&self) -> Result<bool> {
        unimplemented("Subscription::exists")
    }

    async fn receive(&self, _cancel: CancellationToken, _handler: MessageHandler) -> Result<()> {
        unimplemented("Subscription::receive")
    }

    async fn delete(&self) -> Result<()> {
        unimplemented("Subscription::delete")
    }
}

pub trait Message: Send + Sync {
    fn id(&self) -> String {
        unimplemented_default("Message::id")
    }

    fn data(&self) -> Vec<u8> {
        unimplemented_default("Message::data")
    }

    fn attributes(&self) -> HashMap<String, String> {
        unimplemented_default("Message::attributes")
    }

    fn publish_time(&self) -> Option<DateTime<Utc>> {
        unimplemented_default("Message::publish_time")
    }

    fn ack(&self) {
        unimplemented_default::<()>("Message::ack")
    }

    fn nack(&self) {
        unimplemented_default::<()>("Message::nack")
    }

    #[doc(hidden)]
    fn as_adapted(&self) -> Option<&Arc<pubsub::Message>> {
        None
    }
}

#[async_trait]
pub trait PublishResult: Send + Sync {
    async fn get(&mut self) -> Result<String> {
        unimplemented("PublishResult::get")
    }
}

/// Returned by default factory methods; implements every trait of this
/// module with nothing but the defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unimplemented;

impl Client for Unimplemented {}
impl Topic for Unimplemented {}
impl Subscription for Unimplemented {}
impl Message for Unimplemented {}
impl PublishResult for Unimplemented {}

fn placeholder(method: &'static str) -> Unimplemented {
    unimplemented_default::<()>(method);
    Unimplemented
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    struct OnlyTopics;

    impl Client for OnlyTopics {
        fn topic(&self, _id: &str) -> Box<dyn Topic> {
            Box::new(Unimplemented)
        }
    }

    #[tokio::test]
    async fn test_unimplemented_methods_fail_closed() {
        let client = OnlyTopics;

        let err = client.create_topic("t").await.err().unwrap();
        assert!(matches!(
            err,
            Error::Unimplemented {
                method: "Client::create_topic"
            }
        ));

        let sub = client.subscription("s");
        assert!(matches!(
            sub.exists().await,
            Err(Error::Unimplemented { .. })
        ));
        let topic = client.topic("t");
        assert_eq!(topic.name(), "");
        assert!(topic.publish(&Unimplemented).is_err());
    }

    #[tokio::test]
    async fn test_default_message_is_empty() {
        let msg = Unimplemented;
        assert!(msg.data().is_empty());
        assert!(msg.attributes().is_empty());
        assert!(msg.publish_time().is_none());
        msg.ack();
        let mut result: Box<dyn PublishResult> = Box::new(Unimplemented);
        assert!(result.get().await.is_err());
    }
}
