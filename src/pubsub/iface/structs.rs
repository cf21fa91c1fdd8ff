use super::adapters::TopicAdapter;
use super::Topic;
use crate::pubsub;
use crate::utils::error::{Error, Result};
use std::fmt;
use std::sync::Arc;

/// [`pubsub::SubscriptionConfig`] with its topic expressed as a [`Topic`].
///
/// `base.topic` is ignored; `topic` takes its place.
#[derive(Clone, Default)]
pub struct SubscriptionConfig {
    pub base: pubsub::SubscriptionConfig,
    pub topic: Option<Arc<dyn Topic>>,
}

impl SubscriptionConfig {
    pub fn new(topic: Arc<dyn Topic>) -> Self {
        Self {
            base: pubsub::SubscriptionConfig::default(),
            topic: Some(topic),
        }
    }

    pub fn to_concrete(&self) -> Result<pubsub::SubscriptionConfig> {
        let topic = match &self.topic {
            Some(topic) => Some(
                topic
                    .as_adapted()
                    .cloned()
                    .ok_or(Error::AdapterMismatch {
                        expected: "pubsub::Topic",
                    })?,
            ),
            None => None,
        };
        Ok(pubsub::SubscriptionConfig {
            topic,
            ..self.base.clone()
        })
    }

    pub fn from_concrete(config: &pubsub::SubscriptionConfig) -> Self {
        Self {
            base: pubsub::SubscriptionConfig {
                topic: None,
                ..config.clone()
            },
            topic: config
                .topic
                .clone()
                .map(|t| Arc::new(TopicAdapter(t)) as Arc<dyn Topic>),
        }
    }
}

impl fmt::Debug for SubscriptionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionConfig")
            .field("base", &self.base)
            .field("topic", &self.topic.as_ref().map(|t| t.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pubsub::iface::Unimplemented;
    use crate::transport::HttpTransport;
    use std::time::Duration;

    fn concrete_topic() -> Arc<pubsub::Topic> {
        let client = pubsub::Client::new(
            "proj",
            HttpTransport::new("http://127.0.0.1:9/v1/").unwrap(),
        );
        Arc::new(client.topic("t"))
    }

    #[test]
    fn test_round_trip_preserves_fields_and_identity() {
        let topic = concrete_topic();
        let mut concrete = pubsub::SubscriptionConfig::new(topic.clone());
        concrete.ack_deadline = Duration::from_secs(20);
        concrete.retain_acked_messages = true;
        concrete.labels.insert("env".to_string(), "test".to_string());
        concrete.push_config.endpoint = "https://example.com/push".to_string();

        let shadow = SubscriptionConfig::from_concrete(&concrete);
        let back = shadow.to_concrete().unwrap();

        assert!(Arc::ptr_eq(back.topic.as_ref().unwrap(), &topic));
        assert_eq!(back.ack_deadline, concrete.ack_deadline);
        assert!(back.retain_acked_messages);
        assert_eq!(back.labels, concrete.labels);
        assert_eq!(back.push_config, concrete.push_config);
        assert_eq!(back.retention_duration, Duration::ZERO);
    }

    #[test]
    fn test_missing_topic_maps_to_missing_topic() {
        let shadow = SubscriptionConfig::from_concrete(&pubsub::SubscriptionConfig::default());
        assert!(shadow.topic.is_none());
        assert!(shadow.to_concrete().unwrap().topic.is_none());
    }

    #[test]
    fn test_foreign_topic_is_rejected() {
        let shadow = SubscriptionConfig::new(Arc::new(Unimplemented));
        assert!(matches!(
            shadow.to_concrete(),
            Err(Error::AdapterMismatch {
                expected: "pubsub::Topic"
            })
        ));
    }
}
