use crate::utils::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AckKind {
    Ack,
    Nack,
}

/// Settles a received message through the receive loop that delivered it.
#[derive(Debug, Clone)]
pub(crate) struct AckHandle {
    ack_id: String,
    settled: Arc<AtomicBool>,
    sink: UnboundedSender<(AckKind, String)>,
}

impl AckHandle {
    pub(crate) fn new(ack_id: String, sink: UnboundedSender<(AckKind, String)>) -> Self {
        Self {
            ack_id,
            settled: Arc::new(AtomicBool::new(false)),
            sink,
        }
    }

    fn settle(&self, kind: AckKind) {
        if self.settled.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.sink.send((kind, self.ack_id.clone())).is_err() {
            tracing::debug!(
                "Receive loop already finished; dropping {:?} for {}",
                kind,
                self.ack_id
            );
        }
    }
}

/// A Pub/Sub message, either built for publishing or delivered by
/// [`Subscription::receive`](super::Subscription::receive).
#[derive(Debug, Clone, Default)]
pub struct Message {
    pub id: String,
    pub data: Vec<u8>,
    pub attributes: HashMap<String, String>,
    pub publish_time: Option<DateTime<Utc>>,
    pub ordering_key: String,
    pub(crate) ack: Option<AckHandle>,
}

impl Message {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Acknowledges a received message. Only the first of `ack`/`nack` counts;
    /// on messages that were not received this does nothing.
    pub fn ack(&self) {
        if let Some(handle) = &self.ack {
            handle.settle(AckKind::Ack);
        }
    }

    /// Asks the service to redeliver a received message.
    pub fn nack(&self) {
        if let Some(handle) = &self.ack {
            handle.settle(AckKind::Nack);
        }
    }
}

/// Outcome of a [`Topic::publish`](super::Topic::publish) call.
#[derive(Debug)]
pub struct PublishResult {
    handle: Option<JoinHandle<Result<String>>>,
    outcome: Option<Result<String>>,
}

impl PublishResult {
    pub(crate) fn pending(handle: JoinHandle<Result<String>>) -> Self {
        Self {
            handle: Some(handle),
            outcome: None,
        }
    }

    /// Whether the publish call has finished.
    pub fn ready(&self) -> bool {
        match &self.handle {
            Some(handle) => handle.is_finished(),
            None => true,
        }
    }

    /// Waits for the publish to complete and returns the server-assigned ID.
    ///
    /// The outcome is kept, so every call reports the same ID or the same
    /// failure.
    pub async fn get(&mut self) -> Result<String> {
        let outcome = match self.outcome.take() {
            Some(outcome) => outcome,
            None => match self.handle.take() {
                Some(handle) => handle.await.unwrap_or_else(|e| {
                    Err(Error::invalid_response(format!("publish task failed: {}", e)))
                }),
                None => Err(Error::invalid_response("publish task was abandoned")),
            },
        };
        let result = match &outcome {
            Ok(id) => Ok(id.clone()),
            Err(e) => Err(e.replay()),
        };
        self.outcome = Some(outcome);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    #[test]
    fn test_ack_settles_once() {
        let (tx, mut rx) = unbounded_channel();
        let mut msg = Message::new(b"hello".to_vec());
        msg.ack = Some(AckHandle::new("ack-1".to_string(), tx));

        msg.ack();
        msg.nack();
        msg.clone().ack();

        assert_eq!(rx.try_recv().unwrap(), (AckKind::Ack, "ack-1".to_string()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_ack_on_unreceived_message_is_noop() {
        let msg = Message::new("payload").with_attribute("k", "v");
        msg.ack();
        msg.nack();
        assert_eq!(msg.attributes.get("k").map(String::as_str), Some("v"));
    }
}
