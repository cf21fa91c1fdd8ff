//! An in-memory broker standing in for the pub/sub traits.

use async_trait::async_trait;
use cloud_iface::pubsub::iface::{Client, Message, MessageHandler, PublishResult, Subscription, Topic};
use cloud_iface::Result;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct Broker {
    queue: Mutex<VecDeque<(String, Vec<u8>)>>,
    next_id: AtomicUsize,
}

struct FakeClient(Arc<Broker>);
struct FakeTopic(Arc<Broker>);
struct FakeSubscription(Arc<Broker>);
struct FakeResult(String);

struct FakeMessage {
    id: String,
    data: Vec<u8>,
    acked: Arc<AtomicUsize>,
}

impl Client for FakeClient {
    fn topic(&self, _id: &str) -> Box<dyn Topic> {
        Box::new(FakeTopic(self.0.clone()))
    }

    fn subscription(&self, _id: &str) -> Box<dyn Subscription> {
        Box::new(FakeSubscription(self.0.clone()))
    }
}

impl Topic for FakeTopic {
    fn publish(&self, msg: &dyn Message) -> Result<Box<dyn PublishResult>> {
        let id = self.0.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        self.0.queue.lock().push_back((id.clone(), msg.data()));
        Ok(Box::new(FakeResult(id)))
    }
}

#[async_trait]
impl PublishResult for FakeResult {
    async fn get(&mut self) -> Result<String> {
        Ok(self.0.clone())
    }
}

#[async_trait]
impl Subscription for FakeSubscription {
    async fn receive(&self, cancel: CancellationToken, handler: MessageHandler) -> Result<()> {
        let acked = Arc::new(AtomicUsize::new(0));
        loop {
            let next = self.0.queue.lock().pop_front();
            match next {
                Some((id, data)) => handler(
                    &cancel,
                    Box::new(FakeMessage {
                        id,
                        data,
                        acked: acked.clone(),
                    }),
                ),
                None => break,
            }
            if cancel.is_cancelled() {
                break;
            }
        }
        cancel.cancelled().await;
        Ok(())
    }
}

impl Message for FakeMessage {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn data(&self) -> Vec<u8> {
        self.data.clone()
    }

    fn ack(&self) {
        self.acked.fetch_add(1, Ordering::SeqCst);
    }
}

struct Outgoing(&'static [u8]);

impl Message for Outgoing {
    fn data(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

/// Application code under test: publishes a greeting and reads it back.
async fn round_trip(client: &dyn Client) -> Result<Vec<Vec<u8>>> {
    let mut result = client.topic("greetings").publish(&Outgoing(b"hello"))?;
    result.get().await?;

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    let handler: MessageHandler = Arc::new(move |cancel: &CancellationToken, msg: Box<dyn Message>| {
        sink.lock().push(msg.data());
        msg.ack();
        cancel.cancel();
    });
    client
        .subscription("greetings-sub")
        .receive(CancellationToken::new(), handler)
        .await?;

    let received = received.lock().clone();
    Ok(received)
}

#[tokio::test]
async fn test_hello_is_received_exactly_once() {
    let client = FakeClient(Arc::new(Broker::default()));
    let received = round_trip(&client).await.unwrap();
    assert_eq!(received, vec![b"hello".to_vec()]);
}

#[tokio::test]
async fn test_fake_leaves_unused_methods_failing() {
    let client = FakeClient(Arc::new(Broker::default()));
    assert!(client.create_topic("t").await.is_err());
    assert!(client.subscription("s").exists().await.is_err());
    assert_eq!(client.topic("t").name(), "");
}

#[test]
fn test_receive_blocks_until_cancelled() {
    let sub = FakeSubscription(Arc::new(Broker::default()));
    let cancel = CancellationToken::new();
    let handler: MessageHandler = Arc::new(|_: &CancellationToken, _: Box<dyn Message>| {});

    let mut receive = tokio_test::task::spawn(sub.receive(cancel.clone(), handler));
    tokio_test::assert_pending!(receive.poll());

    cancel.cancel();
    assert!(receive.is_woken());
    tokio_test::assert_ready_ok!(receive.poll());
}
