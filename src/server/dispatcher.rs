//! Message dispatch
//!
//! Decodes inbound lines and runs the registration and broadcast protocols
//! against the registry and the pending queue. One dispatcher instance is
//! shared by every connection task; it holds no per-connection state.

use std::sync::Arc;

use serde_json::Value;

use crate::protocol::{self, Filter, Identity, InboundMessage, OutboundMessage};
use crate::queue::DurableQueue;
use crate::registry::{ClientHandle, ConnectionRegistry};

/// Routes inbound messages to the registry and queue
pub struct Dispatcher {
    registry: Arc<ConnectionRegistry>,
    queue: Arc<DurableQueue>,
}

impl Dispatcher {
    /// Create a dispatcher over shared registry and queue actors
    pub fn new(registry: Arc<ConnectionRegistry>, queue: Arc<DurableQueue>) -> Self {
        Self { registry, queue }
    }

    /// The registry this dispatcher routes through
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// The pending queue this dispatcher persists to
    pub fn queue(&self) -> &Arc<DurableQueue> {
        &self.queue
    }

    /// Handle one inbound line from a connection
    ///
    /// Malformed input never touches registry or queue state; the client
    /// gets an `error` reply and the connection stays open.
    pub async fn dispatch(&self, client: &ClientHandle, line: &str) {
        let message = match protocol::decode(line) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(session_id = client.id(), error = %e, "undecodable message");
                let _ = client.deliver(OutboundMessage::error(e.to_string())).await;
                return;
            }
        };

        match message {
            InboundMessage::Register { user } => self.handle_register(client, user).await,
            InboundMessage::Broadcast(req) => {
                self.handle_broadcast(client, req.filter, req.message).await
            }
            InboundMessage::Ping => {
                let _ = client.deliver(OutboundMessage::Pong).await;
            }
            // Probe responses carry no payload; the read loop already
            // marked the connection alive.
            InboundMessage::Pong => {}
        }
    }

    /// Registration protocol
    ///
    /// Register, drain the pending queue for the new identity, attempt each
    /// delivery, requeue what fails, then acknowledge regardless of how the
    /// replays went.
    async fn handle_register(&self, client: &ClientHandle, identity: Identity) {
        self.registry.register(client.clone(), identity.clone()).await;

        match self.queue.take_matching(&identity).await {
            Ok(pending) => {
                for notification in pending {
                    let message = OutboundMessage::notification(notification.message.clone());

                    if let Err(e) = client.deliver(message).await {
                        tracing::debug!(
                            session_id = client.id(),
                            notification_id = notification.id,
                            error = %e,
                            "pending replay failed, requeueing"
                        );

                        // The one case where an atomically removed entry
                        // must go back: delivery to the fresh registration
                        // failed.
                        if let Err(e) = self.queue.requeue(notification).await {
                            tracing::error!(error = %e, "failed to requeue undelivered notification");
                        }
                    }
                }
            }
            Err(e) => {
                tracing::error!(
                    session_id = client.id(),
                    error = %e,
                    "pending queue unavailable during registration"
                );
            }
        }

        let _ = client.deliver(OutboundMessage::Registered).await;
    }

    /// Broadcast protocol
    ///
    /// Fan out to every matching registered connection. The filter/message
    /// pair is persisted exactly once per broadcast when nothing matched or
    /// any delivery failed; the broadcaster is acknowledged unconditionally
    /// either way.
    async fn handle_broadcast(&self, client: &ClientHandle, filter: Filter, message: Value) {
        let clients = self.registry.snapshot().await;

        let mut matched_any = false;
        let mut all_delivered = true;

        for (handle, identity) in &clients {
            if !filter.matches(identity) {
                continue;
            }
            matched_any = true;

            let notification = OutboundMessage::notification(message.clone());
            if let Err(e) = handle.deliver(notification).await {
                tracing::debug!(
                    session_id = handle.id(),
                    error = %e,
                    "broadcast delivery failed"
                );
                all_delivered = false;
            }
        }

        if filter.is_wildcard() {
            tracing::debug!(recipients = clients.len(), "all-wildcard broadcast");
        }

        if !matched_any || !all_delivered {
            if let Err(e) = self.queue.enqueue(filter, message).await {
                tracing::error!(error = %e, "failed to persist undelivered broadcast");
            }
        }

        let _ = client.deliver(OutboundMessage::BroadcastSent).await;
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::sync::mpsc;

    use crate::queue::MemoryStore;
    use crate::registry::DeliveryError;

    use super::*;

    /// A fake client: a real handle whose writer task acks every delivery
    /// (or fails every one) and records what got through.
    struct TestClient {
        handle: ClientHandle,
        received: mpsc::UnboundedReceiver<OutboundMessage>,
    }

    fn test_client(id: u64, healthy: bool) -> TestClient {
        let (handle, mut outbox) = ClientHandle::new(id);
        let (tx, received) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(out) = outbox.recv().await {
                if healthy {
                    let _ = tx.send(out.message.clone());
                    let _ = out.ack.send(Ok(()));
                } else {
                    let _ = out
                        .ack
                        .send(Err(DeliveryError::Transport("broken pipe".to_string())));
                }
            }
        });

        TestClient { handle, received }
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(
            Arc::new(ConnectionRegistry::new()),
            Arc::new(DurableQueue::open(MemoryStore::new())),
        )
    }

    async fn register(d: &Dispatcher, client: &TestClient, user_id: &str, role: &str) {
        let line = format!(
            r#"{{"type":"register","user":{{"domain":"d1","platform":"web","user_id":"{}","first_name":"","role":"{}"}}}}"#,
            user_id, role
        );
        d.dispatch(&client.handle, &line).await;
    }

    #[tokio::test]
    async fn test_live_broadcast_delivers_without_queueing() {
        let d = dispatcher();
        let mut a = test_client(1, true);

        register(&d, &a, "u1", "admin").await;
        assert_eq!(a.received.recv().await, Some(OutboundMessage::Registered));

        let mut sender = test_client(2, true);
        d.dispatch(
            &sender.handle,
            r#"{"type":"broadcast","message":"hello","user_id":"u1"}"#,
        )
        .await;

        assert_eq!(
            a.received.recv().await,
            Some(OutboundMessage::notification(json!("hello")))
        );
        assert_eq!(
            sender.received.recv().await,
            Some(OutboundMessage::BroadcastSent)
        );

        // Delivered live: no queue growth.
        assert!(d.queue().is_empty().await);
    }

    #[tokio::test]
    async fn test_offline_broadcast_queues_then_replays() {
        let d = dispatcher();

        let mut sender = test_client(1, true);
        d.dispatch(
            &sender.handle,
            r#"{"type":"broadcast","message":"offline","user_id":"u2"}"#,
        )
        .await;
        assert_eq!(
            sender.received.recv().await,
            Some(OutboundMessage::BroadcastSent)
        );
        assert_eq!(d.queue().len().await, 1);

        // u2 shows up later and gets the replay before the ack.
        let mut b = test_client(2, true);
        register(&d, &b, "u2", "user").await;

        assert_eq!(
            b.received.recv().await,
            Some(OutboundMessage::notification(json!("offline")))
        );
        assert_eq!(b.received.recv().await, Some(OutboundMessage::Registered));
        assert!(d.queue().is_empty().await);
    }

    #[tokio::test]
    async fn test_failed_delivery_queues_exactly_once() {
        let d = dispatcher();

        // Register two broken clients directly; their transports fail every
        // send. Two failed recipients must still produce a single entry.
        for id in [1, 2] {
            let broken = test_client(id, false);
            d.registry()
                .register(
                    broken.handle.clone(),
                    Identity {
                        domain: "d1".to_string(),
                        platform: "web".to_string(),
                        user_id: "u1".to_string(),
                        first_name: String::new(),
                        role: String::new(),
                    },
                )
                .await;
        }

        let sender = test_client(3, true);
        d.dispatch(
            &sender.handle,
            r#"{"type":"broadcast","message":"lost?","user_id":"u1"}"#,
        )
        .await;

        // Exactly one entry, not zero and not one per failed recipient.
        assert_eq!(d.queue().len().await, 1);
    }

    #[tokio::test]
    async fn test_failed_replay_is_requeued() {
        let d = dispatcher();

        d.queue()
            .enqueue(Filter::for_user("u1"), json!("fragile"))
            .await
            .unwrap();

        // Registration succeeds but every delivery fails, so the replay
        // goes back with a bumped attempt counter.
        let broken = test_client(1, false);
        register(&d, &broken, "u1", "").await;

        assert_eq!(d.queue().len().await, 1);
        let replayed = d
            .queue()
            .take_matching(&Identity {
                domain: String::new(),
                platform: String::new(),
                user_id: "u1".to_string(),
                first_name: String::new(),
                role: String::new(),
            })
            .await
            .unwrap();
        assert_eq!(replayed.len(), 1);
        assert_eq!(replayed[0].attempts, 1);
    }

    #[tokio::test]
    async fn test_wildcard_broadcast_reaches_everyone() {
        let d = dispatcher();
        let mut a = test_client(1, true);
        let mut b = test_client(2, true);

        register(&d, &a, "u1", "admin").await;
        register(&d, &b, "u2", "user").await;
        assert_eq!(a.received.recv().await, Some(OutboundMessage::Registered));
        assert_eq!(b.received.recv().await, Some(OutboundMessage::Registered));

        let sender = test_client(3, true);
        d.dispatch(&sender.handle, r#"{"type":"broadcast","message":"all"}"#)
            .await;

        assert_eq!(
            a.received.recv().await,
            Some(OutboundMessage::notification(json!("all")))
        );
        assert_eq!(
            b.received.recv().await,
            Some(OutboundMessage::notification(json!("all")))
        );
        assert!(d.queue().is_empty().await);
    }

    #[tokio::test]
    async fn test_role_filter_selects_subset() {
        let d = dispatcher();
        let mut admin = test_client(1, true);
        let mut user = test_client(2, true);

        register(&d, &admin, "u1", "admin").await;
        register(&d, &user, "u2", "user").await;
        assert_eq!(admin.received.recv().await, Some(OutboundMessage::Registered));
        assert_eq!(user.received.recv().await, Some(OutboundMessage::Registered));

        let sender = test_client(3, true);
        d.dispatch(
            &sender.handle,
            r#"{"type":"broadcast","message":"admins only","role":"admin"}"#,
        )
        .await;

        assert_eq!(
            admin.received.recv().await,
            Some(OutboundMessage::notification(json!("admins only")))
        );
        // The non-admin got nothing; next thing it could receive would
        // block, so check the channel is empty instead.
        assert!(user.received.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_ping_pong() {
        let d = dispatcher();
        let mut c = test_client(1, true);

        d.dispatch(&c.handle, r#"{"type":"ping"}"#).await;
        assert_eq!(c.received.recv().await, Some(OutboundMessage::Pong));
    }

    #[tokio::test]
    async fn test_malformed_json_yields_error_reply() {
        let d = dispatcher();
        let mut c = test_client(1, true);

        d.dispatch(&c.handle, "{oops").await;

        match c.received.recv().await {
            Some(OutboundMessage::Error { message }) => {
                assert!(message.contains("invalid JSON"));
            }
            other => panic!("unexpected reply: {:?}", other),
        }

        // No state was touched.
        assert!(d.registry().is_empty().await);
        assert!(d.queue().is_empty().await);
    }

    #[tokio::test]
    async fn test_unknown_type_names_the_type() {
        let d = dispatcher();
        let mut c = test_client(1, true);

        d.dispatch(&c.handle, r#"{"type":"subscribe"}"#).await;

        match c.received.recv().await {
            Some(OutboundMessage::Error { message }) => {
                assert!(message.contains("subscribe"));
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_pong_is_silent() {
        let d = dispatcher();
        let mut c = test_client(1, true);

        d.dispatch(&c.handle, r#"{"type":"pong"}"#).await;
        assert!(c.received.try_recv().is_err());
    }
}
