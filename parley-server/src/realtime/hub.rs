use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared::models::{ChatStreamEvent, PresenceDelta, PresenceSnapshot};

use super::presence::PresenceRegistry;

pub type SharedHub = Arc<ConnectionHub>;

struct ConnectionHandle {
    identity: Uuid,
    sender: mpsc::Sender<ChatStreamEvent>,
    opened_at: DateTime<Utc>,
}

/// Registry of live push connections and the presence state they imply.
///
/// Each connection gets a bounded event channel. Delivery is best-effort by
/// contract: fan-out never blocks on a slow consumer. A connection whose
/// queue is full when a targeted event arrives is kicked; the client
/// re-syncs from the store on reconnect.
pub struct ConnectionHub {
    presence: PresenceRegistry,
    connections: RwLock<HashMap<Uuid, ConnectionHandle>>,
    capacity: usize,
}

impl std::fmt::Debug for ConnectionHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHub")
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl ConnectionHub {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            presence: PresenceRegistry::new(),
            connections: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    #[must_use]
    pub fn presence(&self) -> &PresenceRegistry {
        &self.presence
    }

    /// Registers a connection for `identity` and returns its id plus the
    /// receiving end of its event channel.
    ///
    /// The new connection gets a full presence snapshot before anything
    /// else, so the client starts from known-complete presence state. If
    /// this is the identity's first connection, everyone is told it came
    /// online.
    pub async fn connect(&self, identity: Uuid) -> (Uuid, mpsc::Receiver<ChatStreamEvent>) {
        let connection_id = Uuid::new_v4();
        let (sender, receiver) = mpsc::channel(self.capacity);

        {
            let mut connections = self.connections.write().await;
            connections.insert(
                connection_id,
                ConnectionHandle {
                    identity,
                    sender: sender.clone(),
                    opened_at: Utc::now(),
                },
            );
        }

        let came_online = self.presence.add_connection(identity, connection_id).await;

        let snapshot = ChatStreamEvent::PresenceSnapshot(PresenceSnapshot {
            online: self.presence.snapshot_online().await,
        });
        // The channel is freshly created; a full queue here is impossible.
        let _ = sender.try_send(snapshot);

        if came_online {
            self.broadcast(ChatStreamEvent::PresenceDelta(PresenceDelta {
                identity,
                is_online: true,
                last_seen_at: None,
            }))
            .await;
        }

        metrics::counter!("parley_connections_opened_total").increment(1);
        metrics::gauge!("parley_online_identities")
            .set(self.presence.online_count().await as f64);
        info!(%identity, %connection_id, came_online, "connection registered");

        (connection_id, receiver)
    }

    /// Unregisters a connection. Safe to call more than once for the same
    /// id: teardown can race an explicit kick, and only the first call does
    /// anything. Broadcasts the offline edge if this was the identity's
    /// last connection.
    pub async fn disconnect(&self, connection_id: Uuid) {
        let handle = {
            let mut connections = self.connections.write().await;
            connections.remove(&connection_id)
        };
        let Some(handle) = handle else {
            return;
        };

        let went_offline = self
            .presence
            .remove_connection(handle.identity, connection_id)
            .await;

        debug!(
            identity = %handle.identity,
            %connection_id,
            opened_at = %handle.opened_at,
            "connection unregistered"
        );

        if let Some(last_seen) = went_offline {
            self.broadcast(ChatStreamEvent::PresenceDelta(PresenceDelta {
                identity: handle.identity,
                is_online: false,
                last_seen_at: Some(last_seen.into()),
            }))
            .await;
        }

        metrics::gauge!("parley_online_identities")
            .set(self.presence.online_count().await as f64);
    }

    /// Delivers an event to every connection the identity has open.
    ///
    /// A full queue means the consumer is not draining; it gets kicked. A
    /// closed channel means the stream task already ended; the connection
    /// record is cleaned up the same way.
    pub async fn send_to(&self, identity: Uuid, event: &ChatStreamEvent) {
        let targets = self.presence.connection_ids(identity).await;
        if targets.is_empty() {
            return;
        }

        let senders: Vec<(Uuid, mpsc::Sender<ChatStreamEvent>)> = {
            let connections = self.connections.read().await;
            targets
                .iter()
                .filter_map(|id| {
                    connections
                        .get(id)
                        .map(|handle| (*id, handle.sender.clone()))
                })
                .collect()
        };

        for (connection_id, sender) in senders {
            match sender.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        %identity,
                        %connection_id,
                        event = event.name(),
                        "event queue full; kicking slow consumer"
                    );
                    metrics::counter!("parley_connections_kicked_total").increment(1);
                    self.disconnect(connection_id).await;
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    self.disconnect(connection_id).await;
                }
            }
        }
    }

    /// Fan-out to every live connection. Pure delivery: events to full or
    /// closed queues are dropped here, and targeted sends or stream teardown
    /// handle the cleanup. Keeping broadcast reap-free means the
    /// disconnect -> broadcast path cannot recurse.
    pub async fn broadcast(&self, event: ChatStreamEvent) {
        let senders: Vec<mpsc::Sender<ChatStreamEvent>> = {
            let connections = self.connections.read().await;
            connections
                .values()
                .map(|handle| handle.sender.clone())
                .collect()
        };

        for sender in senders {
            if sender.try_send(event.clone()).is_err() {
                metrics::counter!("parley_broadcast_dropped_total").increment(1);
            }
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn next_event(receiver: &mut mpsc::Receiver<ChatStreamEvent>) -> ChatStreamEvent {
        timeout(Duration::from_secs(1), receiver.recv())
            .await
            .expect("event within deadline")
            .expect("channel open")
    }

    #[tokio::test]
    async fn new_connection_receives_snapshot_first() {
        let hub = ConnectionHub::new(8);
        let identity = Uuid::new_v4();

        let (_, mut receiver) = hub.connect(identity).await;

        match next_event(&mut receiver).await {
            ChatStreamEvent::PresenceSnapshot(snapshot) => {
                assert!(snapshot.online.contains(&identity));
            }
            other => panic!("expected presence snapshot, got {}", other.name()),
        }
    }

    #[tokio::test]
    async fn second_tab_does_not_rebroadcast_online() {
        let hub = ConnectionHub::new(8);
        let identity = Uuid::new_v4();
        let observer = Uuid::new_v4();

        let (_, mut observer_rx) = hub.connect(observer).await;
        let _ = next_event(&mut observer_rx).await; // snapshot

        let (_, _first_rx) = hub.connect(identity).await;
        match next_event(&mut observer_rx).await {
            ChatStreamEvent::PresenceDelta(delta) => {
                assert_eq!(delta.identity, identity);
                assert!(delta.is_online);
                assert!(delta.last_seen_at.is_none());
            }
            other => panic!("expected online delta, got {}", other.name()),
        }

        let (_, _second_rx) = hub.connect(identity).await;
        let nothing = timeout(Duration::from_millis(100), observer_rx.recv()).await;
        assert!(nothing.is_err(), "second tab must not re-announce online");
    }

    #[tokio::test]
    async fn last_disconnect_broadcasts_offline_with_last_seen() {
        let hub = ConnectionHub::new(8);
        let identity = Uuid::new_v4();
        let observer = Uuid::new_v4();

        let (first, _first_rx) = hub.connect(identity).await;
        let (second, _second_rx) = hub.connect(identity).await;
        let (_, mut observer_rx) = hub.connect(observer).await;
        let _ = next_event(&mut observer_rx).await; // snapshot

        hub.disconnect(first).await;
        let nothing = timeout(Duration::from_millis(100), observer_rx.recv()).await;
        assert!(nothing.is_err(), "identity still has a live connection");

        hub.disconnect(second).await;
        match next_event(&mut observer_rx).await {
            ChatStreamEvent::PresenceDelta(delta) => {
                assert_eq!(delta.identity, identity);
                assert!(!delta.is_online);
                assert!(delta.last_seen_at.is_some());
            }
            other => panic!("expected offline delta, got {}", other.name()),
        }
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let hub = ConnectionHub::new(8);
        let (connection_id, _rx) = hub.connect(Uuid::new_v4()).await;

        hub.disconnect(connection_id).await;
        hub.disconnect(connection_id).await;
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test]
    async fn slow_consumer_is_kicked_on_targeted_send() {
        let hub = ConnectionHub::new(1);
        let identity = Uuid::new_v4();

        // The receiver is never drained, so the snapshot already fills the
        // queue of one.
        let (_, _undrained_rx) = hub.connect(identity).await;
        assert_eq!(hub.connection_count().await, 1);

        let event = ChatStreamEvent::PresenceSnapshot(PresenceSnapshot { online: vec![] });
        hub.send_to(identity, &event).await;

        assert_eq!(hub.connection_count().await, 0);
        assert!(!hub.presence().is_online(identity).await);
    }
}
