use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Per-identity connection bookkeeping.
///
/// Presence is derived purely from live connections: an identity is online
/// while it has at least one, and `last_seen_at` is stamped the moment its
/// connection set becomes empty. Mutations for one identity serialize on
/// that identity's entry lock, so two racing connects or disconnects can
/// never double-report an online or offline edge. Different identities never
/// contend with each other.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    entries: RwLock<HashMap<Uuid, Arc<Mutex<PresenceEntry>>>>,
}

#[derive(Debug, Default)]
struct PresenceEntry {
    connections: HashSet<Uuid>,
    last_seen_at: Option<DateTime<Utc>>,
}

impl PresenceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn entry(&self, identity: Uuid) -> Arc<Mutex<PresenceEntry>> {
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(&identity) {
                return Arc::clone(entry);
            }
        }

        let mut entries = self.entries.write().await;
        Arc::clone(entries.entry(identity).or_default())
    }

    /// Records a connection; returns whether the identity just came online.
    pub async fn add_connection(&self, identity: Uuid, connection_id: Uuid) -> bool {
        let entry = self.entry(identity).await;
        let mut entry = entry.lock().await;
        let was_offline = entry.connections.is_empty();
        entry.connections.insert(connection_id);
        was_offline
    }

    /// Drops a connection; returns the last-seen stamp if the identity just
    /// went offline. Removing an unknown connection is a no-op, so a stream
    /// teardown racing an explicit kick cannot report offline twice.
    pub async fn remove_connection(
        &self,
        identity: Uuid,
        connection_id: Uuid,
    ) -> Option<DateTime<Utc>> {
        let entry = self.entry(identity).await;
        let mut entry = entry.lock().await;
        if !entry.connections.remove(&connection_id) {
            return None;
        }
        if entry.connections.is_empty() {
            let stamp = Utc::now();
            entry.last_seen_at = Some(stamp);
            return Some(stamp);
        }
        None
    }

    pub async fn is_online(&self, identity: Uuid) -> bool {
        let entry = self.entry(identity).await;
        let entry = entry.lock().await;
        !entry.connections.is_empty()
    }

    pub async fn last_seen(&self, identity: Uuid) -> Option<DateTime<Utc>> {
        let entry = self.entry(identity).await;
        let entry = entry.lock().await;
        entry.last_seen_at
    }

    /// Connection ids currently registered for the identity.
    pub async fn connection_ids(&self, identity: Uuid) -> Vec<Uuid> {
        let entry = self.entry(identity).await;
        let entry = entry.lock().await;
        entry.connections.iter().copied().collect()
    }

    /// Identities with at least one live connection, in no particular order.
    pub async fn snapshot_online(&self) -> Vec<Uuid> {
        let entries = self.entries.read().await;
        let mut online = Vec::new();
        for (identity, entry) in entries.iter() {
            if !entry.lock().await.connections.is_empty() {
                online.push(*identity);
            }
        }
        online
    }

    pub async fn online_count(&self) -> usize {
        self.snapshot_online().await.len()
    }
}
