use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Timestamp;

/// Full set of online identities, sent once when a connection is accepted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct PresenceSnapshot {
    pub online: Vec<Uuid>,
}

/// An identity's aggregate online state changed.
///
/// `last_seen_at` is present only on the offline edge; it is the instant the
/// identity's last connection went away.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct PresenceDelta {
    pub identity: Uuid,
    pub is_online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen_at: Option<Timestamp>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn online_delta_omits_last_seen() {
        let delta = PresenceDelta {
            identity: Uuid::new_v4(),
            is_online: true,
            last_seen_at: None,
        };
        let serialized = serde_json::to_string(&delta).unwrap();
        assert!(!serialized.contains("last_seen_at"));
    }

    #[test]
    fn offline_delta_carries_last_seen() {
        let delta = PresenceDelta {
            identity: Uuid::new_v4(),
            is_online: false,
            last_seen_at: Some(Timestamp(Utc::now())),
        };
        let serialized = serde_json::to_string(&delta).unwrap();
        assert!(serialized.contains("last_seen_at"));

        let deserialized: PresenceDelta = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, delta);
    }
}
