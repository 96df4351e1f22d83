use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Timestamp;

/// The kind of file attached to a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    /// An inline-renderable image.
    Image,
    /// Any other file, offered as a download.
    File,
}

impl Display for AttachmentKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AttachmentKind::Image => write!(f, "image"),
            AttachmentKind::File => write!(f, "file"),
        }
    }
}

/// A file attached to a message in place of (not alongside) text content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct Attachment {
    /// Where the attachment bytes live. Upload/storage is outside this core.
    pub url: String,
    /// How clients should render the attachment.
    pub kind: AttachmentKind,
    /// Human-readable name shown in conversation previews.
    pub name: String,
}

/// A single direct message between two identities.
///
/// Exactly one of `content` and `attachment` is present. Every write path
/// keeps it that way: a send must carry exactly one body, and attachment
/// messages cannot be edited into carrying text as well.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct Message {
    /// Unique identifier for the message.
    pub id: Uuid,

    /// Identity that sent the message.
    pub sender_id: Uuid,

    /// Identity the message was addressed to.
    pub receiver_id: Uuid,

    /// Text content, absent for attachment-only messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Attachment, absent for text messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,

    /// When the store committed the message.
    pub sent_at: Timestamp,

    /// Whether the content was changed after sending.
    pub edited: bool,
}

impl Message {
    /// Whether `identity` is one of the two participants.
    #[must_use]
    pub fn involves(&self, identity: Uuid) -> bool {
        self.sender_id == identity || self.receiver_id == identity
    }

    /// The other participant from `identity`'s point of view, if `identity`
    /// participates at all.
    #[must_use]
    pub fn counterpart_of(&self, identity: Uuid) -> Option<Uuid> {
        if self.sender_id == identity {
            Some(self.receiver_id)
        } else if self.receiver_id == identity {
            Some(self.sender_id)
        } else {
            None
        }
    }

    /// Short text used for conversation-list previews.
    #[must_use]
    pub fn preview(&self) -> String {
        self.content
            .clone()
            .or_else(|| self.attachment.as_ref().map(|a| a.name.clone()))
            .unwrap_or_default()
    }
}

/// Which side of a conversation a pushed message copy belongs to.
///
/// Computed per recipient at fan-out time; never stored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MessageDirection {
    /// The recipient of this event sent the message (echo to other tabs).
    Outgoing,
    /// The recipient of this event is the addressee.
    Incoming,
}

/// Request body for sending a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct SendMessageRequest {
    /// Identity to deliver the message to.
    pub receiver_id: Uuid,
    /// Text content; mutually exclusive with `attachment`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Attachment; mutually exclusive with `content`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

/// Response body for a successful send.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct SendMessageResponse {
    /// The message as the store committed it.
    pub message: Message,
}

/// Request body for editing a message's content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct EditMessageRequest {
    /// Replacement text content.
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn text_message(sender: Uuid, receiver: Uuid) -> Message {
        Message {
            id: Uuid::new_v4(),
            sender_id: sender,
            receiver_id: receiver,
            content: Some("Hello, world!".to_string()),
            attachment: None,
            sent_at: Timestamp(Utc::now()),
            edited: false,
        }
    }

    #[test]
    fn counterpart_is_relative_to_the_viewer() {
        let sender = Uuid::new_v4();
        let receiver = Uuid::new_v4();
        let outsider = Uuid::new_v4();
        let message = text_message(sender, receiver);

        assert_eq!(message.counterpart_of(sender), Some(receiver));
        assert_eq!(message.counterpart_of(receiver), Some(sender));
        assert_eq!(message.counterpart_of(outsider), None);
        assert!(message.involves(sender));
        assert!(!message.involves(outsider));
    }

    #[test]
    fn preview_prefers_content_then_attachment_name() {
        let mut message = text_message(Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(message.preview(), "Hello, world!");

        message.content = None;
        message.attachment = Some(Attachment {
            url: "https://files.example/cat.png".to_string(),
            kind: AttachmentKind::Image,
            name: "cat.png".to_string(),
        });
        assert_eq!(message.preview(), "cat.png");
    }

    #[test]
    fn serialization_round_trips_and_omits_absent_body() {
        let dt = Utc.with_ymd_and_hms(2025, 3, 8, 14, 30, 0).unwrap();
        let message = Message {
            id: Uuid::parse_str("f47ac10b-58cc-4372-a567-0e02b2c3d479").unwrap(),
            sender_id: Uuid::new_v4(),
            receiver_id: Uuid::new_v4(),
            content: Some("Test message".to_string()),
            attachment: None,
            sent_at: Timestamp(dt),
            edited: true,
        };

        let serialized = serde_json::to_string(&message).unwrap();
        assert!(!serialized.contains("attachment"));

        let deserialized: Message = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, message);
    }

    #[test]
    fn attachment_kind_uses_snake_case_on_the_wire() {
        assert_eq!(
            serde_json::to_string(&AttachmentKind::Image).unwrap(),
            "\"image\""
        );
        assert_eq!(AttachmentKind::File.to_string(), "file");
    }
}
