//! Client-side reconciliation over the push stream.
//!
//! The stream is a hint channel, not a transport: any event may be dropped
//! when a connection is slow or replaced, so clients never patch state from
//! events alone. [`SyncSession`] turns stream lifecycle and incoming events
//! into [`SyncAction`]s, and [`MessageLog`] applies them idempotently so a
//! redundant or replayed event never duplicates a message.

use uuid::Uuid;

use crate::models::{ChatStreamEvent, Message};

pub mod log;

pub use log::MessageLog;

/// Lifecycle of the push connection as the client sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No stream; local state may be arbitrarily stale.
    Disconnected,
    /// Stream requested but no event received yet.
    Connecting,
    /// Stream live; events arrive as hints.
    Connected,
}

/// A local mutation derived from a push event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogMutation {
    Append(Message),
    Edit { message_id: Uuid, new_content: String },
    Remove { message_id: Uuid },
    Clear,
}

/// What the client should do next. Pull actions hit the REST surface and
/// replace local state wholesale with the authoritative answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// Re-fetch the conversation summary list.
    PullSummaries,
    /// Re-fetch the full message log with the given counterpart.
    PullConversation(Uuid),
    /// Apply an incremental hint to the open conversation's log.
    Apply(LogMutation),
}

/// Reconciliation state machine for one viewer.
///
/// Drives the contract that a reconnect always re-pulls from the store, and
/// that every event, whatever it carries, refreshes the summary list.
#[derive(Debug)]
pub struct SyncSession {
    viewer: Uuid,
    state: SyncState,
    open_conversation: Option<Uuid>,
}

impl SyncSession {
    #[must_use]
    pub fn new(viewer: Uuid) -> Self {
        Self {
            viewer,
            state: SyncState::Disconnected,
            open_conversation: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> SyncState {
        self.state
    }

    #[must_use]
    pub fn viewer(&self) -> Uuid {
        self.viewer
    }

    /// The client has requested a stream.
    pub fn begin_connect(&mut self) {
        self.state = SyncState::Connecting;
    }

    /// The stream is established. Everything local is suspect until
    /// re-pulled, because any number of events may have been missed while
    /// disconnected.
    pub fn connected(&mut self) -> Vec<SyncAction> {
        tracing::debug!(viewer = %self.viewer, "stream connected; re-pulling authoritative state");
        self.state = SyncState::Connected;
        let mut actions = vec![SyncAction::PullSummaries];
        if let Some(counterpart) = self.open_conversation {
            actions.push(SyncAction::PullConversation(counterpart));
        }
        actions
    }

    /// The stream ended, whether by server kick or network failure. The next
    /// [`connected`](Self::connected) re-pulls; nothing to do until then.
    pub fn channel_closed(&mut self) {
        tracing::debug!(viewer = %self.viewer, "stream closed; local state is stale");
        self.state = SyncState::Disconnected;
    }

    /// The viewer opened the conversation with `counterpart`; its log must be
    /// fetched before incremental hints mean anything.
    pub fn open_conversation(&mut self, counterpart: Uuid) -> SyncAction {
        self.open_conversation = Some(counterpart);
        SyncAction::PullConversation(counterpart)
    }

    pub fn close_conversation(&mut self) {
        self.open_conversation = None;
    }

    /// Translates a push event into actions.
    ///
    /// Message events that target the open conversation yield an incremental
    /// mutation; all events additionally refresh the summary list, since any
    /// of them can change a preview or ordering there.
    pub fn handle_event(&mut self, event: &ChatStreamEvent) -> Vec<SyncAction> {
        let mut actions = Vec::new();

        match event {
            ChatStreamEvent::MessageSent(directed) | ChatStreamEvent::ReceiveMessage(directed) => {
                let counterpart = directed.message.counterpart_of(self.viewer);
                if self.open_conversation == counterpart {
                    actions.push(SyncAction::Apply(LogMutation::Append(
                        directed.message.clone(),
                    )));
                }
            }
            ChatStreamEvent::MessageEdited(edited) => {
                if self.open_conversation.is_some() {
                    actions.push(SyncAction::Apply(LogMutation::Edit {
                        message_id: edited.message_id,
                        new_content: edited.new_content.clone(),
                    }));
                }
            }
            ChatStreamEvent::MessageDeleted(deleted) => {
                if self.open_conversation.is_some() {
                    actions.push(SyncAction::Apply(LogMutation::Remove {
                        message_id: deleted.message_id,
                    }));
                }
            }
            ChatStreamEvent::ChatCleared(cleared) => {
                if self.open_conversation == Some(cleared.initiator_id) {
                    actions.push(SyncAction::Apply(LogMutation::Clear));
                }
            }
            ChatStreamEvent::ConversationRefresh(refresh) => {
                if self.open_conversation == Some(refresh.counterpart_id) {
                    actions.push(SyncAction::PullConversation(refresh.counterpart_id));
                }
            }
            ChatStreamEvent::PresenceSnapshot(_) | ChatStreamEvent::PresenceDelta(_) => {}
        }

        actions.push(SyncAction::PullSummaries);
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ChatCleared, ConversationRefresh, DirectedMessage, MessageDirection, PresenceSnapshot,
        Timestamp,
    };
    use chrono::Utc;

    fn message(sender: Uuid, receiver: Uuid) -> Message {
        Message {
            id: Uuid::new_v4(),
            sender_id: sender,
            receiver_id: receiver,
            content: Some("hello".to_string()),
            attachment: None,
            sent_at: Timestamp(Utc::now()),
            edited: false,
        }
    }

    #[test]
    fn connect_repulls_summaries_and_open_conversation() {
        let viewer = Uuid::new_v4();
        let counterpart = Uuid::new_v4();
        let mut session = SyncSession::new(viewer);

        session.begin_connect();
        assert_eq!(session.state(), SyncState::Connecting);
        assert_eq!(session.connected(), vec![SyncAction::PullSummaries]);

        session.channel_closed();
        session.open_conversation(counterpart);
        session.begin_connect();
        assert_eq!(
            session.connected(),
            vec![
                SyncAction::PullSummaries,
                SyncAction::PullConversation(counterpart)
            ]
        );
    }

    #[test]
    fn incoming_message_for_open_conversation_is_applied() {
        let viewer = Uuid::new_v4();
        let counterpart = Uuid::new_v4();
        let mut session = SyncSession::new(viewer);
        session.open_conversation(counterpart);

        let msg = message(counterpart, viewer);
        let event = ChatStreamEvent::ReceiveMessage(DirectedMessage {
            message: msg.clone(),
            direction: MessageDirection::Incoming,
        });

        let actions = session.handle_event(&event);
        assert_eq!(
            actions,
            vec![
                SyncAction::Apply(LogMutation::Append(msg)),
                SyncAction::PullSummaries
            ]
        );
    }

    #[test]
    fn message_for_other_conversation_only_refreshes_summaries() {
        let viewer = Uuid::new_v4();
        let mut session = SyncSession::new(viewer);
        session.open_conversation(Uuid::new_v4());

        let msg = message(Uuid::new_v4(), viewer);
        let event = ChatStreamEvent::ReceiveMessage(DirectedMessage {
            message: msg,
            direction: MessageDirection::Incoming,
        });

        assert_eq!(session.handle_event(&event), vec![SyncAction::PullSummaries]);
    }

    #[test]
    fn presence_events_still_refresh_summaries() {
        let mut session = SyncSession::new(Uuid::new_v4());
        let event = ChatStreamEvent::PresenceSnapshot(PresenceSnapshot { online: vec![] });
        assert_eq!(session.handle_event(&event), vec![SyncAction::PullSummaries]);
    }

    #[test]
    fn clear_by_open_counterpart_wipes_the_log() {
        let viewer = Uuid::new_v4();
        let counterpart = Uuid::new_v4();
        let mut session = SyncSession::new(viewer);
        session.open_conversation(counterpart);

        let event = ChatStreamEvent::ChatCleared(ChatCleared {
            initiator_id: counterpart,
        });
        assert_eq!(
            session.handle_event(&event),
            vec![
                SyncAction::Apply(LogMutation::Clear),
                SyncAction::PullSummaries
            ]
        );
    }

    #[test]
    fn refresh_for_open_conversation_repulls_it() {
        let viewer = Uuid::new_v4();
        let counterpart = Uuid::new_v4();
        let mut session = SyncSession::new(viewer);
        session.open_conversation(counterpart);

        let event = ChatStreamEvent::ConversationRefresh(ConversationRefresh {
            counterpart_id: counterpart,
        });
        assert_eq!(
            session.handle_event(&event),
            vec![
                SyncAction::PullConversation(counterpart),
                SyncAction::PullSummaries
            ]
        );
    }
}
