use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;
use tracing::{instrument, warn};
use uuid::Uuid;

use shared::models::{
    ChatCleared, ChatStreamEvent, ConversationRefresh, ConversationSummary, DirectedMessage,
    Message, MessageDeleted, MessageDirection, MessageEdited, SendMessageRequest,
};

use crate::store::{NewMessage, SharedStore, StoreError};

use super::hub::SharedHub;

pub type SharedRouter = Arc<MessageRouter>;
pub type RouterResult<T> = Result<T, RouterError>;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for RouterError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(message) => RouterError::NotFound(message),
            other => RouterError::Store(other),
        }
    }
}

/// Orders a pair of identities so both directions map to the same lock key.
fn pair_key(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Mutation pipeline for direct messages.
///
/// Every mutation follows the same shape: validate, take the conversation's
/// pair lock, commit to the store, then push events. Holding the lock across
/// commit and push means events for one conversation go out in commit order;
/// nothing is ever pushed for a write the store rejected. Store calls are
/// bounded by a timeout and surface as unavailability rather than hanging
/// the caller; there is no automatic retry, the client decides.
pub struct MessageRouter {
    store: SharedStore,
    hub: SharedHub,
    pair_locks: RwLock<HashMap<(Uuid, Uuid), Arc<Mutex<()>>>>,
    store_timeout: Duration,
}

impl std::fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageRouter")
            .field("store_timeout", &self.store_timeout)
            .finish()
    }
}

impl MessageRouter {
    #[must_use]
    pub fn new(store: SharedStore, hub: SharedHub, store_timeout: Duration) -> Self {
        Self {
            store,
            hub,
            pair_locks: RwLock::new(HashMap::new()),
            store_timeout,
        }
    }

    async fn pair_lock(&self, a: Uuid, b: Uuid) -> Arc<Mutex<()>> {
        let key = pair_key(a, b);
        {
            let locks = self.pair_locks.read().await;
            if let Some(lock) = locks.get(&key) {
                return Arc::clone(lock);
            }
        }
        let mut locks = self.pair_locks.write().await;
        Arc::clone(locks.entry(key).or_default())
    }

    async fn with_timeout<T, F>(&self, operation: F) -> RouterResult<T>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match timeout(self.store_timeout, operation).await {
            Ok(result) => result.map_err(RouterError::from),
            Err(_) => Err(RouterError::Store(StoreError::Unavailable(
                "store operation timed out".to_string(),
            ))),
        }
    }

    async fn refresh_pair(&self, a: Uuid, b: Uuid) {
        self.hub
            .send_to(
                a,
                &ChatStreamEvent::ConversationRefresh(ConversationRefresh { counterpart_id: b }),
            )
            .await;
        self.hub
            .send_to(
                b,
                &ChatStreamEvent::ConversationRefresh(ConversationRefresh { counterpart_id: a }),
            )
            .await;
    }

    /// Validates, persists, and fans out a new message. The sender's own
    /// connections get an outgoing echo so other tabs stay current; the
    /// receiver's get an incoming delivery.
    #[instrument(name = "router.send", skip(self, request), err)]
    pub async fn send(&self, caller: Uuid, request: SendMessageRequest) -> RouterResult<Message> {
        if request.receiver_id == caller {
            return Err(RouterError::Validation(
                "cannot send a message to yourself".to_string(),
            ));
        }

        let content = request
            .content
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        match (&content, &request.attachment) {
            (None, None) => {
                return Err(RouterError::Validation(
                    "message needs content or an attachment".to_string(),
                ));
            }
            (Some(_), Some(_)) => {
                return Err(RouterError::Validation(
                    "message cannot carry both content and an attachment".to_string(),
                ));
            }
            _ => {}
        }

        let receiver = request.receiver_id;
        let lock = self.pair_lock(caller, receiver).await;
        let _guard = lock.lock().await;

        let message = self
            .with_timeout(self.store.create_message(NewMessage {
                sender_id: caller,
                receiver_id: receiver,
                content,
                attachment: request.attachment,
            }))
            .await?;

        metrics::counter!("parley_messages_sent_total").increment(1);

        self.hub
            .send_to(
                caller,
                &ChatStreamEvent::MessageSent(DirectedMessage {
                    message: message.clone(),
                    direction: MessageDirection::Outgoing,
                }),
            )
            .await;
        self.hub
            .send_to(
                receiver,
                &ChatStreamEvent::ReceiveMessage(DirectedMessage {
                    message: message.clone(),
                    direction: MessageDirection::Incoming,
                }),
            )
            .await;
        self.refresh_pair(caller, receiver).await;

        Ok(message)
    }

    /// Replaces a message's text. Only the sender may edit, and only text
    /// messages are editable: setting content on an attachment message would
    /// leave it with two bodies. A concurrent delete wins and the edit
    /// reports not-found.
    #[instrument(name = "router.edit", skip(self, content), err)]
    pub async fn edit(
        &self,
        caller: Uuid,
        message_id: Uuid,
        content: &str,
    ) -> RouterResult<Message> {
        let content = content.trim();
        if content.is_empty() {
            return Err(RouterError::Validation(
                "edited content cannot be empty".to_string(),
            ));
        }

        let message = self.require_owned(caller, message_id, "edit").await?;
        if message.attachment.is_some() {
            return Err(RouterError::Validation(
                "attachment messages cannot be edited".to_string(),
            ));
        }

        let lock = self.pair_lock(message.sender_id, message.receiver_id).await;
        let _guard = lock.lock().await;

        let updated = self
            .with_timeout(self.store.update_message_content(message_id, content))
            .await?;

        let event = ChatStreamEvent::MessageEdited(MessageEdited {
            message_id,
            new_content: content.to_string(),
        });
        self.hub.send_to(updated.sender_id, &event).await;
        self.hub.send_to(updated.receiver_id, &event).await;
        self.refresh_pair(updated.sender_id, updated.receiver_id).await;

        Ok(updated)
    }

    /// Removes a message. Only the sender may delete.
    #[instrument(name = "router.delete", skip(self), err)]
    pub async fn delete(&self, caller: Uuid, message_id: Uuid) -> RouterResult<()> {
        let message = self.require_owned(caller, message_id, "delete").await?;

        let lock = self.pair_lock(message.sender_id, message.receiver_id).await;
        let _guard = lock.lock().await;

        self.with_timeout(self.store.delete_message(message_id))
            .await?;

        let event = ChatStreamEvent::MessageDeleted(MessageDeleted { message_id });
        self.hub.send_to(message.sender_id, &event).await;
        self.hub.send_to(message.receiver_id, &event).await;
        self.refresh_pair(message.sender_id, message.receiver_id).await;

        Ok(())
    }

    /// Wipes the whole conversation between the caller and a counterpart.
    /// The counterpart is told who initiated; the caller already knows.
    #[instrument(name = "router.clear", skip(self), err)]
    pub async fn clear_conversation(&self, caller: Uuid, counterpart: Uuid) -> RouterResult<u64> {
        let lock = self.pair_lock(caller, counterpart).await;
        let _guard = lock.lock().await;

        let deleted = self
            .with_timeout(self.store.delete_conversation(caller, counterpart))
            .await?;

        self.hub
            .send_to(
                counterpart,
                &ChatStreamEvent::ChatCleared(ChatCleared {
                    initiator_id: caller,
                }),
            )
            .await;
        self.refresh_pair(caller, counterpart).await;

        Ok(deleted)
    }

    /// Authoritative message log for the caller's conversation with one
    /// counterpart, oldest first.
    pub async fn conversation_log(
        &self,
        caller: Uuid,
        counterpart: Uuid,
    ) -> RouterResult<Vec<Message>> {
        self.with_timeout(self.store.messages_between(caller, counterpart))
            .await
    }

    /// Authoritative conversation list for the caller, most recent first.
    pub async fn summaries(&self, caller: Uuid) -> RouterResult<Vec<ConversationSummary>> {
        self.with_timeout(self.store.conversation_summaries(caller))
            .await
    }

    async fn require_owned(
        &self,
        caller: Uuid,
        message_id: Uuid,
        action: &'static str,
    ) -> RouterResult<Message> {
        let message = self
            .with_timeout(self.store.find_message(message_id))
            .await?
            .ok_or_else(|| RouterError::NotFound(format!("message {message_id}")))?;

        if message.sender_id != caller {
            warn!(%caller, %message_id, action, "rejected mutation of another sender's message");
            metrics::counter!("parley_mutations_denied_total", "action" => action).increment(1);
            return Err(RouterError::Forbidden(format!(
                "only the sender may {action} a message"
            )));
        }

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::hub::ConnectionHub;
    use crate::store::MemoryConversationStore;
    use shared::models::Attachment;
    use shared::models::AttachmentKind;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout as within;

    fn build() -> (SharedRouter, SharedHub, SharedStore) {
        let store: SharedStore = Arc::new(MemoryConversationStore::new());
        let hub = Arc::new(ConnectionHub::new(16));
        let router = Arc::new(MessageRouter::new(
            Arc::clone(&store),
            Arc::clone(&hub),
            Duration::from_secs(1),
        ));
        (router, hub, store)
    }

    async fn connect_drained(
        hub: &SharedHub,
        identity: Uuid,
    ) -> mpsc::Receiver<ChatStreamEvent> {
        let (_, mut receiver) = hub.connect(identity).await;
        // Skip the presence snapshot.
        let _ = within(Duration::from_secs(1), receiver.recv()).await;
        receiver
    }

    async fn next_event(receiver: &mut mpsc::Receiver<ChatStreamEvent>) -> ChatStreamEvent {
        within(Duration::from_secs(1), receiver.recv())
            .await
            .expect("event within deadline")
            .expect("channel open")
    }

    /// Pulls events until one that is not a presence delta shows up.
    /// Presence edges from other participants connecting interleave freely.
    async fn next_non_presence(receiver: &mut mpsc::Receiver<ChatStreamEvent>) -> ChatStreamEvent {
        loop {
            match next_event(receiver).await {
                ChatStreamEvent::PresenceDelta(_) | ChatStreamEvent::PresenceSnapshot(_) => {}
                other => return other,
            }
        }
    }

    fn text_request(receiver_id: Uuid, content: &str) -> SendMessageRequest {
        SendMessageRequest {
            receiver_id,
            content: Some(content.to_string()),
            attachment: None,
        }
    }

    #[tokio::test]
    async fn send_delivers_directional_copies_and_refreshes() {
        let (router, hub, _store) = build();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let mut alice_rx = connect_drained(&hub, alice).await;
        let mut bob_rx = connect_drained(&hub, bob).await;

        let message = router
            .send(alice, text_request(bob, "hello"))
            .await
            .unwrap();

        match next_non_presence(&mut alice_rx).await {
            ChatStreamEvent::MessageSent(directed) => {
                assert_eq!(directed.message, message);
                assert_eq!(directed.direction, MessageDirection::Outgoing);
            }
            other => panic!("expected sender echo, got {}", other.name()),
        }
        match next_non_presence(&mut bob_rx).await {
            ChatStreamEvent::ReceiveMessage(directed) => {
                assert_eq!(directed.message, message);
                assert_eq!(directed.direction, MessageDirection::Incoming);
            }
            other => panic!("expected delivery, got {}", other.name()),
        }

        match next_non_presence(&mut alice_rx).await {
            ChatStreamEvent::ConversationRefresh(refresh) => {
                assert_eq!(refresh.counterpart_id, bob);
            }
            other => panic!("expected refresh, got {}", other.name()),
        }
        match next_non_presence(&mut bob_rx).await {
            ChatStreamEvent::ConversationRefresh(refresh) => {
                assert_eq!(refresh.counterpart_id, alice);
            }
            other => panic!("expected refresh, got {}", other.name()),
        }
    }

    #[tokio::test]
    async fn invalid_sends_persist_and_push_nothing() {
        let (router, hub, store) = build();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let mut bob_rx = connect_drained(&hub, bob).await;

        let empty = router.send(alice, text_request(bob, "   ")).await;
        assert!(matches!(empty, Err(RouterError::Validation(_))));

        let to_self = router.send(alice, text_request(alice, "hi me")).await;
        assert!(matches!(to_self, Err(RouterError::Validation(_))));

        let both = router
            .send(
                alice,
                SendMessageRequest {
                    receiver_id: bob,
                    content: Some("text".to_string()),
                    attachment: Some(Attachment {
                        url: "https://files.example/a.png".to_string(),
                        kind: AttachmentKind::Image,
                        name: "a.png".to_string(),
                    }),
                },
            )
            .await;
        assert!(matches!(both, Err(RouterError::Validation(_))));

        assert!(store.messages_between(alice, bob).await.unwrap().is_empty());
        let silence = within(Duration::from_millis(100), bob_rx.recv()).await;
        assert!(silence.is_err(), "rejected sends must push nothing");
    }

    #[tokio::test]
    async fn only_the_sender_may_edit_or_delete() {
        let (router, _hub, _store) = build();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        let message = router
            .send(alice, text_request(bob, "original"))
            .await
            .unwrap();

        let edit = router.edit(bob, message.id, "hijacked").await;
        assert!(matches!(edit, Err(RouterError::Forbidden(_))));

        let delete = router.delete(bob, message.id).await;
        assert!(matches!(delete, Err(RouterError::Forbidden(_))));

        let log = router.conversation_log(alice, bob).await.unwrap();
        assert_eq!(log[0].content.as_deref(), Some("original"));
    }

    #[tokio::test]
    async fn edit_pushes_the_new_content_to_both_sides() {
        let (router, hub, _store) = build();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let mut bob_rx = connect_drained(&hub, bob).await;

        let message = router
            .send(alice, text_request(bob, "first"))
            .await
            .unwrap();
        let _ = next_non_presence(&mut bob_rx).await; // delivery
        let _ = next_non_presence(&mut bob_rx).await; // refresh

        let updated = router.edit(alice, message.id, "second").await.unwrap();
        assert!(updated.edited);

        match next_non_presence(&mut bob_rx).await {
            ChatStreamEvent::MessageEdited(edited) => {
                assert_eq!(edited.message_id, message.id);
                assert_eq!(edited.new_content, "second");
            }
            other => panic!("expected edit event, got {}", other.name()),
        }
    }

    #[tokio::test]
    async fn attachment_messages_keep_a_single_body_on_edit() {
        let (router, hub, store) = build();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let mut bob_rx = connect_drained(&hub, bob).await;

        let message = router
            .send(
                alice,
                SendMessageRequest {
                    receiver_id: bob,
                    content: None,
                    attachment: Some(Attachment {
                        url: "https://files.example/report.pdf".to_string(),
                        kind: AttachmentKind::File,
                        name: "report.pdf".to_string(),
                    }),
                },
            )
            .await
            .unwrap();
        let _ = next_non_presence(&mut bob_rx).await; // delivery
        let _ = next_non_presence(&mut bob_rx).await; // refresh

        let result = router.edit(alice, message.id, "now has text too").await;
        assert!(matches!(result, Err(RouterError::Validation(_))));

        let log = store.messages_between(alice, bob).await.unwrap();
        assert_eq!(log[0].content, None);
        assert!(log[0].attachment.is_some());
        assert!(!log[0].edited);

        let silence = within(Duration::from_millis(100), bob_rx.recv()).await;
        assert!(silence.is_err(), "rejected edits must push nothing");
    }

    #[tokio::test]
    async fn deleting_a_missing_message_is_not_found() {
        let (router, _hub, _store) = build();
        let result = router.delete(Uuid::new_v4(), Uuid::new_v4()).await;
        assert!(matches!(result, Err(RouterError::NotFound(_))));
    }

    #[tokio::test]
    async fn clear_notifies_only_the_counterpart() {
        let (router, hub, store) = build();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        router.send(alice, text_request(bob, "one")).await.unwrap();
        router.send(bob, text_request(alice, "two")).await.unwrap();

        let mut alice_rx = connect_drained(&hub, alice).await;
        let mut bob_rx = connect_drained(&hub, bob).await;

        let deleted = router.clear_conversation(alice, bob).await.unwrap();
        assert_eq!(deleted, 2);
        assert!(store.messages_between(alice, bob).await.unwrap().is_empty());

        match next_non_presence(&mut bob_rx).await {
            ChatStreamEvent::ChatCleared(cleared) => {
                assert_eq!(cleared.initiator_id, alice);
            }
            other => panic!("expected clear event, got {}", other.name()),
        }

        // The initiator gets a refresh but no cleared notice.
        match next_non_presence(&mut alice_rx).await {
            ChatStreamEvent::ConversationRefresh(refresh) => {
                assert_eq!(refresh.counterpart_id, bob);
            }
            other => panic!("expected refresh, got {}", other.name()),
        }
    }

    #[tokio::test]
    async fn store_not_found_surfaces_as_router_not_found() {
        let error = RouterError::from(StoreError::NotFound("message x".to_string()));
        assert!(matches!(error, RouterError::NotFound(_)));

        let unavailable = RouterError::from(StoreError::Unavailable("down".to_string()));
        assert!(matches!(unavailable, RouterError::Store(_)));
    }

    #[tokio::test]
    async fn pair_key_is_order_insensitive() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(pair_key(a, b), pair_key(b, a));
    }
}
