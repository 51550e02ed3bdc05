//! StateManager - actor that owns the ChatCache
//!
//! Processes commands via channels for single-owner access to cached
//! state, and broadcasts change notifications for display consumers.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::events::{ChatEvent, ConversationAction, EventBus};
use msgcache::{CacheMetrics, ChatCache, ChatMessage, Conversation, PresenceStatus, PresenceUpdate};

use super::messages::{StateCommand, StateError, StateResponse};

/// Capacity of the command channel
const COMMAND_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the state-change broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Event broadcast when cached state changes that consumers should react to
#[derive(Debug, Clone)]
pub enum StateEvent {
    /// The conversation list was replaced by a refetch
    ConversationsReplaced { count: usize },
    /// One conversation's messages were replaced by a refetch
    MessagesReplaced { conversation_id: String, count: usize },
    /// A new message was cached
    MessageReceived { message: ChatMessage },
    /// A conversation was created, updated or removed
    ConversationChanged { conversation_id: String },
    /// The set of typing users changed in a conversation
    TypingChanged { conversation_id: String },
    /// A user's presence changed
    PresenceChanged { user_id: String, status: PresenceStatus },
}

/// Handle to send commands to the StateManager
#[derive(Clone)]
pub struct StateManager {
    tx: mpsc::Sender<StateCommand>,
    /// Broadcast sender for state change notifications
    event_tx: broadcast::Sender<StateEvent>,
}

impl StateManager {
    /// Spawn a new StateManager actor with an empty cache
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        tokio::spawn(actor_loop(ChatCache::new(), rx, event_tx.clone()));

        info!("StateManager spawned");
        Self { tx, event_tx }
    }

    /// Subscribe to state change events
    pub fn subscribe_events(&self) -> broadcast::Receiver<StateEvent> {
        self.event_tx.subscribe()
    }

    /// Apply a transport event to the cache
    ///
    /// Fire-and-forget: the event stream has no reply to give. Errors
    /// only surface if the actor is gone.
    pub async fn apply_event(&self, event: ChatEvent) -> StateResponse<()> {
        debug!(event_type = event.event_type(), "apply_event: called");
        self.tx
            .send(StateCommand::ApplyEvent { event })
            .await
            .map_err(|_| StateError::ChannelError)
    }

    /// Replace the conversation list with refetched data
    pub async fn replace_conversations(&self, conversations: Vec<Conversation>) -> StateResponse<()> {
        debug!(count = conversations.len(), "replace_conversations: called");
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        self.tx
            .send(StateCommand::ReplaceConversations {
                conversations,
                reply: reply_tx,
            })
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    /// Replace one conversation's messages with refetched data
    pub async fn replace_messages(&self, conversation_id: &str, messages: Vec<ChatMessage>) -> StateResponse<()> {
        debug!(%conversation_id, count = messages.len(), "replace_messages: called");
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        self.tx
            .send(StateCommand::ReplaceMessages {
                conversation_id: conversation_id.to_string(),
                messages,
                reply: reply_tx,
            })
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    /// List cached conversations, most recently active first
    pub async fn list_conversations(&self) -> StateResponse<Vec<Conversation>> {
        debug!("list_conversations: called");
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        self.tx
            .send(StateCommand::ListConversations { reply: reply_tx })
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    /// Get one cached conversation
    pub async fn get_conversation(&self, id: &str) -> StateResponse<Option<Conversation>> {
        debug!(%id, "get_conversation: called");
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        self.tx
            .send(StateCommand::GetConversation {
                id: id.to_string(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    /// List one conversation's cached messages, oldest first
    pub async fn list_messages(&self, conversation_id: &str) -> StateResponse<Vec<ChatMessage>> {
        debug!(%conversation_id, "list_messages: called");
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        self.tx
            .send(StateCommand::ListMessages {
                conversation_id: conversation_id.to_string(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    /// Users currently typing in a conversation
    pub async fn typing_users(&self, conversation_id: &str) -> StateResponse<Vec<String>> {
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        self.tx
            .send(StateCommand::TypingUsers {
                conversation_id: conversation_id.to_string(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    /// Last known presence for a user
    pub async fn presence(&self, user_id: &str) -> StateResponse<Option<PresenceUpdate>> {
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        self.tx
            .send(StateCommand::GetPresence {
                user_id: user_id.to_string(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    /// Aggregate counters over the cached state
    pub async fn metrics(&self) -> StateResponse<CacheMetrics> {
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        self.tx
            .send(StateCommand::Metrics { reply: reply_tx })
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    /// Stop the actor
    pub async fn shutdown(&self) {
        debug!("shutdown: called");
        let _ = self.tx.send(StateCommand::Shutdown).await;
    }
}

/// Spawn the pump task that applies bus events to the state actor
///
/// Runs until the bus closes or the actor goes away.
pub fn spawn_event_pump(bus: Arc<EventBus>, state: StateManager) -> tokio::task::JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if state.apply_event(event).await.is_err() {
                        debug!("Event pump stopping: state actor is gone");
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Dropped events will be recovered by the next refetch
                    warn!(n, "Event pump lagged, dropped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event pump stopping: bus closed");
                    return;
                }
            }
        }
    })
}

/// The actor task: single owner of the cache
async fn actor_loop(mut cache: ChatCache, mut rx: mpsc::Receiver<StateCommand>, event_tx: broadcast::Sender<StateEvent>) {
    debug!("actor_loop: started");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            StateCommand::ApplyEvent { event } => {
                apply_event(&mut cache, event, &event_tx);
            }
            StateCommand::ReplaceConversations { conversations, reply } => {
                let count = conversations.len();
                cache.replace_conversations(conversations);
                let _ = event_tx.send(StateEvent::ConversationsReplaced { count });
                let _ = reply.send(Ok(()));
            }
            StateCommand::ReplaceMessages {
                conversation_id,
                messages,
                reply,
            } => {
                let count = messages.len();
                cache.replace_messages(&conversation_id, messages);
                let _ = event_tx.send(StateEvent::MessagesReplaced { conversation_id, count });
                let _ = reply.send(Ok(()));
            }
            StateCommand::ListConversations { reply } => {
                let _ = reply.send(Ok(cache.conversations()));
            }
            StateCommand::GetConversation { id, reply } => {
                let _ = reply.send(Ok(cache.conversation(&id).cloned()));
            }
            StateCommand::ListMessages { conversation_id, reply } => {
                let _ = reply.send(Ok(cache.messages(&conversation_id).to_vec()));
            }
            StateCommand::TypingUsers { conversation_id, reply } => {
                let _ = reply.send(Ok(cache.typing_users(&conversation_id)));
            }
            StateCommand::GetPresence { user_id, reply } => {
                let _ = reply.send(Ok(cache.presence(&user_id).cloned()));
            }
            StateCommand::Metrics { reply } => {
                let _ = reply.send(Ok(cache.metrics()));
            }
            StateCommand::Shutdown => {
                debug!("actor_loop: shutdown requested");
                break;
            }
        }
    }

    debug!("actor_loop: stopped");
}

/// Map a transport event onto cache mutations and change notifications
fn apply_event(cache: &mut ChatCache, event: ChatEvent, event_tx: &broadcast::Sender<StateEvent>) {
    match event {
        ChatEvent::MessageReceived { message, .. } => {
            if cache.insert_message(message.clone()) {
                let _ = event_tx.send(StateEvent::MessageReceived { message });
            }
        }
        ChatEvent::TypingStart {
            conversation_id,
            user_id,
            ..
        } => {
            cache.set_typing(&conversation_id, &user_id, true);
            let _ = event_tx.send(StateEvent::TypingChanged { conversation_id });
        }
        ChatEvent::TypingStop {
            conversation_id,
            user_id,
            ..
        } => {
            cache.set_typing(&conversation_id, &user_id, false);
            let _ = event_tx.send(StateEvent::TypingChanged { conversation_id });
        }
        ChatEvent::PresenceUpdate {
            user_id,
            status,
            last_seen_at,
        } => {
            cache.set_presence(PresenceUpdate {
                user_id: user_id.clone(),
                status,
                last_seen_at,
            });
            let _ = event_tx.send(StateEvent::PresenceChanged { user_id, status });
        }
        ChatEvent::ConversationUpdated {
            conversation_id,
            action,
            conversation,
        } => {
            match (action, conversation) {
                (ConversationAction::Deleted, _) => cache.remove_conversation(&conversation_id),
                (_, Some(conversation)) => cache.upsert_conversation(conversation),
                (_, None) => {
                    // Nothing to apply without a body; the next refetch reconciles
                    debug!(%conversation_id, ?action, "conversation_updated without body, skipped");
                }
            }
            let _ = event_tx.send(StateEvent::ConversationChanged { conversation_id });
        }
    }
}
