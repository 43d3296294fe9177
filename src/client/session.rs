use uuid::Uuid;

use crate::database::models::{ChatSummary, MessageSender};

use super::api::{ChatApi, ClientError};

/// Local-only bubble shown when a send fails; never persisted server-side,
/// so a reload of the chat drops it.
pub const SEND_FAILURE_NOTICE: &str = "Sorry, an error occurred. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoChatSelected,
    NewChatPending,
    ChatLoaded,
    MessageInFlight,
}

/// The chat the transcript belongs to. `New` is the sentinel for a
/// conversation that has not been created server-side yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveChat {
    New,
    Existing(Uuid),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub sender: MessageSender,
    pub text: String,
}

/// Destructive actions go through this seam; a UI shows a modal, the
/// terminal client prompts, tests stub it.
pub trait Confirm {
    fn confirm(&self, title: &str, message: &str) -> bool;
}

/// Client-side chat state machine.
///
/// Holds the chat list (most recent first), the active chat and its
/// transcript. All network access goes through the [`ChatApi`] seam.
pub struct ChatSession<A: ChatApi> {
    api: A,
    chats: Vec<ChatSummary>,
    active: Option<ActiveChat>,
    transcript: Vec<TranscriptEntry>,
    state: SessionState,
}

impl<A: ChatApi> ChatSession<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            chats: Vec::new(),
            active: None,
            transcript: Vec::new(),
            state: SessionState::NoChatSelected,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn chats(&self) -> &[ChatSummary] {
        &self.chats
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    pub fn active(&self) -> Option<ActiveChat> {
        self.active
    }

    /// Fetch the chat list and open the most recent chat, or fall into
    /// new-chat-pending when the account has none.
    pub async fn load(&mut self) -> Result<(), ClientError> {
        self.chats = self.api.list_chats().await?;
        match self.chats.first().map(|c| c.id) {
            Some(most_recent) => self.select_chat(ActiveChat::Existing(most_recent)).await?,
            None => self.start_new_chat(),
        }
        Ok(())
    }

    /// Switch to composing a fresh conversation; purely local.
    pub fn start_new_chat(&mut self) {
        self.active = Some(ActiveChat::New);
        self.transcript.clear();
        self.state = SessionState::NewChatPending;
    }

    /// Switch the active chat. Re-selecting the current one is a no-op
    /// with no network traffic.
    pub async fn select_chat(&mut self, target: ActiveChat) -> Result<(), ClientError> {
        if self.active == Some(target) {
            return Ok(());
        }

        match target {
            ActiveChat::New => self.start_new_chat(),
            ActiveChat::Existing(chat_id) => {
                self.active = Some(target);
                let chat = self.api.fetch_chat(chat_id).await?;
                self.transcript = chat
                    .messages
                    .into_iter()
                    .map(|m| TranscriptEntry {
                        sender: m.sender,
                        text: m.content,
                    })
                    .collect();
                self.state = SessionState::ChatLoaded;
            }
        }
        Ok(())
    }

    /// Send a message in the active chat.
    ///
    /// The user's line lands in the transcript before the round trip
    /// resolves. On the first send of a new conversation the chat is
    /// created first, titled with the message text, and its server id
    /// adopted. Failures surface as a local error bubble.
    pub async fn send(&mut self, text: &str) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }

        self.transcript.push(TranscriptEntry {
            sender: MessageSender::User,
            text: trimmed.to_string(),
        });
        self.state = SessionState::MessageInFlight;

        if let Err(err) = self.send_inner(trimmed).await {
            tracing::warn!(error = %err, "failed to send message");
            self.transcript.push(TranscriptEntry {
                sender: MessageSender::Bot,
                text: SEND_FAILURE_NOTICE.to_string(),
            });
        }

        self.state = match self.active {
            Some(ActiveChat::Existing(_)) => SessionState::ChatLoaded,
            _ => SessionState::NewChatPending,
        };
    }

    async fn send_inner(&mut self, text: &str) -> Result<(), ClientError> {
        let chat_id = match self.active {
            Some(ActiveChat::Existing(id)) => id,
            _ => {
                let created = self.api.create_chat(text).await?;
                let id = created.id;
                self.chats.insert(0, created);
                self.active = Some(ActiveChat::Existing(id));
                id
            }
        };

        let response = self.api.send_message(chat_id, text).await?;
        self.transcript.push(TranscriptEntry {
            sender: MessageSender::Bot,
            text: response.reply,
        });
        Ok(())
    }

    /// Delete a chat after confirmation. A failed server call is logged
    /// and leaves local state untouched. Deleting the active chat
    /// reselects the most recent remaining one, or falls back to
    /// new-chat-pending.
    pub async fn delete_chat(
        &mut self,
        chat_id: Uuid,
        confirm: &dyn Confirm,
    ) -> Result<bool, ClientError> {
        if !confirm.confirm(
            "Delete Chat?",
            "Are you sure you want to permanently delete this chat and all its messages?",
        ) {
            return Ok(false);
        }

        if let Err(err) = self.api.delete_chat(chat_id).await {
            tracing::warn!(error = %err, "failed to delete chat");
            return Ok(false);
        }

        self.chats.retain(|c| c.id != chat_id);
        if self.active == Some(ActiveChat::Existing(chat_id)) {
            match self.chats.first().map(|c| c.id) {
                Some(next) => self.select_chat(ActiveChat::Existing(next)).await?,
                None => self.start_new_chat(),
            }
        }
        Ok(true)
    }

    /// Log out after confirmation. The server call is best-effort; local
    /// state is always cleared once confirmed.
    pub async fn logout(&mut self, confirm: &dyn Confirm) -> bool {
        if !confirm.confirm("Confirm Logout", "Are you sure you want to log out?") {
            return false;
        }

        if let Err(err) = self.api.logout().await {
            tracing::warn!(error = %err, "server logout failed, clearing local session anyway");
        }

        self.chats.clear();
        self.transcript.clear();
        self.active = None;
        self.state = SessionState::NoChatSelected;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::chat::{ChatWithMessages, SendMessageResponse};
    use crate::database::models::Message;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use reqwest::StatusCode;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    struct Always(bool);

    impl Confirm for Always {
        fn confirm(&self, _title: &str, _message: &str) -> bool {
            self.0
        }
    }

    #[derive(Default)]
    struct MockState {
        chats: Vec<ChatSummary>,
        messages: HashMap<Uuid, Vec<Message>>,
        reply: String,
        fail_send: bool,
        fail_logout: bool,
        list_calls: usize,
        fetch_calls: usize,
        create_calls: usize,
        send_calls: usize,
        delete_calls: usize,
        logout_calls: usize,
    }

    #[derive(Clone)]
    struct MockApi {
        state: Arc<Mutex<MockState>>,
    }

    impl MockApi {
        fn new(chats: Vec<ChatSummary>) -> Self {
            let mut state = MockState {
                reply: "mock reply".to_string(),
                ..MockState::default()
            };
            for chat in &chats {
                state.messages.insert(chat.id, Vec::new());
            }
            state.chats = chats;
            Self {
                state: Arc::new(Mutex::new(state)),
            }
        }
    }

    /// `age_minutes` pushes the chat into the past; 0 is the most recent.
    fn summary(title: &str, age_minutes: i64) -> ChatSummary {
        let at = Utc::now() - Duration::minutes(age_minutes);
        ChatSummary {
            id: Uuid::new_v4(),
            title: title.to_string(),
            created_at: at,
            updated_at: at,
        }
    }

    fn message(chat_id: Uuid, sender: MessageSender, text: &str) -> Message {
        Message {
            id: Uuid::new_v4(),
            chat_id,
            sender,
            content: text.to_string(),
            created_at: Utc::now(),
        }
    }

    fn server_error() -> ClientError {
        ClientError::Api {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Error communicating with the completion service".to_string(),
        }
    }

    #[async_trait]
    impl ChatApi for MockApi {
        async fn list_chats(&self) -> Result<Vec<ChatSummary>, ClientError> {
            let mut s = self.state.lock().unwrap();
            s.list_calls += 1;
            Ok(s.chats.clone())
        }

        async fn create_chat(&self, title: &str) -> Result<ChatSummary, ClientError> {
            let mut s = self.state.lock().unwrap();
            s.create_calls += 1;
            let created = summary(title, 0);
            s.messages.insert(created.id, Vec::new());
            s.chats.insert(0, created.clone());
            Ok(created)
        }

        async fn fetch_chat(&self, chat_id: Uuid) -> Result<ChatWithMessages, ClientError> {
            let mut s = self.state.lock().unwrap();
            s.fetch_calls += 1;
            let chat = s
                .chats
                .iter()
                .find(|c| c.id == chat_id)
                .cloned()
                .ok_or_else(|| ClientError::Api {
                    status: StatusCode::NOT_FOUND,
                    message: "Chat not found".to_string(),
                })?;
            Ok(ChatWithMessages {
                id: chat.id,
                title: chat.title,
                created_at: chat.created_at,
                updated_at: chat.updated_at,
                messages: s.messages.get(&chat_id).cloned().unwrap_or_default(),
            })
        }

        async fn send_message(
            &self,
            chat_id: Uuid,
            text: &str,
        ) -> Result<SendMessageResponse, ClientError> {
            let mut s = self.state.lock().unwrap();
            s.send_calls += 1;
            if s.fail_send {
                return Err(server_error());
            }
            let reply = s.reply.clone();
            let entry = s.messages.entry(chat_id).or_default();
            entry.push(message(chat_id, MessageSender::User, text));
            entry.push(message(chat_id, MessageSender::Bot, &reply));
            Ok(SendMessageResponse { reply, chat_id })
        }

        async fn delete_chat(&self, chat_id: Uuid) -> Result<(), ClientError> {
            let mut s = self.state.lock().unwrap();
            s.delete_calls += 1;
            s.chats.retain(|c| c.id != chat_id);
            s.messages.remove(&chat_id);
            Ok(())
        }

        async fn logout(&self) -> Result<(), ClientError> {
            let mut s = self.state.lock().unwrap();
            s.logout_calls += 1;
            if s.fail_logout {
                return Err(server_error());
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn empty_account_loads_into_new_chat_pending() {
        let api = MockApi::new(vec![]);
        let mut session = ChatSession::new(api.clone());

        session.load().await.unwrap();

        assert_eq!(session.state(), SessionState::NewChatPending);
        assert_eq!(session.active(), Some(ActiveChat::New));
        assert!(session.transcript().is_empty());
    }

    #[tokio::test]
    async fn first_send_creates_a_chat_titled_with_the_message() {
        let api = MockApi::new(vec![]);
        let mut session = ChatSession::new(api.clone());
        session.load().await.unwrap();

        session.send("hello").await;

        {
            let s = api.state.lock().unwrap();
            assert_eq!(s.create_calls, 1);
            assert_eq!(s.chats.len(), 1);
            assert_eq!(s.chats[0].title, "hello");
            // exactly one chat holding exactly two messages server-side
            assert_eq!(s.messages[&s.chats[0].id].len(), 2);
        }

        assert_eq!(session.chats().len(), 1);
        assert_eq!(session.state(), SessionState::ChatLoaded);
        assert_eq!(
            session.transcript(),
            &[
                TranscriptEntry {
                    sender: MessageSender::User,
                    text: "hello".to_string(),
                },
                TranscriptEntry {
                    sender: MessageSender::Bot,
                    text: "mock reply".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn reselecting_the_active_chat_makes_no_network_call() {
        let api = MockApi::new(vec![summary("latest", 0), summary("older", 10)]);
        let mut session = ChatSession::new(api.clone());
        session.load().await.unwrap();

        let active_id = session.chats()[0].id;
        assert_eq!(session.active(), Some(ActiveChat::Existing(active_id)));
        assert_eq!(api.state.lock().unwrap().fetch_calls, 1);

        session
            .select_chat(ActiveChat::Existing(active_id))
            .await
            .unwrap();

        assert_eq!(api.state.lock().unwrap().fetch_calls, 1);
        assert_eq!(api.state.lock().unwrap().list_calls, 1);
    }

    #[tokio::test]
    async fn selecting_the_new_sentinel_clears_locally_without_network() {
        let api = MockApi::new(vec![summary("latest", 0)]);
        let mut session = ChatSession::new(api.clone());
        session.load().await.unwrap();

        let fetches_after_load = api.state.lock().unwrap().fetch_calls;
        session.select_chat(ActiveChat::New).await.unwrap();

        assert_eq!(session.state(), SessionState::NewChatPending);
        assert!(session.transcript().is_empty());
        assert_eq!(api.state.lock().unwrap().fetch_calls, fetches_after_load);
    }

    #[tokio::test]
    async fn deleting_the_active_most_recent_chat_reselects_the_next() {
        let api = MockApi::new(vec![
            summary("newest", 0),
            summary("middle", 10),
            summary("oldest", 20),
        ]);
        let mut session = ChatSession::new(api.clone());
        session.load().await.unwrap();

        let newest = session.chats()[0].id;
        let middle = session.chats()[1].id;
        let deleted = session.delete_chat(newest, &Always(true)).await.unwrap();

        assert!(deleted);
        assert_eq!(session.chats().len(), 2);
        assert_eq!(session.active(), Some(ActiveChat::Existing(middle)));
        assert_eq!(session.state(), SessionState::ChatLoaded);
    }

    #[tokio::test]
    async fn deleting_the_last_chat_falls_back_to_new_chat_pending() {
        let api = MockApi::new(vec![summary("only", 0)]);
        let mut session = ChatSession::new(api.clone());
        session.load().await.unwrap();

        let only = session.chats()[0].id;
        session.delete_chat(only, &Always(true)).await.unwrap();

        assert!(session.chats().is_empty());
        assert_eq!(session.state(), SessionState::NewChatPending);
    }

    #[tokio::test]
    async fn declined_confirmation_leaves_everything_alone() {
        let api = MockApi::new(vec![summary("latest", 0)]);
        let mut session = ChatSession::new(api.clone());
        session.load().await.unwrap();

        let id = session.chats()[0].id;
        let deleted = session.delete_chat(id, &Always(false)).await.unwrap();

        assert!(!deleted);
        assert_eq!(session.chats().len(), 1);
        assert_eq!(api.state.lock().unwrap().delete_calls, 0);
    }

    #[tokio::test]
    async fn failed_send_appends_a_local_error_bubble_only() {
        let api = MockApi::new(vec![summary("latest", 0)]);
        api.state.lock().unwrap().fail_send = true;
        let mut session = ChatSession::new(api.clone());
        session.load().await.unwrap();

        session.send("hi").await;

        assert_eq!(
            session.transcript(),
            &[
                TranscriptEntry {
                    sender: MessageSender::User,
                    text: "hi".to_string(),
                },
                TranscriptEntry {
                    sender: MessageSender::Bot,
                    text: SEND_FAILURE_NOTICE.to_string(),
                },
            ]
        );

        // nothing was persisted server-side
        let s = api.state.lock().unwrap();
        assert_eq!(s.send_calls, 1);
        assert!(s.messages[&session.chats()[0].id].is_empty());
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let api = MockApi::new(vec![summary("latest", 0)]);
        let mut session = ChatSession::new(api.clone());
        session.load().await.unwrap();

        session.send("   \t ").await;

        assert!(session.transcript().is_empty());
        assert_eq!(api.state.lock().unwrap().send_calls, 0);
    }

    #[tokio::test]
    async fn logout_clears_local_state_even_when_the_server_call_fails() {
        let api = MockApi::new(vec![summary("latest", 0)]);
        api.state.lock().unwrap().fail_logout = true;
        let mut session = ChatSession::new(api.clone());
        session.load().await.unwrap();

        assert!(session.logout(&Always(true)).await);

        assert!(session.chats().is_empty());
        assert!(session.transcript().is_empty());
        assert_eq!(session.state(), SessionState::NoChatSelected);
        assert_eq!(api.state.lock().unwrap().logout_calls, 1);
    }

    #[tokio::test]
    async fn declined_logout_changes_nothing() {
        let api = MockApi::new(vec![summary("latest", 0)]);
        let mut session = ChatSession::new(api.clone());
        session.load().await.unwrap();

        assert!(!session.logout(&Always(false)).await);

        assert_eq!(session.chats().len(), 1);
        assert_eq!(session.state(), SessionState::ChatLoaded);
        assert_eq!(api.state.lock().unwrap().logout_calls, 0);
    }
}
