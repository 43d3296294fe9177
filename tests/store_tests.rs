//! Integration tests for the chat store and the message relay.
//! These run against a live PostgreSQL database: set
//! CHATFREE_TEST_DATABASE_URL to enable them, they skip otherwise.

use std::sync::atomic::{AtomicUsize, Ordering};

use uuid::Uuid;

use chatfree::ai::provider::{CompletionProvider, CompletionResponse, ProviderError};
use chatfree::api::chat::{relay_message, FALLBACK_REPLY};
use chatfree::api::errors::ErrorCode;
use chatfree::database::models::{MessageSender, User};
use chatfree::database::queries::{chats, users};

async fn setup() -> Option<()> {
    let url = std::env::var("CHATFREE_TEST_DATABASE_URL").ok()?;
    chatfree::database::initialize_with_url(&url)
        .await
        .expect("failed to initialize test database");
    Some(())
}

async fn fresh_user() -> User {
    let suffix = Uuid::new_v4().simple().to_string();
    users::create_user(
        &format!("user-{suffix}"),
        &format!("{suffix}@example.com"),
        "not-a-real-hash",
    )
    .await
    .expect("failed to create test user")
}

struct ScriptedProvider {
    calls: AtomicUsize,
    reply: Option<&'static str>,
    fail: bool,
}

impl ScriptedProvider {
    fn replying(reply: &'static str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            reply: Some(reply),
            fail: false,
        }
    }

    fn empty() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            reply: None,
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            reply: None,
            fail: true,
        }
    }
}

#[async_trait::async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, _prompt: &str) -> Result<CompletionResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err("scripted upstream failure".into());
        }
        Ok(CompletionResponse {
            text: self.reply.map(str::to_string),
        })
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

#[tokio::test]
async fn messages_come_back_in_append_order() {
    if setup().await.is_none() {
        eprintln!("Skipping test: CHATFREE_TEST_DATABASE_URL not set");
        return;
    }

    let user = fresh_user().await;
    let chat = chats::create_chat(user.id, "ordering").await.unwrap();

    for i in 0..5 {
        let sender = if i % 2 == 0 {
            MessageSender::User
        } else {
            MessageSender::Bot
        };
        chats::append_message(chat.id, user.id, sender, &format!("msg-{i}"))
            .await
            .unwrap()
            .expect("chat should exist");
    }

    let messages = chats::get_chat_messages(chat.id, user.id).await.unwrap();
    assert_eq!(messages.len(), 5);
    for (i, message) in messages.iter().enumerate() {
        assert_eq!(message.content, format!("msg-{i}"));
    }
    assert_eq!(messages[0].sender, MessageSender::User);
    assert_eq!(messages[1].sender, MessageSender::Bot);
}

#[tokio::test]
async fn create_chat_returns_the_persisted_row() {
    if setup().await.is_none() {
        eprintln!("Skipping test: CHATFREE_TEST_DATABASE_URL not set");
        return;
    }

    let user = fresh_user().await;
    let created = chats::create_chat(user.id, "what is rust").await.unwrap();

    let reread = chats::get_chat(created.id, user.id)
        .await
        .unwrap()
        .expect("created chat should be readable");
    assert_eq!(reread.id, created.id);
    assert_eq!(reread.title, "what is rust");
    assert_eq!(reread.user_id, user.id);
}

#[tokio::test]
async fn deleting_a_missing_chat_reports_not_found_and_leaves_others() {
    if setup().await.is_none() {
        eprintln!("Skipping test: CHATFREE_TEST_DATABASE_URL not set");
        return;
    }

    let user = fresh_user().await;
    chats::create_chat(user.id, "first").await.unwrap();
    chats::create_chat(user.id, "second").await.unwrap();

    let deleted = chats::delete_chat(Uuid::new_v4(), user.id).await.unwrap();
    assert!(!deleted);

    let remaining = chats::list_chats(user.id)
        .await
        .unwrap()
        .expect("user should exist");
    assert_eq!(remaining.len(), 2);
}

#[tokio::test]
async fn chats_are_invisible_across_users() {
    if setup().await.is_none() {
        eprintln!("Skipping test: CHATFREE_TEST_DATABASE_URL not set");
        return;
    }

    let owner = fresh_user().await;
    let stranger = fresh_user().await;
    let chat = chats::create_chat(owner.id, "private").await.unwrap();

    assert!(chats::get_chat(chat.id, stranger.id).await.unwrap().is_none());
    assert!(!chats::delete_chat(chat.id, stranger.id).await.unwrap());
    assert!(chats::get_chat(chat.id, owner.id).await.unwrap().is_some());
}

#[tokio::test]
async fn successful_relay_appends_exactly_two_messages() {
    if setup().await.is_none() {
        eprintln!("Skipping test: CHATFREE_TEST_DATABASE_URL not set");
        return;
    }

    let user = fresh_user().await;
    let chat = chats::create_chat(user.id, "hello").await.unwrap();
    let provider = ScriptedProvider::replying("scripted reply");

    let response = relay_message(&provider, user.id, chat.id, "hello")
        .await
        .unwrap();
    assert_eq!(response.reply, "scripted reply");
    assert_eq!(response.chat_id, chat.id);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

    let messages = chats::get_chat_messages(chat.id, user.id).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].sender, MessageSender::User);
    assert_eq!(messages[0].content, "hello");
    assert_eq!(messages[1].sender, MessageSender::Bot);
    assert_eq!(messages[1].content, "scripted reply");
}

#[tokio::test]
async fn failed_relay_keeps_the_user_message() {
    if setup().await.is_none() {
        eprintln!("Skipping test: CHATFREE_TEST_DATABASE_URL not set");
        return;
    }

    let user = fresh_user().await;
    let chat = chats::create_chat(user.id, "doomed").await.unwrap();
    let provider = ScriptedProvider::failing();

    let err = relay_message(&provider, user.id, chat.id, "still here?")
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::UpstreamServiceError);

    // no rollback: the user's message survives the upstream failure
    let messages = chats::get_chat_messages(chat.id, user.id).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].sender, MessageSender::User);
    assert_eq!(messages[0].content, "still here?");
}

#[tokio::test]
async fn replyless_response_falls_back_to_the_fixed_string() {
    if setup().await.is_none() {
        eprintln!("Skipping test: CHATFREE_TEST_DATABASE_URL not set");
        return;
    }

    let user = fresh_user().await;
    let chat = chats::create_chat(user.id, "fallback").await.unwrap();
    let provider = ScriptedProvider::empty();

    let response = relay_message(&provider, user.id, chat.id, "anyone there?")
        .await
        .unwrap();
    assert_eq!(response.reply, FALLBACK_REPLY);

    let messages = chats::get_chat_messages(chat.id, user.id).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content, FALLBACK_REPLY);
}

#[tokio::test]
async fn relay_for_an_unknown_user_is_not_found() {
    if setup().await.is_none() {
        eprintln!("Skipping test: CHATFREE_TEST_DATABASE_URL not set");
        return;
    }

    let provider = ScriptedProvider::replying("unused");
    let err = relay_message(&provider, Uuid::new_v4(), Uuid::new_v4(), "hello")
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::ResourceUserNotFound);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}
