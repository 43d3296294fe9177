use sqlx::FromRow;
use uuid::Uuid;

use crate::database::get_database_pool;
use crate::database::models::{Chat, ChatSummary, Message, MessageSender};

/// List a user's chats, most recently touched first.
///
/// Returns `None` when the user row itself is gone, so callers can
/// distinguish "no such user" from "user with no chats".
pub async fn list_chats(user_id: Uuid) -> Result<Option<Vec<ChatSummary>>, sqlx::Error> {
    let pool = get_database_pool()?;

    let user = sqlx::query("SELECT 1 FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&*pool)
        .await?;
    if user.is_none() {
        return Ok(None);
    }

    let chats = sqlx::query_as::<_, ChatSummary>(
        "SELECT id, title, created_at, updated_at FROM chats \
         WHERE user_id = $1 ORDER BY updated_at DESC",
    )
    .bind(user_id)
    .fetch_all(&*pool)
    .await?;

    Ok(Some(chats))
}

/// Create an empty chat and return the persisted row.
pub async fn create_chat(user_id: Uuid, title: &str) -> Result<Chat, sqlx::Error> {
    let pool = get_database_pool()?;
    sqlx::query_as::<_, Chat>(
        "INSERT INTO chats (user_id, title) VALUES ($1, $2) \
         RETURNING id, user_id, title, created_at, updated_at",
    )
    .bind(user_id)
    .bind(title)
    .fetch_one(&*pool)
    .await
}

pub async fn get_chat(chat_id: Uuid, user_id: Uuid) -> Result<Option<Chat>, sqlx::Error> {
    let pool = get_database_pool()?;
    sqlx::query_as::<_, Chat>("SELECT * FROM chats WHERE id = $1 AND user_id = $2")
        .bind(chat_id)
        .bind(user_id)
        .fetch_optional(&*pool)
        .await
}

/// Messages of one chat in append order.
pub async fn get_chat_messages(chat_id: Uuid, user_id: Uuid) -> Result<Vec<Message>, sqlx::Error> {
    let pool = get_database_pool()?;
    sqlx::query_as::<_, Message>(
        "SELECT m.id, m.chat_id, m.sender, m.content, m.created_at \
         FROM messages m JOIN chats c ON c.id = m.chat_id \
         WHERE m.chat_id = $1 AND c.user_id = $2 \
         ORDER BY m.seq",
    )
    .bind(chat_id)
    .bind(user_id)
    .fetch_all(&*pool)
    .await
}

/// Append one message to a chat the user owns.
///
/// Returns `None` when the chat does not exist for that user; the insert
/// and the recency touch on the chat commit together.
pub async fn append_message(
    chat_id: Uuid,
    user_id: Uuid,
    sender: MessageSender,
    content: &str,
) -> Result<Option<Message>, sqlx::Error> {
    let pool = get_database_pool()?;
    let mut tx = pool.begin().await?;

    let row = sqlx::query(
        "INSERT INTO messages (chat_id, sender, content) \
         SELECT c.id, $3, $4 FROM chats c WHERE c.id = $1 AND c.user_id = $2 \
         RETURNING id, chat_id, sender, content, created_at",
    )
    .bind(chat_id)
    .bind(user_id)
    .bind(sender.as_str())
    .bind(content)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let message = Message::from_row(&row)?;

    sqlx::query("UPDATE chats SET updated_at = now() WHERE id = $1")
        .bind(chat_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(Some(message))
}

/// Delete a chat by id, scoped to its owner.
///
/// `false` means nothing was deleted: the chat id does not exist under
/// that user (a missing user folds into the same outcome).
pub async fn delete_chat(chat_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let pool = get_database_pool()?;
    let result = sqlx::query("DELETE FROM chats WHERE id = $1 AND user_id = $2")
        .bind(chat_id)
        .bind(user_id)
        .execute(&*pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
