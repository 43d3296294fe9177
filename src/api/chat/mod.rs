//! Chat endpoints: listing/creation/retrieval/deletion plus the message
//! relay that bridges a stored chat and the completion service.

mod handlers;
mod relay;
mod types;

pub use handlers::{create_chat, delete_chat, get_chat, list_chats};
pub use relay::{relay_message, send_message, FALLBACK_REPLY};
pub use types::{
    ChatWithMessages, CreateChatRequest, MessageResponse, SendMessageRequest, SendMessageResponse,
};
