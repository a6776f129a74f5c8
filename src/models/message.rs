use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reserved sender id for automated assistant replies.
pub const ASSISTANT_SENDER: Uuid = Uuid::max();

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingLink {
    pub title: String,
    pub uri: String,
}

/// A single chat message. `thread_id` is the id of the customer or guest
/// identity that originated the conversation; every message with the same
/// `thread_id` belongs to one thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub text: String,
    pub is_admin: bool,
    /// Server-side stamp. `None` means the write has not been resolved yet;
    /// such messages sort as time zero.
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<GroundingLink>,
}

/// A conversation head derived from the message set; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Thread {
    pub id: Uuid,
    pub name: String,
    pub last_text: String,
    pub last_at: Option<DateTime<Utc>>,
}
