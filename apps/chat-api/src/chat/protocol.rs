//! Chat wire format: inbound frames and outbound envelopes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Longest chat message accepted, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// Discriminator value selecting the reaction variant.
const REACTION_TYPE: &str = "reaction";

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// A decoded client frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Post { message: String },
    Reaction { message_id: Uuid },
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("frame is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("frame is not a JSON object")]
    NotAnObject,
    #[error("post frame has no message")]
    MissingMessage,
    #[error("post frame message is empty")]
    EmptyMessage,
    #[error("post frame message exceeds {MAX_MESSAGE_CHARS} characters")]
    MessageTooLong,
    #[error("reaction frame has no messageId")]
    MissingMessageId,
    #[error("reaction frame messageId is not a UUID")]
    InvalidMessageId,
}

#[derive(Deserialize)]
struct PostFrame {
    #[serde(default)]
    message: Option<Value>,
}

#[derive(Deserialize)]
struct ReactionFrame {
    #[serde(rename = "messageId", default)]
    message_id: Option<Value>,
}

/// Decode one text or binary frame.
///
/// A missing `type`, or any value other than `"reaction"`, selects the post
/// variant. Fields other than the ones each variant needs are ignored.
pub fn decode(frame: &[u8]) -> Result<Inbound, DecodeError> {
    let value: Value = serde_json::from_slice(frame)?;
    if !value.is_object() {
        return Err(DecodeError::NotAnObject);
    }

    if value.get("type").and_then(Value::as_str) == Some(REACTION_TYPE) {
        let frame: ReactionFrame = serde_json::from_value(value)?;
        let raw = match frame.message_id {
            Some(Value::String(s)) => s,
            Some(_) => return Err(DecodeError::InvalidMessageId),
            None => return Err(DecodeError::MissingMessageId),
        };
        let message_id = Uuid::parse_str(&raw).map_err(|_| DecodeError::InvalidMessageId)?;
        return Ok(Inbound::Reaction { message_id });
    }

    let frame: PostFrame = serde_json::from_value(value)?;
    let message = match frame.message {
        Some(Value::String(s)) => s,
        _ => return Err(DecodeError::MissingMessage),
    };
    if message.trim().is_empty() {
        return Err(DecodeError::EmptyMessage);
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(DecodeError::MessageTooLong);
    }
    Ok(Inbound::Post { message })
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// A newly persisted chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatPosted {
    pub id: Uuid,
    pub username: String,
    pub message: String,
    pub timestamp: String,
    pub reactions: i64,
}

/// The new reaction total for a message, plus who just reacted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename = "reaction", rename_all = "camelCase")]
pub struct ReactionUpdated {
    pub message_id: Uuid,
    pub username: String,
    pub reactions: i64,
}

/// An envelope broadcast to every connected session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Outbound {
    ChatPosted(ChatPosted),
    ReactionUpdated(ReactionUpdated),
}

impl Outbound {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<ChatPosted> for Outbound {
    fn from(posted: ChatPosted) -> Self {
        Self::ChatPosted(posted)
    }
}

impl From<ReactionUpdated> for Outbound {
    fn from(updated: ReactionUpdated) -> Self {
        Self::ReactionUpdated(updated)
    }
}
