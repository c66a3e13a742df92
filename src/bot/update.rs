//! Inbound update decoding.
//!
//! The webhook body is decoded once at the boundary into the [`Inbound`]
//! tagged union; handlers never branch on raw key presence. When more than
//! one event object is present, the fixed priority order is join request,
//! then message, then button press.

use serde::Deserialize;

/// Raw webhook payload. Unknown shapes decode to an empty update and are
/// acknowledged as no-ops.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawUpdate {
    #[serde(default)]
    pub chat_join_request: Option<RawJoinRequest>,
    #[serde(default)]
    pub message: Option<RawMessage>,
    #[serde(default)]
    pub callback_query: Option<RawCallback>,
}

/// Join-request body: `{from:{id}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawJoinRequest {
    pub from: RawUser,
}

/// Chat message body: `{chat:{id}, from:{id, first_name}, text}`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMessage {
    pub chat: RawChat,
    #[serde(default)]
    pub from: Option<RawUser>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub reply_to_message: Option<RawReply>,
}

/// Button-press body: `{from:{id}, id, data}`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCallback {
    pub id: String,
    pub from: RawUser,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawChat {
    pub id: i64,
}

/// Replied-to message; kept only for reply-based admin broadcast.
#[derive(Debug, Clone, Deserialize)]
pub struct RawReply {
    pub message_id: i32,
}

/// One decoded inbound event.
#[derive(Debug, Clone)]
pub enum Inbound {
    /// A user asked to join the gated channel or group.
    JoinRequest { user_id: i64 },
    /// A direct chat message.
    Message(MessageEvent),
    /// An inline keyboard press.
    ButtonPress(PressEvent),
}

/// Fields of a chat message the gate acts on.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub chat_id: i64,
    pub user_id: Option<i64>,
    pub first_name: Option<String>,
    pub text: Option<String>,
    pub reply_message_id: Option<i32>,
}

/// Fields of a button press the gate acts on.
#[derive(Debug, Clone)]
pub struct PressEvent {
    pub callback_id: String,
    pub user_id: i64,
    pub data: Option<String>,
}

impl RawUpdate {
    /// Decode into the tagged union, or `None` for shapes the gate ignores.
    #[must_use]
    pub fn classify(self) -> Option<Inbound> {
        if let Some(join) = self.chat_join_request {
            return Some(Inbound::JoinRequest { user_id: join.from.id });
        }
        if let Some(message) = self.message {
            return Some(Inbound::Message(MessageEvent {
                chat_id: message.chat.id,
                user_id: message.from.as_ref().map(|user| user.id),
                first_name: message.from.and_then(|user| user.first_name),
                text: message.text,
                reply_message_id: message.reply_to_message.map(|reply| reply.message_id),
            }));
        }
        if let Some(callback) = self.callback_query {
            return Some(Inbound::ButtonPress(PressEvent {
                callback_id: callback.id,
                user_id: callback.from.id,
                data: callback.data,
            }));
        }
        None
    }
}

/// Payload of the ACCESS button.
pub const ACCESS_DATA: &str = "access";

/// Decoded callback button payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    /// The ACCESS gate button.
    Access,
    /// A language selection button.
    SetLanguage(String),
    /// A poll option button, tagged with its poll and option index.
    Vote { poll_id: u64, option: usize },
}

impl CallbackAction {
    /// Parse button data. Unknown payloads yield `None` and are answered as
    /// no-ops.
    #[must_use]
    pub fn parse(data: &str) -> Option<Self> {
        if data == ACCESS_DATA {
            return Some(Self::Access);
        }
        if let Some(code) = data.strip_prefix("lang:") {
            return Some(Self::SetLanguage(code.to_string()));
        }
        if let Some(rest) = data.strip_prefix("vote:") {
            let (poll, option) = rest.split_once(':')?;
            return Some(Self::Vote {
                poll_id: poll.parse().ok()?,
                option: option.parse().ok()?,
            });
        }
        None
    }

    /// Button payload for voting on `option` of `poll_id`.
    #[must_use]
    pub fn vote_data(poll_id: u64, option: usize) -> String {
        format!("vote:{poll_id}:{option}")
    }

    /// Button payload selecting language `code`.
    #[must_use]
    pub fn lang_data(code: &str) -> String {
        format!("lang:{code}")
    }
}
