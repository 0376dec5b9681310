//! Wire protocol: JSON text frames exchanged over the WebSocket.
//!
//! Every frame is an envelope `{"event": <name>, "data": <payload>}`. The
//! `data` key is absent for events without a payload. Event and field names
//! are fixed by the browser client and must not change.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// A frame that could not be turned into an [`InboundEvent`].
#[derive(Debug, Error)]
pub enum FrameError {
    /// The frame was not valid JSON or did not match any known event shape.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Payload of a `send_message` frame.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessagePayload {
    /// Message text. A missing or `null` field decodes as empty text.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub message: String,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Events arriving from a client (or synthesized by the transport).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum InboundEvent {
    /// A connection was opened.
    Connect,
    /// The client proposes a nickname for itself.
    SetNickname(String),
    /// The client sends a chat message.
    SendMessage(SendMessagePayload),
    /// The connection is going away.
    Disconnect,
}

impl InboundEvent {
    /// Decode a text frame.
    pub fn decode(text: &str) -> Result<Self, FrameError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::SetNickname(_) => "set_nickname",
            Self::SendMessage(_) => "send_message",
            Self::Disconnect => "disconnect",
        }
    }
}

/// Events sent from the server to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Ask a freshly connected client to identify itself.
    RequestNickname,
    /// Someone else registered a nickname.
    #[serde(rename = "user_join")]
    UserJoined {
        /// The nickname that joined.
        nickname: String,
    },
    /// Current roster of registered nicknames.
    #[serde(rename = "user_list")]
    RosterUpdate {
        /// Nicknames in registration order.
        users: Vec<String>,
    },
    /// The recipient's own nickname registration succeeded.
    NicknameAccepted {
        /// The accepted nickname.
        nickname: String,
    },
    /// A registered participant disconnected.
    #[serde(rename = "user_leave")]
    UserLeft {
        /// The nickname that left.
        nickname: String,
    },
    /// A chat message, echoed to every participant including its author.
    NewMessage {
        /// Author's nickname.
        nickname: String,
        /// Message text.
        message: String,
    },
    /// A request from the recipient was refused.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

impl ServerEvent {
    /// Build an `error` event.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Serialize to the JSON text sent on the wire.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RequestNickname => "request_nickname",
            Self::UserJoined { .. } => "user_join",
            Self::RosterUpdate { .. } => "user_list",
            Self::NicknameAccepted { .. } => "nickname_accepted",
            Self::UserLeft { .. } => "user_leave",
            Self::NewMessage { .. } => "new_message",
            Self::Error { .. } => "error",
        }
    }
}
