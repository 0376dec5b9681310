//! Chat core: session registry, event router and broadcast dispatcher.

pub mod dispatch;
pub mod hub;
pub mod registry;
pub mod router;

pub use dispatch::{BroadcastDispatcher, DeliveryError, DispatchReport, Transport};
pub use hub::ChatHub;
pub use registry::{NicknameError, RegisterOutcome, SessionRegistry};
pub use router::{Audience, Emission, EventRouter, MessageError};

use parley_settings::ChatSettings;

/// Nickname and message rules applied by the chat core.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatPolicy {
    /// Refuse a nickname held by another connection.
    pub unique_nicknames: bool,
    /// Longest nickname in characters.
    pub max_nickname_len: usize,
    /// Longest message in characters.
    pub max_message_len: usize,
}

impl Default for ChatPolicy {
    fn default() -> Self {
        Self::from(&ChatSettings::default())
    }
}

impl From<&ChatSettings> for ChatPolicy {
    fn from(settings: &ChatSettings) -> Self {
        Self {
            unique_nicknames: settings.unique_nicknames,
            max_nickname_len: settings.max_nickname_len,
            max_message_len: settings.max_message_len,
        }
    }
}
