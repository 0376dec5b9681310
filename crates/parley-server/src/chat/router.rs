//! Event router: turns one inbound event into registry mutations and an
//! ordered list of outbound emissions.
//!
//! The router holds no state of its own. Within one event the registry is
//! mutated first, and every roster carried by the resulting emissions is
//! snapshotted afterwards, one snapshot per emission.

use std::sync::Arc;

use parley_core::{ConnId, InboundEvent, ServerEvent};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::registry::{NicknameError, RegisterOutcome, SessionRegistry};

/// Who receives an emission, relative to the connection that caused it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Audience {
    /// Only the originating connection.
    SenderOnly,
    /// Every open connection except the originator.
    AllExceptSender,
    /// Every open connection, originator included.
    All,
}

/// One outbound event addressed to an audience.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Emission {
    /// Recipients, resolved at dispatch time.
    pub audience: Audience,
    /// The event to deliver.
    pub event: ServerEvent,
}

impl Emission {
    fn new(audience: Audience, event: ServerEvent) -> Self {
        Self { audience, event }
    }
}

/// Why a chat message was refused.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MessageError {
    /// The sender has no session yet.
    #[error("must register before sending")]
    UnregisteredSender,
    /// The message exceeds the configured limit.
    #[error("message must be at most {max} characters")]
    TooLong {
        /// Limit in characters.
        max: usize,
    },
}

/// Stateless policy layer over a [`SessionRegistry`].
pub struct EventRouter {
    registry: Arc<SessionRegistry>,
    max_message_len: usize,
}

impl EventRouter {
    /// Create a router over `registry`.
    pub fn new(registry: Arc<SessionRegistry>, max_message_len: usize) -> Self {
        Self {
            registry,
            max_message_len,
        }
    }

    /// Handle `event` from `conn`, returning emissions in delivery order.
    pub fn route(&self, conn: &ConnId, event: InboundEvent) -> Vec<Emission> {
        match event {
            InboundEvent::Connect => {
                vec![Emission::new(Audience::SenderOnly, ServerEvent::RequestNickname)]
            }
            InboundEvent::SetNickname(proposed) => self.set_nickname(conn, &proposed),
            InboundEvent::SendMessage(payload) => self.send_message(conn, payload.message),
            InboundEvent::Disconnect => self.disconnect(conn),
        }
    }

    fn roster(&self) -> ServerEvent {
        ServerEvent::RosterUpdate {
            users: self.registry.snapshot(),
        }
    }

    fn set_nickname(&self, conn: &ConnId, proposed: &str) -> Vec<Emission> {
        match self.registry.register(conn, proposed) {
            Ok(RegisterOutcome::Registered(nickname)) => {
                info!(conn_id = %conn, nickname, "user joined");
                vec![
                    Emission::new(
                        Audience::AllExceptSender,
                        ServerEvent::UserJoined {
                            nickname: nickname.clone(),
                        },
                    ),
                    Emission::new(Audience::SenderOnly, self.roster()),
                    Emission::new(Audience::SenderOnly, ServerEvent::NicknameAccepted { nickname }),
                    Emission::new(Audience::AllExceptSender, self.roster()),
                ]
            }
            Ok(RegisterOutcome::AlreadyRegistered(nickname)) => {
                debug!(conn_id = %conn, nickname, "nickname re-acknowledged");
                vec![
                    Emission::new(Audience::SenderOnly, ServerEvent::NicknameAccepted { nickname }),
                    Emission::new(Audience::SenderOnly, self.roster()),
                ]
            }
            Err(err) => {
                match &err {
                    NicknameError::Empty => debug!(conn_id = %conn, "empty nickname refused"),
                    _ => warn!(conn_id = %conn, proposed, error = %err, "nickname refused"),
                }
                vec![Emission::new(
                    Audience::SenderOnly,
                    ServerEvent::error(err.to_string()),
                )]
            }
        }
    }

    fn send_message(&self, conn: &ConnId, message: String) -> Vec<Emission> {
        let Some(nickname) = self.registry.lookup(conn) else {
            warn!(conn_id = %conn, "message from unregistered connection");
            return vec![Emission::new(
                Audience::SenderOnly,
                ServerEvent::error(MessageError::UnregisteredSender.to_string()),
            )];
        };
        if message.is_empty() {
            debug!(conn_id = %conn, nickname, "empty message dropped");
            return Vec::new();
        }
        if message.chars().count() > self.max_message_len {
            let err = MessageError::TooLong {
                max: self.max_message_len,
            };
            debug!(conn_id = %conn, nickname, error = %err, "message refused");
            return vec![Emission::new(
                Audience::SenderOnly,
                ServerEvent::error(err.to_string()),
            )];
        }

        debug!(conn_id = %conn, nickname, len = message.len(), "message accepted");
        vec![Emission::new(
            Audience::All,
            ServerEvent::NewMessage { nickname, message },
        )]
    }

    fn disconnect(&self, conn: &ConnId) -> Vec<Emission> {
        let Some(nickname) = self.registry.unregister(conn) else {
            debug!(conn_id = %conn, "unregistered connection closed");
            return Vec::new();
        };
        info!(conn_id = %conn, nickname, "user left");
        vec![
            Emission::new(Audience::All, ServerEvent::UserLeft { nickname }),
            Emission::new(Audience::All, self.roster()),
        ]
    }
}
