//! Session registry: the authoritative map from connection to nickname.
//!
//! All four operations take the same lock, so each is atomic and they are
//! totally ordered with respect to each other. A roster snapshot taken after
//! a `register`/`unregister` returns always reflects that mutation.

use std::collections::HashMap;

use parking_lot::Mutex;
use parley_core::ConnId;
use thiserror::Error;
use tracing::debug;

/// Successful outcome of [`SessionRegistry::register`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// A new session was created with this nickname.
    Registered(String),
    /// The connection already held exactly this nickname; nothing changed.
    AlreadyRegistered(String),
}

impl RegisterOutcome {
    /// The nickname the connection now holds.
    pub fn nickname(&self) -> &str {
        match self {
            Self::Registered(n) | Self::AlreadyRegistered(n) => n,
        }
    }
}

/// Why a nickname registration was refused. The registry is unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum NicknameError {
    /// Empty or whitespace-only.
    #[error("nickname must not be empty")]
    Empty,
    /// Longer than the configured limit.
    #[error("nickname must be at most {max} characters")]
    TooLong {
        /// Limit in characters.
        max: usize,
    },
    /// The connection is already registered under a different nickname.
    #[error("already registered as {current}")]
    Rejected {
        /// The nickname the connection keeps.
        current: String,
    },
    /// Another connection holds this nickname and uniqueness is enforced.
    #[error("nickname {nickname} is already in use")]
    Taken {
        /// The contested nickname.
        nickname: String,
    },
}

struct Session {
    nickname: String,
    seq: u64,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<ConnId, Session>,
    next_seq: u64,
}

/// Connection → nickname map guarded by a single mutex.
pub struct SessionRegistry {
    inner: Mutex<Inner>,
    unique_nicknames: bool,
    max_nickname_len: usize,
}

impl SessionRegistry {
    /// Create an empty registry.
    ///
    /// With `unique_nicknames` set, a nickname held by one connection is
    /// refused for every other connection until released.
    pub fn new(unique_nicknames: bool, max_nickname_len: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            unique_nicknames,
            max_nickname_len,
        }
    }

    /// Register `nickname` (trimmed) for `conn`.
    pub fn register(&self, conn: &ConnId, nickname: &str) -> Result<RegisterOutcome, NicknameError> {
        let nickname = nickname.trim();
        if nickname.is_empty() {
            return Err(NicknameError::Empty);
        }

        let mut inner = self.inner.lock();
        if let Some(existing) = inner.sessions.get(conn) {
            return if existing.nickname == nickname {
                Ok(RegisterOutcome::AlreadyRegistered(existing.nickname.clone()))
            } else {
                Err(NicknameError::Rejected {
                    current: existing.nickname.clone(),
                })
            };
        }
        if nickname.chars().count() > self.max_nickname_len {
            return Err(NicknameError::TooLong {
                max: self.max_nickname_len,
            });
        }
        if self.unique_nicknames && inner.sessions.values().any(|s| s.nickname == nickname) {
            return Err(NicknameError::Taken {
                nickname: nickname.to_owned(),
            });
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        let _ = inner.sessions.insert(
            conn.clone(),
            Session {
                nickname: nickname.to_owned(),
                seq,
            },
        );
        debug!(conn_id = %conn, nickname, sessions = inner.sessions.len(), "session registered");
        Ok(RegisterOutcome::Registered(nickname.to_owned()))
    }

    /// Remove the session for `conn`, returning its nickname.
    ///
    /// Returns `None` if the connection never registered or was already
    /// removed.
    pub fn unregister(&self, conn: &ConnId) -> Option<String> {
        let removed = self.inner.lock().sessions.remove(conn)?;
        debug!(conn_id = %conn, nickname = %removed.nickname, "session removed");
        Some(removed.nickname)
    }

    /// Nicknames of every live session, in registration order.
    pub fn snapshot(&self) -> Vec<String> {
        let inner = self.inner.lock();
        let mut sessions: Vec<&Session> = inner.sessions.values().collect();
        sessions.sort_by_key(|s| s.seq);
        sessions.into_iter().map(|s| s.nickname.clone()).collect()
    }

    /// Nickname held by `conn`, if any.
    pub fn lookup(&self, conn: &ConnId) -> Option<String> {
        self.inner
            .lock()
            .sessions
            .get(conn)
            .map(|s| s.nickname.clone())
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    /// Whether no session is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
