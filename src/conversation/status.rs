//! Status line shown under the conversation

use std::time::Duration;

use tokio::time::Instant;

/// What the status line is reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Listening,
    Processing,
    Speaking,
    Error,
}

/// A status message, optionally cleared at a deadline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub kind: StatusKind,
    pub text: String,
    /// `None` for statuses that stay until replaced
    pub expires_at: Option<Instant>,
}

impl Status {
    /// A status that stays until replaced or cleared
    #[must_use]
    pub fn persistent(kind: StatusKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            expires_at: None,
        }
    }

    /// A status that clears itself `after` from `now`
    #[must_use]
    pub fn transient(
        kind: StatusKind,
        text: impl Into<String>,
        now: Instant,
        after: Duration,
    ) -> Self {
        Self {
            kind,
            text: text.into(),
            expires_at: Some(now + after),
        }
    }

    /// Whether the deadline has passed at `now`
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}
