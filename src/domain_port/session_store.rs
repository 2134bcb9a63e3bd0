use crate::application_port::TokenError;
use crate::domain_model::*;
use std::time::Duration;

/// Longest successor chain revoked when a rotated refresh token is replayed.
pub const MAX_REVOKED_HOPS: u32 = 32;

/// Result of an atomic check-and-rotate of a refresh session.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RotateOutcome {
    /// The session was live for the expected user and now holds the tripwire.
    Rotated,
    /// No entry (expired or never issued), or live for a different user.
    Unknown,
    /// The session had already been rotated. The tripwire and the successor
    /// chain behind it were deleted.
    Replayed { revoked: u64 },
}

#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Register a live session. Never overwrites an existing entry.
    async fn insert(
        &self,
        session_id: &SessionId,
        user_id: UserId,
        ttl: Duration,
    ) -> Result<(), TokenError>;

    async fn get(&self, session_id: &SessionId) -> Result<Option<SessionEntry>, TokenError>;

    /// Returns how many entries were removed (0 or 1).
    async fn remove(&self, session_id: &SessionId) -> Result<u64, TokenError>;

    /// If `session_id` is live for `user_id`, replace it with a tripwire
    /// pointing at `successor`, keeping its remaining TTL. If it already is a
    /// tripwire, revoke it along with the successor chain.
    async fn rotate(
        &self,
        session_id: &SessionId,
        user_id: UserId,
        successor: &Successor,
    ) -> Result<RotateOutcome, TokenError>;
}
