use crate::domain_model::*;
use chrono::{DateTime, Utc};

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token signing failed: {0}")]
    Signing(String),
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("malformed token claims: {0}")]
    MalformedClaims(String),
    #[error("session not found")]
    SessionNotFound,
    #[error("refresh token expired or unknown")]
    RefreshExpiredOrUnknown,
    #[error("refresh token reuse detected")]
    RefreshReuseDetected,
    #[error("session store write failed: {0}")]
    StoreWrite(String),
    #[error("session store read failed: {0}")]
    StoreRead(String),
}

/// Claims of a token whose signature, algorithm and expiry checked out.
#[derive(Debug, Clone)]
pub struct VerifiedClaims {
    pub kind: TokenKind,
    pub user_id: UserId,
    pub session_id: SessionId,
    pub expires_at: DateTime<Utc>,
}

/// Caller identity behind a live access session.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Principal {
    pub user_id: UserId,
    pub session_id: SessionId,
}

/// Signs and verifies tokens. Pure, no store access.
pub trait TokenCodec: Send + Sync {
    /// Returns the signed token and its absolute expiry.
    fn sign(
        &self,
        kind: TokenKind,
        user_id: UserId,
        session_id: &SessionId,
        issued_at: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>), TokenError>;

    fn verify(
        &self,
        kind: TokenKind,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<VerifiedClaims, TokenError>;
}

#[async_trait::async_trait]
pub trait TokenService: Send + Sync {
    /// Mint a token pair for an already authenticated user and register both
    /// sessions. No session survives a failed issuance.
    async fn issue(&self, user_id: UserId) -> Result<TokenPair, TokenError>;

    fn validate(&self, token: &str, kind: TokenKind) -> Result<VerifiedClaims, TokenError>;

    /// Map a session id to the user it is live for.
    async fn resolve(&self, session_id: &SessionId) -> Result<UserId, TokenError>;

    /// Validate an access token and resolve its session.
    async fn authenticate(&self, access_token: &str) -> Result<Principal, TokenError>;

    /// Returns how many entries were removed (0 or 1).
    async fn revoke(&self, session_id: &SessionId) -> Result<u64, TokenError>;

    /// End the refresh session behind already validated refresh claims.
    /// Returns 1 if a live session owned by the claims' user was removed,
    /// 0 if there was none. A session that was already exchanged is treated
    /// as a replay and fails with `RefreshReuseDetected`.
    async fn revoke_refresh(&self, claims: &VerifiedClaims) -> Result<u64, TokenError>;

    /// Exchange an unused refresh token for a new pair.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, TokenError>;
}
