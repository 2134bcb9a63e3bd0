use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::AUDIT_TARGET;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct RealTokenService {
    token_codec: Arc<dyn TokenCodec>,
    session_store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
}

impl RealTokenService {
    pub fn new(
        token_codec: Arc<dyn TokenCodec>,
        session_store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            token_codec,
            session_store,
            clock,
        }
    }

    fn ttl(now: DateTime<Utc>, until: DateTime<Utc>) -> Duration {
        (until - now)
            .to_std()
            .unwrap_or_default()
            .max(Duration::from_secs(1))
    }

    /// Sign a fresh pair. Touches no store.
    fn mint(&self, user_id: UserId, now: DateTime<Utc>) -> Result<TokenPair, TokenError> {
        let access_session = SessionId::generate();
        let refresh_session = SessionId::generate();
        let (access_token, access_expires_at) =
            self.token_codec
                .sign(TokenKind::Access, user_id, &access_session, now)?;
        let (refresh_token, refresh_expires_at) =
            self.token_codec
                .sign(TokenKind::Refresh, user_id, &refresh_session, now)?;

        Ok(TokenPair {
            access_token: AccessToken(access_token),
            refresh_token: RefreshToken(refresh_token),
            access_session,
            refresh_session,
            access_expires_at,
            refresh_expires_at,
        })
    }

    /// Write both sessions of `pair`, or neither.
    async fn register(
        &self,
        user_id: UserId,
        pair: &TokenPair,
        now: DateTime<Utc>,
    ) -> Result<(), TokenError> {
        let sessions = [
            (&pair.access_session, pair.access_expires_at),
            (&pair.refresh_session, pair.refresh_expires_at),
        ];
        for (session_id, expires_at) in sessions {
            if let Err(e) = self
                .session_store
                .insert(session_id, user_id, Self::ttl(now, expires_at))
                .await
            {
                // a failed write may still have landed
                self.discard(pair).await;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Best-effort removal of both sessions of a pair that will not be handed out.
    async fn discard(&self, pair: &TokenPair) {
        for session_id in [&pair.access_session, &pair.refresh_session] {
            if let Err(e) = self.session_store.remove(session_id).await {
                warn!(%session_id, "discarding session: {}", e);
            }
        }
    }

    fn report_replay(user_id: UserId, session_id: &SessionId, revoked: u64) {
        warn!(
            target: AUDIT_TARGET,
            %user_id,
            %session_id,
            revoked,
            "refresh token reuse detected, session chain revoked"
        );
    }
}

#[async_trait::async_trait]
impl TokenService for RealTokenService {
    async fn issue(&self, user_id: UserId) -> Result<TokenPair, TokenError> {
        let now = self.clock.now();
        let pair = self.mint(user_id, now)?;
        self.register(user_id, &pair, now).await?;
        debug!(%user_id, access = %pair.access_session, refresh = %pair.refresh_session, "issued tokens");
        Ok(pair)
    }

    fn validate(&self, token: &str, kind: TokenKind) -> Result<VerifiedClaims, TokenError> {
        self.token_codec.verify(kind, token, self.clock.now())
    }

    async fn resolve(&self, session_id: &SessionId) -> Result<UserId, TokenError> {
        match self.session_store.get(session_id).await? {
            Some(SessionEntry::Live(user_id)) => Ok(user_id),
            Some(SessionEntry::Rotated(_)) | None => Err(TokenError::SessionNotFound),
        }
    }

    async fn authenticate(&self, access_token: &str) -> Result<Principal, TokenError> {
        let claims = self.validate(access_token, TokenKind::Access)?;
        let user_id = self.resolve(&claims.session_id).await?;
        if user_id != claims.user_id {
            warn!(%claims.session_id, "session owner does not match token subject");
            return Err(TokenError::SessionNotFound);
        }
        Ok(Principal {
            user_id,
            session_id: claims.session_id,
        })
    }

    async fn revoke(&self, session_id: &SessionId) -> Result<u64, TokenError> {
        let removed = self.session_store.remove(session_id).await?;
        debug!(%session_id, removed, "revoked session");
        Ok(removed)
    }

    async fn revoke_refresh(&self, claims: &VerifiedClaims) -> Result<u64, TokenError> {
        if claims.kind != TokenKind::Refresh {
            return Err(TokenError::MalformedClaims(
                "expected refresh token claims".to_string(),
            ));
        }
        // Rotating onto sessions that are never registered retires a live
        // entry atomically, and runs the replay path on a tripwire.
        let retired = Successor {
            refresh: SessionId::generate(),
            access: SessionId::generate(),
        };
        match self
            .session_store
            .rotate(&claims.session_id, claims.user_id, &retired)
            .await?
        {
            RotateOutcome::Rotated => self.revoke(&claims.session_id).await,
            RotateOutcome::Unknown => Ok(0),
            RotateOutcome::Replayed { revoked } => {
                Self::report_replay(claims.user_id, &claims.session_id, revoked);
                Err(TokenError::RefreshReuseDetected)
            }
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, TokenError> {
        let claims = self.validate(refresh_token, TokenKind::Refresh)?;
        let user_id = claims.user_id;

        // The successor is registered before the rotation commits so the
        // tripwire never points at a session that does not exist yet.
        let now = self.clock.now();
        let pair = self.mint(user_id, now)?;
        self.register(user_id, &pair, now).await?;

        let successor = Successor {
            refresh: pair.refresh_session.clone(),
            access: pair.access_session.clone(),
        };
        let outcome = match self
            .session_store
            .rotate(&claims.session_id, user_id, &successor)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                self.discard(&pair).await;
                return Err(e);
            }
        };

        match outcome {
            RotateOutcome::Rotated => {
                debug!(%user_id, from = %claims.session_id, to = %pair.refresh_session, "rotated refresh token");
                Ok(pair)
            }
            RotateOutcome::Unknown => {
                self.discard(&pair).await;
                Err(TokenError::RefreshExpiredOrUnknown)
            }
            RotateOutcome::Replayed { revoked } => {
                self.discard(&pair).await;
                Self::report_replay(user_id, &claims.session_id, revoked);
                Err(TokenError::RefreshReuseDetected)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::{JwtConfig, JwtHs256Codec};
    use crate::infra_memory::{ManualClock, MemorySessionStore};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const ACCESS_TTL: Duration = Duration::from_secs(15 * 60);
    const REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

    struct Fixture {
        clock: Arc<ManualClock>,
        store: Arc<MemorySessionStore>,
        service: Arc<RealTokenService>,
    }

    fn codec() -> Arc<dyn TokenCodec> {
        Arc::new(JwtHs256Codec::new(JwtConfig {
            issuer: "waypoint.test".to_string(),
            audience: "waypoint-client".to_string(),
            access_ttl: ACCESS_TTL,
            refresh_ttl: REFRESH_TTL,
            access_secret: b"access-secret".to_vec(),
            refresh_secret: b"refresh-secret".to_vec(),
        }))
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Arc::new(MemorySessionStore::new(clock.clone()));
        let service = Arc::new(RealTokenService::new(
            codec(),
            store.clone(),
            clock.clone(),
        ));
        Fixture {
            clock,
            store,
            service,
        }
    }

    /// Delegates to a memory store but fails the n-th insert, and every
    /// `get` or `rotate` once switched on.
    struct FlakyStore {
        inner: MemorySessionStore,
        inserts: AtomicUsize,
        fail_on: usize,
        fail_get: AtomicBool,
        fail_rotate: AtomicBool,
    }

    impl FlakyStore {
        fn new(clock: Arc<ManualClock>, fail_on: usize) -> Arc<Self> {
            Arc::new(FlakyStore {
                inner: MemorySessionStore::new(clock),
                inserts: AtomicUsize::new(0),
                fail_on,
                fail_get: AtomicBool::new(false),
                fail_rotate: AtomicBool::new(false),
            })
        }
    }

    #[async_trait::async_trait]
    impl SessionStore for FlakyStore {
        async fn insert(
            &self,
            session_id: &SessionId,
            user_id: UserId,
            ttl: Duration,
        ) -> Result<(), TokenError> {
            if self.inserts.fetch_add(1, Ordering::SeqCst) == self.fail_on {
                return Err(TokenError::StoreWrite("connection reset".to_string()));
            }
            self.inner.insert(session_id, user_id, ttl).await
        }

        async fn get(&self, session_id: &SessionId) -> Result<Option<SessionEntry>, TokenError> {
            if self.fail_get.load(Ordering::SeqCst) {
                return Err(TokenError::StoreRead("read timed out".to_string()));
            }
            self.inner.get(session_id).await
        }

        async fn remove(&self, session_id: &SessionId) -> Result<u64, TokenError> {
            self.inner.remove(session_id).await
        }

        async fn rotate(
            &self,
            session_id: &SessionId,
            user_id: UserId,
            successor: &Successor,
        ) -> Result<RotateOutcome, TokenError> {
            if self.fail_rotate.load(Ordering::SeqCst) {
                return Err(TokenError::StoreWrite("script aborted".to_string()));
            }
            self.inner.rotate(session_id, user_id, successor).await
        }
    }

    #[tokio::test]
    async fn issued_access_session_resolves_to_its_user() {
        let f = fixture();
        for user in [1, 42, i64::MAX] {
            let pair = f.service.issue(UserId(user)).await.unwrap();
            assert_eq!(
                f.service.resolve(&pair.access_session).await.unwrap(),
                UserId(user)
            );
            assert_eq!(
                f.service.resolve(&pair.refresh_session).await.unwrap(),
                UserId(user)
            );
        }
    }

    #[tokio::test]
    async fn access_expiry_fails_validation_and_resolution() {
        let f = fixture();
        let pair = f.service.issue(UserId(3)).await.unwrap();

        f.clock.advance(ACCESS_TTL + Duration::from_secs(1));
        assert!(matches!(
            f.service
                .validate(&pair.access_token.0, TokenKind::Access),
            Err(TokenError::Expired)
        ));
        assert!(matches!(
            f.service.resolve(&pair.access_session).await,
            Err(TokenError::SessionNotFound)
        ));

        // the refresh token outlives the access token
        let renewed = f.service.refresh(&pair.refresh_token.0).await.unwrap();
        assert_eq!(
            f.service
                .authenticate(&renewed.access_token.0)
                .await
                .unwrap()
                .user_id,
            UserId(3)
        );
    }

    #[tokio::test]
    async fn expired_refresh_token_is_rejected() {
        let f = fixture();
        let pair = f.service.issue(UserId(3)).await.unwrap();

        f.clock.advance(REFRESH_TTL);
        assert!(matches!(
            f.service.refresh(&pair.refresh_token.0).await,
            Err(TokenError::Expired)
        ));
        assert_eq!(f.store.live_len(), 0);
    }

    #[tokio::test]
    async fn revoke_is_idempotent() {
        let f = fixture();
        let pair = f.service.issue(UserId(9)).await.unwrap();

        assert_eq!(f.service.revoke(&pair.access_session).await.unwrap(), 1);
        assert_eq!(f.service.revoke(&pair.access_session).await.unwrap(), 0);
        assert!(matches!(
            f.service.authenticate(&pair.access_token.0).await,
            Err(TokenError::SessionNotFound)
        ));
    }

    #[tokio::test]
    async fn refresh_is_single_use_and_replay_revokes_the_successor() {
        let f = fixture();
        let first = f.service.issue(UserId(5)).await.unwrap();

        let second = f.service.refresh(&first.refresh_token.0).await.unwrap();
        assert_eq!(
            f.service.resolve(&second.access_session).await.unwrap(),
            UserId(5)
        );
        // the exchanged refresh id is no longer an active session
        assert!(matches!(
            f.service.resolve(&first.refresh_session).await,
            Err(TokenError::SessionNotFound)
        ));

        assert!(matches!(
            f.service.refresh(&first.refresh_token.0).await,
            Err(TokenError::RefreshReuseDetected)
        ));
        assert!(matches!(
            f.service.refresh(&second.refresh_token.0).await,
            Err(TokenError::RefreshExpiredOrUnknown)
        ));
        assert!(matches!(
            f.service.authenticate(&second.access_token.0).await,
            Err(TokenError::SessionNotFound)
        ));
        // the original access session is untouched by the replay
        assert_eq!(
            f.service.resolve(&first.access_session).await.unwrap(),
            UserId(5)
        );
    }

    #[tokio::test]
    async fn replay_of_an_old_token_revokes_the_whole_chain() {
        let f = fixture();
        let first = f.service.issue(UserId(5)).await.unwrap();
        let second = f.service.refresh(&first.refresh_token.0).await.unwrap();
        let third = f.service.refresh(&second.refresh_token.0).await.unwrap();

        assert!(matches!(
            f.service.refresh(&first.refresh_token.0).await,
            Err(TokenError::RefreshReuseDetected)
        ));
        assert!(matches!(
            f.service.refresh(&third.refresh_token.0).await,
            Err(TokenError::RefreshExpiredOrUnknown)
        ));
        assert!(matches!(
            f.service.resolve(&third.access_session).await,
            Err(TokenError::SessionNotFound)
        ));
    }

    #[tokio::test]
    async fn refresh_after_logout_of_refresh_session_is_unknown() {
        let f = fixture();
        let pair = f.service.issue(UserId(5)).await.unwrap();
        f.service.revoke(&pair.refresh_session).await.unwrap();

        let live_before = f.store.live_len();
        assert!(matches!(
            f.service.refresh(&pair.refresh_token.0).await,
            Err(TokenError::RefreshExpiredOrUnknown)
        ));
        assert_eq!(f.store.live_len(), live_before);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_refreshes_rotate_once() {
        for _ in 0..50 {
            let f = fixture();
            let pair = f.service.issue(UserId(11)).await.unwrap();

            let a = tokio::spawn({
                let service = f.service.clone();
                let token = pair.refresh_token.0.clone();
                async move { service.refresh(&token).await }
            });
            let b = tokio::spawn({
                let service = f.service.clone();
                let token = pair.refresh_token.0.clone();
                async move { service.refresh(&token).await }
            });
            let results = [a.await.unwrap(), b.await.unwrap()];

            let rotated = results.iter().filter(|r| r.is_ok()).count();
            let replayed = results
                .iter()
                .filter(|r| matches!(r, Err(TokenError::RefreshReuseDetected)))
                .count();
            assert_eq!((rotated, replayed), (1, 1));
        }
    }

    #[tokio::test]
    async fn failed_store_write_leaves_no_session() {
        for fail_on in [0, 1] {
            let clock = Arc::new(ManualClock::new(Utc::now()));
            let store = FlakyStore::new(clock.clone(), fail_on);
            let service = RealTokenService::new(codec(), store.clone(), clock);

            assert!(matches!(
                service.issue(UserId(1)).await,
                Err(TokenError::StoreWrite(_))
            ));
            assert_eq!(store.inner.live_len(), 0);
        }
    }

    #[tokio::test]
    async fn failed_refresh_write_keeps_the_old_refresh_token_usable() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = FlakyStore::new(clock.clone(), 3);
        let service = RealTokenService::new(codec(), store.clone(), clock);
        let pair = service.issue(UserId(1)).await.unwrap();

        assert!(matches!(
            service.refresh(&pair.refresh_token.0).await,
            Err(TokenError::StoreWrite(_))
        ));
        // nothing was rotated, the next attempt goes through
        assert!(service.refresh(&pair.refresh_token.0).await.is_ok());
    }

    #[tokio::test]
    async fn failed_rotate_is_a_hard_error_and_discards_the_new_pair() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = FlakyStore::new(clock.clone(), usize::MAX);
        let service = RealTokenService::new(codec(), store.clone(), clock);
        let pair = service.issue(UserId(1)).await.unwrap();
        assert_eq!(store.inner.live_len(), 2);

        store.fail_rotate.store(true, Ordering::SeqCst);
        assert!(matches!(
            service.refresh(&pair.refresh_token.0).await,
            Err(TokenError::StoreWrite(_))
        ));
        assert_eq!(store.inner.live_len(), 2);

        store.fail_rotate.store(false, Ordering::SeqCst);
        assert!(service.refresh(&pair.refresh_token.0).await.is_ok());
    }

    #[tokio::test]
    async fn failed_read_is_not_reported_as_a_missing_session() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = FlakyStore::new(clock.clone(), usize::MAX);
        let service = RealTokenService::new(codec(), store.clone(), clock);
        let pair = service.issue(UserId(1)).await.unwrap();

        store.fail_get.store(true, Ordering::SeqCst);
        assert!(matches!(
            service.resolve(&pair.access_session).await,
            Err(TokenError::StoreRead(_))
        ));
        assert!(matches!(
            service.authenticate(&pair.access_token.0).await,
            Err(TokenError::StoreRead(_))
        ));
        assert_eq!(store.inner.live_len(), 2);
    }

    #[tokio::test]
    async fn revoking_a_live_refresh_session_ends_it() {
        let f = fixture();
        let pair = f.service.issue(UserId(5)).await.unwrap();
        let claims = f
            .service
            .validate(&pair.refresh_token.0, TokenKind::Refresh)
            .unwrap();

        assert_eq!(f.service.revoke_refresh(&claims).await.unwrap(), 1);
        assert_eq!(f.service.revoke_refresh(&claims).await.unwrap(), 0);
        assert!(matches!(
            f.service.refresh(&pair.refresh_token.0).await,
            Err(TokenError::RefreshExpiredOrUnknown)
        ));
        // only the access session is left
        assert_eq!(f.store.live_len(), 1);
    }

    #[tokio::test]
    async fn revoking_an_exchanged_refresh_session_is_a_replay() {
        let f = fixture();
        let first = f.service.issue(UserId(5)).await.unwrap();
        let second = f.service.refresh(&first.refresh_token.0).await.unwrap();
        let stale = f
            .service
            .validate(&first.refresh_token.0, TokenKind::Refresh)
            .unwrap();

        assert!(matches!(
            f.service.revoke_refresh(&stale).await,
            Err(TokenError::RefreshReuseDetected)
        ));
        assert!(matches!(
            f.service.refresh(&second.refresh_token.0).await,
            Err(TokenError::RefreshExpiredOrUnknown)
        ));
        assert!(matches!(
            f.service.resolve(&second.access_session).await,
            Err(TokenError::SessionNotFound)
        ));
    }

    #[tokio::test]
    async fn revoke_refresh_rejects_access_claims() {
        let f = fixture();
        let pair = f.service.issue(UserId(5)).await.unwrap();
        let claims = f
            .service
            .validate(&pair.access_token.0, TokenKind::Access)
            .unwrap();
        assert!(matches!(
            f.service.revoke_refresh(&claims).await,
            Err(TokenError::MalformedClaims(_))
        ));
        assert_eq!(f.store.live_len(), 2);
    }

    #[tokio::test]
    async fn session_lifecycle_for_user_42() {
        let f = fixture();
        let pair = f.service.issue(UserId(42)).await.unwrap();

        let claims = f
            .service
            .validate(&pair.access_token.0, TokenKind::Access)
            .unwrap();
        assert_eq!(claims.user_id, UserId(42));
        assert_eq!(claims.session_id, pair.access_session);
        assert_eq!(
            f.service.resolve(&claims.session_id).await.unwrap(),
            UserId(42)
        );

        assert_eq!(f.service.revoke(&claims.session_id).await.unwrap(), 1);
        assert!(matches!(
            f.service.resolve(&claims.session_id).await,
            Err(TokenError::SessionNotFound)
        ));
    }
}
