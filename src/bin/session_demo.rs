//! Walks one user through the token lifecycle against in-memory backends:
//! issue, resolve, rotate, replay, logout.
//!
//! $ cargo run --bin session_demo

use std::sync::Arc;
use std::time::Duration;
use waypoint::application_impl::{JwtConfig, JwtHs256Codec, RealTokenService};
use waypoint::application_port::{TokenError, TokenService};
use waypoint::domain_model::{TokenKind, UserId};
use waypoint::domain_port::{Clock, SystemClock};
use waypoint::infra_memory::MemorySessionStore;
use waypoint::logger::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let logger = Logger::new_bootstrap();
    logger.reload_from_config(&LogConfig {
        filter: "debug".to_string(),
    })?;

    let jwt_config = JwtConfig {
        issuer: "waypoint.demo".to_string(),
        audience: "waypoint-client".to_string(),
        access_ttl: Duration::from_secs(15 * 60),
        refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
        access_secret: b"demo-access-secret".to_vec(),
        refresh_secret: b"demo-refresh-secret".to_vec(),
    };
    jwt_config.validate()?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(MemorySessionStore::new(clock.clone()));
    let tokens = RealTokenService::new(Arc::new(JwtHs256Codec::new(jwt_config)), store, clock);

    let user_id = UserId(42);
    let first = tokens.issue(user_id).await?;
    info!(access_session = %first.access_session, "issued");

    let claims = tokens.validate(&first.access_token.0, TokenKind::Access)?;
    let owner = tokens.resolve(&claims.session_id).await?;
    info!(%owner, "resolved access session");

    let second = tokens.refresh(&first.refresh_token.0).await?;
    info!(refresh_session = %second.refresh_session, "rotated");

    match tokens.refresh(&first.refresh_token.0).await {
        Err(TokenError::RefreshReuseDetected) => info!("replay of the old refresh token refused"),
        other => warn!(?other, "unexpected replay outcome"),
    }
    match tokens.refresh(&second.refresh_token.0).await {
        Err(TokenError::RefreshExpiredOrUnknown) => info!("successor chain was revoked"),
        other => warn!(?other, "unexpected successor outcome"),
    }

    let third = tokens.issue(user_id).await?;
    let removed = tokens.revoke(&third.access_session).await?;
    info!(removed, "logged out");

    Ok(())
}
