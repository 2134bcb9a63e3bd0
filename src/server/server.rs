use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::Settings;
use anyhow::anyhow;
use sqlx::{MySql, Pool};
use std::sync::Arc;

pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    pub user_service: Arc<dyn UserService>,
    pub payment_service: Arc<dyn PaymentService>,
    pool: Option<Pool<MySql>>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let jwt_config = settings.jwt.to_config()?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let session_store: Arc<dyn SessionStore> = match settings.session.backend.as_str() {
            "memory" => Arc::new(MemorySessionStore::new(clock.clone())),
            "redis" => {
                let dsn = settings
                    .session
                    .redis_dsn
                    .as_deref()
                    .ok_or_else(|| anyhow!("session.redis_dsn is required for redis backend"))?;
                let redis_client = redis::Client::open(dsn)?;
                let redis_manager = redis_client.get_connection_manager().await?;
                Arc::new(RedisSessionStore::new(
                    redis_manager,
                    settings.session.key_prefix.clone(),
                ))
            }
            other => return Err(anyhow!("Unknown session backend: {}", other)),
        };

        let (user_repo, payment_repo, pool): (
            Arc<dyn UserRepo>,
            Arc<dyn PaymentRepo>,
            Option<Pool<MySql>>,
        ) = match settings.user.backend.as_str() {
            "memory" => (
                Arc::new(MemoryUserRepo::new()),
                Arc::new(MemoryPaymentRepo::new()),
                None,
            ),
            "mysql" => {
                let dsn = settings
                    .user
                    .mysql_dsn
                    .as_deref()
                    .ok_or_else(|| anyhow!("user.mysql_dsn is required for mysql backend"))?;
                let pool = Pool::<MySql>::connect(dsn).await?;
                ensure_schema(&pool).await?;
                (
                    Arc::new(MySqlUserRepo::new(pool.clone())),
                    Arc::new(MySqlPaymentRepo::new(pool.clone())),
                    Some(pool),
                )
            }
            other => return Err(anyhow!("Unknown user backend: {}", other)),
        };

        let token_codec: Arc<dyn TokenCodec> = Arc::new(JwtHs256Codec::new(jwt_config));
        let token_service: Arc<dyn TokenService> = Arc::new(RealTokenService::new(
            token_codec,
            session_store,
            clock,
        ));
        let credential_hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2PasswordHasher);

        let auth_service: Arc<dyn AuthService> = Arc::new(RealAuthService::new(
            user_repo.clone(),
            credential_hasher,
            token_service,
        ));
        let user_service: Arc<dyn UserService> = Arc::new(RealUserService::new(user_repo));
        let payment_service: Arc<dyn PaymentService> =
            Arc::new(RealPaymentService::new(payment_repo));

        info!(
            session_backend = %settings.session.backend,
            user_backend = %settings.user.backend,
            "server started"
        );

        Ok(Self {
            auth_service,
            user_service,
            payment_service,
            pool,
        })
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
