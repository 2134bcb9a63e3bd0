use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::Arc;
use tracing::info;

pub struct RealAuthService {
    user_repo: Arc<dyn UserRepo>,
    credential_hasher: Arc<dyn CredentialHasher>,
    token_service: Arc<dyn TokenService>,
    min_login_len: usize,
    min_password_len: usize,
}

impl RealAuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepo>,
        credential_hasher: Arc<dyn CredentialHasher>,
        token_service: Arc<dyn TokenService>,
    ) -> Self {
        Self {
            user_repo,
            credential_hasher,
            token_service,
            min_login_len: 3,
            min_password_len: 6,
        }
    }

    fn validate_signup(&self, input: &SignupInput) -> Result<(), AuthError> {
        if input.login.trim().len() < self.min_login_len {
            return Err(AuthError::InvalidInput("login too short".to_string()));
        }
        if input.password.len() < self.min_password_len {
            return Err(AuthError::InvalidInput("password too short".to_string()));
        }
        if input.first_name.trim().is_empty() || input.last_name.trim().is_empty() {
            return Err(AuthError::InvalidInput("name must not be empty".to_string()));
        }
        validate_email(&input.email)
    }
}

pub(crate) fn validate_email(email: &str) -> Result<(), AuthError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(AuthError::InvalidInput("invalid email".to_string())),
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn signup(&self, request: SignupInput) -> Result<LoginResult, AuthError> {
        self.validate_signup(&request)?;

        if self.user_repo.login_exists(&request.login).await? {
            return Err(AuthError::LoginTaken);
        }

        let password_hash = self
            .credential_hasher
            .hash_password(&request.password)
            .await?;
        let user_id = self
            .user_repo
            .create(NewUser {
                first_name: request.first_name,
                last_name: request.last_name,
                login: request.login,
                password_hash,
                phone: request.phone,
                email: request.email,
            })
            .await?;
        info!(%user_id, "user registered");

        let tokens = self.token_service.issue(user_id).await?;
        Ok(LoginResult { user_id, tokens })
    }

    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError> {
        let LoginInput { login, password } = request;

        let rec = self
            .user_repo
            .get_credentials(&login)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let ok = self
            .credential_hasher
            .verify_password(&password, &rec.password_hash)
            .await?;
        if !ok {
            return Err(AuthError::InvalidCredentials);
        }

        let tokens = self.token_service.issue(rec.user_id).await?;
        Ok(LoginResult {
            user_id: rec.user_id,
            tokens,
        })
    }

    async fn verify_token(&self, token: &str) -> Result<Principal, AuthError> {
        Ok(self.token_service.authenticate(token).await?)
    }

    async fn logout(
        &self,
        principal: &Principal,
        refresh_token: Option<&str>,
    ) -> Result<u64, AuthError> {
        let refresh_claims = match refresh_token {
            Some(token) => {
                let claims = self.token_service.validate(token, TokenKind::Refresh)?;
                if claims.user_id != principal.user_id {
                    return Err(AuthError::InvalidInput(
                        "refresh token belongs to another user".to_string(),
                    ));
                }
                Some(claims)
            }
            None => None,
        };

        let mut removed = self.token_service.revoke(&principal.session_id).await?;
        if let Some(claims) = refresh_claims {
            removed += self.token_service.revoke_refresh(&claims).await?;
        }
        info!(user_id = %principal.user_id, removed, "logged out");
        Ok(removed)
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        if refresh_token.is_empty() {
            return Err(AuthError::InvalidInput("refresh token required".to_string()));
        }
        Ok(self.token_service.refresh(refresh_token).await?)
    }
}
