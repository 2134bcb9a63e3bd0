use crate::application_port::*;
use crate::domain_model::*;

#[derive(Debug, Clone)]
pub struct CredentialsRecord {
    pub user_id: UserId,
    pub password_hash: String,
}

#[async_trait::async_trait]
pub trait UserRepo: Send + Sync {
    /// Fails with `AuthError::LoginTaken` if the login is already in use.
    async fn create(&self, user: NewUser) -> Result<UserId, AuthError>;

    /// Fetch credentials by login (for login).
    async fn get_credentials(&self, login: &str) -> Result<Option<CredentialsRecord>, AuthError>;

    async fn get_profile(&self, user_id: UserId) -> Result<Option<UserProfile>, AuthError>;

    async fn list_profiles(&self) -> Result<Vec<UserProfile>, AuthError>;

    /// Returns `false` if no such user exists.
    async fn update_profile(
        &self,
        user_id: UserId,
        update: &ProfileUpdate,
    ) -> Result<bool, AuthError>;

    async fn login_exists(&self, login: &str) -> Result<bool, AuthError>;
}
