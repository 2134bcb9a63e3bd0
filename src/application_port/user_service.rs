use super::AuthError;
use crate::domain_model::{ProfileUpdate, UserId, UserProfile};

#[async_trait::async_trait]
pub trait UserService: Send + Sync {
    async fn profile(&self, user_id: UserId) -> Result<UserProfile, AuthError>;
    async fn list_profiles(&self) -> Result<Vec<UserProfile>, AuthError>;
    async fn update_profile(
        &self,
        user_id: UserId,
        update: ProfileUpdate,
    ) -> Result<UserId, AuthError>;
}
