use super::auth_service_impl::validate_email;
use crate::application_port::{AuthError, UserService};
use crate::domain_model::*;
use crate::domain_port::UserRepo;
use std::sync::Arc;

pub struct RealUserService {
    user_repo: Arc<dyn UserRepo>,
}

impl RealUserService {
    pub fn new(user_repo: Arc<dyn UserRepo>) -> RealUserService {
        RealUserService { user_repo }
    }
}

#[async_trait::async_trait]
impl UserService for RealUserService {
    async fn profile(&self, user_id: UserId) -> Result<UserProfile, AuthError> {
        self.user_repo
            .get_profile(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    async fn list_profiles(&self) -> Result<Vec<UserProfile>, AuthError> {
        self.user_repo.list_profiles().await
    }

    async fn update_profile(
        &self,
        user_id: UserId,
        update: ProfileUpdate,
    ) -> Result<UserId, AuthError> {
        if update.is_empty() {
            return Err(AuthError::InvalidInput("nothing to update".to_string()));
        }
        let blank_name = [&update.first_name, &update.last_name]
            .into_iter()
            .flatten()
            .any(|name| name.trim().is_empty());
        if blank_name {
            return Err(AuthError::InvalidInput("name must not be empty".to_string()));
        }
        if let Some(email) = &update.email {
            validate_email(email)?;
        }

        if !self.user_repo.update_profile(user_id, &update).await? {
            return Err(AuthError::UserNotFound);
        }
        Ok(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra_memory::MemoryUserRepo;

    async fn seeded() -> (RealUserService, UserId) {
        let repo = Arc::new(MemoryUserRepo::new());
        let user_id = repo
            .create(NewUser {
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                login: "ada".to_string(),
                password_hash: "$argon2id$stub".to_string(),
                phone: None,
                email: "ada@example.com".to_string(),
            })
            .await
            .unwrap();
        (RealUserService::new(repo), user_id)
    }

    #[tokio::test]
    async fn partial_update_keeps_other_fields() {
        let (users, user_id) = seeded().await;
        users
            .update_profile(
                user_id,
                ProfileUpdate {
                    phone: Some("+44 20 7946 0000".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let profile = users.profile(user_id).await.unwrap();
        assert_eq!(profile.phone.as_deref(), Some("+44 20 7946 0000"));
        assert_eq!(profile.first_name, "Ada");
        assert_eq!(profile.email, "ada@example.com");
    }

    #[tokio::test]
    async fn rejects_empty_and_invalid_updates() {
        let (users, user_id) = seeded().await;
        assert!(matches!(
            users.update_profile(user_id, ProfileUpdate::default()).await,
            Err(AuthError::InvalidInput(_))
        ));
        assert!(matches!(
            users
                .update_profile(
                    user_id,
                    ProfileUpdate {
                        email: Some("nope".to_string()),
                        ..Default::default()
                    },
                )
                .await,
            Err(AuthError::InvalidInput(_))
        ));
        assert!(matches!(
            users
                .update_profile(
                    UserId(999),
                    ProfileUpdate {
                        last_name: Some("Byron".to_string()),
                        ..Default::default()
                    },
                )
                .await,
            Err(AuthError::UserNotFound)
        ));
    }
}
