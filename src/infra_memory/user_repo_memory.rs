use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};

struct StoredUser {
    profile: UserProfile,
    password_hash: String,
}

pub struct MemoryUserRepo {
    users: DashMap<UserId, StoredUser>,
    logins: DashMap<String, UserId>,
    next_id: AtomicI64,
}

impl MemoryUserRepo {
    pub fn new() -> Self {
        MemoryUserRepo {
            users: DashMap::new(),
            logins: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for MemoryUserRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl UserRepo for MemoryUserRepo {
    async fn create(&self, user: NewUser) -> Result<UserId, AuthError> {
        let user_id = match self.logins.entry(user.login.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => return Err(AuthError::LoginTaken),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let user_id = UserId(self.next_id.fetch_add(1, Ordering::Relaxed));
                vacant.insert(user_id);
                user_id
            }
        };

        let now = Utc::now();
        self.users.insert(
            user_id,
            StoredUser {
                profile: UserProfile {
                    id: user_id,
                    first_name: user.first_name,
                    last_name: user.last_name,
                    login: user.login,
                    phone: user.phone,
                    email: user.email,
                    created_at: now,
                    updated_at: now,
                },
                password_hash: user.password_hash,
            },
        );
        Ok(user_id)
    }

    async fn get_credentials(&self, login: &str) -> Result<Option<CredentialsRecord>, AuthError> {
        let Some(user_id) = self.logins.get(login).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.users.get(&user_id).map(|user| CredentialsRecord {
            user_id,
            password_hash: user.password_hash.clone(),
        }))
    }

    async fn get_profile(&self, user_id: UserId) -> Result<Option<UserProfile>, AuthError> {
        Ok(self.users.get(&user_id).map(|user| user.profile.clone()))
    }

    async fn list_profiles(&self) -> Result<Vec<UserProfile>, AuthError> {
        let mut profiles: Vec<UserProfile> =
            self.users.iter().map(|user| user.profile.clone()).collect();
        profiles.sort_by_key(|p| p.id);
        Ok(profiles)
    }

    async fn update_profile(
        &self,
        user_id: UserId,
        update: &ProfileUpdate,
    ) -> Result<bool, AuthError> {
        let Some(mut user) = self.users.get_mut(&user_id) else {
            return Ok(false);
        };
        let profile = &mut user.profile;
        if let Some(first_name) = &update.first_name {
            profile.first_name = first_name.clone();
        }
        if let Some(last_name) = &update.last_name {
            profile.last_name = last_name.clone();
        }
        if let Some(phone) = &update.phone {
            profile.phone = Some(phone.clone());
        }
        if let Some(email) = &update.email {
            profile.email = email.clone();
        }
        profile.updated_at = Utc::now();
        Ok(true)
    }

    async fn login_exists(&self, login: &str) -> Result<bool, AuthError> {
        Ok(self.logins.contains_key(login))
    }
}
