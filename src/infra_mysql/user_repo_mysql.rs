use super::util::is_dup_key;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySql, MySqlPool, QueryBuilder, Row};

pub struct MySqlUserRepo {
    pool: MySqlPool,
}

impl MySqlUserRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlUserRepo { pool }
    }

    fn row_to_profile(row: MySqlRow) -> Result<UserProfile, AuthError> {
        let id: UserId = row
            .try_get("id")
            .map_err(|e| AuthError::Store(e.to_string()))?;
        let first_name: String = row
            .try_get("first_name")
            .map_err(|e| AuthError::Store(e.to_string()))?;
        let last_name: String = row
            .try_get("last_name")
            .map_err(|e| AuthError::Store(e.to_string()))?;
        let login: String = row
            .try_get("login")
            .map_err(|e| AuthError::Store(e.to_string()))?;
        let phone: Option<String> = row
            .try_get("phone")
            .map_err(|e| AuthError::Store(e.to_string()))?;
        let email: String = row
            .try_get("email")
            .map_err(|e| AuthError::Store(e.to_string()))?;
        let created_at: DateTime<Utc> = row
            .try_get("created_at")
            .map_err(|e| AuthError::Store(e.to_string()))?;
        let updated_at: DateTime<Utc> = row
            .try_get("updated_at")
            .map_err(|e| AuthError::Store(e.to_string()))?;

        Ok(UserProfile {
            id,
            first_name,
            last_name,
            login,
            phone,
            email,
            created_at,
            updated_at,
        })
    }
}

#[async_trait::async_trait]
impl UserRepo for MySqlUserRepo {
    async fn create(&self, user: NewUser) -> Result<UserId, AuthError> {
        let result = sqlx::query(
            r#"
INSERT INTO user (first_name, last_name, login, password_hash, phone, email)
VALUES (?, ?, ?, ?, ?, ?)
"#,
        )
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.login)
        .bind(&user.password_hash)
        .bind(&user.phone)
        .bind(&user.email)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_dup_key(&e) {
                AuthError::LoginTaken
            } else {
                AuthError::Store(e.to_string())
            }
        })?;

        Ok(UserId(result.last_insert_id() as i64))
    }

    async fn get_credentials(&self, login: &str) -> Result<Option<CredentialsRecord>, AuthError> {
        let row_opt: Option<MySqlRow> =
            sqlx::query("SELECT id, password_hash FROM user WHERE login = ?")
                .bind(login)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AuthError::Store(format!("query credentials: {e}")))?;

        row_opt
            .map(|row| {
                Ok(CredentialsRecord {
                    user_id: row
                        .try_get("id")
                        .map_err(|e| AuthError::Store(e.to_string()))?,
                    password_hash: row
                        .try_get("password_hash")
                        .map_err(|e| AuthError::Store(e.to_string()))?,
                })
            })
            .transpose()
    }

    async fn get_profile(&self, user_id: UserId) -> Result<Option<UserProfile>, AuthError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT id, first_name, last_name, login, phone, email, created_at, updated_at
FROM user
WHERE id = ?
"#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::Store(format!("query profile: {e}")))?;

        row_opt.map(Self::row_to_profile).transpose()
    }

    async fn list_profiles(&self) -> Result<Vec<UserProfile>, AuthError> {
        let rows: Vec<MySqlRow> = sqlx::query(
            r#"
SELECT id, first_name, last_name, login, phone, email, created_at, updated_at
FROM user
ORDER BY id
"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AuthError::Store(format!("list profiles: {e}")))?;

        rows.into_iter().map(Self::row_to_profile).collect()
    }

    async fn update_profile(
        &self,
        user_id: UserId,
        update: &ProfileUpdate,
    ) -> Result<bool, AuthError> {
        if update.is_empty() {
            return self.get_profile(user_id).await.map(|p| p.is_some());
        }

        let mut qb: QueryBuilder<MySql> = QueryBuilder::new("UPDATE user SET ");
        let mut set = qb.separated(", ");
        if let Some(first_name) = &update.first_name {
            set.push("first_name = ").push_bind_unseparated(first_name);
        }
        if let Some(last_name) = &update.last_name {
            set.push("last_name = ").push_bind_unseparated(last_name);
        }
        if let Some(phone) = &update.phone {
            set.push("phone = ").push_bind_unseparated(phone);
        }
        if let Some(email) = &update.email {
            set.push("email = ").push_bind_unseparated(email);
        }
        set.push("updated_at = CURRENT_TIMESTAMP(6)");
        qb.push(" WHERE id = ").push_bind(user_id);

        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Store(format!("update profile: {e}")))?;

        // matched rows are reported only with CLIENT_FOUND_ROWS, so a zero
        // here may still be an existing user
        if result.rows_affected() > 0 {
            return Ok(true);
        }
        self.get_profile(user_id).await.map(|p| p.is_some())
    }

    async fn login_exists(&self, login: &str) -> Result<bool, AuthError> {
        let count: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM user WHERE login = ?"#)
            .bind(login)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        Ok(count > 0)
    }
}
