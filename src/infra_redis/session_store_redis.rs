use crate::application_port::TokenError;
use crate::domain_model::*;
use crate::domain_port::*;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use std::time::Duration;
use tracing::debug;

const SESSION_ROTATE: &str = include_str!("session_rotate.lua");

pub struct RedisSessionStore {
    conn: ConnectionManager,
    prefix: String,
    rotate_script: Script,
}

impl RedisSessionStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisSessionStore {
            conn,
            prefix: prefix.into(),
            rotate_script: Script::new(SESSION_ROTATE),
        }
    }

    fn key(&self, session_id: &SessionId) -> String {
        session_key(&self.prefix, session_id)
    }
}

fn session_key(prefix: &str, session_id: &SessionId) -> String {
    format!("{}:{}", prefix, session_id)
}

/// Redis rejects `PX 0` and anything past `i64::MAX`, so the value is
/// clamped into that range.
fn ttl_millis(ttl: Duration) -> u64 {
    ttl.as_millis().clamp(1, i64::MAX as u128) as u64
}

fn rotate_outcome(status: i64, revoked: i64) -> Result<RotateOutcome, TokenError> {
    match status {
        1 => Ok(RotateOutcome::Rotated),
        -1 | -2 => Ok(RotateOutcome::Unknown),
        0 => Ok(RotateOutcome::Replayed {
            revoked: revoked.max(0) as u64,
        }),
        other => Err(TokenError::StoreWrite(format!(
            "unknown rotate script status {other}"
        ))),
    }
}

#[async_trait::async_trait]
impl SessionStore for RedisSessionStore {
    async fn insert(
        &self,
        session_id: &SessionId,
        user_id: UserId,
        ttl: Duration,
    ) -> Result<(), TokenError> {
        let key = self.key(session_id);
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(SessionEntry::Live(user_id).to_string())
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(|e| TokenError::StoreWrite(e.to_string()))?;
        match reply {
            Some(_) => Ok(()),
            None => Err(TokenError::StoreWrite(format!(
                "session {} already exists",
                session_id
            ))),
        }
    }

    async fn get(&self, session_id: &SessionId) -> Result<Option<SessionEntry>, TokenError> {
        let key = self.key(session_id);
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| TokenError::StoreRead(e.to_string()))?;
        raw.map(|s| s.parse::<SessionEntry>())
            .transpose()
            .map_err(|e| TokenError::StoreRead(e.to_string()))
    }

    async fn remove(&self, session_id: &SessionId) -> Result<u64, TokenError> {
        let key = self.key(session_id);
        let mut conn = self.conn.clone();
        let removed: u64 = conn
            .del(&key)
            .await
            .map_err(|e| TokenError::StoreWrite(e.to_string()))?;
        Ok(removed)
    }

    async fn rotate(
        &self,
        session_id: &SessionId,
        user_id: UserId,
        successor: &Successor,
    ) -> Result<RotateOutcome, TokenError> {
        let key = self.key(session_id);
        let mut conn = self.conn.clone();
        let (status, revoked): (i64, i64) = self
            .rotate_script
            .key(&key)
            .arg(user_id.to_string())
            .arg(SessionEntry::Rotated(successor.clone()).to_string())
            .arg(&self.prefix)
            .arg(MAX_REVOKED_HOPS)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| TokenError::StoreWrite(e.to_string()))?;
        if status == -2 {
            debug!(%session_id, "rotate refused for foreign owner");
        }
        rotate_outcome(status, revoked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_prefixed_session_ids() {
        let sid: SessionId = "00112233445566778899aabbccddeeff".parse().unwrap();
        assert_eq!(
            session_key("waypoint:session", &sid),
            "waypoint:session:00112233445566778899aabbccddeeff"
        );
    }

    #[test]
    fn ttl_never_rounds_to_zero() {
        assert_eq!(ttl_millis(Duration::from_micros(10)), 1);
        assert_eq!(ttl_millis(Duration::from_secs(900)), 900_000);
        assert_eq!(ttl_millis(Duration::MAX), i64::MAX as u64);
    }

    #[test]
    fn script_statuses_map_to_outcomes() {
        assert_eq!(rotate_outcome(1, 0).unwrap(), RotateOutcome::Rotated);
        assert_eq!(rotate_outcome(-1, 0).unwrap(), RotateOutcome::Unknown);
        assert_eq!(rotate_outcome(-2, 0).unwrap(), RotateOutcome::Unknown);
        assert_eq!(
            rotate_outcome(0, 5).unwrap(),
            RotateOutcome::Replayed { revoked: 5 }
        );
        assert!(matches!(
            rotate_outcome(7, 0),
            Err(TokenError::StoreWrite(_))
        ));
    }

    #[test]
    fn script_and_entry_encoding_agree_on_the_tripwire_prefix() {
        let entry = SessionEntry::Rotated(Successor {
            refresh: SessionId::generate(),
            access: SessionId::generate(),
        });
        assert!(entry.to_string().starts_with("rotated:"));
        assert!(SESSION_ROTATE.contains("'rotated:'"));
    }

    #[test]
    fn script_declares_only_the_rotated_session() {
        assert!(SESSION_ROTATE.contains("KEYS[1]"));
        assert!(!SESSION_ROTATE.contains("KEYS[2]"));
        assert!(SESSION_ROTATE.contains("Standalone Redis only"));
    }
}
