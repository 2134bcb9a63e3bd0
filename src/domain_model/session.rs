use super::UserId;
use argon2::password_hash::rand_core::{OsRng, RngCore};
use std::fmt;
use std::str::FromStr;

const SESSION_ID_BYTES: usize = 16;
const ROTATED_PREFIX: &str = "rotated:";

/// Opaque key of one issued token in the session store.
///
/// 128 random bits from the OS generator, rendered as lowercase hex.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        OsRng.fill_bytes(&mut bytes);
        SessionId(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid session id: {0:?}")]
pub struct InvalidSessionId(pub String);

impl FromStr for SessionId {
    type Err = InvalidSessionId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let well_formed = s.len() == SESSION_ID_BYTES * 2
            && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if well_formed {
            Ok(SessionId(s.to_string()))
        } else {
            Err(InvalidSessionId(s.to_string()))
        }
    }
}

/// Sessions minted in exchange for a rotated refresh token.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Successor {
    pub refresh: SessionId,
    pub access: SessionId,
}

/// Value stored under a session id.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SessionEntry {
    Live(UserId),
    /// Tripwire left under an exchanged refresh session id.
    Rotated(Successor),
}

impl fmt::Display for SessionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEntry::Live(user_id) => write!(f, "{}", user_id),
            SessionEntry::Rotated(next) => {
                write!(f, "{}{}:{}", ROTATED_PREFIX, next.refresh, next.access)
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid session entry: {0:?}")]
pub struct InvalidSessionEntry(pub String);

impl FromStr for SessionEntry {
    type Err = InvalidSessionEntry;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidSessionEntry(s.to_string());
        match s.strip_prefix(ROTATED_PREFIX) {
            Some(rest) => {
                let (refresh, access) = rest.split_once(':').ok_or_else(invalid)?;
                Ok(SessionEntry::Rotated(Successor {
                    refresh: refresh.parse().map_err(|_| invalid())?,
                    access: access.parse().map_err(|_| invalid())?,
                }))
            }
            None => s.parse().map(SessionEntry::Live).map_err(|_| invalid()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_distinct_hex() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().parse::<SessionId>().is_ok());
    }

    #[test]
    fn rejects_foreign_session_ids() {
        assert!("".parse::<SessionId>().is_err());
        assert!("0123456789ABCDEF0123456789ABCDEF".parse::<SessionId>().is_err());
        assert!("550e8400-e29b-41d4-a716-446655440000".parse::<SessionId>().is_err());
    }

    #[test]
    fn entry_encoding_distinguishes_tripwires() {
        let live: SessionEntry = "42".parse().unwrap();
        assert_eq!(live, SessionEntry::Live(UserId(42)));

        let next = Successor {
            refresh: SessionId::generate(),
            access: SessionId::generate(),
        };
        let encoded = SessionEntry::Rotated(next.clone()).to_string();
        assert!(encoded.starts_with("rotated:"));
        assert_eq!(
            encoded.parse::<SessionEntry>().unwrap(),
            SessionEntry::Rotated(next)
        );

        assert!("rotated:nope".parse::<SessionEntry>().is_err());
        assert!("forty-two".parse::<SessionEntry>().is_err());
    }
}
