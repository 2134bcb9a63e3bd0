use crate::application_port::TokenError;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::time::Duration;

struct Slot {
    entry: SessionEntry,
    expires_at: DateTime<Utc>,
}

/// Process-local session store. Expired entries read as absent and are
/// dropped when touched.
pub struct MemorySessionStore {
    entries: DashMap<SessionId, Slot>,
    clock: Arc<dyn Clock>,
}

impl MemorySessionStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        MemorySessionStore {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Number of unexpired entries.
    pub fn live_len(&self) -> usize {
        let now = self.clock.now();
        self.entries.iter().filter(|s| s.expires_at > now).count()
    }

    fn take(&self, session_id: &SessionId, now: DateTime<Utc>) -> Option<SessionEntry> {
        self.entries
            .remove(session_id)
            .filter(|(_, slot)| slot.expires_at > now)
            .map(|(_, slot)| slot.entry)
    }

    fn revoke_chain(&self, mut next: Successor, now: DateTime<Utc>) -> u64 {
        let mut revoked = 0;
        for _ in 0..MAX_REVOKED_HOPS {
            if self.take(&next.access, now).is_some() {
                revoked += 1;
            }
            match self.take(&next.refresh, now) {
                Some(SessionEntry::Rotated(following)) => {
                    revoked += 1;
                    next = following;
                }
                Some(SessionEntry::Live(_)) => return revoked + 1,
                None => return revoked,
            }
        }
        revoked
    }
}

#[async_trait::async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(
        &self,
        session_id: &SessionId,
        user_id: UserId,
        ttl: Duration,
    ) -> Result<(), TokenError> {
        let now = self.clock.now();
        let expires_at = TimeDelta::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| TokenError::StoreWrite(format!("ttl {:?} out of range", ttl)))?;
        let slot = Slot {
            entry: SessionEntry::Live(user_id),
            expires_at,
        };
        match self.entries.entry(session_id.clone()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().expires_at > now {
                    return Err(TokenError::StoreWrite(format!(
                        "session {} already exists",
                        session_id
                    )));
                }
                *occupied.get_mut() = slot;
            }
            Entry::Vacant(vacant) => {
                vacant.insert(slot);
            }
        }
        Ok(())
    }

    async fn get(&self, session_id: &SessionId) -> Result<Option<SessionEntry>, TokenError> {
        let now = self.clock.now();
        let found = self
            .entries
            .get(session_id)
            .map(|slot| (slot.expires_at > now).then(|| slot.entry.clone()));
        match found {
            Some(Some(entry)) => Ok(Some(entry)),
            Some(None) => {
                self.entries.remove_if(session_id, |_, slot| slot.expires_at <= now);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn remove(&self, session_id: &SessionId) -> Result<u64, TokenError> {
        let now = self.clock.now();
        Ok(self.take(session_id, now).map_or(0, |_| 1))
    }

    async fn rotate(
        &self,
        session_id: &SessionId,
        user_id: UserId,
        successor: &Successor,
    ) -> Result<RotateOutcome, TokenError> {
        let now = self.clock.now();
        // the shard lock is held until the match ends, so only one caller
        // can observe the live entry
        let replayed = match self.entries.entry(session_id.clone()) {
            Entry::Vacant(_) => return Ok(RotateOutcome::Unknown),
            Entry::Occupied(mut occupied) => {
                if occupied.get().expires_at <= now {
                    occupied.remove();
                    return Ok(RotateOutcome::Unknown);
                }
                match occupied.get().entry.clone() {
                    SessionEntry::Live(owner) if owner != user_id => {
                        return Ok(RotateOutcome::Unknown);
                    }
                    SessionEntry::Live(_) => {
                        occupied.get_mut().entry = SessionEntry::Rotated(successor.clone());
                        return Ok(RotateOutcome::Rotated);
                    }
                    SessionEntry::Rotated(next) => {
                        occupied.remove();
                        next
                    }
                }
            }
        };

        let revoked = 1 + self.revoke_chain(replayed, now);
        Ok(RotateOutcome::Replayed { revoked })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra_memory::ManualClock;

    fn store() -> (Arc<ManualClock>, MemorySessionStore) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        (clock.clone(), MemorySessionStore::new(clock))
    }

    fn successor() -> Successor {
        Successor {
            refresh: SessionId::generate(),
            access: SessionId::generate(),
        }
    }

    #[tokio::test]
    async fn entries_expire_with_the_clock() {
        let (clock, store) = store();
        let sid = SessionId::generate();
        store
            .insert(&sid, UserId(7), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(
            store.get(&sid).await.unwrap(),
            Some(SessionEntry::Live(UserId(7)))
        );

        clock.advance(Duration::from_secs(60));
        assert_eq!(store.get(&sid).await.unwrap(), None);
        assert_eq!(store.remove(&sid).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn insert_never_overwrites_a_live_entry() {
        let (_, store) = store();
        let sid = SessionId::generate();
        store
            .insert(&sid, UserId(1), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(matches!(
            store.insert(&sid, UserId(2), Duration::from_secs(60)).await,
            Err(TokenError::StoreWrite(_))
        ));
        assert_eq!(
            store.get(&sid).await.unwrap(),
            Some(SessionEntry::Live(UserId(1)))
        );
    }

    #[tokio::test]
    async fn unrepresentable_ttl_is_a_write_error() {
        let (_, store) = store();
        let sid = SessionId::generate();
        assert!(matches!(
            store.insert(&sid, UserId(1), Duration::MAX).await,
            Err(TokenError::StoreWrite(_))
        ));
        assert_eq!(store.get(&sid).await.unwrap(), None);
    }

    #[tokio::test]
    async fn rotate_leaves_a_tripwire_with_the_original_deadline() {
        let (clock, store) = store();
        let sid = SessionId::generate();
        let next = successor();
        store
            .insert(&sid, UserId(1), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(
            store.rotate(&sid, UserId(1), &next).await.unwrap(),
            RotateOutcome::Rotated
        );
        assert_eq!(
            store.get(&sid).await.unwrap(),
            Some(SessionEntry::Rotated(next))
        );

        clock.advance(Duration::from_secs(61));
        assert_eq!(store.get(&sid).await.unwrap(), None);
    }

    #[tokio::test]
    async fn rotate_refuses_unknown_and_foreign_sessions() {
        let (_, store) = store();
        let sid = SessionId::generate();
        assert_eq!(
            store.rotate(&sid, UserId(1), &successor()).await.unwrap(),
            RotateOutcome::Unknown
        );

        store
            .insert(&sid, UserId(1), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(
            store.rotate(&sid, UserId(2), &successor()).await.unwrap(),
            RotateOutcome::Unknown
        );
        assert_eq!(
            store.get(&sid).await.unwrap(),
            Some(SessionEntry::Live(UserId(1)))
        );
    }

    #[tokio::test]
    async fn replay_revokes_tripwire_and_successors() {
        let (_, store) = store();
        let ttl = Duration::from_secs(60);
        let first = SessionId::generate();
        let next = successor();
        store.insert(&first, UserId(1), ttl).await.unwrap();
        store.insert(&next.access, UserId(1), ttl).await.unwrap();
        store.insert(&next.refresh, UserId(1), ttl).await.unwrap();
        store.rotate(&first, UserId(1), &next).await.unwrap();

        assert_eq!(
            store.rotate(&first, UserId(1), &successor()).await.unwrap(),
            RotateOutcome::Replayed { revoked: 3 }
        );
        assert_eq!(store.live_len(), 0);
    }
}
