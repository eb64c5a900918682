//! The durable acceptor role.
//!
//! An acceptor serves prepare/accept for any key against its stable store:
//! load the key's view, consult the decision functions, persist before
//! replying. State is entirely in the store; the only in-memory piece is a
//! lock table serializing the two operations per key.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, trace};

use crate::ballot::Ballot;
use crate::core::{AcceptorView, decision};
use crate::error::{AcceptorError, StorageError};
use crate::store::{StableStore, accepted_ballot_key, promised_ballot_key};

/// Per-node durable state machine answering prepare/accept.
pub struct Acceptor {
    id: u64,
    store: Arc<dyn StableStore>,
    locks: KeyLocks,
}

impl Acceptor {
    #[must_use]
    pub fn new(id: u64, store: Arc<dyn StableStore>) -> Self {
        Self {
            id,
            store,
            locks: KeyLocks::default(),
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Phase 1: promise not to honor any ballot below `ballot` for `key`.
    ///
    /// On success the promise is durable before the reply, and the reply
    /// carries whatever this acceptor has already accepted so the proposer
    /// can pick the current value.
    ///
    /// # Errors
    ///
    /// [`AcceptorError::Conflict`] if a strictly higher ballot was already
    /// promised or accepted; [`AcceptorError::Storage`] if the store failed.
    pub async fn prepare(&self, ballot: Ballot, key: &[u8]) -> Result<AcceptorView, AcceptorError> {
        let _guard = self.locks.acquire(key).await;
        let (value, accepted, promised) = self.load(key).await?;

        if let Some(accepted) = accepted
            && !decision::should_promise(ballot, None, Some(accepted))
        {
            trace!(acceptor = self.id, %ballot, %accepted, "prepare outranked by accepted ballot");
            return Err(AcceptorError::Conflict(AcceptorView {
                promised: None,
                accepted: Some(accepted),
                value,
            }));
        }

        if let Some(promised) = promised
            && !decision::should_promise(ballot, Some(promised), None)
        {
            trace!(acceptor = self.id, %ballot, %promised, "prepare outranked by promised ballot");
            return Err(AcceptorError::Conflict(AcceptorView {
                promised: Some(promised),
                accepted,
                value,
            }));
        }

        self.store
            .set(
                &promised_ballot_key(key),
                Bytes::copy_from_slice(&ballot.encode()),
            )
            .await
            .map_err(|e| self.storage("persist promised ballot", e))?;

        debug!(acceptor = self.id, %ballot, "promised");
        Ok(AcceptorView {
            promised: Some(ballot),
            accepted,
            value,
        })
    }

    /// Phase 2: take `value` at `ballot` for `key`.
    ///
    /// On success the promise is erased and the accepted ballot and value
    /// are durable before the reply. The writes are per-record in a fixed
    /// order (promise erase, accepted ballot, value); a crash between the
    /// last two leaves a stale value under an advanced ballot, repaired by
    /// the next quorum round.
    ///
    /// # Errors
    ///
    /// [`AcceptorError::Conflict`] if a strictly higher ballot was already
    /// promised or accepted; [`AcceptorError::Storage`] if the store failed.
    pub async fn accept(
        &self,
        ballot: Ballot,
        key: &[u8],
        value: Bytes,
    ) -> Result<AcceptorView, AcceptorError> {
        let _guard = self.locks.acquire(key).await;
        let (current, accepted, promised) = self.load(key).await?;

        if let Some(accepted) = accepted
            && !decision::should_accept(ballot, None, Some(accepted))
        {
            trace!(acceptor = self.id, %ballot, %accepted, "accept outranked by accepted ballot");
            return Err(AcceptorError::Conflict(AcceptorView {
                promised: None,
                accepted: Some(accepted),
                value: current,
            }));
        }

        if let Some(promised) = promised
            && !decision::should_accept(ballot, Some(promised), None)
        {
            trace!(acceptor = self.id, %ballot, %promised, "accept outranked by promised ballot");
            return Err(AcceptorError::Conflict(AcceptorView {
                promised: Some(promised),
                accepted,
                value: current,
            }));
        }

        self.store
            .set(&promised_ballot_key(key), Bytes::new())
            .await
            .map_err(|e| self.storage("erase promised ballot", e))?;
        self.store
            .set(
                &accepted_ballot_key(key),
                Bytes::copy_from_slice(&ballot.encode()),
            )
            .await
            .map_err(|e| self.storage("persist accepted ballot", e))?;
        self.store
            .set(key, value.clone())
            .await
            .map_err(|e| self.storage("persist value", e))?;

        debug!(acceptor = self.id, %ballot, "accepted");
        Ok(AcceptorView {
            promised: None,
            accepted: Some(ballot),
            value: Some(value),
        })
    }

    /// Load the key's full view, treating absence as empty state.
    async fn load(
        &self,
        key: &[u8],
    ) -> Result<(Option<Bytes>, Option<Ballot>, Option<Ballot>), AcceptorError> {
        let value = self
            .store
            .get(key)
            .await
            .map_err(|e| self.storage("read value", e))?;

        let accepted_record = self
            .store
            .get(&accepted_ballot_key(key))
            .await
            .map_err(|e| self.storage("read accepted ballot", e))?;
        let accepted = Ballot::decode_stored(accepted_record.as_deref())
            .map_err(StorageError::from)?;

        let promised_record = self
            .store
            .get(&promised_ballot_key(key))
            .await
            .map_err(|e| self.storage("read promised ballot", e))?;
        let promised = Ballot::decode_stored(promised_record.as_deref())
            .map_err(StorageError::from)?;

        Ok((value, accepted, promised))
    }

    fn storage(&self, op: &str, e: StorageError) -> AcceptorError {
        AcceptorError::Storage(StorageError::with_source(
            format!("acceptor {}: unable to {op}", self.id),
            e,
        ))
    }
}

/// Lock table serializing prepare/accept per key. Different keys proceed
/// concurrently; the async mutex is held across the storage writes.
#[derive(Default)]
struct KeyLocks {
    table: Mutex<HashMap<Bytes, Arc<AsyncMutex<()>>>>,
}

impl KeyLocks {
    async fn acquire(&self, key: &[u8]) -> OwnedMutexGuard<()> {
        let lock = {
            let mut table = self.table.lock().expect("lock table poisoned");
            table
                .entry(Bytes::copy_from_slice(key))
                .or_default()
                .clone()
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::core::KeyPhase;
    use crate::store::MemoryStore;

    fn acceptor() -> (Acceptor, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (Acceptor::new(1, store.clone()), store)
    }

    fn conflict_view(result: Result<AcceptorView, AcceptorError>) -> AcceptorView {
        match result {
            Err(AcceptorError::Conflict(view)) => view,
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn prepare_on_empty_key_grants_and_persists_the_promise() {
        let (acceptor, store) = acceptor();
        let ballot = Ballot::new(1, 1);

        let view = acceptor.prepare(ballot, b"k").await.unwrap();
        assert_eq!(view.phase(), KeyPhase::Promised(ballot));
        assert_eq!(view.value, None);

        let record = store.get(&promised_ballot_key(b"k")).await.unwrap();
        assert_eq!(record.as_deref(), Some(ballot.encode().as_slice()));
    }

    #[tokio::test]
    async fn prepare_conflicts_below_a_standing_promise() {
        let (acceptor, _store) = acceptor();
        acceptor.prepare(Ballot::new(2, 1), b"k").await.unwrap();

        let view = conflict_view(acceptor.prepare(Ballot::new(1, 1), b"k").await);
        assert_eq!(view.promised, Some(Ballot::new(2, 1)));
        assert_eq!(view.accepted, None);
    }

    #[tokio::test]
    async fn prepare_at_equal_counter_is_decided_by_node_id() {
        let (acceptor, _store) = acceptor();
        acceptor.prepare(Ballot::new(1, 2), b"k").await.unwrap();

        // lower node id loses the tie
        let view = conflict_view(acceptor.prepare(Ballot::new(1, 1), b"k").await);
        assert_eq!(view.promised, Some(Ballot::new(1, 2)));

        // higher node id takes over the promise
        let view = acceptor.prepare(Ballot::new(1, 3), b"k").await.unwrap();
        assert_eq!(view.promised, Some(Ballot::new(1, 3)));
    }

    #[tokio::test]
    async fn prepare_reports_previously_accepted_state() {
        let (acceptor, _store) = acceptor();
        let first = Ballot::new(1, 1);
        acceptor.prepare(first, b"k").await.unwrap();
        acceptor
            .accept(first, b"k", Bytes::from_static(b"v"))
            .await
            .unwrap();

        let view = acceptor.prepare(Ballot::new(2, 1), b"k").await.unwrap();
        assert_eq!(view.accepted, Some(first));
        assert_eq!(view.value, Some(Bytes::from_static(b"v")));
    }

    #[tokio::test]
    async fn accept_erases_the_promise_and_persists_ballot_then_value() {
        let (acceptor, store) = acceptor();
        let ballot = Ballot::new(1, 1);
        acceptor.prepare(ballot, b"k").await.unwrap();

        let view = acceptor
            .accept(ballot, b"k", Bytes::from_static(b"v"))
            .await
            .unwrap();
        assert_eq!(view.phase(), KeyPhase::Accepted(ballot));

        // full persisted layout for the key
        assert_eq!(
            store.get(&promised_ballot_key(b"k")).await.unwrap(),
            Some(Bytes::new())
        );
        assert_eq!(
            store
                .get(&accepted_ballot_key(b"k"))
                .await
                .unwrap()
                .as_deref(),
            Some(ballot.encode().as_slice())
        );
        assert_eq!(
            store.get(b"k").await.unwrap(),
            Some(Bytes::from_static(b"v"))
        );
    }

    #[tokio::test]
    async fn accept_conflicts_below_a_standing_promise() {
        let (acceptor, store) = acceptor();
        acceptor.prepare(Ballot::new(2, 2), b"k").await.unwrap();

        let view = conflict_view(
            acceptor
                .accept(Ballot::new(1, 1), b"k", Bytes::from_static(b"v"))
                .await,
        );
        assert_eq!(view.promised, Some(Ballot::new(2, 2)));
        assert_eq!(store.get(b"k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn accepted_ballots_never_regress() {
        let (acceptor, _store) = acceptor();
        let high = Ballot::new(3, 1);
        acceptor.prepare(high, b"k").await.unwrap();
        acceptor
            .accept(high, b"k", Bytes::from_static(b"newer"))
            .await
            .unwrap();

        let view = conflict_view(acceptor.prepare(Ballot::new(2, 1), b"k").await);
        assert_eq!(view.accepted, Some(high));
        assert_eq!(view.value, Some(Bytes::from_static(b"newer")));

        let view = conflict_view(
            acceptor
                .accept(Ballot::new(2, 1), b"k", Bytes::from_static(b"older"))
                .await,
        );
        assert_eq!(view.accepted, Some(high));
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let (acceptor, _store) = acceptor();
        acceptor.prepare(Ballot::new(9, 1), b"busy").await.unwrap();

        // a promise on one key never outranks another key
        let view = acceptor.prepare(Ballot::new(1, 1), b"idle").await.unwrap();
        assert_eq!(view.promised, Some(Ballot::new(1, 1)));
    }

    #[tokio::test]
    async fn empty_value_is_a_valid_accepted_value() {
        let (acceptor, store) = acceptor();
        let ballot = Ballot::new(1, 1);
        acceptor.prepare(ballot, b"k").await.unwrap();
        acceptor.accept(ballot, b"k", Bytes::new()).await.unwrap();

        assert_eq!(store.get(b"k").await.unwrap(), Some(Bytes::new()));

        let view = acceptor.prepare(Ballot::new(2, 1), b"k").await.unwrap();
        assert_eq!(view.value, Some(Bytes::new()));
    }

    struct BrokenStore;

    #[async_trait]
    impl StableStore for BrokenStore {
        async fn get(&self, _key: &[u8]) -> Result<Option<Bytes>, StorageError> {
            Err(StorageError::new("disk on fire"))
        }

        async fn set(&self, _key: &[u8], _value: Bytes) -> Result<(), StorageError> {
            Err(StorageError::new("disk on fire"))
        }
    }

    #[tokio::test]
    async fn storage_failures_surface_as_storage_errors() {
        let acceptor = Acceptor::new(7, Arc::new(BrokenStore));

        let err = acceptor.prepare(Ballot::new(1, 1), b"k").await.unwrap_err();
        assert!(matches!(err, AcceptorError::Storage(_)));

        let err = acceptor
            .accept(Ballot::new(1, 1), b"k", Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AcceptorError::Storage(_)));
    }

    #[tokio::test]
    async fn corrupt_ballot_record_is_a_storage_error() {
        let (acceptor, store) = acceptor();
        store.insert(accepted_ballot_key(b"k"), Bytes::from_static(b"junk"));

        let err = acceptor.prepare(Ballot::new(1, 1), b"k").await.unwrap_err();
        assert!(matches!(err, AcceptorError::Storage(_)));
    }
}
