//! The durable storage contract and the reserved-key layout.
//!
//! For a user key `K` the acceptor persists three records: the accepted
//! value at `K` itself, and the accepted/promised ballots under two derived
//! keys built from sentinel prefixes. The prefixes are UUID-stamped so no
//! application key can collide by accident, and the proposer refuses any
//! client key that matches either derivation.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};

use crate::error::StorageError;

const ACCEPTED_BALLOT_PREFIX: &[u8] =
    b"__accepted_ballot__1d3f60ce-5f82-4e0b-9a41-c2b7a9d04e13__86aa1c52-7b9e-4d37-b0f5-2ee84c6091d7.";
const PROMISED_BALLOT_PREFIX: &[u8] =
    b"__promised_ballot__4b07e9aa-63c1-4f7e-8d2a-51f9b3c8e604__d92f04b1-88a6-4c15-9e73-0a6d5e27c4f8.";

/// The derived key holding the accepted ballot for `key`.
#[must_use]
pub fn accepted_ballot_key(key: &[u8]) -> Bytes {
    derive(ACCEPTED_BALLOT_PREFIX, key)
}

/// The derived key holding the promised ballot for `key`.
#[must_use]
pub fn promised_ballot_key(key: &[u8]) -> Bytes {
    derive(PROMISED_BALLOT_PREFIX, key)
}

/// Whether `key` collides with either ballot-key derivation and must be
/// rejected as a client key.
#[must_use]
pub fn is_reserved_key(key: &[u8]) -> bool {
    key.starts_with(ACCEPTED_BALLOT_PREFIX) || key.starts_with(PROMISED_BALLOT_PREFIX)
}

fn derive(prefix: &[u8], key: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(prefix.len() + key.len());
    buf.put_slice(prefix);
    buf.put_slice(key);
    buf.freeze()
}

/// Stable storage required of embedders.
///
/// Absence is `Ok(None)`, distinct from failure. The acceptor serializes
/// mutations per key, so the store itself does not need to be safe against
/// concurrent writers to one key — but each successful `set` must survive a
/// process crash (best-effort fsync is acceptable).
#[async_trait]
pub trait StableStore: Send + Sync {
    /// Read the record at `key`, `None` if it was never written.
    async fn get(&self, key: &[u8]) -> Result<Option<Bytes>, StorageError>;

    /// Durably write the record at `key`. An empty value written to the
    /// promised-ballot slot means erasure.
    async fn set(&self, key: &[u8], value: Bytes) -> Result<(), StorageError>;

    /// Convenience integer read; unused by the protocol core.
    async fn get_u64(&self, key: &[u8]) -> Result<Option<u64>, StorageError> {
        match self.get(key).await? {
            None => Ok(None),
            Some(bytes) => {
                let buf: [u8; 8] = bytes.as_ref().try_into().map_err(|_| {
                    StorageError::new(format!(
                        "integer record must be 8 bytes, found {}",
                        bytes.len()
                    ))
                })?;
                Ok(Some(u64::from_be_bytes(buf)))
            }
        }
    }

    /// Convenience integer write; unused by the protocol core.
    async fn set_u64(&self, key: &[u8], value: u64) -> Result<(), StorageError> {
        self.set(key, Bytes::copy_from_slice(&value.to_be_bytes()))
            .await
    }
}

/// In-memory [`StableStore`] for tests and single-process clusters.
///
/// Internally thread-safe, so several nodes may share one instance — though
/// fault-independent deployments should give each node its own store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<Bytes, Bytes>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record without going through consensus. Test setup only.
    pub fn insert(&self, key: impl Into<Bytes>, value: impl Into<Bytes>) {
        self.records
            .write()
            .expect("store lock poisoned")
            .insert(key.into(), value.into());
    }
}

#[async_trait]
impl StableStore for MemoryStore {
    async fn get(&self, key: &[u8]) -> Result<Option<Bytes>, StorageError> {
        Ok(self
            .records
            .read()
            .expect("store lock poisoned")
            .get(key)
            .cloned())
    }

    async fn set(&self, key: &[u8], value: Bytes) -> Result<(), StorageError> {
        self.records
            .write()
            .expect("store lock poisoned")
            .insert(Bytes::copy_from_slice(key), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn absent_is_not_an_error() {
        let store = MemoryStore::new();
        assert_eq!(store.get(b"missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = MemoryStore::new();
        store
            .set(b"k", Bytes::from_static(b"v"))
            .await
            .unwrap();
        assert_eq!(
            store.get(b"k").await.unwrap(),
            Some(Bytes::from_static(b"v"))
        );
    }

    #[tokio::test]
    async fn empty_value_is_stored_not_deleted() {
        let store = MemoryStore::new();
        store.set(b"k", Bytes::new()).await.unwrap();
        assert_eq!(store.get(b"k").await.unwrap(), Some(Bytes::new()));
    }

    #[tokio::test]
    async fn u64_helpers_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(store.get_u64(b"n").await.unwrap(), None);
        store.set_u64(b"n", 99).await.unwrap();
        assert_eq!(store.get_u64(b"n").await.unwrap(), Some(99));
    }

    #[tokio::test]
    async fn u64_get_rejects_malformed_records() {
        let store = MemoryStore::new();
        store.set(b"n", Bytes::from_static(b"abc")).await.unwrap();
        assert!(store.get_u64(b"n").await.is_err());
    }

    #[test]
    fn derived_keys_are_reserved_and_distinct() {
        let accepted = accepted_ballot_key(b"user");
        let promised = promised_ballot_key(b"user");

        assert_ne!(accepted, promised);
        assert!(is_reserved_key(&accepted));
        assert!(is_reserved_key(&promised));
        assert!(!is_reserved_key(b"user"));
    }

    #[test]
    fn derivations_of_distinct_keys_are_distinct() {
        assert_ne!(accepted_ballot_key(b"a"), accepted_ballot_key(b"b"));
        assert_ne!(promised_ballot_key(b"a"), promised_ballot_key(b"b"));
    }

    #[test]
    fn nested_derivations_stay_reserved() {
        let nested = accepted_ballot_key(&promised_ballot_key(b"k"));
        assert!(is_reserved_key(&nested));
    }
}
