//! Ballot numbers — the total order every protocol decision hangs off.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A ballot is a `(counter, node_id)` tuple. Proposers generate one per
/// request by combining a local increasing counter with their node id; the
/// derived ordering compares counters first and breaks ties by node id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Ballot {
    pub counter: u64,
    pub node_id: u64,
}

/// Size of the on-disk/on-wire ballot encoding.
pub const BALLOT_ENCODED_LEN: usize = 16;

impl Ballot {
    #[must_use]
    pub fn new(counter: u64, node_id: u64) -> Self {
        Self { counter, node_id }
    }

    /// Fixed-layout encoding: counter then node id, each u64 big-endian.
    /// Stable across nodes that share a store or a transport.
    #[must_use]
    pub fn encode(&self) -> [u8; BALLOT_ENCODED_LEN] {
        let mut buf = [0u8; BALLOT_ENCODED_LEN];
        buf[..8].copy_from_slice(&self.counter.to_be_bytes());
        buf[8..].copy_from_slice(&self.node_id.to_be_bytes());
        buf
    }

    /// Decode the fixed-layout form produced by [`Ballot::encode`].
    ///
    /// # Errors
    ///
    /// Returns [`BallotCodecError`] if `bytes` is not exactly
    /// [`BALLOT_ENCODED_LEN`] bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, BallotCodecError> {
        let Ok(buf) = <[u8; BALLOT_ENCODED_LEN]>::try_from(bytes) else {
            return Err(BallotCodecError { len: bytes.len() });
        };
        let counter = u64::from_be_bytes(buf[..8].try_into().expect("split at 8"));
        let node_id = u64::from_be_bytes(buf[8..].try_into().expect("split at 8"));
        Ok(Self { counter, node_id })
    }

    /// Decode a ballot slot as stored by the acceptor: a missing record or
    /// an empty record both mean "no ballot" (the accept path erases the
    /// promised slot by writing an empty record).
    ///
    /// # Errors
    ///
    /// Returns [`BallotCodecError`] for a non-empty record of the wrong
    /// length.
    pub fn decode_stored(record: Option<&[u8]>) -> Result<Option<Self>, BallotCodecError> {
        match record {
            None => Ok(None),
            Some([]) => Ok(None),
            Some(bytes) => Self::decode(bytes).map(Some),
        }
    }
}

impl fmt::Display for Ballot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.counter, self.node_id)
    }
}

/// The persisted ballot record had an unexpected length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BallotCodecError {
    len: usize,
}

impl fmt::Display for BallotCodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ballot record must be {BALLOT_ENCODED_LEN} bytes, found {}",
            self.len
        )
    }
}

impl std::error::Error for BallotCodecError {}
