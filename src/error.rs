//! Error taxonomy for the protocol core.

use std::fmt;
use std::time::Duration;

use crate::ballot::BallotCodecError;
use crate::core::AcceptorView;

/// Minimum cluster size for consensus to make progress.
pub const MIN_CLUSTER_SIZE: usize = 3;

/// Boxed error returned by a client-supplied change function.
pub type ChangeError = Box<dyn std::error::Error + Send + Sync>;

/// The stable store failed on a get or set, or a persisted ballot record
/// was unreadable. Not a conflict: the affected peer simply contributes a
/// non-confirmation.
#[derive(Debug)]
pub struct StorageError {
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StorageError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    #[must_use]
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<BallotCodecError> for StorageError {
    fn from(e: BallotCodecError) -> Self {
        StorageError::with_source("corrupt persisted ballot record", e)
    }
}

/// An acceptor's rejection or local failure.
#[derive(Debug)]
pub enum AcceptorError {
    /// The acceptor already saw a strictly higher ballot. Carries the
    /// ballots it observed so the proposer can advance past them.
    Conflict(AcceptorView),
    /// The acceptor's stable store failed.
    Storage(StorageError),
}

impl fmt::Display for AcceptorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcceptorError::Conflict(view) => match view.highest_ballot() {
                Some(ballot) => write!(f, "outranked by ballot {ballot}"),
                None => f.write_str("outranked by a higher ballot"),
            },
            AcceptorError::Storage(e) => write!(f, "stable store failed: {e}"),
        }
    }
}

impl std::error::Error for AcceptorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AcceptorError::Conflict(_) => None,
            AcceptorError::Storage(e) => Some(e),
        }
    }
}

impl From<StorageError> for AcceptorError {
    fn from(e: StorageError) -> Self {
        AcceptorError::Storage(e)
    }
}

/// A transport-level reply: what the proposer sees from one peer.
#[derive(Debug)]
pub enum RpcError {
    /// The peer's acceptor reported a conflict.
    Conflict(AcceptorView),
    /// The peer's acceptor hit a storage failure (possibly relayed).
    Storage(StorageError),
    /// The peer did not reply within the configured bound.
    Timeout(Duration),
    /// The peer could not be reached at all.
    Unreachable(String),
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcError::Conflict(view) => match view.highest_ballot() {
                Some(ballot) => write!(f, "peer reported conflicting ballot {ballot}"),
                None => f.write_str("peer reported a conflict"),
            },
            RpcError::Storage(e) => write!(f, "peer storage failed: {e}"),
            RpcError::Timeout(bound) => write!(f, "peer did not reply within {bound:?}"),
            RpcError::Unreachable(reason) => write!(f, "peer unreachable: {reason}"),
        }
    }
}

impl std::error::Error for RpcError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RpcError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AcceptorError> for RpcError {
    fn from(e: AcceptorError) -> Self {
        match e {
            AcceptorError::Conflict(view) => RpcError::Conflict(view),
            AcceptorError::Storage(e) => RpcError::Storage(e),
        }
    }
}

/// Which round of a proposal failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Prepare,
    Accept,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Prepare => f.write_str("prepare"),
            Phase::Accept => f.write_str("accept"),
        }
    }
}

/// The client-facing failure of a `propose` call.
#[derive(Debug)]
pub enum ProposeError {
    /// The key matches a reserved ballot-key derivation. Rejected before
    /// any RPC is issued.
    ReservedKey,
    /// The peer list is smaller than [`MIN_CLUSTER_SIZE`]. Rejected before
    /// any RPC is issued.
    InsufficientPeers { got: usize },
    /// A round finished without gathering a quorum of confirmations. The
    /// proposer's ballot counter has already been advanced past the highest
    /// conflict it observed; the client may retry.
    Quorum {
        phase: Phase,
        confirmations: usize,
        needed: usize,
    },
    /// The client-supplied change function failed; the accept round was
    /// skipped.
    Change(ChangeError),
}

impl fmt::Display for ProposeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProposeError::ReservedKey => {
                f.write_str("key collides with the reserved ballot-key prefixes")
            }
            ProposeError::InsufficientPeers { got } => write!(
                f,
                "cluster has {got} peers, consensus needs at least {MIN_CLUSTER_SIZE}"
            ),
            ProposeError::Quorum {
                phase,
                confirmations,
                needed,
            } => write!(
                f,
                "{phase} round gathered {confirmations} of {needed} needed confirmations"
            ),
            ProposeError::Change(_) => f.write_str("change function failed"),
        }
    }
}

impl std::error::Error for ProposeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProposeError::Change(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ballot::Ballot;

    #[test]
    fn conflict_display_names_the_winning_ballot() {
        let err = AcceptorError::Conflict(AcceptorView {
            promised: Some(Ballot::new(4, 2)),
            accepted: Some(Ballot::new(3, 1)),
            value: None,
        });
        assert_eq!(err.to_string(), "outranked by ballot (4, 2)");
    }

    #[test]
    fn storage_error_chains_its_source() {
        let err = StorageError::with_source("write failed", std::io::Error::other("disk gone"));
        let source = std::error::Error::source(&err).expect("source");
        assert_eq!(source.to_string(), "disk gone");
    }

    #[test]
    fn quorum_error_reports_both_counts() {
        let err = ProposeError::Quorum {
            phase: Phase::Prepare,
            confirmations: 1,
            needed: 2,
        };
        assert_eq!(
            err.to_string(),
            "prepare round gathered 1 of 2 needed confirmations"
        );
    }
}
