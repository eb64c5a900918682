//! Wire message shapes for remote transports.
//!
//! The core does not prescribe a socket protocol, but both halves of a
//! remote transport must agree on the request and reply payloads. These are
//! those payloads, with a compact byte codec; an embedder frames and ships
//! them however it likes.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::ballot::Ballot;
use crate::core::AcceptorView;
use crate::error::{AcceptorError, RpcError, StorageError};

/// A proposer-to-acceptor request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    Prepare { ballot: Ballot, key: Bytes },
    Accept { ballot: Ballot, key: Bytes, value: Bytes },
}

/// An acceptor-to-proposer reply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    /// The request was admitted; here is the resulting view.
    Confirm(AcceptorView),
    /// A strictly higher ballot outranks the request; here is the view
    /// that outranks it.
    Conflict(AcceptorView),
    /// The acceptor failed locally (storage); the message is relayed.
    Failed(String),
}

impl Reply {
    /// Build the reply for an acceptor-side result.
    #[must_use]
    pub fn from_result(result: Result<AcceptorView, AcceptorError>) -> Self {
        match result {
            Ok(view) => Reply::Confirm(view),
            Err(AcceptorError::Conflict(view)) => Reply::Conflict(view),
            Err(AcceptorError::Storage(e)) => Reply::Failed(e.to_string()),
        }
    }

    /// Interpret the reply on the proposer side.
    ///
    /// # Errors
    ///
    /// [`RpcError::Conflict`] or [`RpcError::Storage`] for the matching
    /// reply variants.
    pub fn into_result(self) -> Result<AcceptorView, RpcError> {
        match self {
            Reply::Confirm(view) => Ok(view),
            Reply::Conflict(view) => Err(RpcError::Conflict(view)),
            Reply::Failed(message) => Err(RpcError::Storage(StorageError::new(message))),
        }
    }
}

/// Encode a message for the wire.
///
/// # Errors
///
/// Returns [`WireError`] if serialization fails.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, WireError> {
    postcard::to_allocvec(message).map_err(WireError)
}

/// Decode a message off the wire.
///
/// # Errors
///
/// Returns [`WireError`] for malformed bytes.
pub fn decode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, WireError> {
    postcard::from_bytes(bytes).map_err(WireError)
}

/// A message could not be encoded or decoded.
#[derive(Debug)]
pub struct WireError(postcard::Error);

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "wire codec failed: {}", self.0)
    }
}

impl std::error::Error for WireError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}
