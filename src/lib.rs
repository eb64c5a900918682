//! CASPaxos consensus library
//!
//! CASPaxos is a replicated state machine protocol without leader election
//! or log replication: per key, a cluster of 2F+1 symmetric nodes agrees on
//! a sequence of values, each produced by applying a client-supplied change
//! function to the previously agreed value. Any node coordinates a client
//! request through two quorum rounds (prepare, then accept) over all peers.
//!
//! # Architecture
//!
//! - [`core`]: the pure protocol state machine — decision functions, round
//!   tallies, view types. No I/O; shared with the model-checker tests.
//! - [`Acceptor`]: the durable per-node role, persisting promises and
//!   accepted values through a [`StableStore`] before every reply.
//! - [`Node`]: acceptor + proposer + peer list; exposes `propose`.
//! - [`Transport`]: the RPC seam between a proposer and a peer's acceptor,
//!   with [`wire`] defining the messages remote implementations exchange.
//!
//! # Quick start
//!
//! ```ignore
//! use std::sync::Arc;
//! use caspaxos::{change, wire_cluster, MemoryStore, Node};
//!
//! let nodes: Vec<_> = (1..=3)
//!     .map(|id| Node::new(id, Arc::new(MemoryStore::new())))
//!     .collect();
//! wire_cluster(&nodes);
//!
//! let value = nodes[0].propose(b"name", change::set("Marley")).await?;
//! assert_eq!(&value[..], b"Marley");
//! ```

#![warn(clippy::pedantic)]

mod acceptor;
mod ballot;
pub mod change;
mod config;
pub mod core;
mod error;
mod node;
mod proposer;
mod store;
mod transport;
pub mod wire;

pub use acceptor::Acceptor;
pub use ballot::{BALLOT_ENCODED_LEN, Ballot, BallotCodecError};
pub use config::ProposeConfig;
pub use self::core::{AcceptorView, KeyPhase};
pub use error::{
    AcceptorError, ChangeError, MIN_CLUSTER_SIZE, Phase, ProposeError, RpcError, StorageError,
};
pub use node::{Node, wire_cluster};
pub use store::{
    MemoryStore, StableStore, accepted_ballot_key, is_reserved_key, promised_ballot_key,
};
pub use transport::{LocalTransport, Transport};
