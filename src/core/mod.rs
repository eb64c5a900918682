//! Pure protocol core — no I/O, no async, no synchronization.
//!
//! Everything the protocol *decides* lives here, so that the durable
//! acceptor, the proposer runtime, and the model-checker tests all run the
//! exact same transitions:
//!
//! - [`types`]: the acceptor view reported in replies and the implicit
//!   per-key state machine
//! - [`acceptor`]: the admit/conflict decision functions
//! - [`quorum`]: the proposer-side round tallies

pub(crate) mod acceptor;
pub(crate) mod quorum;
pub(crate) mod types;

pub use acceptor::decision;
pub use quorum::{AcceptTally, PrepareTally};
pub use types::{AcceptorView, KeyPhase};
