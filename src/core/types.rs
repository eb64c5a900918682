//! Reply and state-classification types shared across the protocol.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::ballot::Ballot;

/// An acceptor's view of one key, as reported in replies.
///
/// A successful prepare reply carries `promised` = the granted ballot plus
/// whatever was already accepted; a conflict reply carries the ballots that
/// outrank the request so the proposer can advance past them.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AcceptorView {
    pub promised: Option<Ballot>,
    pub accepted: Option<Ballot>,
    pub value: Option<Bytes>,
}

impl AcceptorView {
    /// The highest ballot this view reports, across both slots.
    #[must_use]
    pub fn highest_ballot(&self) -> Option<Ballot> {
        self.promised.max(self.accepted)
    }

    /// Classify the view into the per-key protocol state.
    #[must_use]
    pub fn phase(&self) -> KeyPhase {
        match (self.promised, self.accepted) {
            (None, None) => KeyPhase::Empty,
            (Some(promised), None) => KeyPhase::Promised(promised),
            (None, Some(accepted)) => KeyPhase::Accepted(accepted),
            (Some(promised), Some(accepted)) => KeyPhase::PromisedOnAccepted {
                promised,
                accepted,
            },
        }
    }
}

/// The implicit per-key state machine, read off the two ballot slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyPhase {
    /// Nothing promised, nothing accepted.
    Empty,
    /// A promise stands and no value has ever been accepted.
    Promised(Ballot),
    /// A value is accepted and no newer promise outranks it.
    Accepted(Ballot),
    /// A newer promise stands over an older accepted value.
    PromisedOnAccepted { promised: Ballot, accepted: Ballot },
}
