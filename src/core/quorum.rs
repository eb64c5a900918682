//! Pure proposer-side round tallies.
//!
//! A tally consumes peer replies in arrival order and reports the moment
//! quorum is reached. It never talks to the network; the runtime proposer
//! feeds it and the model checker drives it directly.

use bytes::Bytes;

use crate::ballot::Ballot;
use crate::core::types::AcceptorView;

/// Majority quorum for a cluster of `peers` acceptors.
///
/// Equal to F+1 for the odd clusters the protocol is specified over
/// (N = 2F+1), and the safe majority for even N.
#[must_use]
pub(crate) fn quorum(peers: usize) -> usize {
    peers / 2 + 1
}

/// Tally for the prepare round.
///
/// Tracks confirmations toward quorum, adopts the value carried by the
/// highest accepted ballot among confirming peers, and remembers the
/// highest ballot reported by any conflicting peer so the proposer can
/// advance past it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct PrepareTally {
    needed: usize,
    confirmations: usize,
    conflicts: usize,
    failures: usize,
    highest_accepted: Option<Ballot>,
    current_value: Option<Bytes>,
    highest_conflict: Option<Ballot>,
}

impl PrepareTally {
    #[must_use]
    pub fn new(peers: usize) -> Self {
        Self {
            needed: quorum(peers),
            ..Self::default()
        }
    }

    /// Record a confirming reply.
    ///
    /// Returns `Some(current_value)` at the moment quorum is reached; the
    /// inner `Option` is the value to feed the change function (`None` when
    /// no confirming peer carried one).
    pub fn confirm(&mut self, view: AcceptorView) -> Option<Option<Bytes>> {
        self.confirmations += 1;

        // Adopt the value under the highest accepted ballot seen so far.
        // Absent compares lowest; equal ballots are last writer wins, which
        // also picks up a pre-seeded value no round has ever ballotted.
        if view.accepted >= self.highest_accepted {
            self.highest_accepted = view.accepted;
            self.current_value = view.value;
        }

        (self.confirmations >= self.needed).then(|| self.current_value.clone())
    }

    /// Record a conflicting reply, tracking the highest ballot it reported.
    pub fn conflict(&mut self, view: &AcceptorView) {
        self.conflicts += 1;
        self.highest_conflict = self.highest_conflict.max(view.highest_ballot());
    }

    /// Record a reply that carried no ballot information (transport or
    /// storage failure, timeout).
    pub fn failure(&mut self) {
        self.failures += 1;
    }

    #[must_use]
    pub fn confirmations(&self) -> usize {
        self.confirmations
    }

    #[must_use]
    pub fn needed(&self) -> usize {
        self.needed
    }

    #[must_use]
    pub fn conflicts(&self) -> usize {
        self.conflicts
    }

    #[must_use]
    pub fn failures(&self) -> usize {
        self.failures
    }

    /// The highest ballot any conflicting peer reported, if any.
    #[must_use]
    pub fn highest_conflict(&self) -> Option<Ballot> {
        self.highest_conflict
    }
}

/// Tally for the accept round. Same accounting as the prepare tally minus
/// value adoption: the value is already fixed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct AcceptTally {
    needed: usize,
    confirmations: usize,
    conflicts: usize,
    failures: usize,
    highest_conflict: Option<Ballot>,
}

impl AcceptTally {
    #[must_use]
    pub fn new(peers: usize) -> Self {
        Self {
            needed: quorum(peers),
            ..Self::default()
        }
    }

    /// Record a confirming reply. Returns true at the moment quorum is
    /// reached.
    pub fn confirm(&mut self) -> bool {
        self.confirmations += 1;
        self.confirmations >= self.needed
    }

    /// Record a conflicting reply, tracking the highest ballot it reported.
    pub fn conflict(&mut self, view: &AcceptorView) {
        self.conflicts += 1;
        self.highest_conflict = self.highest_conflict.max(view.highest_ballot());
    }

    /// Record a reply that carried no ballot information.
    pub fn failure(&mut self) {
        self.failures += 1;
    }

    #[must_use]
    pub fn confirmations(&self) -> usize {
        self.confirmations
    }

    #[must_use]
    pub fn needed(&self) -> usize {
        self.needed
    }

    #[must_use]
    pub fn conflicts(&self) -> usize {
        self.conflicts
    }

    #[must_use]
    pub fn failures(&self) -> usize {
        self.failures
    }

    /// The highest ballot any conflicting peer reported, if any.
    #[must_use]
    pub fn highest_conflict(&self) -> Option<Ballot> {
        self.highest_conflict
    }
}
