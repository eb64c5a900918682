//! Pure acceptor decision logic.
//!
//! The durable acceptor and the model-checker tests both call into this
//! module, so the checker verifies the same transitions as production code.

/// Decision functions for the two acceptor operations.
///
/// CASPaxos uses the same admission rule for both phases: a request at
/// ballot `b` proceeds unless a strictly higher ballot has already been
/// promised or accepted for the key. Unlike Multi-Paxos there is no
/// exact-promise-match requirement on accept; a proposer that was promised
/// `b` may be raced by a higher prepare, and the accept gate is what
/// rejects its now-stale write.
pub mod decision {
    use crate::ballot::Ballot;

    /// Whether `prepare(ballot)` may grant a promise.
    #[must_use]
    pub fn should_promise(
        ballot: Ballot,
        promised: Option<Ballot>,
        accepted: Option<Ballot>,
    ) -> bool {
        admits(ballot, promised, accepted)
    }

    /// Whether `accept(ballot)` may take the value.
    #[must_use]
    pub fn should_accept(
        ballot: Ballot,
        promised: Option<Ballot>,
        accepted: Option<Ballot>,
    ) -> bool {
        admits(ballot, promised, accepted)
    }

    fn admits(ballot: Ballot, promised: Option<Ballot>, accepted: Option<Ballot>) -> bool {
        let dominated_by_promise = promised.is_some_and(|p| p > ballot);
        let dominated_by_accept = accepted.is_some_and(|a| a > ballot);

        !dominated_by_promise && !dominated_by_accept
    }
}
