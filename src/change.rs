//! Change functions — the client's half of the protocol.
//!
//! A change function is applied by the proposer between the two rounds: it
//! receives the currently agreed value (or `None` if the key has never held
//! one) and yields the value to propose. It must be deterministic and free
//! of side effects; an error aborts the proposal before the accept round.

use bytes::Bytes;

use crate::error::ChangeError;

/// Build a change function that overwrites the current value.
pub fn set(value: impl Into<Bytes>) -> impl FnOnce(Option<Bytes>) -> Result<Bytes, ChangeError> {
    let value = value.into();
    move |_current| Ok(value)
}

/// Build a change function that keeps the current value, committing it at
/// this proposal's ballot. An absent value reads as empty.
pub fn read() -> impl FnOnce(Option<Bytes>) -> Result<Bytes, ChangeError> {
    |current| Ok(current.unwrap_or_default())
}
