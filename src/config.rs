//! Proposer configuration.

use std::time::Duration;

/// Knobs for the proposal rounds.
#[derive(Debug, Clone)]
pub struct ProposeConfig {
    /// Bound on each per-peer prepare/accept call. A peer that does not
    /// reply in time counts as a non-confirmation carrying no ballot
    /// information.
    pub rpc_timeout: Duration,
}

impl Default for ProposeConfig {
    fn default() -> Self {
        Self {
            rpc_timeout: Duration::from_secs(3),
        }
    }
}
