//! The proposer role: ballot generation, fan-out, and round accounting.
//!
//! A proposal is two quorum rounds over the peer list. Each round spawns
//! one task per peer and consumes completions in arrival order, feeding the
//! pure tallies in [`crate::core`]; the round returns the moment a majority
//! confirms, leaving stragglers to finish against their own acceptors.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, trace};

use crate::ballot::Ballot;
use crate::config::ProposeConfig;
use crate::core::{AcceptTally, AcceptorView, PrepareTally};
use crate::error::{ChangeError, MIN_CLUSTER_SIZE, Phase, ProposeError, RpcError};
use crate::node::Peer;
use crate::store::is_reserved_key;

pub(crate) struct Proposer {
    node_id: u64,
    counter: AtomicU64,
    config: ProposeConfig,
}

enum RoundCall {
    Prepare,
    Accept(Bytes),
}

impl Proposer {
    pub(crate) fn new(node_id: u64, config: ProposeConfig) -> Self {
        Self {
            node_id,
            counter: AtomicU64::new(0),
            config,
        }
    }

    /// The counter the next proposal will exceed.
    pub(crate) fn counter(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }

    fn next_ballot(&self) -> Ballot {
        Ballot::new(self.counter.fetch_add(1, Ordering::SeqCst) + 1, self.node_id)
    }

    /// Losing a round teaches us a higher ballot exists; make sure the next
    /// attempt exceeds it. Failures with no ballot information (timeouts,
    /// unreachable peers) do not advance the counter.
    fn observe_conflict(&self, highest: Option<Ballot>) {
        if let Some(ballot) = highest {
            self.counter.fetch_max(ballot.counter, Ordering::SeqCst);
        }
    }

    /// Run one full proposal: prepare, apply the change function, accept.
    #[instrument(skip_all, name = "propose", fields(node = self.node_id))]
    pub(crate) async fn propose<F>(
        &self,
        peers: &[Peer],
        key: Bytes,
        change: F,
    ) -> Result<Bytes, ProposeError>
    where
        F: FnOnce(Option<Bytes>) -> Result<Bytes, ChangeError>,
    {
        if is_reserved_key(&key) {
            return Err(ProposeError::ReservedKey);
        }
        if peers.len() < MIN_CLUSTER_SIZE {
            return Err(ProposeError::InsufficientPeers { got: peers.len() });
        }

        let ballot = self.next_ballot();

        let current = self.prepare_round(ballot, peers, &key).await?;
        let new_value = change(current).map_err(ProposeError::Change)?;
        self.accept_round(ballot, peers, &key, new_value.clone())
            .await?;

        Ok(new_value)
    }

    async fn prepare_round(
        &self,
        ballot: Ballot,
        peers: &[Peer],
        key: &Bytes,
    ) -> Result<Option<Bytes>, ProposeError> {
        let mut tally = PrepareTally::new(peers.len());
        debug!(%ballot, peers = peers.len(), needed = tally.needed(), "prepare round");

        let mut replies = self.fan_out(peers, ballot, key, &RoundCall::Prepare);
        while let Some(joined) = replies.next().await {
            let Ok((peer, reply)) = joined else {
                tally.failure();
                continue;
            };
            match reply {
                Ok(view) => {
                    trace!(peer, "prepare confirmed");
                    if let Some(current) = tally.confirm(view) {
                        debug!(%ballot, "prepare quorum reached");
                        return Ok(current);
                    }
                }
                Err(RpcError::Conflict(view)) => {
                    trace!(peer, outranked_by = ?view.highest_ballot(), "prepare conflicted");
                    tally.conflict(&view);
                }
                Err(err) => {
                    trace!(peer, %err, "prepare reply lost");
                    tally.failure();
                }
            }
        }

        self.observe_conflict(tally.highest_conflict());
        debug!(
            confirmations = tally.confirmations(),
            needed = tally.needed(),
            "prepare round failed"
        );
        Err(ProposeError::Quorum {
            phase: Phase::Prepare,
            confirmations: tally.confirmations(),
            needed: tally.needed(),
        })
    }

    async fn accept_round(
        &self,
        ballot: Ballot,
        peers: &[Peer],
        key: &Bytes,
        value: Bytes,
    ) -> Result<(), ProposeError> {
        let mut tally = AcceptTally::new(peers.len());
        debug!(%ballot, needed = tally.needed(), "accept round");

        let mut replies = self.fan_out(peers, ballot, key, &RoundCall::Accept(value));
        while let Some(joined) = replies.next().await {
            let Ok((peer, reply)) = joined else {
                tally.failure();
                continue;
            };
            match reply {
                Ok(_view) => {
                    trace!(peer, "accept confirmed");
                    if tally.confirm() {
                        debug!(%ballot, "accept quorum reached");
                        return Ok(());
                    }
                }
                Err(RpcError::Conflict(view)) => {
                    trace!(peer, outranked_by = ?view.highest_ballot(), "accept conflicted");
                    tally.conflict(&view);
                }
                Err(err) => {
                    trace!(peer, %err, "accept reply lost");
                    tally.failure();
                }
            }
        }

        self.observe_conflict(tally.highest_conflict());
        debug!(
            confirmations = tally.confirmations(),
            needed = tally.needed(),
            "accept round failed"
        );
        Err(ProposeError::Quorum {
            phase: Phase::Accept,
            confirmations: tally.confirmations(),
            needed: tally.needed(),
        })
    }

    /// One task per peer, each bounded by the RPC timeout. Returning early
    /// from the consuming loop detaches the remaining tasks rather than
    /// cancelling them; the acceptor's work is durable before it replies,
    /// so stragglers are harmless.
    fn fan_out(
        &self,
        peers: &[Peer],
        ballot: Ballot,
        key: &Bytes,
        call: &RoundCall,
    ) -> FuturesUnordered<JoinHandle<(u64, Result<AcceptorView, RpcError>)>> {
        peers
            .iter()
            .map(|peer| {
                let transport = peer.transport();
                let peer_id = peer.id();
                let key = key.clone();
                let bound = self.config.rpc_timeout;
                let value = match call {
                    RoundCall::Prepare => None,
                    RoundCall::Accept(value) => Some(value.clone()),
                };
                tokio::spawn(async move {
                    let request = async {
                        match value {
                            None => transport.prepare(ballot, &key).await,
                            Some(value) => transport.accept(ballot, &key, value).await,
                        }
                    };
                    let reply = match tokio::time::timeout(bound, request).await {
                        Ok(reply) => reply,
                        Err(_) => Err(RpcError::Timeout(bound)),
                    };
                    (peer_id, reply)
                })
            })
            .collect()
    }
}
