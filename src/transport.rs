//! The intra-cluster RPC seam.
//!
//! A transport is how the proposer reaches one peer's acceptor. The local
//! implementation is a direct call; remote implementations serialize
//! [`crate::wire`] messages over whatever the embedder runs between nodes.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::acceptor::Acceptor;
use crate::ballot::Ballot;
use crate::core::AcceptorView;
use crate::error::RpcError;

/// Request/reply surface to one peer's acceptor.
///
/// Both calls are bounded by the proposer's RPC timeout; implementations do
/// not need their own. Conflicts travel as [`RpcError::Conflict`] so the
/// proposer can read the outranking ballots out of the reply.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn prepare(&self, ballot: Ballot, key: &[u8]) -> Result<AcceptorView, RpcError>;

    async fn accept(
        &self,
        ballot: Ballot,
        key: &[u8],
        value: Bytes,
    ) -> Result<AcceptorView, RpcError>;
}

/// In-process transport: invokes the target acceptor directly.
pub struct LocalTransport {
    acceptor: Arc<Acceptor>,
}

impl LocalTransport {
    #[must_use]
    pub fn new(acceptor: Arc<Acceptor>) -> Self {
        Self { acceptor }
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn prepare(&self, ballot: Ballot, key: &[u8]) -> Result<AcceptorView, RpcError> {
        self.acceptor
            .prepare(ballot, key)
            .await
            .map_err(RpcError::from)
    }

    async fn accept(
        &self,
        ballot: Ballot,
        key: &[u8],
        value: Bytes,
    ) -> Result<AcceptorView, RpcError> {
        self.acceptor
            .accept(ballot, key, value)
            .await
            .map_err(RpcError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn local_transport_relays_confirmations_and_conflicts() {
        let acceptor = Arc::new(Acceptor::new(1, Arc::new(MemoryStore::new())));
        let transport = LocalTransport::new(acceptor);

        let view = transport.prepare(Ballot::new(2, 1), b"k").await.unwrap();
        assert_eq!(view.promised, Some(Ballot::new(2, 1)));

        let err = transport.prepare(Ballot::new(1, 1), b"k").await.unwrap_err();
        assert!(matches!(err, RpcError::Conflict(_)));
    }
}
