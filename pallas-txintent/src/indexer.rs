//! Chain data sources consumed while completing a transaction.

use std::sync::atomic::{AtomicUsize, Ordering};

use pallas_addresses::Address;
use thiserror::Error;

use crate::{
    model::{Delegation, RewardAddress, Utxo},
    params::ProtocolParams,
};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IndexerError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Decoding(String),

    #[error("{0} not found")]
    NotFound(String),
}

/// A client of a service indexing the chain.
///
/// The builder treats whatever it returns as already validated.
#[trait_variant::make(ChainIndexer: Send)]
pub trait LocalChainIndexer {
    async fn utxos_at(&self, address: &Address) -> Result<Vec<Utxo>, IndexerError>;

    async fn protocol_params(&self) -> Result<ProtocolParams, IndexerError>;

    /// `None` when the stake credential is not registered.
    async fn delegation(
        &self,
        reward_address: &RewardAddress,
    ) -> Result<Option<Delegation>, IndexerError>;
}

/// A fixed, in-memory view of the chain.
#[derive(Debug, Default)]
pub struct MemoryIndexer {
    utxos: Vec<Utxo>,
    delegations: Vec<(RewardAddress, Delegation)>,
    protocol: ProtocolParams,
    calls: AtomicUsize,
}

impl MemoryIndexer {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_utxos(mut self, utxos: impl IntoIterator<Item = Utxo>) -> Self {
        self.utxos.extend(utxos);
        self
    }

    pub fn with_delegation(mut self, reward_address: RewardAddress, delegation: Delegation) -> Self {
        self.delegations.push((reward_address, delegation));
        self
    }

    pub fn with_protocol(mut self, protocol: ProtocolParams) -> Self {
        self.protocol = protocol;
        self
    }

    /// Number of queries served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl ChainIndexer for MemoryIndexer {
    async fn utxos_at(&self, address: &Address) -> Result<Vec<Utxo>, IndexerError> {
        self.hit();

        Ok(self
            .utxos
            .iter()
            .filter(|x| &x.address == address)
            .cloned()
            .collect())
    }

    async fn protocol_params(&self) -> Result<ProtocolParams, IndexerError> {
        self.hit();

        Ok(self.protocol.clone())
    }

    async fn delegation(
        &self,
        reward_address: &RewardAddress,
    ) -> Result<Option<Delegation>, IndexerError> {
        self.hit();

        Ok(self
            .delegations
            .iter()
            .find(|(x, _)| x == reward_address)
            .map(|(_, d)| *d))
    }
}
