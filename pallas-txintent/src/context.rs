use std::sync::Arc;

use indexmap::IndexMap;
use pallas_addresses::Address;

use crate::{
    intent::Intent,
    model::{Script, ScriptKey, UtxoRef},
    params::NetworkParams,
};

/// What every builder of a session shares: network parameters, the chain
/// indexer and the wallet paying fees and receiving change.
#[derive(Debug)]
pub struct BuilderConfig<I> {
    pub params: Arc<NetworkParams>,
    pub indexer: Arc<I>,
    pub wallet: Address,
}

impl<I> BuilderConfig<I> {
    pub fn new(params: NetworkParams, indexer: I, wallet: Address) -> Self {
        Self {
            params: Arc::new(params),
            indexer: Arc::new(indexer),
            wallet,
        }
    }
}

// derive(Clone) would require `I: Clone`
impl<I> Clone for BuilderConfig<I> {
    fn clone(&self) -> Self {
        Self {
            params: self.params.clone(),
            indexer: self.indexer.clone(),
            wallet: self.wallet.clone(),
        }
    }
}

/// State of one transaction under construction.
pub struct BuilderContext<I, E> {
    pub(crate) config: BuilderConfig<I>,
    pub(crate) engine: E,
    pub(crate) input_refs: Vec<UtxoRef>,
    pub(crate) scripts: IndexMap<ScriptKey, Script>,
    pub(crate) intents: Vec<Intent>,
}

impl<I, E> BuilderContext<I, E> {
    pub(crate) fn new(config: BuilderConfig<I>, engine: E) -> Self {
        Self {
            config,
            engine,
            input_refs: vec![],
            scripts: IndexMap::new(),
            intents: vec![],
        }
    }

    pub fn params(&self) -> &NetworkParams {
        &self.config.params
    }

    pub fn wallet(&self) -> &Address {
        &self.config.wallet
    }

    /// Inputs spent explicitly, in declaration order.
    pub fn input_refs(&self) -> &[UtxoRef] {
        &self.input_refs
    }

    pub fn scripts(&self) -> &IndexMap<ScriptKey, Script> {
        &self.scripts
    }

    /// Intents in replay order.
    pub fn intents(&self) -> &[Intent] {
        &self.intents
    }
}
