pub use crate::engine::{CompletedTx, LedgerEngine, StagingEngine};
pub use crate::model::*;
pub use crate::params::{Network, NetworkParams, ProtocolParams, SlotConfig};
pub use crate::{
    BuilderConfig, ChainIndexer, Completion, MemoryIndexer, Program, TransactionError,
    TxBuilder, TxBuilderError,
};
pub use pallas_addresses::Address;
