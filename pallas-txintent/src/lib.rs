//! A Cardano transaction builder that records declarations as intents and
//! replays them against a ledger engine when the transaction is completed.

mod builder;
mod complete;
mod context;
mod error;
mod indexer;

pub mod engine;
pub mod factory;
pub mod intent;
pub mod model;
pub mod params;
pub mod prelude;

pub use builder::TxBuilder;
pub use complete::{attempt_completion, Completion, Program};
pub use context::{BuilderConfig, BuilderContext};
pub use error::{RuntimeError, TransactionError, TxBuilderError};
pub use indexer::{ChainIndexer, IndexerError, LocalChainIndexer, MemoryIndexer};
