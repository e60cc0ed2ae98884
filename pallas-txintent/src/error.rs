//! Failures surfaced while declaring or completing a transaction.

use pallas_crypto::hash::Hash;
use thiserror::Error;

use crate::{indexer::IndexerError, model::ScriptKind, model::UtxoRef};

/// A ledger-rule or argument-shape violation.
///
/// These are recoverable by adjusting the declarations. Shape violations are
/// raised by the declaration call itself, everything else when the intents
/// are replayed or the transaction is balanced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum TransactionError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("address {0} belongs to a different network")]
    WrongNetwork(String),

    #[error("expected a reward address, got {0}")]
    NotARewardAddress(String),

    #[error("expected a script address, got {0}")]
    NotAScriptAddress(String),

    #[error("invalid asset unit: {0}")]
    InvalidUnit(String),

    #[error("asset name is longer than 32 bytes")]
    AssetNameTooLong,

    #[error("negative quantity {quantity} for {unit}")]
    NegativeQuantity { unit: String, quantity: i128 },

    #[error("quantity {quantity} for {unit} is out of range")]
    QuantityOutOfRange { unit: String, quantity: i128 },

    #[error("mint quantity for {0} is zero")]
    ZeroMintQuantity(String),

    #[error("lovelace can't be minted or burned")]
    LovelaceMint,

    #[error("output doesn't carry any value")]
    EmptyOutput,

    #[error("nothing to mint")]
    EmptyMint,

    #[error("utxo list is empty")]
    EmptyUtxoSet,

    #[error("datum is not valid plutus data")]
    MalformedDatum,

    #[error("redeemer is not valid plutus data")]
    MalformedRedeemer,

    #[error("malformed script")]
    MalformedScript,

    #[error("timestamp {0} precedes the first slot of the network")]
    InvalidTimestamp(u64),

    #[error("withdrawal amount must be positive")]
    ZeroWithdrawal,

    #[error("invalid pool id: {0}")]
    InvalidPoolId(String),

    #[error("invalid key hash: {0}")]
    InvalidKeyHash(String),

    #[error("validity interval start {start} is not before its end {end}")]
    InvalidValidityInterval { start: u64, end: u64 },

    #[error("output value takes {size} bytes, above the maximum of {max}")]
    OutputValueTooLarge { size: u64, max: u64 },

    #[error("output {index} holds {lovelace} lovelace, below the minimum of {required}")]
    OutputBelowMinimum {
        index: usize,
        lovelace: u64,
        required: u64,
    },

    #[error("input {0} is spent twice")]
    DuplicateInput(UtxoRef),

    #[error("missing script {hash} required by {purpose}")]
    MissingScript { hash: Hash<28>, purpose: String },

    #[error("missing redeemer for {0}")]
    MissingRedeemer(String),

    #[error("missing datum {0}")]
    MissingDatum(Hash<32>),

    #[error("missing cost model for {0:?}")]
    MissingCostModel(ScriptKind),

    #[error("insufficient funds, missing {missing} of {unit}")]
    InsufficientFunds { unit: String, missing: i128 },

    #[error("no utxo suitable for collateral")]
    MissingCollateral,

    #[error("rewards of {0} are withdrawn twice")]
    DuplicateWithdrawal(String),

    #[error("stake credential of {0} is not registered")]
    StakeNotRegistered(String),

    #[error("withdrawal of {requested} doesn't match the {available} available")]
    WithdrawalMismatch { requested: u64, available: u64 },

    #[error("transaction takes {size} bytes, above the maximum of {max}")]
    MaxTxSizeExceeded { size: u64, max: u64 },
}

/// An engine or environment fault, not fixable by changing declarations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RuntimeError {
    #[error("chain indexer failure: {0}")]
    Indexer(#[from] IndexerError),

    #[error("transaction can't be encoded: {0}")]
    Encoding(String),

    #[error("fee didn't settle after {0} rounds")]
    FeeDidNotConverge(usize),

    #[error("ledger engine fault: {0}")]
    Engine(String),
}

/// The failure of a declaration or a completion.
#[derive(Debug, Error)]
pub enum TxBuilderError {
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl TxBuilderError {
    pub fn is_transaction(&self) -> bool {
        matches!(self, Self::Transaction(_))
    }

    pub fn is_runtime(&self) -> bool {
        matches!(self, Self::Runtime(_))
    }

    /// The ledger-rule violation, if that's what this is.
    pub fn as_transaction(&self) -> Option<&TransactionError> {
        match self {
            Self::Transaction(x) => Some(x),
            Self::Runtime(_) => None,
        }
    }
}

impl From<IndexerError> for TxBuilderError {
    fn from(value: IndexerError) -> Self {
        Self::Runtime(RuntimeError::Indexer(value))
    }
}

pub(crate) fn encoding_error(err: impl std::fmt::Display) -> TxBuilderError {
    RuntimeError::Encoding(err.to_string()).into()
}
