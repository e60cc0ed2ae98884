//! The ledger engine: the primitive operations intents are translated into,
//! and the balancing step that turns them into a signed-ready transaction.

use std::fmt;

use pallas_addresses::Address;

use crate::{
    intent::Redeemer,
    model::{
        Assets, Certificate, KeyHash, Output, PolicyId, RewardAddress, Script, ScriptRole, TxHash,
        Utxo, UtxoRef,
    },
    TxBuilderError,
};

mod conway;
mod fee;
mod script_data;
mod staging;

pub use fee::{linear_fee, script_fee};
pub use staging::StagingEngine;

/// The primitive operations of a transaction under construction.
///
/// Calls happen while the intent queue is replayed, in declaration order.
/// Checks that only depend on the declarations themselves should fail here
/// so that completion stops before touching the network.
pub trait LedgerEngine {
    fn add_input(&mut self, utxo: Utxo, redeemer: Option<Redeemer>) -> Result<(), TxBuilderError>;

    fn add_reference_input(&mut self, utxo: Utxo) -> Result<(), TxBuilderError>;

    fn add_output(&mut self, output: Output) -> Result<(), TxBuilderError>;

    fn add_mint(&mut self, assets: Assets, redeemer: Option<Redeemer>)
        -> Result<(), TxBuilderError>;

    fn set_validity_start(&mut self, slot: u64) -> Result<(), TxBuilderError>;

    fn set_validity_end(&mut self, slot: u64) -> Result<(), TxBuilderError>;

    fn register_script(&mut self, role: ScriptRole, script: Script) -> Result<(), TxBuilderError>;

    fn add_required_signer(&mut self, key_hash: KeyHash) -> Result<(), TxBuilderError>;

    fn add_certificate(
        &mut self,
        certificate: Certificate,
        redeemer: Option<Redeemer>,
    ) -> Result<(), TxBuilderError>;

    fn add_withdrawal(
        &mut self,
        reward_address: RewardAddress,
        amount: u64,
        redeemer: Option<Redeemer>,
    ) -> Result<(), TxBuilderError>;

    /// Selects wallet inputs, settles the fee and encodes the transaction.
    fn balance_and_build(self, ctx: BalanceContext) -> Result<CompletedTx, TxBuilderError>;
}

/// What the engine receives from the chain right before balancing.
#[derive(Debug, Clone)]
pub struct BalanceContext {
    /// Wallet outputs available for selection, already stripped of anything
    /// the transaction spends explicitly.
    pub wallet_utxos: Vec<Utxo>,
    pub change_address: Address,
}

/// The element of the transaction a redeemer is attached to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum RedeemerTarget {
    Spend(UtxoRef),
    Mint(PolicyId),
    /// Position in the certificate list.
    Cert(usize),
    /// Raw bytes of the reward account.
    Reward(Vec<u8>),
}

impl fmt::Display for RedeemerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedeemerTarget::Spend(x) => write!(f, "spend of {x}"),
            RedeemerTarget::Mint(x) => write!(f, "mint of {x}"),
            RedeemerTarget::Cert(x) => write!(f, "certificate #{x}"),
            RedeemerTarget::Reward(x) => write!(f, "withdrawal from {}", hex::encode(x)),
        }
    }
}

/// A balanced, encoded transaction, not yet signed.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedTx {
    pub(crate) tx_hash: TxHash,
    pub(crate) tx_bytes: Vec<u8>,
    pub(crate) fee: u64,
    pub(crate) inputs: Vec<UtxoRef>,
    pub(crate) reference_inputs: Vec<UtxoRef>,
    pub(crate) collateral: Option<UtxoRef>,
    pub(crate) outputs: Vec<Output>,
    pub(crate) mint: Assets,
    pub(crate) witness_scripts: Vec<Script>,
    pub(crate) datums: Vec<Vec<u8>>,
    pub(crate) redeemers: Vec<RedeemerTarget>,
    pub(crate) required_signers: Vec<KeyHash>,
    pub(crate) valid_from_slot: Option<u64>,
    pub(crate) valid_to_slot: Option<u64>,
}

impl CompletedTx {
    /// A bare result for engines that only produce the encoded transaction.
    pub fn new(tx_hash: TxHash, tx_bytes: Vec<u8>, fee: u64) -> Self {
        Self {
            tx_hash,
            tx_bytes,
            fee,
            inputs: vec![],
            reference_inputs: vec![],
            collateral: None,
            outputs: vec![],
            mint: Assets::new(),
            witness_scripts: vec![],
            datums: vec![],
            redeemers: vec![],
            required_signers: vec![],
            valid_from_slot: None,
            valid_to_slot: None,
        }
    }

    pub fn tx_hash(&self) -> &TxHash {
        &self.tx_hash
    }

    pub fn tx_bytes(&self) -> &[u8] {
        &self.tx_bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.tx_bytes)
    }

    pub fn fee(&self) -> u64 {
        self.fee
    }

    /// Spent inputs, in ledger order.
    pub fn inputs(&self) -> &[UtxoRef] {
        &self.inputs
    }

    pub fn reference_inputs(&self) -> &[UtxoRef] {
        &self.reference_inputs
    }

    pub fn collateral(&self) -> Option<&UtxoRef> {
        self.collateral.as_ref()
    }

    /// Declared outputs followed by the change output, if any.
    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn mint(&self) -> &Assets {
        &self.mint
    }

    /// Scripts carried in the witness set.
    pub fn witness_scripts(&self) -> &[Script] {
        &self.witness_scripts
    }

    pub fn datums(&self) -> &[Vec<u8>] {
        &self.datums
    }

    pub fn redeemers(&self) -> &[RedeemerTarget] {
        &self.redeemers
    }

    pub fn redeemer_count(&self) -> usize {
        self.redeemers.len()
    }

    pub fn required_signers(&self) -> &[KeyHash] {
        &self.required_signers
    }

    pub fn valid_from_slot(&self) -> Option<u64> {
        self.valid_from_slot
    }

    pub fn valid_to_slot(&self) -> Option<u64> {
        self.valid_to_slot
    }
}
