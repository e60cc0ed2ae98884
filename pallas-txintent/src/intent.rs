//! Suspended declarations, replayed in order against a ledger engine.

use crate::{
    engine::LedgerEngine,
    model::{
        Assets, Certificate, KeyHash, Output, PoolId, RewardAddress, Script, ScriptRole, Utxo,
    },
    params::NetworkParams,
    TransactionError, TxBuilderError,
};

/// CBOR-encoded plutus data handed to a script.
pub type Redeemer = Vec<u8>;

/// One declaration, recorded but not yet applied.
///
/// Intents are plain values: replaying the same intent against two
/// equivalent engines issues the same calls.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// Spend a single output without a redeemer.
    AddInput(Utxo),
    CollectInputs {
        utxos: Vec<Utxo>,
        redeemer: Option<Redeemer>,
    },
    /// Reference the outputs without spending them.
    ReadFrom(Vec<Utxo>),
    AddOutput(Output),
    MintAsset {
        assets: Assets,
        redeemer: Option<Redeemer>,
    },
    /// Unix time in milliseconds.
    SetValidFrom(u64),
    /// Unix time in milliseconds.
    SetValidTo(u64),
    AttachScript {
        role: ScriptRole,
        script: Script,
    },
    AddSigner(KeyHash),
    RegisterStake(RewardAddress),
    DeregisterStake {
        reward_address: RewardAddress,
        redeemer: Option<Redeemer>,
    },
    DelegateTo {
        reward_address: RewardAddress,
        pool_id: PoolId,
        redeemer: Option<Redeemer>,
    },
    Withdraw {
        reward_address: RewardAddress,
        amount: u64,
        redeemer: Option<Redeemer>,
    },
}

impl Intent {
    pub fn kind(&self) -> &'static str {
        match self {
            Intent::AddInput(_) => "add_input",
            Intent::CollectInputs { .. } => "collect_inputs",
            Intent::ReadFrom(_) => "read_from",
            Intent::AddOutput(_) => "add_output",
            Intent::MintAsset { .. } => "mint_asset",
            Intent::SetValidFrom(_) => "set_valid_from",
            Intent::SetValidTo(_) => "set_valid_to",
            Intent::AttachScript { .. } => "attach_script",
            Intent::AddSigner(_) => "add_signer",
            Intent::RegisterStake(_) => "register_stake",
            Intent::DeregisterStake { .. } => "deregister_stake",
            Intent::DelegateTo { .. } => "delegate_to",
            Intent::Withdraw { .. } => "withdraw",
        }
    }

    /// Translates the intent into calls against the engine.
    pub fn apply<E>(self, engine: &mut E, params: &NetworkParams) -> Result<(), TxBuilderError>
    where
        E: LedgerEngine + ?Sized,
    {
        match self {
            Intent::AddInput(utxo) => engine.add_input(utxo, None),
            Intent::CollectInputs { utxos, redeemer } => {
                for utxo in utxos {
                    engine.add_input(utxo, redeemer.clone())?;
                }

                Ok(())
            }
            Intent::ReadFrom(utxos) => utxos
                .into_iter()
                .try_for_each(|utxo| engine.add_reference_input(utxo)),
            Intent::AddOutput(output) => engine.add_output(output),
            Intent::MintAsset { assets, redeemer } => engine.add_mint(assets, redeemer),
            Intent::SetValidFrom(unix_time) => {
                engine.set_validity_start(to_slot(params, unix_time)?)
            }
            Intent::SetValidTo(unix_time) => engine.set_validity_end(to_slot(params, unix_time)?),
            Intent::AttachScript { role, script } => engine.register_script(role, script),
            Intent::AddSigner(key_hash) => engine.add_required_signer(key_hash),
            Intent::RegisterStake(reward_address) => engine.add_certificate(
                Certificate::StakeRegistration(reward_address.credential()),
                None,
            ),
            Intent::DeregisterStake {
                reward_address,
                redeemer,
            } => engine.add_certificate(
                Certificate::StakeDeregistration(reward_address.credential()),
                redeemer,
            ),
            Intent::DelegateTo {
                reward_address,
                pool_id,
                redeemer,
            } => engine.add_certificate(
                Certificate::StakeDelegation(reward_address.credential(), pool_id),
                redeemer,
            ),
            Intent::Withdraw {
                reward_address,
                amount,
                redeemer,
            } => engine.add_withdrawal(reward_address, amount, redeemer),
        }
    }
}

fn to_slot(params: &NetworkParams, unix_time: u64) -> Result<u64, TxBuilderError> {
    params
        .slot_config
        .unix_time_to_slot(unix_time)
        .ok_or_else(|| TransactionError::InvalidTimestamp(unix_time).into())
}
