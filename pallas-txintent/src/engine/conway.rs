//! Conway-era encoding of a staged transaction.

use pallas_codec::{
    minicbor,
    utils::{CborWrap, MaybeIndefArray},
};
use pallas_primitives::{
    conway::{
        Certificate as PallasCertificate, DatumOption, ExUnits as PallasExUnits, NativeScript,
        NetworkId, NonZeroInt, PlutusData, PlutusScript, PostAlonzoTransactionOutput,
        PseudoScript as PallasScript, PseudoTransactionOutput, Redeemer, RedeemerTag, Redeemers,
        StakeCredential, TransactionBody, TransactionInput, Tx, Value, WitnessSet,
    },
    Fragment, NonEmptyKeyValuePairs, NonEmptySet, PositiveCoin,
};
use pallas_traverse::ComputeHash;

use super::{
    script_data::{LanguageViews, ScriptData},
    RedeemerTarget,
};
use crate::{
    error::encoding_error,
    model::{
        Assets, Certificate, Credential, Datum, DatumKind, KeyHash, Output, PolicyId, Script,
        ScriptKind, TxHash, Unit, UtxoRef,
    },
    params::ExUnits,
    TransactionError, TxBuilderError,
};

/// Everything that ends up in the encoded transaction.
///
/// Inputs and withdrawals are expected in ledger order, redeemer indices are
/// resolved against them.
#[derive(Debug, Clone)]
pub(crate) struct Draft {
    pub inputs: Vec<UtxoRef>,
    pub reference_inputs: Vec<UtxoRef>,
    pub collateral: Option<UtxoRef>,
    pub outputs: Vec<Output>,
    pub fee: u64,
    pub valid_from_slot: Option<u64>,
    pub valid_to_slot: Option<u64>,
    pub mint: Assets,
    pub certificates: Vec<Certificate>,
    pub withdrawals: Vec<(Vec<u8>, u64)>,
    pub required_signers: Vec<KeyHash>,
    pub network_id: u8,
    pub witness_scripts: Vec<Script>,
    pub datums: Vec<Vec<u8>>,
    pub redeemers: Vec<(RedeemerTarget, Vec<u8>)>,
    pub ex_units: ExUnits,
    pub language_views: LanguageViews,
}

impl Draft {
    pub fn build(&self) -> Result<Tx, TxBuilderError> {
        let inputs = self.inputs.iter().map(build_input).collect::<Vec<_>>();

        let outputs = self
            .outputs
            .iter()
            .map(build_output)
            .collect::<Result<Vec<_>, _>>()?;

        let mint_policies = self.mint.by_policy();

        let mint = NonEmptyKeyValuePairs::from_vec(
            mint_policies
                .iter()
                .map(|(policy, assets)| {
                    let assets = assets
                        .iter()
                        .map(|(name, quantity)| {
                            let quantity = i64::try_from(*quantity)
                                .ok()
                                .and_then(|x| NonZeroInt::try_from(x).ok())
                                .ok_or_else(|| out_of_range(policy, name, *quantity))?;

                            Ok((name.clone().into(), quantity))
                        })
                        .collect::<Result<Vec<_>, TxBuilderError>>()?;

                    let assets = NonEmptyKeyValuePairs::from_vec(assets)
                        .ok_or(TransactionError::EmptyMint)?;

                    Ok((*policy, assets))
                })
                .collect::<Result<Vec<_>, TxBuilderError>>()?,
        );

        let certificates = NonEmptySet::from_vec(
            self.certificates
                .iter()
                .map(build_certificate)
                .collect(),
        );

        let withdrawals = NonEmptyKeyValuePairs::from_vec(
            self.withdrawals
                .iter()
                .map(|(account, amount)| (account.clone().into(), *amount))
                .collect(),
        );

        let collateral = NonEmptySet::from_vec(self.collateral.iter().map(build_input).collect());

        let required_signers = NonEmptySet::from_vec(self.required_signers.clone());

        let reference_inputs =
            NonEmptySet::from_vec(self.reference_inputs.iter().map(build_input).collect());

        let network_id = NetworkId::try_from(self.network_id)
            .map_err(|_| encoding_error(format!("invalid network id {}", self.network_id)))?;

        let (mut native_script, mut plutus_v1_script, mut plutus_v2_script, mut plutus_v3_script) =
            (vec![], vec![], vec![], vec![]);

        for script in self.witness_scripts.iter() {
            match script.kind {
                ScriptKind::Native => native_script.push(decode_native(&script.bytes)?),
                ScriptKind::PlutusV1 => {
                    plutus_v1_script.push(PlutusScript::<1>(script.bytes.clone().into()))
                }
                ScriptKind::PlutusV2 => {
                    plutus_v2_script.push(PlutusScript::<2>(script.bytes.clone().into()))
                }
                ScriptKind::PlutusV3 => {
                    plutus_v3_script.push(PlutusScript::<3>(script.bytes.clone().into()))
                }
            }
        }

        let plutus_data = self
            .datums
            .iter()
            .map(|x| decode_data(x, TransactionError::MalformedDatum))
            .collect::<Result<Vec<_>, _>>()?;

        let policies = mint_policies.keys().collect::<Vec<_>>();

        let ex_units = PallasExUnits {
            mem: self.ex_units.mem,
            steps: self.ex_units.steps,
        };

        let mut redeemers = vec![];

        for (target, data) in self.redeemers.iter() {
            let (tag, index) = match target {
                RedeemerTarget::Spend(input) => {
                    (RedeemerTag::Spend, self.inputs.iter().position(|x| x == input))
                }
                RedeemerTarget::Mint(policy) => {
                    (RedeemerTag::Mint, policies.iter().position(|x| *x == policy))
                }
                RedeemerTarget::Cert(index) => (
                    RedeemerTag::Cert,
                    Some(*index).filter(|x| *x < self.certificates.len()),
                ),
                RedeemerTarget::Reward(account) => (
                    RedeemerTag::Reward,
                    self.withdrawals.iter().position(|(x, _)| x == account),
                ),
            };

            let index =
                index.ok_or_else(|| encoding_error(format!("redeemer target {target} is missing")))?;

            redeemers.push(Redeemer {
                tag,
                index: index as u32,
                data: decode_data(data, TransactionError::MalformedRedeemer)?,
                ex_units,
            });
        }

        let witness_set_redeemers = Redeemers::List(MaybeIndefArray::Def(redeemers.clone()));

        let script_data_hash = if !redeemers.is_empty() || !plutus_data.is_empty() {
            let data = ScriptData {
                redeemers: (!redeemers.is_empty()).then(|| witness_set_redeemers.clone()),
                datums: (!plutus_data.is_empty()).then(|| plutus_data.clone()),
                language_views: self.language_views.clone(),
            };

            Some(data.hash()?)
        } else {
            None
        };

        Ok(Tx {
            transaction_body: TransactionBody {
                inputs: pallas_primitives::Set::from(inputs),
                outputs,
                ttl: self.valid_to_slot,
                validity_interval_start: self.valid_from_slot,
                fee: self.fee,
                certificates,
                withdrawals,
                auxiliary_data_hash: None,
                mint,
                script_data_hash,
                collateral,
                required_signers,
                network_id: Some(network_id),
                collateral_return: None,
                reference_inputs,
                total_collateral: None,
                voting_procedures: None,
                proposal_procedures: None,
                treasury_value: None,
                donation: None,
            },
            transaction_witness_set: WitnessSet {
                vkeywitness: None,
                native_script: NonEmptySet::from_vec(native_script),
                bootstrap_witness: None,
                plutus_v1_script: NonEmptySet::from_vec(plutus_v1_script),
                plutus_v2_script: NonEmptySet::from_vec(plutus_v2_script),
                plutus_v3_script: NonEmptySet::from_vec(plutus_v3_script),
                plutus_data: NonEmptySet::from_vec(plutus_data),
                redeemer: if redeemers.is_empty() {
                    None
                } else {
                    Some(witness_set_redeemers)
                },
            },
            success: true,
            auxiliary_data: None.into(),
        })
    }

    /// Body hash and full CBOR of the transaction.
    pub fn encode(&self) -> Result<(TxHash, Vec<u8>), TxBuilderError> {
        let tx = self.build()?;
        let bytes = tx.encode_fragment().map_err(encoding_error)?;

        Ok((tx.transaction_body.compute_hash(), bytes))
    }
}

fn build_input(input: &UtxoRef) -> TransactionInput {
    TransactionInput {
        transaction_id: input.tx_hash,
        index: input.index,
    }
}

fn build_credential(credential: &Credential) -> StakeCredential {
    match credential {
        Credential::Key(x) => StakeCredential::AddrKeyhash(*x),
        Credential::Script(x) => StakeCredential::ScriptHash(*x),
    }
}

fn build_certificate(certificate: &Certificate) -> PallasCertificate {
    match certificate {
        Certificate::StakeRegistration(x) => {
            PallasCertificate::StakeRegistration(build_credential(x))
        }
        Certificate::StakeDeregistration(x) => {
            PallasCertificate::StakeDeregistration(build_credential(x))
        }
        Certificate::StakeDelegation(x, pool) => {
            PallasCertificate::StakeDelegation(build_credential(x), *pool)
        }
    }
}

fn out_of_range(policy: &PolicyId, name: &[u8], quantity: i128) -> TxBuilderError {
    TransactionError::QuantityOutOfRange {
        unit: Unit::Token(*policy, name.to_vec()).to_string(),
        quantity,
    }
    .into()
}

fn decode_data(bytes: &[u8], err: TransactionError) -> Result<PlutusData, TxBuilderError> {
    PlutusData::decode_fragment(bytes).map_err(|_| err.into())
}

fn decode_native(bytes: &[u8]) -> Result<NativeScript, TxBuilderError> {
    NativeScript::decode_fragment(bytes).map_err(|_| TransactionError::MalformedScript.into())
}

/// The ledger value of a bundle. Quantities must already be non-negative.
pub(crate) fn build_value(assets: &Assets) -> Result<Value, TxBuilderError> {
    let coin = u64::try_from(assets.lovelace()).map_err(|_| {
        TransactionError::QuantityOutOfRange {
            unit: Unit::Lovelace.to_string(),
            quantity: assets.lovelace(),
        }
    })?;

    let tokens = assets
        .by_policy()
        .into_iter()
        .map(|(policy, assets)| {
            let assets = assets
                .into_iter()
                .map(|(name, quantity)| {
                    let amount = u64::try_from(quantity)
                        .ok()
                        .and_then(|x| PositiveCoin::try_from(x).ok())
                        .ok_or_else(|| out_of_range(&policy, &name, quantity))?;

                    Ok((name.into(), amount))
                })
                .collect::<Result<Vec<_>, TxBuilderError>>()?;

            let assets =
                NonEmptyKeyValuePairs::from_vec(assets).ok_or(TransactionError::EmptyOutput)?;

            Ok((policy, assets))
        })
        .collect::<Result<Vec<_>, TxBuilderError>>()?;

    Ok(match NonEmptyKeyValuePairs::from_vec(tokens) {
        Some(tokens) => Value::Multiasset(coin, tokens),
        None => Value::Coin(coin),
    })
}

fn build_datum(datum: &Datum) -> Result<DatumOption, TxBuilderError> {
    match datum.kind {
        DatumKind::Hash => Ok(DatumOption::Hash(datum.hash())),
        DatumKind::Inline => {
            let data = decode_data(&datum.bytes, TransactionError::MalformedDatum)?;
            Ok(DatumOption::Data(CborWrap(data)))
        }
    }
}

pub(crate) fn build_script_ref(script: &Script) -> Result<PallasScript<NativeScript>, TxBuilderError> {
    Ok(match script.kind {
        ScriptKind::Native => PallasScript::NativeScript(decode_native(&script.bytes)?),
        ScriptKind::PlutusV1 => {
            PallasScript::PlutusV1Script(PlutusScript::<1>(script.bytes.clone().into()))
        }
        ScriptKind::PlutusV2 => {
            PallasScript::PlutusV2Script(PlutusScript::<2>(script.bytes.clone().into()))
        }
        ScriptKind::PlutusV3 => {
            PallasScript::PlutusV3Script(PlutusScript::<3>(script.bytes.clone().into()))
        }
    })
}

pub(crate) fn build_output(
    output: &Output,
) -> Result<PseudoTransactionOutput<PostAlonzoTransactionOutput>, TxBuilderError> {
    let datum_option = output.datum.as_ref().map(build_datum).transpose()?;

    let script_ref = output
        .script_ref
        .as_ref()
        .map(|x| build_script_ref(x).map(CborWrap))
        .transpose()?;

    Ok(PseudoTransactionOutput::PostAlonzo(
        PostAlonzoTransactionOutput {
            address: output.address.to_vec().into(),
            value: build_value(&output.assets)?,
            datum_option,
            script_ref,
        },
    ))
}

/// Encoded size of the value alone, checked against `max_value_size`.
pub(crate) fn value_size(assets: &Assets) -> Result<u64, TxBuilderError> {
    let bytes = minicbor::to_vec(build_value(assets)?).map_err(encoding_error)?;
    Ok(bytes.len() as u64)
}

/// Encoded size of a whole output, the basis of its minimum ada.
pub(crate) fn output_size(output: &Output) -> Result<u64, TxBuilderError> {
    let bytes = minicbor::to_vec(build_output(output)?).map_err(encoding_error)?;
    Ok(bytes.len() as u64)
}
