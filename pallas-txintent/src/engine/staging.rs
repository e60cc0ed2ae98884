//! The default ledger engine: stages primitive operations in memory and
//! balances them into a Conway transaction.

use std::collections::{BTreeMap, BTreeSet};

use pallas_addresses::{Address, ShelleyPaymentPart};
use tracing::{debug, trace};

use super::{
    conway::{output_size, value_size, Draft},
    fee::{linear_fee, script_fee},
    script_data::LanguageViews,
    BalanceContext, CompletedTx, LedgerEngine, RedeemerTarget,
};
use crate::{
    intent::Redeemer,
    model::{
        Assets, Certificate, Credential, DatumHash, DatumKind, KeyHash, Output, PolicyId,
        RewardAddress, Script, ScriptHash, ScriptKind, ScriptRole, Unit, Utxo, UtxoRef,
    },
    params::{NetworkParams, ProtocolParams},
    RuntimeError, TransactionError, TxBuilderError,
};

/// Rounds of fee estimation before giving up.
const MAX_FEE_ROUNDS: usize = 16;

/// Fixed overhead the ledger adds to the serialized size of an output when
/// computing its minimum ada.
const OUTPUT_OVERHEAD: u64 = 160;

/// Encoded size of a vkey witness: a public key and a signature.
const VKEY_WITNESS_SIZE: u64 = 101;

#[derive(Debug, Clone)]
pub struct StagingEngine {
    protocol: ProtocolParams,
    network_id: u8,
    inputs: BTreeMap<UtxoRef, Utxo>,
    spend_redeemers: BTreeMap<UtxoRef, Redeemer>,
    reference_inputs: BTreeMap<UtxoRef, Utxo>,
    outputs: Vec<Output>,
    mint: Assets,
    mint_redeemers: BTreeMap<PolicyId, Redeemer>,
    valid_from_slot: Option<u64>,
    valid_to_slot: Option<u64>,
    scripts: BTreeMap<ScriptHash, Script>,
    required_signers: Vec<KeyHash>,
    certificates: Vec<(Certificate, Option<Redeemer>)>,
    withdrawals: BTreeMap<Vec<u8>, (RewardAddress, u64, Option<Redeemer>)>,
    datums: BTreeMap<DatumHash, Vec<u8>>,
}

/// What the witness set needs, as derived from the staged operations.
struct Witnesses {
    scripts: Vec<Script>,
    redeemers: Vec<(RedeemerTarget, Redeemer)>,
    datums: Vec<Vec<u8>>,
    language_views: LanguageViews,
}

struct Selection {
    inputs: Vec<Utxo>,
    change: Option<Output>,
}

impl StagingEngine {
    pub fn new(params: &NetworkParams) -> Self {
        Self {
            protocol: params.protocol.clone(),
            network_id: params.network.network_id(),
            inputs: Default::default(),
            spend_redeemers: Default::default(),
            reference_inputs: Default::default(),
            outputs: vec![],
            mint: Assets::new(),
            mint_redeemers: Default::default(),
            valid_from_slot: None,
            valid_to_slot: None,
            scripts: Default::default(),
            required_signers: vec![],
            certificates: vec![],
            withdrawals: Default::default(),
            datums: Default::default(),
        }
    }

    fn check_validity_interval(&self) -> Result<(), TxBuilderError> {
        match (self.valid_from_slot, self.valid_to_slot) {
            (Some(start), Some(end)) if start >= end => {
                Err(TransactionError::InvalidValidityInterval { start, end }.into())
            }
            _ => Ok(()),
        }
    }

    fn min_ada(&self, output: &Output) -> Result<u64, TxBuilderError> {
        Ok((OUTPUT_OVERHEAD + output_size(output)?) * self.protocol.coins_per_utxo_byte)
    }

    /// Raises the lovelace of the output until it covers its own minimum.
    fn fill_min_ada(&self, mut output: Output) -> Result<Output, TxBuilderError> {
        loop {
            let required = self.min_ada(&output)?;

            if output.lovelace() >= required {
                return Ok(output);
            }

            output.assets = output.assets.with_lovelace(required);
        }
    }

    fn check_value_size(&self, assets: &Assets) -> Result<(), TxBuilderError> {
        let size = value_size(assets)?;

        if size > self.protocol.max_value_size {
            return Err(TransactionError::OutputValueTooLarge {
                size,
                max: self.protocol.max_value_size,
            }
            .into());
        }

        Ok(())
    }

    fn redeemer_for(&self, target: &RedeemerTarget) -> Option<&Redeemer> {
        match target {
            RedeemerTarget::Spend(input) => self.spend_redeemers.get(input),
            RedeemerTarget::Mint(policy) => self.mint_redeemers.get(policy),
            RedeemerTarget::Cert(index) => self
                .certificates
                .get(*index)
                .and_then(|(_, redeemer)| redeemer.as_ref()),
            RedeemerTarget::Reward(account) => self
                .withdrawals
                .get(account)
                .and_then(|(_, _, redeemer)| redeemer.as_ref()),
        }
    }

    /// Scripts that must validate this transaction, with what they validate.
    fn script_purposes(&self) -> Vec<(ScriptHash, RedeemerTarget)> {
        let mut out = vec![];

        for (input, utxo) in self.inputs.iter() {
            if let Some(hash) = utxo.payment_script() {
                out.push((hash, RedeemerTarget::Spend(*input)));
            }
        }

        for policy in self.mint.by_policy().into_keys() {
            out.push((policy, RedeemerTarget::Mint(policy)));
        }

        for (index, (certificate, _)) in self.certificates.iter().enumerate() {
            if !certificate.requires_witness() {
                continue;
            }

            if let Some(hash) = certificate.credential().script_hash() {
                out.push((hash, RedeemerTarget::Cert(index)));
            }
        }

        for (account, (reward_address, _, _)) in self.withdrawals.iter() {
            if let Some(hash) = reward_address.credential().script_hash() {
                out.push((hash, RedeemerTarget::Reward(account.clone())));
            }
        }

        out
    }

    fn resolve_witnesses(&self) -> Result<Witnesses, TxBuilderError> {
        // scripts already on chain, through reference or spent inputs
        let provided: BTreeMap<ScriptHash, ScriptKind> = self
            .reference_inputs
            .values()
            .chain(self.inputs.values())
            .filter_map(|x| x.script_ref.as_ref())
            .map(|x| (x.hash(), x.kind))
            .collect();

        let mut scripts = BTreeMap::new();
        let mut languages = BTreeSet::new();
        let mut redeemers = vec![];
        let mut datums = self.datums.clone();

        for (hash, target) in self.script_purposes() {
            let kind = match (provided.get(&hash), self.scripts.get(&hash)) {
                (Some(kind), _) => *kind,
                (None, Some(script)) => {
                    scripts.insert(hash, script.clone());
                    script.kind
                }
                (None, None) => {
                    return Err(TransactionError::MissingScript {
                        hash,
                        purpose: target.to_string(),
                    }
                    .into())
                }
            };

            if !kind.is_plutus() {
                continue;
            }

            let redeemer = self
                .redeemer_for(&target)
                .ok_or_else(|| TransactionError::MissingRedeemer(target.to_string()))?;

            if let RedeemerTarget::Spend(input) = &target {
                let datum = self
                    .inputs
                    .get(input)
                    .and_then(|x| x.datum_hash.map(|hash| (hash, x.datum.clone())));

                if let Some((hash, body)) = datum {
                    let body = body.ok_or(TransactionError::MissingDatum(hash))?;
                    datums.insert(hash, body);
                }
            }

            languages.insert(kind);
            redeemers.push((target, redeemer.clone()));
        }

        let views = languages
            .into_iter()
            .map(|kind| {
                self.protocol
                    .cost_models
                    .get(kind)
                    .map(|model| (kind, model.to_vec()))
                    .ok_or(TransactionError::MissingCostModel(kind))
            })
            .collect::<Result<Vec<_>, _>>()?;

        redeemers.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(Witnesses {
            scripts: scripts.into_values().collect(),
            redeemers,
            datums: datums.into_values().collect(),
            language_views: LanguageViews::new(views),
        })
    }

    /// Value entering the transaction minus value leaving it, before fees and
    /// wallet inputs.
    fn base_balance(&self) -> Assets {
        let mut balance = Assets::new();

        for utxo in self.inputs.values() {
            balance.merge(&utxo.assets);
        }

        balance.merge(&self.mint);

        for (_, amount, _) in self.withdrawals.values() {
            balance.add_quantity(Unit::Lovelace, *amount as i128);
        }

        let deposit = self.protocol.key_deposit as i128;

        for (certificate, _) in self.certificates.iter() {
            match certificate {
                Certificate::StakeRegistration(_) => balance.add_quantity(Unit::Lovelace, -deposit),
                Certificate::StakeDeregistration(_) => {
                    balance.add_quantity(Unit::Lovelace, deposit)
                }
                Certificate::StakeDelegation(..) => (),
            }
        }

        for output in self.outputs.iter() {
            balance.subtract(&output.assets);
        }

        balance
    }

    /// Wallet outputs eligible for selection, largest lovelace first.
    fn selection_pool(&self, ctx: &BalanceContext) -> Vec<Utxo> {
        let mut pool: Vec<_> = ctx
            .wallet_utxos
            .iter()
            .filter(|x| !self.inputs.contains_key(&x.input))
            .filter(|x| !self.reference_inputs.contains_key(&x.input))
            .filter(|x| x.payment_script().is_none())
            .cloned()
            .collect();

        pool.sort_by(|a, b| {
            b.assets
                .lovelace()
                .cmp(&a.assets.lovelace())
                .then(a.input.cmp(&b.input))
        });

        pool
    }

    fn select(
        &self,
        pool: &[Utxo],
        fee: u64,
        change_address: &Address,
    ) -> Result<Selection, TxBuilderError> {
        let mut balance = self.base_balance();
        balance.add_quantity(Unit::Lovelace, -(fee as i128));

        let mut pool: Vec<&Utxo> = pool.iter().collect();
        let mut inputs: Vec<Utxo> = vec![];

        // a transaction spends at least one input
        if self.inputs.is_empty() && !pool.is_empty() {
            let utxo = pool.remove(0);
            balance.merge(&utxo.assets);
            inputs.push(utxo.clone());
        }

        loop {
            // token deficits first, their utxos usually carry lovelace too
            let deficit = balance
                .iter()
                .filter(|(_, quantity)| *quantity < 0)
                .min_by_key(|(unit, _)| unit.is_lovelace())
                .map(|(unit, quantity)| (unit.clone(), quantity));

            if let Some((unit, quantity)) = deficit {
                let pick = pool.iter().position(|x| x.assets.get(&unit) > 0);

                let Some(index) = pick else {
                    return Err(TransactionError::InsufficientFunds {
                        unit: unit.to_string(),
                        missing: -quantity,
                    }
                    .into());
                };

                let utxo = pool.remove(index);
                balance.merge(&utxo.assets);
                inputs.push(utxo.clone());
                continue;
            }

            if balance.is_empty() {
                return Ok(Selection {
                    inputs,
                    change: None,
                });
            }

            let change = Output::new(change_address.clone(), balance.clone());
            let required = self.min_ada(&change)?;

            if change.lovelace() >= required {
                self.check_value_size(&change.assets)?;

                return Ok(Selection {
                    inputs,
                    change: Some(change),
                });
            }

            if pool.is_empty() {
                return Err(TransactionError::InsufficientFunds {
                    unit: Unit::Lovelace.to_string(),
                    missing: (required - change.lovelace()) as i128,
                }
                .into());
            }

            let utxo = pool.remove(0);
            balance.merge(&utxo.assets);
            inputs.push(utxo.clone());
        }
    }

    /// Smallest pure-ada wallet output covering the required collateral.
    fn select_collateral<'a>(&self, pool: &'a [Utxo], fee: u64) -> Result<&'a Utxo, TxBuilderError> {
        let required =
            (fee as u128 * self.protocol.collateral_percent as u128).div_ceil(100) as i128;

        pool.iter()
            .filter(|x| !x.assets.has_tokens())
            .filter(|x| x.assets.lovelace() >= required)
            .min_by(|a, b| {
                a.assets
                    .lovelace()
                    .cmp(&b.assets.lovelace())
                    .then(a.input.cmp(&b.input))
            })
            .ok_or_else(|| TransactionError::MissingCollateral.into())
    }

    /// Distinct keys expected to sign, used to account for their witnesses in
    /// the fee.
    fn key_witnesses(&self, selected: &[Utxo], collateral: Option<&Utxo>) -> u64 {
        let mut keys = BTreeSet::new();

        for utxo in self.inputs.values().chain(selected).chain(collateral) {
            if let Address::Shelley(x) = &utxo.address {
                if let ShelleyPaymentPart::Key(hash) = x.payment() {
                    keys.insert(*hash);
                }
            }
        }

        keys.extend(self.required_signers.iter().copied());

        for (certificate, _) in self.certificates.iter() {
            if let (true, Credential::Key(hash)) =
                (certificate.requires_witness(), certificate.credential())
            {
                keys.insert(*hash);
            }
        }

        for (reward_address, _, _) in self.withdrawals.values() {
            if let Credential::Key(hash) = reward_address.credential() {
                keys.insert(hash);
            }
        }

        keys.len() as u64
    }

    fn draft(
        &self,
        witnesses: &Witnesses,
        selection: &Selection,
        collateral: Option<UtxoRef>,
        fee: u64,
    ) -> Draft {
        let inputs: BTreeSet<UtxoRef> = self
            .inputs
            .keys()
            .copied()
            .chain(selection.inputs.iter().map(|x| x.input))
            .collect();

        let mut outputs = self.outputs.clone();
        outputs.extend(selection.change.clone());

        Draft {
            inputs: inputs.into_iter().collect(),
            reference_inputs: self.reference_inputs.keys().copied().collect(),
            collateral,
            outputs,
            fee,
            valid_from_slot: self.valid_from_slot,
            valid_to_slot: self.valid_to_slot,
            mint: self.mint.clone(),
            certificates: self.certificates.iter().map(|(x, _)| *x).collect(),
            withdrawals: self
                .withdrawals
                .iter()
                .map(|(account, (_, amount, _))| (account.clone(), *amount))
                .collect(),
            required_signers: self.required_signers.clone(),
            network_id: self.network_id,
            witness_scripts: witnesses.scripts.clone(),
            datums: witnesses.datums.clone(),
            redeemers: witnesses.redeemers.clone(),
            ex_units: self.protocol.default_ex_units,
            language_views: witnesses.language_views.clone(),
        }
    }
}

impl LedgerEngine for StagingEngine {
    fn add_input(&mut self, utxo: Utxo, redeemer: Option<Redeemer>) -> Result<(), TxBuilderError> {
        if self.inputs.contains_key(&utxo.input) {
            return Err(TransactionError::DuplicateInput(utxo.input).into());
        }

        trace!(input = %utxo.input, "staging input");

        if let Some(redeemer) = redeemer {
            self.spend_redeemers.insert(utxo.input, redeemer);
        }

        self.inputs.insert(utxo.input, utxo);

        Ok(())
    }

    fn add_reference_input(&mut self, utxo: Utxo) -> Result<(), TxBuilderError> {
        self.reference_inputs.insert(utxo.input, utxo);
        Ok(())
    }

    fn add_output(&mut self, output: Output) -> Result<(), TxBuilderError> {
        let index = self.outputs.len();

        let output = if output.lovelace() == 0 {
            self.fill_min_ada(output)?
        } else {
            let required = self.min_ada(&output)?;

            if output.lovelace() < required {
                return Err(TransactionError::OutputBelowMinimum {
                    index,
                    lovelace: output.lovelace(),
                    required,
                }
                .into());
            }

            output
        };

        self.check_value_size(&output.assets)?;

        if let Some(datum) = &output.datum {
            if datum.kind == DatumKind::Hash {
                self.datums.insert(datum.hash(), datum.bytes.clone());
            }
        }

        trace!(index, lovelace = output.lovelace(), "staging output");

        self.outputs.push(output);

        Ok(())
    }

    fn add_mint(
        &mut self,
        assets: Assets,
        redeemer: Option<Redeemer>,
    ) -> Result<(), TxBuilderError> {
        if let Some(redeemer) = redeemer {
            for policy in assets.by_policy().into_keys() {
                self.mint_redeemers.insert(policy, redeemer.clone());
            }
        }

        self.mint.merge(&assets);

        Ok(())
    }

    fn set_validity_start(&mut self, slot: u64) -> Result<(), TxBuilderError> {
        self.valid_from_slot = Some(slot);
        self.check_validity_interval()
    }

    fn set_validity_end(&mut self, slot: u64) -> Result<(), TxBuilderError> {
        self.valid_to_slot = Some(slot);
        self.check_validity_interval()
    }

    fn register_script(&mut self, _role: ScriptRole, script: Script) -> Result<(), TxBuilderError> {
        self.scripts.insert(script.hash(), script);
        Ok(())
    }

    fn add_required_signer(&mut self, key_hash: KeyHash) -> Result<(), TxBuilderError> {
        if !self.required_signers.contains(&key_hash) {
            self.required_signers.push(key_hash);
        }

        Ok(())
    }

    fn add_certificate(
        &mut self,
        certificate: Certificate,
        redeemer: Option<Redeemer>,
    ) -> Result<(), TxBuilderError> {
        self.certificates.push((certificate, redeemer));
        Ok(())
    }

    fn add_withdrawal(
        &mut self,
        reward_address: RewardAddress,
        amount: u64,
        redeemer: Option<Redeemer>,
    ) -> Result<(), TxBuilderError> {
        let account = reward_address.to_vec();

        if self.withdrawals.contains_key(&account) {
            return Err(TransactionError::DuplicateWithdrawal(reward_address.to_string()).into());
        }

        self.withdrawals
            .insert(account, (reward_address, amount, redeemer));

        Ok(())
    }

    fn balance_and_build(self, ctx: BalanceContext) -> Result<CompletedTx, TxBuilderError> {
        let witnesses = self.resolve_witnesses()?;
        let pool = self.selection_pool(&ctx);

        debug!(
            scripts = witnesses.scripts.len(),
            redeemers = witnesses.redeemers.len(),
            pool = pool.len(),
            "balancing transaction"
        );

        let mut fee = 0;

        for round in 0..MAX_FEE_ROUNDS {
            let selection = self.select(&pool, fee, &ctx.change_address)?;

            let collateral = if witnesses.redeemers.is_empty() {
                None
            } else {
                Some(self.select_collateral(&pool, fee)?)
            };

            let draft = self.draft(&witnesses, &selection, collateral.map(|x| x.input), fee);
            let (tx_hash, tx_bytes) = draft.encode()?;

            let signers = self.key_witnesses(&selection.inputs, collateral);
            let size = tx_bytes.len() as u64 + signers * VKEY_WITNESS_SIZE;

            let next = linear_fee(size, &self.protocol)
                + script_fee(witnesses.redeemers.len(), &self.protocol);

            debug!(round, fee, next, size, "fee round");

            if next > fee {
                fee = next;
                continue;
            }

            if size > self.protocol.max_tx_size {
                return Err(TransactionError::MaxTxSizeExceeded {
                    size,
                    max: self.protocol.max_tx_size,
                }
                .into());
            }

            return Ok(CompletedTx {
                tx_hash,
                tx_bytes,
                fee,
                inputs: draft.inputs,
                reference_inputs: draft.reference_inputs,
                collateral: draft.collateral,
                outputs: draft.outputs,
                mint: draft.mint,
                witness_scripts: draft.witness_scripts,
                datums: draft.datums,
                redeemers: draft.redeemers.into_iter().map(|(x, _)| x).collect(),
                required_signers: draft.required_signers,
                valid_from_slot: draft.valid_from_slot,
                valid_to_slot: draft.valid_to_slot,
            });
        }

        Err(RuntimeError::FeeDidNotConverge(MAX_FEE_ROUNDS).into())
    }
}
