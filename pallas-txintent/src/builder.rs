use tracing::{debug, trace};

use crate::{
    complete::Completion,
    context::{BuilderConfig, BuilderContext},
    engine::StagingEngine,
    factory,
    intent::{Intent, Redeemer},
    model::{Assets, Datum, Script, ScriptRole, Utxo},
    TransactionError,
};

/// A transaction declared piece by piece.
///
/// Every declaration validates its arguments, records an [`Intent`] and hands
/// the builder back. Nothing touches the ledger engine or the chain until
/// [`TxBuilder::complete`] is driven. The builder is moved through every call,
/// so a builder can't be completed twice, and the sources of a
/// [`TxBuilder::compose`] can't be completed at all.
pub struct TxBuilder<I, E = StagingEngine> {
    ctx: BuilderContext<I, E>,
}

impl<I> TxBuilder<I, StagingEngine> {
    pub fn new(config: BuilderConfig<I>) -> Self {
        let engine = StagingEngine::new(&config.params);
        Self::with_engine(config, engine)
    }
}

impl<I, E> TxBuilder<I, E> {
    /// A builder replaying its intents against a custom engine.
    pub fn with_engine(config: BuilderConfig<I>, engine: E) -> Self {
        Self {
            ctx: BuilderContext::new(config, engine),
        }
    }

    pub fn context(&self) -> &BuilderContext<I, E> {
        &self.ctx
    }

    fn push(mut self, intent: Intent) -> Self {
        trace!(kind = intent.kind(), position = self.ctx.intents.len(), "intent declared");
        self.ctx.intents.push(intent);
        self
    }

    /// Spends a single utxo without a redeemer.
    pub fn add_input(mut self, utxo: Utxo) -> Self {
        self.ctx.input_refs.push(utxo.input);
        self.push(factory::add_input(utxo))
    }

    /// Spends every utxo of the list. Script-locked utxos share the redeemer.
    pub fn collect_from(
        mut self,
        utxos: Vec<Utxo>,
        redeemer: Option<Redeemer>,
    ) -> Result<Self, TransactionError> {
        let intent = factory::collect_from(utxos, redeemer)?;

        if let Intent::CollectInputs { utxos, .. } = &intent {
            self.ctx.input_refs.extend(utxos.iter().map(|x| x.input));
        }

        Ok(self.push(intent))
    }

    /// Adds reference inputs, making their datums and reference scripts
    /// available without spending them.
    pub fn read_from(self, utxos: Vec<Utxo>) -> Result<Self, TransactionError> {
        let intent = factory::read_from(utxos)?;
        Ok(self.push(intent))
    }

    pub fn pay_to_address(self, address: &str, assets: Assets) -> Result<Self, TransactionError> {
        let intent = factory::pay_to_address(&self.ctx.config.params, address, assets)?;
        Ok(self.push(intent))
    }

    pub fn pay_to_address_with_data(
        self,
        address: &str,
        datum: Datum,
        script_ref: Option<Script>,
        assets: Assets,
    ) -> Result<Self, TransactionError> {
        let intent = factory::pay_to_address_with_data(
            &self.ctx.config.params,
            address,
            datum,
            script_ref,
            assets,
        )?;

        Ok(self.push(intent))
    }

    pub fn pay_to_contract(
        self,
        address: &str,
        datum: Datum,
        assets: Assets,
    ) -> Result<Self, TransactionError> {
        let intent = factory::pay_to_contract(&self.ctx.config.params, address, datum, assets)?;
        Ok(self.push(intent))
    }

    /// Mints positive quantities, burns negative ones.
    pub fn mint_assets(
        self,
        assets: Assets,
        redeemer: Option<Redeemer>,
    ) -> Result<Self, TransactionError> {
        let intent = factory::mint_assets(assets, redeemer)?;
        Ok(self.push(intent))
    }

    /// Unix time in milliseconds.
    pub fn valid_from(self, unix_time: u64) -> Result<Self, TransactionError> {
        let intent = factory::valid_from(&self.ctx.config.params, unix_time)?;
        Ok(self.push(intent))
    }

    /// Unix time in milliseconds.
    pub fn valid_to(self, unix_time: u64) -> Result<Self, TransactionError> {
        let intent = factory::valid_to(&self.ctx.config.params, unix_time)?;
        Ok(self.push(intent))
    }

    /// Stores the script under its role and hash. Attaching the same script
    /// for the same role again replaces the previous entry.
    pub fn attach_script(mut self, role: ScriptRole, script: Script) -> Result<Self, TransactionError> {
        let (key, script) = factory::attach_script(role, script)?;

        trace!(?role, hash = %key.hash, "script attached");

        self.ctx.scripts.insert(key, script);

        Ok(self)
    }

    pub fn attach_spending_validator(self, script: Script) -> Result<Self, TransactionError> {
        self.attach_script(ScriptRole::Spending, script)
    }

    pub fn attach_minting_policy(self, script: Script) -> Result<Self, TransactionError> {
        self.attach_script(ScriptRole::Minting, script)
    }

    pub fn attach_certificate_validator(self, script: Script) -> Result<Self, TransactionError> {
        self.attach_script(ScriptRole::Certificate, script)
    }

    pub fn attach_withdrawal_validator(self, script: Script) -> Result<Self, TransactionError> {
        self.attach_script(ScriptRole::Withdrawal, script)
    }

    /// Requires the signature of the key behind `address`.
    pub fn add_signer(self, address: &str) -> Result<Self, TransactionError> {
        let intent = factory::add_signer(&self.ctx.config.params, address)?;
        Ok(self.push(intent))
    }

    /// Requires the signature of the key with the given hex hash.
    pub fn add_signer_key(self, key_hash: &str) -> Result<Self, TransactionError> {
        let intent = factory::add_signer_key(key_hash)?;
        Ok(self.push(intent))
    }

    pub fn register_stake(self, reward_address: &str) -> Result<Self, TransactionError> {
        let intent = factory::register_stake(&self.ctx.config.params, reward_address)?;
        Ok(self.push(intent))
    }

    pub fn deregister_stake(
        self,
        reward_address: &str,
        redeemer: Option<Redeemer>,
    ) -> Result<Self, TransactionError> {
        let intent = factory::deregister_stake(&self.ctx.config.params, reward_address, redeemer)?;
        Ok(self.push(intent))
    }

    pub fn delegate_to(
        self,
        reward_address: &str,
        pool_id: &str,
        redeemer: Option<Redeemer>,
    ) -> Result<Self, TransactionError> {
        let intent =
            factory::delegate_to(&self.ctx.config.params, reward_address, pool_id, redeemer)?;

        Ok(self.push(intent))
    }

    /// Withdraws rewards. `amount` must match the rewards available.
    pub fn withdraw(
        self,
        reward_address: &str,
        amount: u64,
        redeemer: Option<Redeemer>,
    ) -> Result<Self, TransactionError> {
        let intent = factory::withdraw(&self.ctx.config.params, reward_address, amount, redeemer)?;
        Ok(self.push(intent))
    }

    /// Merges `other` into this builder.
    ///
    /// Intents of `other` are replayed after ours, its scripts replace ours
    /// when keys collide, and its spent inputs are appended to ours. The
    /// configuration, indexer and engine of `self` are kept.
    pub fn compose(mut self, other: Self) -> Self {
        let BuilderContext {
            input_refs,
            scripts,
            intents,
            ..
        } = other.ctx;

        debug!(
            left = self.ctx.intents.len(),
            right = intents.len(),
            "composing builders"
        );

        self.ctx.intents.extend(intents);

        for (key, script) in scripts {
            self.ctx.scripts.insert(key, script);
        }

        for input in input_refs {
            if !self.ctx.input_refs.contains(&input) {
                self.ctx.input_refs.push(input);
            }
        }

        self
    }

    /// Hands the builder over to completion. See [`Completion`] for the
    /// ways to drive it.
    pub fn complete(self) -> Completion<I, E> {
        Completion::new(self.ctx)
    }
}
