//! Replay of the declared intents and the three ways to drive it.

use std::future::{Future, IntoFuture};

use futures::{future::BoxFuture, FutureExt};
use tracing::{debug, instrument, warn};

use crate::{
    context::BuilderContext,
    engine::{BalanceContext, CompletedTx, LedgerEngine},
    indexer::ChainIndexer,
    intent::Intent,
    model::{Credential, RewardAddress, Utxo},
    TransactionError, TxBuilderError,
};

/// Replays every intent against the engine, then balances and builds.
///
/// Replay stops at the first failing intent. The chain indexer is only
/// queried once the whole queue has been replayed.
#[instrument(skip_all, fields(intents = ctx.intents.len(), scripts = ctx.scripts.len()))]
pub async fn attempt_completion<I, E>(
    ctx: BuilderContext<I, E>,
) -> Result<CompletedTx, TxBuilderError>
where
    I: ChainIndexer + Sync,
    E: LedgerEngine,
{
    let BuilderContext {
        config,
        mut engine,
        input_refs,
        scripts,
        intents,
    } = ctx;

    let mut registered: Vec<Credential> = vec![];
    let mut withdrawals: Vec<(RewardAddress, u64)> = vec![];

    for (position, intent) in intents.into_iter().enumerate() {
        debug!(position, kind = intent.kind(), "replaying intent");

        match &intent {
            Intent::RegisterStake(reward_address) => {
                registered.push(reward_address.credential());
            }
            Intent::Withdraw {
                reward_address,
                amount,
                ..
            } => withdrawals.push((reward_address.clone(), *amount)),
            _ => (),
        }

        if let Err(err) = intent.apply(&mut engine, &config.params) {
            warn!(position, %err, "replay failed");
            return Err(err);
        }
    }

    for (key, script) in scripts {
        Intent::AttachScript {
            role: key.role,
            script,
        }
        .apply(&mut engine, &config.params)?;
    }

    let wallet_utxos: Vec<Utxo> = config
        .indexer
        .utxos_at(&config.wallet)
        .await?
        .into_iter()
        .filter(|x| !input_refs.contains(&x.input))
        .collect();

    debug!(count = wallet_utxos.len(), "wallet utxos fetched");

    for (reward_address, requested) in withdrawals {
        // registered by this same transaction, nothing accrued yet
        let available = if registered.contains(&reward_address.credential()) {
            0
        } else {
            config
                .indexer
                .delegation(&reward_address)
                .await?
                .ok_or_else(|| TransactionError::StakeNotRegistered(reward_address.to_string()))?
                .rewards
        };

        if requested != available {
            return Err(TransactionError::WithdrawalMismatch {
                requested,
                available,
            }
            .into());
        }
    }

    engine.balance_and_build(BalanceContext {
        wallet_utxos,
        change_address: config.wallet.clone(),
    })
}

/// A builder handed over to completion.
///
/// The three run modes share [`attempt_completion`] and only differ in how
/// the outcome reaches the caller.
#[must_use = "nothing is built until the completion is run"]
pub struct Completion<I, E> {
    ctx: BuilderContext<I, E>,
}

impl<I, E> Completion<I, E> {
    pub(crate) fn new(ctx: BuilderContext<I, E>) -> Self {
        Self { ctx }
    }
}

impl<I, E> Completion<I, E>
where
    I: ChainIndexer + Send + Sync + 'static,
    E: LedgerEngine + Send + 'static,
{
    /// Runs completion and returns its outcome.
    pub async fn safe_run(self) -> Result<CompletedTx, TxBuilderError> {
        attempt_completion(self.ctx).await
    }

    /// Runs completion and returns the transaction.
    ///
    /// # Panics
    ///
    /// Panics if completion fails. The panic payload is the formatted
    /// failure message as a `String`, not the [`TxBuilderError`] itself; use
    /// [`Completion::safe_run`] to tell transaction failures from runtime
    /// ones.
    pub async fn unsafe_run(self) -> CompletedTx {
        match self.safe_run().await {
            Ok(tx) => tx,
            Err(err) => panic!("{err}"),
        }
    }

    /// Describes completion without running it. Nothing happens, not even
    /// replay, until the program is run.
    pub fn program(self) -> Program<CompletedTx> {
        let ctx = self.ctx;
        Program::new(move || attempt_completion(ctx))
    }
}

type Thunk<T> = Box<dyn FnOnce() -> BoxFuture<'static, Result<T, TxBuilderError>> + Send>;

/// A deferred computation that may fail with a [`TxBuilderError`].
///
/// Programs chain into larger programs (signing or submission stages, for
/// example) and only execute when [`Program::run`] is awaited.
#[must_use = "a program does nothing until it is run"]
pub struct Program<T> {
    thunk: Thunk<T>,
}

impl<T: Send + 'static> Program<T> {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TxBuilderError>> + Send + 'static,
    {
        Self {
            thunk: Box::new(move || f().boxed()),
        }
    }

    pub fn succeed(value: T) -> Self {
        Self::new(move || futures::future::ready(Ok(value)))
    }

    pub fn fail(err: TxBuilderError) -> Self {
        Self::new(move || futures::future::ready(Err(err)))
    }

    pub fn map<U, F>(self, f: F) -> Program<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        Program::new(move || async move { self.run().await.map(f) })
    }

    /// Runs `f` on the result of this program, then the program it returns.
    pub fn and_then<U, F>(self, f: F) -> Program<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Program<U> + Send + 'static,
    {
        Program::new(move || async move {
            let value = self.run().await?;
            f(value).run().await
        })
    }

    pub fn map_err<F>(self, f: F) -> Self
    where
        F: FnOnce(TxBuilderError) -> TxBuilderError + Send + 'static,
    {
        Program::new(move || async move { self.run().await.map_err(f) })
    }

    pub async fn run(self) -> Result<T, TxBuilderError> {
        (self.thunk)().await
    }
}

impl<T: Send + 'static> IntoFuture for Program<T> {
    type Output = Result<T, TxBuilderError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        (self.thunk)()
    }
}
