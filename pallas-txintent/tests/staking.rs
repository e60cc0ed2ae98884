use pallas_crypto::hash::Hash;
use pallas_txintent::prelude::*;
use test_case::test_case;

mod common;

use common::*;

const POOL: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

fn stake_key() -> String {
    reward_address(Hash::new([0x0b; 28]), false)
}

fn reward(bech32: &str) -> RewardAddress {
    RewardAddress::try_from(Address::from_bech32(bech32).unwrap()).unwrap()
}

fn delegated(rewards: u64) -> MemoryIndexer {
    indexer().with_delegation(
        reward(&stake_key()),
        Delegation {
            pool_id: Some(Hash::new([0xaa; 28])),
            rewards,
        },
    )
}

#[tokio::test]
async fn registration_pays_the_deposit() {
    let tx = builder()
        .register_stake(&stake_key())
        .unwrap()
        .delegate_to(&stake_key(), POOL, None)
        .unwrap()
        .complete()
        .unsafe_run()
        .await;

    let change = tx.outputs().last().unwrap();
    assert_eq!(change.address, wallet());

    // only the largest wallet utxo is spent
    assert_eq!(change.lovelace() + tx.fee() + 2_000_000, 50_000_000);
}

#[tokio::test]
async fn deregistration_refunds_the_deposit() {
    let tx = TxBuilder::new(config_with(delegated(0)))
        .deregister_stake(&stake_key(), None)
        .unwrap()
        .complete()
        .unsafe_run()
        .await;

    let change = tx.outputs().last().unwrap();
    assert_eq!(change.lovelace() + tx.fee(), 50_000_000 + 2_000_000);
}

#[tokio::test]
async fn withdrawals_need_a_registered_credential() {
    let err = builder()
        .withdraw(&stake_key(), 1_000_000, None)
        .unwrap()
        .complete()
        .safe_run()
        .await
        .unwrap_err();

    assert_eq!(
        err.as_transaction(),
        Some(&TransactionError::StakeNotRegistered(stake_key()))
    );
}

#[test_case(999_999 ; "below the rewards")]
#[test_case(1_000_001 ; "above the rewards")]
#[tokio::test]
async fn withdrawals_take_every_reward(requested: u64) {
    let err = TxBuilder::new(config_with(delegated(1_000_000)))
        .withdraw(&stake_key(), requested, None)
        .unwrap()
        .complete()
        .safe_run()
        .await
        .unwrap_err();

    assert_eq!(
        err.as_transaction(),
        Some(&TransactionError::WithdrawalMismatch {
            requested,
            available: 1_000_000,
        })
    );
}

#[tokio::test]
async fn withdrawn_rewards_fund_the_transaction() {
    let tx = TxBuilder::new(config_with(delegated(1_000_000)))
        .withdraw(&stake_key(), 1_000_000, None)
        .unwrap()
        .complete()
        .unsafe_run()
        .await;

    let change = tx.outputs().last().unwrap();
    assert_eq!(change.lovelace() + tx.fee(), 50_000_000 + 1_000_000);
}

#[tokio::test]
async fn script_credentials_need_their_validator() {
    let validator = plutus();
    let stake_script = reward_address(validator.hash(), true);
    let redeemer = Some(datum(UNIT_DATUM));

    let err = builder()
        .delegate_to(&stake_script, POOL, redeemer.clone())
        .unwrap()
        .complete()
        .safe_run()
        .await
        .unwrap_err();

    match err.as_transaction() {
        Some(TransactionError::MissingScript { hash, purpose }) => {
            assert_eq!(*hash, validator.hash());
            assert_eq!(purpose, "certificate #0");
        }
        other => panic!("unexpected failure: {other:?}"),
    }

    let tx = builder()
        .delegate_to(&stake_script, POOL, redeemer)
        .unwrap()
        .attach_certificate_validator(validator.clone())
        .unwrap()
        .complete()
        .unsafe_run()
        .await;

    assert_eq!(tx.redeemer_count(), 1);
    assert_eq!(tx.witness_scripts(), &[validator]);
    assert!(tx.collateral().is_some());
}

#[test]
fn staking_declarations_validate_their_arguments() {
    let err = builder().register_stake(&receiver()).err();
    assert_eq!(err, Some(TransactionError::NotARewardAddress(receiver())));

    let err = builder().withdraw(&stake_key(), 0, None).err();
    assert_eq!(err, Some(TransactionError::ZeroWithdrawal));

    let err = builder().delegate_to(&stake_key(), "pool1xyz", None).err();
    assert_eq!(
        err,
        Some(TransactionError::InvalidPoolId("pool1xyz".to_owned()))
    );
}

#[tokio::test]
async fn rewards_are_withdrawn_once() {
    let config = config_with(delegated(1_000_000));
    let indexer = config.indexer.clone();

    let err = TxBuilder::new(config)
        .withdraw(&stake_key(), 1_000_000, None)
        .unwrap()
        .withdraw(&stake_key(), 1_000_000, None)
        .unwrap()
        .complete()
        .safe_run()
        .await
        .unwrap_err();

    assert_eq!(
        err.as_transaction(),
        Some(&TransactionError::DuplicateWithdrawal(stake_key()))
    );
    assert_eq!(indexer.calls(), 0);
}
