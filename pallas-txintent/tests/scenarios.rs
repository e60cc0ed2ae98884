use pallas_txintent::prelude::*;

mod common;

use common::*;

#[tokio::test]
async fn pays_with_an_inline_datum() {
    init_tracing();

    let tx = builder()
        .pay_to_address_with_data(
            &receiver(),
            Datum::inline(datum(UNIT_DATUM)),
            None,
            Assets::from_lovelace(5_000_000),
        )
        .unwrap()
        .complete()
        .unsafe_run()
        .await;

    let declared: Vec<_> = tx
        .outputs()
        .iter()
        .filter(|x| bech32(&x.address) == receiver())
        .collect();

    assert_eq!(declared.len(), 1);
    assert_eq!(declared[0].lovelace(), 5_000_000);

    let attached = declared[0].datum.as_ref().unwrap();
    assert_eq!(attached.kind, DatumKind::Inline);
    assert_eq!(attached.bytes, datum(UNIT_DATUM));

    // inline datums never reach the witness set
    assert!(tx.datums().is_empty());
}

#[tokio::test]
async fn minting_needs_its_policy() {
    let policy = sig_policy();
    let assets = Assets::new().with(token(&policy, "token"), 123);

    let err = builder()
        .mint_assets(assets.clone(), None)
        .unwrap()
        .complete()
        .safe_run()
        .await
        .unwrap_err();

    match err.as_transaction() {
        Some(TransactionError::MissingScript { hash, purpose }) => {
            assert_eq!(*hash, policy.hash());
            assert!(purpose.starts_with("mint of"));
        }
        other => panic!("unexpected failure: {other:?}"),
    }

    let tx = builder()
        .mint_assets(assets, None)
        .unwrap()
        .attach_minting_policy(policy.clone())
        .unwrap()
        .complete()
        .safe_run()
        .await
        .unwrap();

    assert_eq!(tx.mint().get(&token(&policy, "token")), 123);
    assert_eq!(tx.witness_scripts(), &[policy.clone()]);
    assert_eq!(tx.redeemer_count(), 0);

    // the minted tokens land in the change output
    let change = tx.outputs().last().unwrap();
    assert_eq!(change.address, wallet());
    assert_eq!(change.assets.get(&token(&policy, "token")), 123);
}

#[tokio::test]
async fn composed_outputs_keep_declaration_order() {
    let hashed = builder()
        .pay_to_address_with_data(
            &receiver(),
            Datum::as_hash(datum(BYTES_DATUM)),
            None,
            Assets::from_lovelace(3_000_000),
        )
        .unwrap();

    let inlined = builder()
        .pay_to_address_with_data(
            &receiver(),
            Datum::inline(datum(UNIT_DATUM)),
            None,
            Assets::from_lovelace(4_000_000),
        )
        .unwrap();

    let tx = hashed.compose(inlined).complete().unsafe_run().await;

    let outputs = tx.outputs();
    assert_eq!(outputs.len(), 3);

    assert_eq!(outputs[0].datum.as_ref().unwrap().kind, DatumKind::Hash);
    assert_eq!(outputs[0].lovelace(), 3_000_000);
    assert_eq!(outputs[1].datum.as_ref().unwrap().kind, DatumKind::Inline);
    assert_eq!(outputs[1].lovelace(), 4_000_000);
    assert_eq!(outputs[2].address, wallet());

    // only the hashed datum travels in the witness set
    assert_eq!(tx.datums(), &[datum(BYTES_DATUM)]);
}

#[tokio::test]
async fn inverted_validity_fails_before_querying_the_chain() {
    let config = config_with(indexer());
    let indexer = config.indexer.clone();

    let err = TxBuilder::new(config)
        .valid_to(ZERO_TIME + 10_000)
        .unwrap()
        .valid_from(ZERO_TIME + 20_000)
        .unwrap()
        .complete()
        .safe_run()
        .await
        .unwrap_err();

    assert_eq!(
        err.as_transaction(),
        Some(&TransactionError::InvalidValidityInterval { start: 20, end: 10 })
    );
    assert_eq!(indexer.calls(), 0);
}

#[tokio::test]
async fn validity_bounds_become_slots() {
    let tx = builder()
        .valid_from(ZERO_TIME + 5_000)
        .unwrap()
        .valid_to(ZERO_TIME + 905_500)
        .unwrap()
        .complete()
        .unsafe_run()
        .await;

    assert_eq!(tx.valid_from_slot(), Some(5));
    assert_eq!(tx.valid_to_slot(), Some(905));
}

#[tokio::test]
async fn replay_stops_at_the_first_failure() {
    let spent = wallet_utxos().remove(0);

    let err = builder()
        .add_input(spent.clone())
        .add_input(spent.clone())
        .valid_to(ZERO_TIME + 10_000)
        .unwrap()
        .valid_from(ZERO_TIME + 20_000)
        .unwrap()
        .complete()
        .safe_run()
        .await
        .unwrap_err();

    assert_eq!(
        err.as_transaction(),
        Some(&TransactionError::DuplicateInput(spent.input))
    );
}

#[tokio::test]
async fn explicit_inputs_are_not_selected_twice() {
    let spent = wallet_utxos().remove(1);

    let tx = builder()
        .add_input(spent.clone())
        .pay_to_address(&receiver(), Assets::from_lovelace(10_000_000))
        .unwrap()
        .complete()
        .unsafe_run()
        .await;

    assert_eq!(tx.inputs(), &[spent.input]);
}

#[tokio::test]
async fn balances_value_exactly() {
    let tx = builder()
        .pay_to_address(&receiver(), Assets::from_lovelace(60_000_000))
        .unwrap()
        .complete()
        .unsafe_run()
        .await;

    // both wallet utxos are needed
    assert_eq!(tx.inputs().len(), 2);

    let produced: u64 = tx.outputs().iter().map(|x| x.lovelace()).sum();
    assert_eq!(produced + tx.fee(), 75_000_000);
}

#[tokio::test]
async fn unfunded_payments_are_rejected() {
    let err = builder()
        .pay_to_address(&receiver(), Assets::from_lovelace(80_000_000))
        .unwrap()
        .complete()
        .safe_run()
        .await
        .unwrap_err();

    assert!(matches!(
        err.as_transaction(),
        Some(TransactionError::InsufficientFunds { .. })
    ));
}

#[tokio::test]
async fn zero_lovelace_outputs_get_the_minimum() {
    let policy = sig_policy();
    let unit = token(&policy, "token");

    let tx = builder()
        .mint_assets(Assets::new().with(unit.clone(), 10), None)
        .unwrap()
        .attach_minting_policy(policy)
        .unwrap()
        .pay_to_address(&receiver(), Assets::new().with(unit.clone(), 10))
        .unwrap()
        .complete()
        .unsafe_run()
        .await;

    let paid = &tx.outputs()[0];
    assert_eq!(paid.assets.get(&unit), 10);
    assert!(paid.lovelace() > 0);
}

#[test]
fn declarations_reject_malformed_arguments() {
    let err = builder()
        .pay_to_address("not an address", Assets::from_lovelace(1_000_000))
        .err();
    assert!(matches!(err, Some(TransactionError::InvalidAddress(_))));

    let err = builder().mint_assets(Assets::new(), None).err();
    assert_eq!(err, Some(TransactionError::EmptyMint));

    let err = builder().valid_from(ZERO_TIME - 1).err();
    assert_eq!(err, Some(TransactionError::InvalidTimestamp(ZERO_TIME - 1)));

    let err = builder()
        .pay_to_contract(
            &receiver(),
            Datum::inline(datum(UNIT_DATUM)),
            Assets::from_lovelace(2_000_000),
        )
        .err();
    assert!(matches!(err, Some(TransactionError::NotAScriptAddress(_))));
}

#[test]
fn unusable_slot_configs_reject_timestamps() {
    let mut params = params();
    params.slot_config.slot_length = 0;

    let err = TxBuilder::new(BuilderConfig::new(params, indexer(), wallet()))
        .valid_from(ZERO_TIME + 1_000)
        .err();

    assert_eq!(err, Some(TransactionError::InvalidTimestamp(ZERO_TIME + 1_000)));
}
