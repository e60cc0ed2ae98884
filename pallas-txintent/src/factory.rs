//! Argument validation for every declaration.
//!
//! Each function checks the shape of its arguments and returns the matching
//! [`Intent`]. Nothing here looks at the chain or at the ledger engine, so
//! anything that depends on the rest of the transaction is left to replay.

use bech32::FromBase32;
use pallas_addresses::{Address, ShelleyPaymentPart, StakePayload};
use pallas_crypto::hash::Hash;
use pallas_primitives::{conway::NativeScript, conway::PlutusData, Fragment};

use crate::{
    intent::{Intent, Redeemer},
    model::{
        payment_script, Assets, Datum, KeyHash, Output, PoolId, RewardAddress, Script,
        ScriptKey, ScriptKind, ScriptRole, Unit, Utxo,
    },
    params::NetworkParams,
    TransactionError,
};

const POOL_HRP: &str = "pool";

pub fn add_input(utxo: Utxo) -> Intent {
    Intent::AddInput(utxo)
}

/// Spends every utxo of the list, all with the same redeemer.
pub fn collect_from(
    utxos: Vec<Utxo>,
    redeemer: Option<Redeemer>,
) -> Result<Intent, TransactionError> {
    if utxos.is_empty() {
        return Err(TransactionError::EmptyUtxoSet);
    }

    Ok(Intent::CollectInputs {
        utxos,
        redeemer: check_redeemer(redeemer)?,
    })
}

pub fn read_from(utxos: Vec<Utxo>) -> Result<Intent, TransactionError> {
    if utxos.is_empty() {
        return Err(TransactionError::EmptyUtxoSet);
    }

    Ok(Intent::ReadFrom(utxos))
}

pub fn pay_to_address(
    params: &NetworkParams,
    address: &str,
    assets: Assets,
) -> Result<Intent, TransactionError> {
    let address = parse_address(params, address)?;
    let assets = check_output_assets(assets)?;

    Ok(Intent::AddOutput(Output::new(address, assets)))
}

/// Pays with a datum attached and, optionally, a reference script.
pub fn pay_to_address_with_data(
    params: &NetworkParams,
    address: &str,
    datum: Datum,
    script_ref: Option<Script>,
    assets: Assets,
) -> Result<Intent, TransactionError> {
    let address = parse_address(params, address)?;
    let assets = check_output_assets(assets)?;
    let datum = check_datum(datum)?;
    let script_ref = script_ref.map(check_script).transpose()?;

    Ok(Intent::AddOutput(Output {
        address,
        assets,
        datum: Some(datum),
        script_ref,
    }))
}

/// Locks value at a script address. Outputs at script addresses without a
/// datum are unspendable by plutus validators, so the datum is mandatory.
pub fn pay_to_contract(
    params: &NetworkParams,
    address: &str,
    datum: Datum,
    assets: Assets,
) -> Result<Intent, TransactionError> {
    let parsed = parse_address(params, address)?;

    if payment_script(&parsed).is_none() {
        return Err(TransactionError::NotAScriptAddress(address.to_owned()));
    }

    pay_to_address_with_data(params, address, datum, None, assets)
}

/// Mints positive quantities and burns negative ones.
pub fn mint_assets(assets: Assets, redeemer: Option<Redeemer>) -> Result<Intent, TransactionError> {
    if assets.is_empty() {
        return Err(TransactionError::EmptyMint);
    }

    for (unit, quantity) in assets.iter() {
        let Unit::Token(_, name) = unit else {
            return Err(TransactionError::LovelaceMint);
        };

        if name.len() > 32 {
            return Err(TransactionError::AssetNameTooLong);
        }

        if quantity == 0 {
            return Err(TransactionError::ZeroMintQuantity(unit.to_string()));
        }

        if i64::try_from(quantity).is_err() {
            return Err(TransactionError::QuantityOutOfRange {
                unit: unit.to_string(),
                quantity,
            });
        }
    }

    Ok(Intent::MintAsset {
        assets,
        redeemer: check_redeemer(redeemer)?,
    })
}

/// Unix time in milliseconds.
pub fn valid_from(params: &NetworkParams, unix_time: u64) -> Result<Intent, TransactionError> {
    check_time(params, unix_time)?;
    Ok(Intent::SetValidFrom(unix_time))
}

/// Unix time in milliseconds.
pub fn valid_to(params: &NetworkParams, unix_time: u64) -> Result<Intent, TransactionError> {
    check_time(params, unix_time)?;
    Ok(Intent::SetValidTo(unix_time))
}

/// Scripts are not queued: the builder keeps them in a map under the
/// returned key.
pub fn attach_script(
    role: ScriptRole,
    script: Script,
) -> Result<(ScriptKey, Script), TransactionError> {
    let script = check_script(script)?;
    Ok((ScriptKey::of(role, &script), script))
}

/// Requires the signature of the key behind the payment part of a shelley
/// address, or behind a stake address.
pub fn add_signer(params: &NetworkParams, address: &str) -> Result<Intent, TransactionError> {
    let key_hash = match parse_address(params, address)? {
        Address::Shelley(x) => match x.payment() {
            ShelleyPaymentPart::Key(hash) => *hash,
            ShelleyPaymentPart::Script(_) => {
                return Err(TransactionError::InvalidKeyHash(address.to_owned()))
            }
        },
        Address::Stake(x) => match x.payload() {
            StakePayload::Stake(hash) => *hash,
            StakePayload::Script(_) => {
                return Err(TransactionError::InvalidKeyHash(address.to_owned()))
            }
        },
        Address::Byron(_) => return Err(TransactionError::InvalidAddress(address.to_owned())),
    };

    Ok(Intent::AddSigner(key_hash))
}

/// Same as [`add_signer`], from the hex of the key hash.
pub fn add_signer_key(key_hash: &str) -> Result<Intent, TransactionError> {
    let hash: KeyHash =
        parse_hash(key_hash).ok_or_else(|| TransactionError::InvalidKeyHash(key_hash.to_owned()))?;

    Ok(Intent::AddSigner(hash))
}

pub fn register_stake(
    params: &NetworkParams,
    reward_address: &str,
) -> Result<Intent, TransactionError> {
    Ok(Intent::RegisterStake(parse_reward_address(
        params,
        reward_address,
    )?))
}

pub fn deregister_stake(
    params: &NetworkParams,
    reward_address: &str,
    redeemer: Option<Redeemer>,
) -> Result<Intent, TransactionError> {
    Ok(Intent::DeregisterStake {
        reward_address: parse_reward_address(params, reward_address)?,
        redeemer: check_redeemer(redeemer)?,
    })
}

/// Delegates to a pool given as `pool1…` bech32 or as the hex of its id.
pub fn delegate_to(
    params: &NetworkParams,
    reward_address: &str,
    pool_id: &str,
    redeemer: Option<Redeemer>,
) -> Result<Intent, TransactionError> {
    Ok(Intent::DelegateTo {
        reward_address: parse_reward_address(params, reward_address)?,
        pool_id: parse_pool_id(pool_id)?,
        redeemer: check_redeemer(redeemer)?,
    })
}

pub fn withdraw(
    params: &NetworkParams,
    reward_address: &str,
    amount: u64,
    redeemer: Option<Redeemer>,
) -> Result<Intent, TransactionError> {
    if amount == 0 {
        return Err(TransactionError::ZeroWithdrawal);
    }

    Ok(Intent::Withdraw {
        reward_address: parse_reward_address(params, reward_address)?,
        amount,
        redeemer: check_redeemer(redeemer)?,
    })
}

fn parse_address(params: &NetworkParams, address: &str) -> Result<Address, TransactionError> {
    let parsed = Address::from_bech32(address)
        .map_err(|_| TransactionError::InvalidAddress(address.to_owned()))?;

    match parsed.network() {
        Some(network) if network.value() != params.network.network_id() => {
            Err(TransactionError::WrongNetwork(address.to_owned()))
        }
        _ => Ok(parsed),
    }
}

fn parse_reward_address(
    params: &NetworkParams,
    address: &str,
) -> Result<RewardAddress, TransactionError> {
    let parsed = parse_address(params, address)?;

    RewardAddress::try_from(parsed)
        .map_err(|_| TransactionError::NotARewardAddress(address.to_owned()))
}

fn parse_hash<const N: usize>(hex_str: &str) -> Option<Hash<N>> {
    let bytes = hex::decode(hex_str).ok()?;
    let bytes: [u8; N] = bytes.try_into().ok()?;

    Some(Hash::new(bytes))
}

fn parse_pool_id(pool_id: &str) -> Result<PoolId, TransactionError> {
    let invalid = || TransactionError::InvalidPoolId(pool_id.to_owned());

    if !pool_id.starts_with(POOL_HRP) {
        return parse_hash(pool_id).ok_or_else(invalid);
    }

    let (hrp, data, _) = bech32::decode(pool_id).map_err(|_| invalid())?;

    if hrp != POOL_HRP {
        return Err(invalid());
    }

    let bytes = Vec::<u8>::from_base32(&data).map_err(|_| invalid())?;
    let bytes: [u8; 28] = bytes.try_into().map_err(|_| invalid())?;

    Ok(Hash::new(bytes))
}

/// Drops zero entries. What's left must be non-negative, fit in a `u64` and
/// not be empty.
fn check_output_assets(assets: Assets) -> Result<Assets, TransactionError> {
    for (unit, quantity) in assets.iter() {
        if quantity < 0 {
            return Err(TransactionError::NegativeQuantity {
                unit: unit.to_string(),
                quantity,
            });
        }

        if u64::try_from(quantity).is_err() {
            return Err(TransactionError::QuantityOutOfRange {
                unit: unit.to_string(),
                quantity,
            });
        }

        if let Unit::Token(_, name) = unit {
            if name.len() > 32 {
                return Err(TransactionError::AssetNameTooLong);
            }
        }
    }

    let assets = assets.pruned();

    if assets.is_empty() {
        return Err(TransactionError::EmptyOutput);
    }

    Ok(assets)
}

fn check_datum(datum: Datum) -> Result<Datum, TransactionError> {
    PlutusData::decode_fragment(&datum.bytes).map_err(|_| TransactionError::MalformedDatum)?;
    Ok(datum)
}

fn check_redeemer(redeemer: Option<Redeemer>) -> Result<Option<Redeemer>, TransactionError> {
    if let Some(bytes) = &redeemer {
        PlutusData::decode_fragment(bytes).map_err(|_| TransactionError::MalformedRedeemer)?;
    }

    Ok(redeemer)
}

fn check_script(script: Script) -> Result<Script, TransactionError> {
    if script.bytes.is_empty() {
        return Err(TransactionError::MalformedScript);
    }

    if script.kind == ScriptKind::Native {
        NativeScript::decode_fragment(&script.bytes)
            .map_err(|_| TransactionError::MalformedScript)?;
    }

    Ok(script)
}

fn check_time(params: &NetworkParams, unix_time: u64) -> Result<(), TransactionError> {
    match params.slot_config.unix_time_to_slot(unix_time) {
        Some(_) => Ok(()),
        None => Err(TransactionError::InvalidTimestamp(unix_time)),
    }
}

#[cfg(test)]
mod tests {
    use bech32::{ToBase32, Variant};
    use test_case::test_case;

    use super::*;
    use crate::model::Credential;

    const DATUM: &str = "d87980";
    const NATIVE: &str = "8200581c07070707070707070707070707070707070707070707070707070707";

    fn bech32(header: u8, seed: u8) -> String {
        let mut bytes = vec![header];
        bytes.extend([seed; 28]);
        Address::from_bytes(&bytes).unwrap().to_bech32().unwrap()
    }

    fn params() -> NetworkParams {
        NetworkParams::custom(1_000_000)
    }

    fn token(name: &str) -> Unit {
        Unit::token(Hash::new([4; 28]), name.as_bytes()).unwrap()
    }

    #[test]
    fn pays_to_a_key_address() {
        let intent =
            pay_to_address(&params(), &bech32(0x60, 1), Assets::from_lovelace(5_000_000)).unwrap();

        let Intent::AddOutput(output) = intent else {
            panic!("expected an output");
        };

        assert_eq!(output.lovelace(), 5_000_000);
        assert!(output.datum.is_none());
    }

    #[test_case(Assets::from_lovelace(0) => TransactionError::EmptyOutput ; "nothing")]
    #[test_case(Assets::new().with(Unit::Lovelace, -1) => matches TransactionError::NegativeQuantity { .. } ; "negative lovelace")]
    #[test_case(Assets::from_lovelace(1).with(token("a"), -5) => matches TransactionError::NegativeQuantity { .. } ; "negative token")]
    #[test_case(Assets::new().with(Unit::Lovelace, u64::MAX as i128 + 1) => matches TransactionError::QuantityOutOfRange { .. } ; "too much")]
    fn rejects_invalid_output_assets(assets: Assets) -> TransactionError {
        pay_to_address(&params(), &bech32(0x60, 1), assets).unwrap_err()
    }

    #[test]
    fn zero_lovelace_with_tokens_is_accepted() {
        let intent = pay_to_address(
            &params(),
            &bech32(0x60, 1),
            Assets::from_lovelace(0).with(token("a"), 3),
        )
        .unwrap();

        let Intent::AddOutput(output) = intent else {
            panic!("expected an output");
        };

        assert_eq!(output.assets, Assets::new().with(token("a"), 3));
    }

    #[test_case("addr_test1qqq" ; "garbage")]
    #[test_case("" ; "empty")]
    fn rejects_malformed_addresses(address: &str) {
        let err = pay_to_address(&params(), address, Assets::from_lovelace(1)).unwrap_err();
        assert!(matches!(err, TransactionError::InvalidAddress(_)));
    }

    #[test]
    fn rejects_addresses_of_other_networks() {
        let mainnet = bech32(0x61, 1);
        let err = pay_to_address(&params(), &mainnet, Assets::from_lovelace(1)).unwrap_err();

        assert_eq!(err, TransactionError::WrongNetwork(mainnet));
    }

    #[test]
    fn datum_must_be_plutus_data() {
        let err = pay_to_address_with_data(
            &params(),
            &bech32(0x60, 1),
            Datum::inline(vec![0xff, 0xff]),
            None,
            Assets::from_lovelace(1),
        )
        .unwrap_err();

        assert_eq!(err, TransactionError::MalformedDatum);
    }

    #[test]
    fn contracts_need_a_script_address() {
        let datum = Datum::as_hash(hex::decode(DATUM).unwrap());

        let err = pay_to_contract(
            &params(),
            &bech32(0x60, 1),
            datum.clone(),
            Assets::from_lovelace(1),
        )
        .unwrap_err();
        assert!(matches!(err, TransactionError::NotAScriptAddress(_)));

        let intent =
            pay_to_contract(&params(), &bech32(0x70, 1), datum, Assets::from_lovelace(1)).unwrap();
        assert!(matches!(intent, Intent::AddOutput(Output { datum: Some(_), .. })));
    }

    #[test_case(Assets::new() => TransactionError::EmptyMint ; "empty")]
    #[test_case(Assets::from_lovelace(1) => TransactionError::LovelaceMint ; "lovelace")]
    #[test_case(Assets::new().with(token("a"), 0) => matches TransactionError::ZeroMintQuantity(_) ; "zero")]
    #[test_case(Assets::new().with(token("a"), i64::MAX as i128 + 1) => matches TransactionError::QuantityOutOfRange { .. } ; "too much")]
    fn rejects_invalid_mints(assets: Assets) -> TransactionError {
        mint_assets(assets, None).unwrap_err()
    }

    #[test]
    fn burns_are_negative_mints() {
        let intent = mint_assets(Assets::new().with(token("a"), -10), None).unwrap();
        assert!(matches!(intent, Intent::MintAsset { .. }));
    }

    #[test]
    fn redeemers_must_be_plutus_data() {
        let err = mint_assets(Assets::new().with(token("a"), 1), Some(vec![0xff])).unwrap_err();
        assert_eq!(err, TransactionError::MalformedRedeemer);
    }

    #[test]
    fn times_before_slot_zero_are_rejected() {
        assert_eq!(
            valid_from(&params(), 999_999).unwrap_err(),
            TransactionError::InvalidTimestamp(999_999)
        );
        assert_eq!(
            valid_to(&params(), 1_000_000).unwrap(),
            Intent::SetValidTo(1_000_000)
        );
    }

    #[test]
    fn collect_and_read_need_utxos() {
        assert_eq!(
            collect_from(vec![], None).unwrap_err(),
            TransactionError::EmptyUtxoSet
        );
        assert_eq!(read_from(vec![]).unwrap_err(), TransactionError::EmptyUtxoSet);
    }

    #[test]
    fn native_scripts_must_decode() {
        let valid = Script::new(ScriptKind::Native, hex::decode(NATIVE).unwrap());
        let (key, script) = attach_script(ScriptRole::Minting, valid.clone()).unwrap();
        assert_eq!(key.role, ScriptRole::Minting);
        assert_eq!(key.hash, valid.hash());
        assert_eq!(script, valid);

        let invalid = Script::new(ScriptKind::Native, vec![0x01, 0x02]);
        assert_eq!(
            attach_script(ScriptRole::Minting, invalid).unwrap_err(),
            TransactionError::MalformedScript
        );

        let empty = Script::new(ScriptKind::PlutusV2, vec![]);
        assert_eq!(
            attach_script(ScriptRole::Spending, empty).unwrap_err(),
            TransactionError::MalformedScript
        );
    }

    #[test]
    fn stake_declarations_need_reward_addresses() {
        let err = register_stake(&params(), &bech32(0x60, 1)).unwrap_err();
        assert!(matches!(err, TransactionError::NotARewardAddress(_)));

        let intent = register_stake(&params(), &bech32(0xe0, 1)).unwrap();
        let Intent::RegisterStake(reward_address) = intent else {
            panic!("expected a registration");
        };

        assert_eq!(
            reward_address.credential(),
            Credential::Key(Hash::new([1; 28]))
        );
    }

    #[test]
    fn pool_ids_parse_from_bech32_and_hex() {
        let pool = bech32::encode(POOL_HRP, [9u8; 28].to_base32(), Variant::Bech32).unwrap();
        let hex_id = hex::encode([9u8; 28]);

        for pool_id in [pool.as_str(), hex_id.as_str()] {
            let intent = delegate_to(&params(), &bech32(0xe0, 1), pool_id, None).unwrap();

            assert!(matches!(
                intent,
                Intent::DelegateTo { pool_id, .. } if pool_id == Hash::new([9; 28])
            ));
        }

        let err = delegate_to(&params(), &bech32(0xe0, 1), "pool1xyz", None).unwrap_err();
        assert!(matches!(err, TransactionError::InvalidPoolId(_)));
    }

    #[test]
    fn withdrawals_must_be_positive() {
        assert_eq!(
            withdraw(&params(), &bech32(0xe0, 1), 0, None).unwrap_err(),
            TransactionError::ZeroWithdrawal
        );
    }

    #[test]
    fn signers_come_from_key_credentials() {
        let intent = add_signer(&params(), &bech32(0x60, 5)).unwrap();
        assert_eq!(intent, Intent::AddSigner(Hash::new([5; 28])));

        let err = add_signer(&params(), &bech32(0x70, 5)).unwrap_err();
        assert!(matches!(err, TransactionError::InvalidKeyHash(_)));

        let intent = add_signer_key(&hex::encode([6u8; 28])).unwrap();
        assert_eq!(intent, Intent::AddSigner(Hash::new([6; 28])));
    }
}
