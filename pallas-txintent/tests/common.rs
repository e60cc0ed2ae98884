#![allow(dead_code)]

use pallas_crypto::hash::Hash;
use pallas_txintent::prelude::*;

/// Slot zero of the test network.
pub const ZERO_TIME: u64 = 1_700_000_000_000;

/// `Constr 0 []`
pub const UNIT_DATUM: &str = "d87980";

/// The bytes `1111`.
pub const BYTES_DATUM: &str = "4431313131";

pub const PLUTUS_V2: &str = "49480100002221200101";

pub const SIG_KEY: [u8; 28] = [0x0a; 28];

pub fn address(header: u8, seed: u8) -> Address {
    let mut bytes = vec![header];
    bytes.extend([seed; 28]);
    Address::from_bytes(&bytes).unwrap()
}

pub fn bech32(address: &Address) -> String {
    address.to_bech32().unwrap()
}

pub fn script_address(hash: ScriptHash) -> Address {
    let mut bytes = vec![0x70];
    bytes.extend_from_slice(hash.as_slice());
    Address::from_bytes(&bytes).unwrap()
}

pub fn reward_address(hash: Hash<28>, script: bool) -> String {
    let mut bytes = vec![if script { 0xf0 } else { 0xe0 }];
    bytes.extend_from_slice(hash.as_slice());
    bech32(&Address::from_bytes(&bytes).unwrap())
}

pub fn wallet() -> Address {
    address(0x60, 1)
}

pub fn receiver() -> String {
    bech32(&address(0x60, 2))
}

pub fn utxo(seed: u8, address: Address, lovelace: u64) -> Utxo {
    Utxo::new(
        UtxoRef::new(Hash::new([seed; 32]), 0),
        address,
        Assets::from_lovelace(lovelace),
    )
}

pub fn wallet_utxos() -> Vec<Utxo> {
    vec![
        utxo(1, wallet(), 50_000_000),
        utxo(2, wallet(), 25_000_000),
    ]
}

pub fn params() -> NetworkParams {
    let mut protocol = ProtocolParams::default();
    protocol.cost_models = protocol
        .cost_models
        .with(ScriptKind::PlutusV2, vec![100_788, 420, 1, 1, 1000, 173]);

    NetworkParams::custom(ZERO_TIME).with_protocol(protocol)
}

pub fn indexer() -> MemoryIndexer {
    MemoryIndexer::new().with_utxos(wallet_utxos())
}

pub fn config_with(indexer: MemoryIndexer) -> BuilderConfig<MemoryIndexer> {
    BuilderConfig::new(params(), indexer, wallet())
}

pub fn builder() -> TxBuilder<MemoryIndexer> {
    TxBuilder::new(config_with(indexer()))
}

pub fn datum(hex_str: &str) -> Vec<u8> {
    hex::decode(hex_str).unwrap()
}

pub fn plutus() -> Script {
    Script::new(ScriptKind::PlutusV2, hex::decode(PLUTUS_V2).unwrap())
}

/// A native script requiring the signature of [`SIG_KEY`].
pub fn sig_policy() -> Script {
    let mut bytes = hex::decode("8200581c").unwrap();
    bytes.extend(SIG_KEY);
    Script::new(ScriptKind::Native, bytes)
}

pub fn token(policy: &Script, name: &str) -> Unit {
    Unit::token(policy.hash(), name.as_bytes()).unwrap()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}
