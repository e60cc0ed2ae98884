//! Ledger values that intents are declared over.

use std::{collections::BTreeMap, fmt, str::FromStr};

use pallas_addresses::{Address, ShelleyPaymentPart, StakeAddress, StakePayload};
use pallas_crypto::hash::{Hash, Hasher};
use serde::{Deserialize, Serialize};

use crate::TransactionError;

pub type PolicyId = Hash<28>;
pub type PoolId = Hash<28>;
pub type KeyHash = Hash<28>;
pub type ScriptHash = Hash<28>;
pub type DatumHash = Hash<32>;
pub type TxHash = Hash<32>;

/// Reference to a transaction output: the producing transaction and the
/// output index within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtxoRef {
    pub tx_hash: TxHash,
    pub index: u64,
}

impl UtxoRef {
    pub fn new(tx_hash: TxHash, index: u64) -> Self {
        Self { tx_hash, index }
    }
}

impl fmt::Display for UtxoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.tx_hash, self.index)
    }
}

/// An asset class: either lovelace or a native token.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Unit {
    Lovelace,
    Token(PolicyId, Vec<u8>),
}

impl Unit {
    pub fn token(policy: PolicyId, name: impl Into<Vec<u8>>) -> Result<Self, TransactionError> {
        let name = name.into();

        if name.len() > 32 {
            return Err(TransactionError::AssetNameTooLong);
        }

        Ok(Self::Token(policy, name))
    }

    pub fn policy(&self) -> Option<&PolicyId> {
        match self {
            Unit::Lovelace => None,
            Unit::Token(policy, _) => Some(policy),
        }
    }

    pub fn is_lovelace(&self) -> bool {
        matches!(self, Unit::Lovelace)
    }
}

impl FromStr for Unit {
    type Err = TransactionError;

    /// Parses `lovelace` or the hex concatenation of policy id and asset name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "lovelace" {
            return Ok(Unit::Lovelace);
        }

        let bytes = hex::decode(s).map_err(|_| TransactionError::InvalidUnit(s.to_owned()))?;

        if bytes.len() < 28 {
            return Err(TransactionError::InvalidUnit(s.to_owned()));
        }

        let (policy, name) = bytes.split_at(28);
        let policy: [u8; 28] = policy
            .try_into()
            .map_err(|_| TransactionError::InvalidUnit(s.to_owned()))?;

        Unit::token(Hash::new(policy), name)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Lovelace => write!(f, "lovelace"),
            Unit::Token(policy, name) => write!(f, "{}{}", policy, hex::encode(name)),
        }
    }
}

/// A bundle of quantities indexed by unit.
///
/// Quantities are signed so the same type serves outputs, mints, burns and
/// balance arithmetic. `with` keeps whatever quantity it is given (zero
/// included) so declaration checks can see it; the arithmetic helpers drop
/// entries that reach zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assets(BTreeMap<Unit, i128>);

impl Assets {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn from_lovelace(amount: u64) -> Self {
        Self::new().with(Unit::Lovelace, amount as i128)
    }

    /// Builds a bundle from `(unit, quantity)` pairs in their string form.
    pub fn from_units<S: AsRef<str>>(
        units: impl IntoIterator<Item = (S, i128)>,
    ) -> Result<Self, TransactionError> {
        let mut out = Self::new();

        for (unit, quantity) in units {
            let unit = unit.as_ref().parse()?;
            out.add_quantity(unit, quantity);
        }

        Ok(out)
    }

    pub fn with(mut self, unit: Unit, quantity: i128) -> Self {
        self.0.insert(unit, quantity);
        self
    }

    pub fn with_lovelace(self, amount: u64) -> Self {
        self.with(Unit::Lovelace, amount as i128)
    }

    pub fn add_quantity(&mut self, unit: Unit, quantity: i128) {
        let entry = self.0.entry(unit.clone()).or_default();
        *entry += quantity;

        if *entry == 0 {
            self.0.remove(&unit);
        }
    }

    pub fn get(&self, unit: &Unit) -> i128 {
        self.0.get(unit).copied().unwrap_or_default()
    }

    pub fn lovelace(&self) -> i128 {
        self.get(&Unit::Lovelace)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Unit, i128)> {
        self.0.iter().map(|(unit, quantity)| (unit, *quantity))
    }

    /// Native tokens grouped by policy, in canonical order.
    pub fn by_policy(&self) -> BTreeMap<PolicyId, Vec<(Vec<u8>, i128)>> {
        let mut out: BTreeMap<PolicyId, Vec<(Vec<u8>, i128)>> = BTreeMap::new();

        for (unit, quantity) in self.iter() {
            if let Unit::Token(policy, name) = unit {
                out.entry(*policy)
                    .or_default()
                    .push((name.clone(), quantity));
            }
        }

        out
    }

    pub fn has_tokens(&self) -> bool {
        self.0.keys().any(|x| !x.is_lovelace())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Removes entries holding a zero quantity.
    pub fn pruned(mut self) -> Self {
        self.0.retain(|_, quantity| *quantity != 0);
        self
    }

    pub fn merge(&mut self, other: &Assets) {
        for (unit, quantity) in other.iter() {
            self.add_quantity(unit.clone(), quantity);
        }
    }

    pub fn subtract(&mut self, other: &Assets) {
        for (unit, quantity) in other.iter() {
            self.add_quantity(unit.clone(), -quantity);
        }
    }

    /// The first unit holding a negative quantity, lovelace first.
    pub fn first_deficit(&self) -> Option<(&Unit, i128)> {
        self.iter().find(|(_, quantity)| *quantity < 0)
    }
}

impl FromIterator<(Unit, i128)> for Assets {
    fn from_iter<T: IntoIterator<Item = (Unit, i128)>>(iter: T) -> Self {
        let mut out = Assets::new();

        for (unit, quantity) in iter {
            out.add_quantity(unit, quantity);
        }

        out
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum DatumKind {
    /// Only the datum hash goes in the output, the body in the witness set.
    Hash,
    Inline,
}

/// Datum attached to an output. `bytes` is always the CBOR of the plutus data,
/// whatever the kind.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Datum {
    pub kind: DatumKind,
    pub bytes: Vec<u8>,
}

impl Datum {
    pub fn inline(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: DatumKind::Inline,
            bytes: bytes.into(),
        }
    }

    pub fn as_hash(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: DatumKind::Hash,
            bytes: bytes.into(),
        }
    }

    pub fn hash(&self) -> DatumHash {
        Hasher::<256>::hash(&self.bytes)
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum ScriptKind {
    Native,
    PlutusV1,
    PlutusV2,
    PlutusV3,
}

impl ScriptKind {
    /// Prefix byte used when hashing a script of this language.
    pub fn tag(&self) -> u8 {
        match self {
            ScriptKind::Native => 0,
            ScriptKind::PlutusV1 => 1,
            ScriptKind::PlutusV2 => 2,
            ScriptKind::PlutusV3 => 3,
        }
    }

    pub fn is_plutus(&self) -> bool {
        !matches!(self, ScriptKind::Native)
    }
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Script {
    pub kind: ScriptKind,
    pub bytes: Vec<u8>,
}

impl Script {
    pub fn new(kind: ScriptKind, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            bytes: bytes.into(),
        }
    }

    pub fn hash(&self) -> ScriptHash {
        Hasher::<224>::hash_tagged(&self.bytes, self.kind.tag())
    }
}

/// What an attached script is meant to validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScriptRole {
    Generic,
    Spending,
    Minting,
    Certificate,
    Withdrawal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScriptKey {
    pub role: ScriptRole,
    pub hash: ScriptHash,
}

impl ScriptKey {
    pub fn of(role: ScriptRole, script: &Script) -> Self {
        Self {
            role,
            hash: script.hash(),
        }
    }
}

/// An unspent output, as served by a chain indexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Utxo {
    pub input: UtxoRef,
    pub address: Address,
    pub assets: Assets,
    /// Set when the output only carries the hash of its datum.
    pub datum_hash: Option<DatumHash>,
    /// The datum body: inline, or resolved from the hash.
    pub datum: Option<Vec<u8>>,
    pub script_ref: Option<Script>,
}

impl Utxo {
    pub fn new(input: UtxoRef, address: Address, assets: Assets) -> Self {
        Self {
            input,
            address,
            assets,
            datum_hash: None,
            datum: None,
            script_ref: None,
        }
    }

    pub fn with_inline_datum(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.datum_hash = None;
        self.datum = Some(bytes.into());
        self
    }

    pub fn with_datum_hash(mut self, hash: DatumHash, body: Option<Vec<u8>>) -> Self {
        self.datum_hash = Some(hash);
        self.datum = body;
        self
    }

    pub fn with_script_ref(mut self, script: Script) -> Self {
        self.script_ref = Some(script);
        self
    }

    pub fn payment_script(&self) -> Option<ScriptHash> {
        payment_script(&self.address)
    }
}

pub(crate) fn payment_script(address: &Address) -> Option<ScriptHash> {
    match address {
        Address::Shelley(x) => match x.payment() {
            ShelleyPaymentPart::Script(hash) => Some(*hash),
            ShelleyPaymentPart::Key(_) => None,
        },
        _ => None,
    }
}

/// A transaction output, as declared or as produced by balancing.
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub address: Address,
    pub assets: Assets,
    pub datum: Option<Datum>,
    pub script_ref: Option<Script>,
}

impl Output {
    pub fn new(address: Address, assets: Assets) -> Self {
        Self {
            address,
            assets,
            datum: None,
            script_ref: None,
        }
    }

    pub fn lovelace(&self) -> u64 {
        self.assets.lovelace().max(0) as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Credential {
    Key(KeyHash),
    Script(ScriptHash),
}

impl Credential {
    pub fn script_hash(&self) -> Option<ScriptHash> {
        match self {
            Credential::Script(x) => Some(*x),
            Credential::Key(_) => None,
        }
    }
}

/// A stake (reward) address.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardAddress(StakeAddress);

impl RewardAddress {
    pub fn credential(&self) -> Credential {
        match self.0.payload() {
            StakePayload::Stake(x) => Credential::Key(*x),
            StakePayload::Script(x) => Credential::Script(*x),
        }
    }

    /// Raw bytes, as used for the reward account of a withdrawal.
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    pub fn to_address(&self) -> Address {
        Address::Stake(self.0.clone())
    }
}

impl fmt::Display for RewardAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_address().to_bech32() {
            Ok(x) => write!(f, "{x}"),
            Err(_) => write!(f, "{}", hex::encode(self.to_vec())),
        }
    }
}

impl TryFrom<Address> for RewardAddress {
    type Error = Address;

    fn try_from(value: Address) -> Result<Self, Self::Error> {
        match value {
            Address::Stake(x) => Ok(Self(x)),
            other => Err(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Certificate {
    StakeRegistration(Credential),
    StakeDeregistration(Credential),
    StakeDelegation(Credential, PoolId),
}

impl Certificate {
    pub fn credential(&self) -> &Credential {
        match self {
            Certificate::StakeRegistration(x) => x,
            Certificate::StakeDeregistration(x) => x,
            Certificate::StakeDelegation(x, _) => x,
        }
    }

    /// Registration certificates don't need the credential's witness.
    pub fn requires_witness(&self) -> bool {
        !matches!(self, Certificate::StakeRegistration(_))
    }
}

/// The delegation state of a registered stake credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delegation {
    pub pool_id: Option<PoolId>,
    pub rewards: u64,
}
