//! Network configuration handed to every builder at creation time.

use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::{
    indexer::{ChainIndexer, IndexerError},
    model::ScriptKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    Mainnet,
    Preprod,
    Preview,
    /// A private network or an emulator.
    Custom,
}

impl Network {
    /// The network tag carried in address headers.
    pub fn network_id(&self) -> u8 {
        match self {
            Network::Mainnet => 1,
            _ => 0,
        }
    }
}

/// Maps unix time (milliseconds) to slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotConfig {
    pub zero_time: u64,
    pub zero_slot: u64,
    pub slot_length: u64,
}

impl SlotConfig {
    pub fn mainnet() -> Self {
        Self {
            zero_time: 1_596_059_091_000,
            zero_slot: 4_492_800,
            slot_length: 1000,
        }
    }

    pub fn preprod() -> Self {
        Self {
            zero_time: 1_655_769_600_000,
            zero_slot: 86_400,
            slot_length: 1000,
        }
    }

    pub fn preview() -> Self {
        Self {
            zero_time: 1_666_656_000_000,
            zero_slot: 0,
            slot_length: 1000,
        }
    }

    /// Slot zero starts at `zero_time`, one slot per second.
    pub fn custom(zero_time: u64) -> Self {
        Self {
            zero_time,
            zero_slot: 0,
            slot_length: 1000,
        }
    }

    /// Returns `None` for times before the first slot, or when the config
    /// can't map time to slots at all (zero slot length, overflow).
    pub fn unix_time_to_slot(&self, unix_time: u64) -> Option<u64> {
        unix_time
            .checked_sub(self.zero_time)?
            .checked_div(self.slot_length)?
            .checked_add(self.zero_slot)
    }

    pub fn slot_to_unix_time(&self, slot: u64) -> Option<u64> {
        slot.checked_sub(self.zero_slot)?
            .checked_mul(self.slot_length)?
            .checked_add(self.zero_time)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ratio {
    pub numerator: u64,
    pub denominator: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExUnits {
    pub mem: u64,
    pub steps: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostModels {
    pub plutus_v1: Option<Vec<i64>>,
    pub plutus_v2: Option<Vec<i64>>,
    pub plutus_v3: Option<Vec<i64>>,
}

impl CostModels {
    pub fn get(&self, kind: ScriptKind) -> Option<&[i64]> {
        match kind {
            ScriptKind::Native => None,
            ScriptKind::PlutusV1 => self.plutus_v1.as_deref(),
            ScriptKind::PlutusV2 => self.plutus_v2.as_deref(),
            ScriptKind::PlutusV3 => self.plutus_v3.as_deref(),
        }
    }

    pub fn with(mut self, kind: ScriptKind, model: Vec<i64>) -> Self {
        match kind {
            ScriptKind::Native => (),
            ScriptKind::PlutusV1 => self.plutus_v1 = Some(model),
            ScriptKind::PlutusV2 => self.plutus_v2 = Some(model),
            ScriptKind::PlutusV3 => self.plutus_v3 = Some(model),
        }

        self
    }
}

/// The subset of protocol parameters the builder needs for balancing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolParams {
    pub min_fee_a: u64,
    pub min_fee_b: u64,
    pub max_tx_size: u64,
    pub max_value_size: u64,
    pub key_deposit: u64,
    pub coins_per_utxo_byte: u64,
    pub collateral_percent: u64,
    pub price_mem: Ratio,
    pub price_step: Ratio,
    /// Budget assigned to every redeemer. Script evaluation is out of reach of
    /// this crate, so budgets are not measured.
    pub default_ex_units: ExUnits,
    pub cost_models: CostModels,
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            min_fee_a: 44,
            min_fee_b: 155_381,
            max_tx_size: 16_384,
            max_value_size: 5000,
            key_deposit: 2_000_000,
            coins_per_utxo_byte: 4310,
            collateral_percent: 150,
            price_mem: Ratio {
                numerator: 577,
                denominator: 10_000,
            },
            price_step: Ratio {
                numerator: 721,
                denominator: 10_000_000,
            },
            default_ex_units: ExUnits {
                mem: 1_000_000,
                steps: 400_000_000,
            },
            cost_models: CostModels::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkParams {
    pub network: Network,
    pub slot_config: SlotConfig,
    #[serde(default)]
    pub protocol: ProtocolParams,
}

impl NetworkParams {
    pub fn mainnet() -> Self {
        Self {
            network: Network::Mainnet,
            slot_config: SlotConfig::mainnet(),
            protocol: ProtocolParams::default(),
        }
    }

    pub fn preprod() -> Self {
        Self {
            network: Network::Preprod,
            slot_config: SlotConfig::preprod(),
            protocol: ProtocolParams::default(),
        }
    }

    pub fn preview() -> Self {
        Self {
            network: Network::Preview,
            slot_config: SlotConfig::preview(),
            protocol: ProtocolParams::default(),
        }
    }

    pub fn custom(zero_time: u64) -> Self {
        Self {
            network: Network::Custom,
            slot_config: SlotConfig::custom(zero_time),
            protocol: ProtocolParams::default(),
        }
    }

    pub fn with_protocol(mut self, protocol: ProtocolParams) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, serde_json::Error> {
        serde_json::from_reader(reader)
    }

    /// Builds the parameters of `network` from the protocol parameters served
    /// by a chain indexer.
    pub async fn fetch<I: ChainIndexer>(
        indexer: &I,
        network: Network,
        slot_config: SlotConfig,
    ) -> Result<Self, IndexerError> {
        let protocol = indexer.protocol_params().await?;

        Ok(Self {
            network,
            slot_config,
            protocol,
        })
    }
}
