use std::time::Duration;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::consts;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct KeeperConfig {
    /// Receives the execution fees, defaults to the signing account.
    #[serde(default)]
    pub payout_address: Option<Address>,
    /// Gas the task manager keeps in reserve when executing a batch.
    #[serde(default)]
    pub min_gas_reserve: u64,
    /// Determines how frequently the keeper checks for due tasks.
    #[serde(default = "default_millis_per_tick")]
    pub millis_per_tick: u64,
    /// How many blocks past the current one are searched for due tasks.
    #[serde(default = "default_lookahead_blocks")]
    pub lookahead_blocks: u64,
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            payout_address: None,
            min_gas_reserve: 0,
            millis_per_tick: default_millis_per_tick(),
            lookahead_blocks: default_lookahead_blocks(),
        }
    }
}

impl KeeperConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.millis_per_tick)
    }
}

fn default_millis_per_tick() -> u64 {
    consts::DEFAULT_MILLIS_PER_TICK
}

fn default_lookahead_blocks() -> u64 {
    consts::DEFAULT_LOOKAHEAD_BLOCKS
}
