use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    consts,
    errors::{ConfigError, ConfigResult},
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct SchedulingConfig {
    /// The bonded amount required for scheduling, as a multiple of the
    /// estimated cost. The same amount is sent as maximum payment.
    #[serde(default = "default_bond_multiplier")]
    pub bond_multiplier: u64,
    /// How many times the bond is topped up before a scheduling attempt is
    /// abandoned.
    #[serde(default = "default_max_top_ups")]
    pub max_top_ups: u32,
    #[serde(default = "default_inclusion_timeout_millis")]
    pub inclusion_timeout_millis: u64,
    #[serde(default = "default_poll_interval_millis")]
    pub poll_interval_millis: u64,
    /// Gas limit of the `executeTasks` transaction.
    #[serde(default = "default_execute_gas_limit")]
    pub execute_gas_limit: u64,
    #[serde(default = "default_task_gas_limit")]
    pub task_gas_limit: u64,
    /// Default distance of a new task's start block from the current block.
    #[serde(default = "default_blocks_ahead")]
    pub blocks_ahead: u64,
    /// Default distance of a new task's deadline from the current block.
    #[serde(default = "default_deadline_blocks")]
    pub deadline_blocks: u64,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            bond_multiplier: default_bond_multiplier(),
            max_top_ups: default_max_top_ups(),
            inclusion_timeout_millis: default_inclusion_timeout_millis(),
            poll_interval_millis: default_poll_interval_millis(),
            execute_gas_limit: default_execute_gas_limit(),
            task_gas_limit: default_task_gas_limit(),
            blocks_ahead: default_blocks_ahead(),
            deadline_blocks: default_deadline_blocks(),
        }
    }
}

impl SchedulingConfig {
    pub fn inclusion_timeout(&self) -> Duration {
        Duration::from_millis(self.inclusion_timeout_millis)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_millis)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.bond_multiplier == 0 {
            return Err(ConfigError::InvalidValue {
                field: "bond-multiplier",
                reason: "must be at least 1",
            });
        }
        if self.poll_interval_millis == 0 {
            return Err(ConfigError::InvalidValue {
                field: "poll-interval-millis",
                reason: "must be positive",
            });
        }
        if self.blocks_ahead >= self.deadline_blocks {
            return Err(ConfigError::InvalidValue {
                field: "deadline-blocks",
                reason: "must be larger than blocks-ahead",
            });
        }
        Ok(())
    }
}

fn default_bond_multiplier() -> u64 {
    consts::DEFAULT_BOND_MULTIPLIER
}

fn default_max_top_ups() -> u32 {
    consts::DEFAULT_MAX_TOP_UPS
}

fn default_inclusion_timeout_millis() -> u64 {
    consts::DEFAULT_INCLUSION_TIMEOUT_MILLIS
}

fn default_poll_interval_millis() -> u64 {
    consts::DEFAULT_POLL_INTERVAL_MILLIS
}

fn default_execute_gas_limit() -> u64 {
    consts::DEFAULT_EXECUTE_GAS_LIMIT
}

fn default_task_gas_limit() -> u64 {
    consts::DEFAULT_TASK_GAS_LIMIT
}

fn default_blocks_ahead() -> u64 {
    consts::DEFAULT_BLOCKS_AHEAD
}

fn default_deadline_blocks() -> u64 {
    consts::DEFAULT_DEADLINE_BLOCKS
}
