use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::errors::{ConfigError, ConfigResult};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct RegistryConfig {
    /// Address of the hub every other FastLane contract is resolved from.
    #[serde(default)]
    pub address_hub: Option<Address>,
}

impl RegistryConfig {
    pub fn address_hub(&self) -> ConfigResult<Address> {
        self.address_hub.ok_or(ConfigError::MissingAddressHub)
    }
}
