use std::{fmt, fs, path::Path};

use serde::{Deserialize, Serialize};

mod chain;
mod cli;
pub mod consts;
pub mod errors;
mod keeper;
mod registry;
mod scheduling;

pub use chain::ChainConfig;
pub use cli::KeeperArgs;
pub use errors::{ConfigError, ConfigResult};
pub use keeper::KeeperConfig;
pub use registry::RegistryConfig;
pub use scheduling::SchedulingConfig;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FastlaneConfig {
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub keeper: KeeperConfig,
}

impl FastlaneConfig {
    pub fn try_load_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let toml = fs::read_to_string(path)
            .map_err(|err| ConfigError::ReadFile(path.to_path_buf(), err))?;
        Self::try_load_from_toml(&toml)
            .map_err(|err| ConfigError::ParseFile(path.to_path_buf(), err))
    }

    pub fn try_load_from_toml(toml: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.scheduling.validate()
    }
}

impl fmt::Display for FastlaneConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match toml::to_string_pretty(self) {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "{:?}", self),
        }
    }
}
