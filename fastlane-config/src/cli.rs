use std::{path::PathBuf, str::FromStr};

use alloy::{primitives::Address, signers::local::PrivateKeySigner};
use clap::Args;
use url::Url;

use crate::{
    errors::{ConfigError, ConfigResult},
    FastlaneConfig,
};

/// Options shared by every keeper command. Values given here override the
/// config file.
#[derive(Debug, Clone, Default, Args)]
pub struct KeeperArgs {
    #[arg(long, help = "Path to the TOML config file")]
    pub config_file: Option<PathBuf>,

    #[arg(long, env = "RPC_URL", help = "JSON-RPC endpoint of the chain")]
    pub rpc_url: Option<Url>,

    #[arg(
        long,
        env = "ADDRESS_HUB",
        help = "Address of the FastLane address hub"
    )]
    pub address_hub: Option<String>,

    #[arg(
        long,
        env = "DEPLOYER_PRIVATE_KEY",
        hide_env_values = true,
        help = "Hex private key of the signing account. DO NOT PROVIDE THIS VALUE VIA THE CLI IN PROD!"
    )]
    pub private_key: Option<String>,
}

impl KeeperArgs {
    /// Loads the config file, if any, and applies the overrides.
    pub fn load_config(&self) -> ConfigResult<FastlaneConfig> {
        let mut config = match &self.config_file {
            Some(path) => FastlaneConfig::try_load_from_file(path)?,
            None => FastlaneConfig::default(),
        };

        if let Some(rpc_url) = &self.rpc_url {
            config.chain.rpc_url = rpc_url.clone();
        }
        if let Some(address_hub) = &self.address_hub {
            config.registry.address_hub =
                Some(Address::from_str(address_hub).map_err(|_| {
                    ConfigError::InvalidAddress {
                        field: "address-hub",
                        value: address_hub.clone(),
                    }
                })?);
        }

        config.validate()?;
        Ok(config)
    }

    /// The signer for transactions, `None` when no key was provided.
    ///
    /// The key may be given with or without `0x` prefix.
    pub fn signer(&self) -> ConfigResult<Option<PrivateKeySigner>> {
        let Some(key) = &self.private_key else {
            return Ok(None);
        };
        let key = key.trim();
        let key = key.strip_prefix("0x").unwrap_or(key);
        PrivateKeySigner::from_str(key)
            .map(Some)
            .map_err(|err| ConfigError::InvalidPrivateKey(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    // anvil's first dev account
    const DEV_KEY: &str =
        "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_signer_accepts_prefixed_and_bare_keys() {
        let bare = KeeperArgs {
            private_key: Some(DEV_KEY.to_string()),
            ..Default::default()
        };
        let prefixed = KeeperArgs {
            private_key: Some(format!("0x{DEV_KEY}")),
            ..Default::default()
        };
        let bare = bare.signer().unwrap().unwrap();
        let prefixed = prefixed.signer().unwrap().unwrap();
        assert_eq!(bare.address(), prefixed.address());
        assert_eq!(
            bare.address(),
            Address::from_str("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
                .unwrap()
        );
    }

    #[test]
    fn test_missing_key_means_read_only() {
        assert!(KeeperArgs::default().signer().unwrap().is_none());
    }

    #[test]
    fn test_invalid_key_is_rejected() {
        let args = KeeperArgs {
            private_key: Some("not-a-key".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            args.signer(),
            Err(ConfigError::InvalidPrivateKey(_))
        ));
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[chain]\nrpc-url = \"http://file:8545/\"\n\n[scheduling]\nmax-top-ups = 3"
        )
        .unwrap();

        let args = KeeperArgs {
            config_file: Some(file.path().to_path_buf()),
            rpc_url: Some("http://cli:8545".parse().unwrap()),
            address_hub: Some(
                "0x00000000000000000000000000000000000000bb".to_string(),
            ),
            private_key: None,
        };
        let config = args.load_config().unwrap();
        assert_eq!(config.chain.rpc_url.as_str(), "http://cli:8545/");
        assert_eq!(config.scheduling.max_top_ups, 3);
        assert!(config.registry.address_hub().is_ok());
    }

    #[test]
    fn test_invalid_hub_override() {
        let args = KeeperArgs {
            address_hub: Some("hub".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            args.load_config(),
            Err(ConfigError::InvalidAddress { .. })
        ));
    }
}
