use std::{
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use alloy::primitives::Address;
use fastlane_config::{ConfigError, FastlaneConfig};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[test]
fn test_load_monad_testnet_toml() {
    let config =
        FastlaneConfig::try_load_from_file(fixture("01_monad-testnet.toml"))
            .unwrap();

    assert_eq!(config.chain.rpc_url.as_str(), "https://testnet-rpc.monad.xyz/");
    assert_eq!(
        config.registry.address_hub().unwrap(),
        Address::from_str("0xC9f0cDE8316AbC5Efc8C3f5A6b571e815C021B51")
            .unwrap()
    );
    assert_eq!(config.scheduling.bond_multiplier, 3);
    assert_eq!(
        config.scheduling.inclusion_timeout(),
        Duration::from_secs(30)
    );
    // untouched fields keep their defaults
    assert_eq!(config.scheduling.max_top_ups, 1);
    assert_eq!(config.keeper.min_gas_reserve, 50_000);
    assert_eq!(config.keeper.tick_interval(), Duration::from_millis(400));
    assert!(config.keeper.payout_address.is_some());
}

#[test]
fn test_unknown_section_fails() {
    let err =
        FastlaneConfig::try_load_from_file(fixture("02_unknown-section.toml"))
            .unwrap_err();
    assert!(matches!(err, ConfigError::ParseFile(..)));
}

#[test]
fn test_missing_file_fails() {
    let err = FastlaneConfig::try_load_from_file(fixture("does-not-exist.toml"))
        .unwrap_err();
    assert!(matches!(err, ConfigError::ReadFile(..)));
}

#[test]
fn test_missing_address_hub() {
    let config = FastlaneConfig::default();
    assert!(matches!(
        config.registry.address_hub(),
        Err(ConfigError::MissingAddressHub)
    ));
}
