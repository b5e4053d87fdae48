use std::{sync::Arc, time::Duration};

use fastlane_rpc_client::{FastlaneRpcClient, InclusionConfig};

pub mod macros;
mod simulated;

pub use simulated::{
    SimulatedDeployment, SimulatedLedger, SimulatedTask, DEFAULT_POLICY_ID,
};

/// Short inclusion window so that withheld receipts time out quickly.
pub fn test_inclusion_config() -> InclusionConfig {
    InclusionConfig::new(Duration::from_millis(200), Duration::from_millis(10))
}

pub fn rpc_client_for(ledger: &Arc<SimulatedLedger>) -> FastlaneRpcClient {
    FastlaneRpcClient::new(ledger.clone(), test_inclusion_config())
}
