use fastlane_core::{Address, PolicyId};
use fastlane_rpc_client::FastlaneRpcClientError;
use thiserror::Error;

pub type ShMonadResult<T> = Result<T, ShMonadError>;

#[derive(Error, Debug)]
pub enum ShMonadError {
    #[error("Failed to read {what} of {account}: {source}")]
    Read {
        what: &'static str,
        account: Address,
        #[source]
        source: FastlaneRpcClientError,
    },

    #[error("Failed to deposit and bond to policy {policy_id} for {recipient}: {source}")]
    DepositAndBond {
        policy_id: PolicyId,
        recipient: Address,
        #[source]
        source: FastlaneRpcClientError,
    },
}

impl ShMonadError {
    pub fn ledger_error(&self) -> &FastlaneRpcClientError {
        match self {
            Self::Read { source, .. } | Self::DepositAndBond { source, .. } => {
                source
            }
        }
    }
}
