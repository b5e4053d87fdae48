use fastlane_core::{Address, ContractPointer};
use fastlane_rpc_client::FastlaneRpcClientError;
use thiserror::Error;

pub type AddressHubResult<T> = Result<T, AddressHubError>;

#[derive(Error, Debug)]
pub enum AddressHubError {
    #[error("Address hub {hub} does not know pointer {pointer}")]
    UnknownPointer {
        hub: Address,
        pointer: ContractPointer,
    },

    #[error("Address hub returned unknown pointer {0} for {1}")]
    UnexpectedPointer(u64, Address),

    #[error("Failed to query address hub for {what}: {source}")]
    Query {
        what: String,
        #[source]
        source: FastlaneRpcClientError,
    },
}
