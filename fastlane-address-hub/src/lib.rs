//! Resolves the current addresses of the FastLane contracts.
//!
//! The deployment is upgradable, so resolved addresses are only valid for
//! the session that resolved them.
use fastlane_core::{abi::IAddressHub, Address, ContractPointer, U256};
use fastlane_rpc_client::FastlaneRpcClient;
use log::*;

mod errors;

pub use errors::{AddressHubError, AddressHubResult};

/// Addresses of the contracts a session talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedAddresses {
    pub address_hub: Address,
    pub task_manager: Address,
    pub shmonad: Address,
}

#[derive(Clone)]
pub struct AddressHub {
    rpc_client: FastlaneRpcClient,
    address: Address,
}

impl AddressHub {
    pub fn new(rpc_client: FastlaneRpcClient, address: Address) -> Self {
        Self {
            rpc_client,
            address,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn resolve(
        &self,
        pointer: ContractPointer,
    ) -> AddressHubResult<Address> {
        let call = IAddressHub::getAddressFromPointerCall {
            pointer: U256::from(pointer.as_u64()),
        };
        let address = self
            .rpc_client
            .read(self.address, &call)
            .await
            .map_err(|source| AddressHubError::Query {
                what: format!("pointer {pointer}"),
                source,
            })?;

        if address.is_zero() {
            return Err(AddressHubError::UnknownPointer {
                hub: self.address,
                pointer,
            });
        }
        debug!("Resolved {} to {}", pointer, address);
        Ok(address)
    }

    pub async fn task_manager_address(&self) -> AddressHubResult<Address> {
        self.resolve(ContractPointer::TaskManager).await
    }

    pub async fn shmonad_address(&self) -> AddressHubResult<Address> {
        self.resolve(ContractPointer::ShMonad).await
    }

    /// Reverse lookup, `None` if the hub does not track `address`.
    pub async fn pointer_of(
        &self,
        address: Address,
    ) -> AddressHubResult<Option<ContractPointer>> {
        let call = IAddressHub::getPointerFromAddressCall { target: address };
        let pointer = self
            .rpc_client
            .read(self.address, &call)
            .await
            .map_err(|source| AddressHubError::Query {
                what: format!("address {address}"),
                source,
            })?;
        if pointer.is_zero() {
            return Ok(None);
        }

        let raw = u64::try_from(pointer).unwrap_or(u64::MAX);
        ContractPointer::try_from(raw)
            .map(Some)
            .map_err(|raw| AddressHubError::UnexpectedPointer(raw, address))
    }

    pub async fn is_fastlane(
        &self,
        address: Address,
    ) -> AddressHubResult<bool> {
        let call = IAddressHub::isFastLaneCall { target: address };
        self.rpc_client
            .read(self.address, &call)
            .await
            .map_err(|source| AddressHubError::Query {
                what: format!("address {address}"),
                source,
            })
    }

    /// Resolves every contract the keeper needs, once per session.
    pub async fn resolve_session(&self) -> AddressHubResult<ResolvedAddresses> {
        let addresses = ResolvedAddresses {
            address_hub: self.address,
            task_manager: self.task_manager_address().await?,
            shmonad: self.shmonad_address().await?,
        };
        info!(
            "Task manager at {}, shMonad at {}",
            addresses.task_manager, addresses.shmonad
        );
        Ok(addresses)
    }
}
