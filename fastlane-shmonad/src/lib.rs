use fastlane_core::{
    abi::IShMonad, format_ether, Address, PolicyBond, PolicyId, U256,
};
use fastlane_rpc_client::{FastlaneRpcClient, PendingTransaction};
use log::*;

mod errors;

pub use errors::{ShMonadError, ShMonadResult};

/// Client of the shMonad bonding contract.
///
/// Every read goes to the ledger, bond snapshots are never cached.
#[derive(Clone)]
pub struct ShMonadClient {
    rpc_client: FastlaneRpcClient,
    address: Address,
}

impl ShMonadClient {
    pub fn new(rpc_client: FastlaneRpcClient, address: Address) -> Self {
        Self {
            rpc_client,
            address,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Free (unbonded) shMonad balance.
    pub async fn get_balance(&self, account: Address) -> ShMonadResult<U256> {
        self.rpc_client
            .read(self.address, &IShMonad::balanceOfCall { account })
            .await
            .map_err(|source| ShMonadError::Read {
                what: "balance",
                account,
                source,
            })
    }

    pub async fn get_native_balance(
        &self,
        account: Address,
    ) -> ShMonadResult<U256> {
        self.rpc_client.get_native_balance(account).await.map_err(
            |source| ShMonadError::Read {
                what: "native balance",
                account,
                source,
            },
        )
    }

    /// Reads bonded and unbonding amounts of `account` under `policy_id`.
    ///
    /// The two reads may land in different blocks.
    pub async fn get_policy_bond(
        &self,
        policy_id: PolicyId,
        account: Address,
    ) -> ShMonadResult<PolicyBond> {
        let bonded = self
            .rpc_client
            .read(
                self.address,
                &IShMonad::balanceOfBondedCall {
                    policyId: policy_id.0,
                    account,
                },
            )
            .await
            .map_err(|source| ShMonadError::Read {
                what: "bonded balance",
                account,
                source,
            })?;
        let unbonding = self
            .rpc_client
            .read(
                self.address,
                &IShMonad::balanceOfUnbondingCall {
                    policyId: policy_id.0,
                    account,
                },
            )
            .await
            .map_err(|source| ShMonadError::Read {
                what: "unbonding balance",
                account,
                source,
            })?;

        Ok(PolicyBond { bonded, unbonding })
    }

    /// `true` iff the bonded balance covers `required`, unbonding collateral
    /// does not count.
    pub async fn ensure_sufficient_bond(
        &self,
        policy_id: PolicyId,
        account: Address,
        required: U256,
    ) -> ShMonadResult<bool> {
        let bond = self.get_policy_bond(policy_id, account).await?;
        if bond.covers(required) {
            return Ok(true);
        }
        warn!(
            "Insufficient bond for {} under policy {}: current {} MON, required {} MON",
            account,
            policy_id,
            format_ether(bond.bonded),
            format_ether(required)
        );
        Ok(false)
    }

    pub async fn should_deposit_and_bond(
        &self,
        policy_id: PolicyId,
        account: Address,
        required: U256,
    ) -> ShMonadResult<bool> {
        self.ensure_sufficient_bond(policy_id, account, required)
            .await
            .map(|sufficient| !sufficient)
    }

    /// Deposits `amount` of native currency and bonds all of it to
    /// `policy_id` on behalf of `recipient`.
    pub async fn deposit_and_bond(
        &self,
        policy_id: PolicyId,
        recipient: Address,
        amount: U256,
    ) -> ShMonadResult<PendingTransaction> {
        let call = IShMonad::depositAndBondCall {
            policyId: policy_id.0,
            bondRecipient: recipient,
            amountToBond: U256::MAX,
        };
        let pending = self
            .rpc_client
            .submit(self.address, &call, amount, None)
            .await
            .map_err(|source| ShMonadError::DepositAndBond {
                policy_id,
                recipient,
                source,
            })?;
        info!(
            "Depositing {} MON bonded to policy {} for {}: {}",
            format_ether(amount),
            policy_id,
            recipient,
            pending.tx_hash()
        );
        Ok(pending)
    }
}
