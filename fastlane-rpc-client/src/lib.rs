use std::{sync::Arc, time::Duration};

use alloy::{
    primitives::{Address, Bytes, TxHash, U256},
    sol_types::SolCall,
    transports::TransportError,
};
use log::*;
use tokio::{
    sync::{OwnedSemaphorePermit, Semaphore},
    time::Instant,
};

mod ledger;
mod provider;

pub use ledger::{
    LedgerClient, LedgerLog, LedgerReceipt, TransactionSubmission,
};
pub use provider::ProviderLedger;

// -----------------
// FastlaneRpcClientError
// -----------------
#[derive(Debug, thiserror::Error)]
pub enum FastlaneRpcClientError {
    #[error("Error getting block number: {0} ({0:?})")]
    GetBlockNumber(TransportError),

    #[error("Error getting native balance of {0}: {1}")]
    GetBalance(Address, TransportError),

    #[error("Call to {to} failed: {reason}")]
    Call { to: Address, reason: String },

    #[error("Failed to decode return data of '{call}': {source}")]
    DecodeReturn {
        call: &'static str,
        source: alloy::sol_types::Error,
    },

    #[error("Wallet client required for transactions")]
    WalletRequired,

    #[error("Error sending transaction to {to}: {reason}")]
    SendTransaction { to: Address, reason: String },

    #[error("Error getting receipt of {0}: {1}")]
    GetReceipt(TxHash, String),

    #[error("Transaction {0} was not included within {1:?}")]
    InclusionTimeout(TxHash, Duration),

    #[error("The transaction submission gate was closed")]
    SubmissionGateClosed,
}

impl FastlaneRpcClientError {
    /// Returns the hash of the transaction that caused the error
    /// if available.
    pub fn tx_hash(&self) -> Option<TxHash> {
        use FastlaneRpcClientError::*;
        match self {
            GetReceipt(hash, _) | InclusionTimeout(hash, _) => Some(*hash),
            _ => None,
        }
    }

    /// `true` if the ledger never accepted the transaction.
    pub fn is_submission_error(&self) -> bool {
        use FastlaneRpcClientError::*;
        matches!(
            self,
            WalletRequired | SendTransaction { .. } | SubmissionGateClosed
        )
    }
}

pub type FastlaneRpcClientResult<T> =
    std::result::Result<T, FastlaneRpcClientError>;

// -----------------
// InclusionConfig
// -----------------
const DEFAULT_INCLUSION_TIMEOUT: Duration = Duration::from_millis(60_000);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// How long we wait for a submitted transaction to show up in a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InclusionConfig {
    pub timeout: Duration,
    /// How long to wait in between receipt lookups.
    pub poll_interval: Duration,
}

impl InclusionConfig {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }
}

impl Default for InclusionConfig {
    fn default() -> Self {
        Self::new(DEFAULT_INCLUSION_TIMEOUT, DEFAULT_POLL_INTERVAL)
    }
}

// -----------------
// PendingTransaction
// -----------------

/// A transaction that was accepted by the ledger but not yet observed in a
/// block.
///
/// It holds the account's submission permit, so no other transaction can be
/// submitted through the same client until this one is included, timed out
/// or dropped.
#[derive(Debug)]
pub struct PendingTransaction {
    tx_hash: TxHash,
    _permit: OwnedSemaphorePermit,
}

impl PendingTransaction {
    pub fn tx_hash(&self) -> TxHash {
        self.tx_hash
    }
}

// -----------------
// FastlaneRpcClient
// -----------------

/// Wraps a [LedgerClient] to provide typed contract reads and orderly
/// transaction submission for a single signing account.
#[derive(Clone)]
pub struct FastlaneRpcClient {
    ledger: Arc<dyn LedgerClient>,
    submission_gate: Arc<Semaphore>,
    inclusion: InclusionConfig,
}

impl FastlaneRpcClient {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        inclusion: InclusionConfig,
    ) -> Self {
        Self {
            ledger,
            submission_gate: Arc::new(Semaphore::new(1)),
            inclusion,
        }
    }

    pub fn signer_address(&self) -> Option<Address> {
        self.ledger.signer_address()
    }

    pub fn require_signer(&self) -> FastlaneRpcClientResult<Address> {
        self.signer_address()
            .ok_or(FastlaneRpcClientError::WalletRequired)
    }

    pub async fn get_block_number(&self) -> FastlaneRpcClientResult<u64> {
        self.ledger.block_number().await
    }

    pub async fn get_native_balance(
        &self,
        account: Address,
    ) -> FastlaneRpcClientResult<U256> {
        self.ledger.native_balance(account).await
    }

    /// Performs a read-only contract call and decodes its return value.
    pub async fn read<C: SolCall>(
        &self,
        to: Address,
        call: &C,
    ) -> FastlaneRpcClientResult<C::Return> {
        let data = self.ledger.call(to, call.abi_encode().into()).await?;
        C::abi_decode_returns(&data).map_err(|source| {
            FastlaneRpcClientError::DecodeReturn {
                call: C::SIGNATURE,
                source,
            }
        })
    }

    /// Submits a contract call as a transaction without waiting for it.
    ///
    /// Waits for any transaction previously submitted through this client to
    /// leave the pending state first, so that the account's nonces are
    /// consumed strictly in order.
    pub async fn submit<C: SolCall>(
        &self,
        to: Address,
        call: &C,
        value: U256,
        gas_limit: Option<u64>,
    ) -> FastlaneRpcClientResult<PendingTransaction> {
        let from = self.require_signer()?;
        let permit = self
            .submission_gate
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| FastlaneRpcClientError::SubmissionGateClosed)?;

        let submission = TransactionSubmission {
            to,
            data: Bytes::from(call.abi_encode()),
            value,
            gas_limit,
        };
        let tx_hash = self.ledger.send_transaction(submission).await?;
        debug!(
            "Submitted '{}' from {} to {}: {}",
            C::SIGNATURE,
            from,
            to,
            tx_hash
        );

        Ok(PendingTransaction {
            tx_hash,
            _permit: permit,
        })
    }

    /// Polls for the receipt of the pending transaction until it is included
    /// or the configured timeout elapses.
    ///
    /// The returned receipt may belong to a reverted transaction, callers
    /// decide what that means for them.
    pub async fn wait_for_inclusion(
        &self,
        pending: PendingTransaction,
    ) -> FastlaneRpcClientResult<LedgerReceipt> {
        let InclusionConfig {
            timeout,
            poll_interval,
        } = self.inclusion;

        let start = Instant::now();
        loop {
            if let Some(receipt) =
                self.ledger.transaction_receipt(pending.tx_hash).await?
            {
                debug!(
                    "Transaction {} included in block {:?} (success: {})",
                    receipt.tx_hash, receipt.block_number, receipt.success
                );
                return Ok(receipt);
            }

            if start.elapsed() >= timeout {
                warn!(
                    "Transaction {} not included after {:?}",
                    pending.tx_hash, timeout
                );
                return Err(FastlaneRpcClientError::InclusionTimeout(
                    pending.tx_hash,
                    timeout,
                ));
            }

            trace!(
                "Waiting for transaction {} to be included",
                pending.tx_hash
            );
            tokio::time::sleep(poll_interval).await;
        }
    }

    pub async fn send_and_confirm<C: SolCall>(
        &self,
        to: Address,
        call: &C,
        value: U256,
        gas_limit: Option<u64>,
    ) -> FastlaneRpcClientResult<LedgerReceipt> {
        let pending = self.submit(to, call, value, gas_limit).await?;
        self.wait_for_inclusion(pending).await
    }
}
