use alloy::{
    primitives::{Address, Bytes, TxHash, B256, U256},
    sol_types::SolEvent,
};
use async_trait::async_trait;
use log::*;

use crate::FastlaneRpcClientResult;

/// Raw capabilities of the remote ledger.
///
/// Implementations do not encode or decode contract calls, that is done by
/// the typed wrappers on top of [crate::FastlaneRpcClient].
#[async_trait]
pub trait LedgerClient: Send + Sync + 'static {
    async fn block_number(&self) -> FastlaneRpcClientResult<u64>;

    async fn native_balance(
        &self,
        account: Address,
    ) -> FastlaneRpcClientResult<U256>;

    /// Executes a read-only call against `to` and returns the raw return data.
    async fn call(
        &self,
        to: Address,
        data: Bytes,
    ) -> FastlaneRpcClientResult<Bytes>;

    /// The account transactions are signed with, `None` if this client
    /// cannot sign.
    fn signer_address(&self) -> Option<Address>;

    /// Signs and broadcasts a transaction, returning its hash as soon as the
    /// ledger accepted it for relaying.
    async fn send_transaction(
        &self,
        submission: TransactionSubmission,
    ) -> FastlaneRpcClientResult<TxHash>;

    /// Returns the receipt once the transaction was included in a block.
    async fn transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> FastlaneRpcClientResult<Option<LedgerReceipt>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionSubmission {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    /// When `None` the ledger estimates the gas itself.
    pub gas_limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerReceipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    /// `false` if the transaction reverted
    pub success: bool,
    pub gas_used: u64,
    pub logs: Vec<LedgerLog>,
}

impl LedgerReceipt {
    /// Decodes every log emitted by `emitter` that is an `E` event.
    ///
    /// Logs of other emitters or events are expected and skipped. A log that
    /// carries the signature of `E` but fails to decode is skipped as well.
    pub fn decode_events<E: SolEvent>(&self, emitter: Address) -> Vec<E> {
        self.logs
            .iter()
            .filter(|log| log.address == emitter)
            .filter(|log| log.topics.first() == Some(&E::SIGNATURE_HASH))
            .filter_map(|log| {
                match E::decode_raw_log(log.topics.iter().copied(), &log.data)
                {
                    Ok(event) => Some(event),
                    Err(err) => {
                        debug!(
                            "Skipping undecodable {} log in {}: {}",
                            E::SIGNATURE,
                            self.tx_hash,
                            err
                        );
                        None
                    }
                }
            })
            .collect()
    }

    /// Returns the first `E` event emitted by `emitter`, if any.
    pub fn find_event<E: SolEvent>(&self, emitter: Address) -> Option<E> {
        self.decode_events::<E>(emitter).into_iter().next()
    }
}
