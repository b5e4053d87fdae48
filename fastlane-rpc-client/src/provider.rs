use alloy::{
    network::{EthereumWallet, TransactionBuilder},
    primitives::{Address, Bytes, TxHash, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::{TransactionReceipt, TransactionRequest},
    signers::local::PrivateKeySigner,
};
use async_trait::async_trait;
use log::*;
use url::Url;

use crate::{
    FastlaneRpcClientError, FastlaneRpcClientResult, LedgerClient, LedgerLog,
    LedgerReceipt, TransactionSubmission,
};

/// [LedgerClient] talking JSON-RPC over HTTP to an EVM node.
pub struct ProviderLedger {
    provider: DynProvider,
    signer: Option<Address>,
}

impl ProviderLedger {
    /// Connects a read-only client, every submission will fail with
    /// [FastlaneRpcClientError::WalletRequired].
    pub fn read_only(url: Url) -> Self {
        let provider = ProviderBuilder::new().connect_http(url).erased();
        Self {
            provider,
            signer: None,
        }
    }

    /// Connects a client that signs transactions with `signer`.
    pub fn with_signer(url: Url, signer: PrivateKeySigner) -> Self {
        let address = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(url.clone())
            .erased();
        debug!("Connected to {} as {}", url, address);
        Self {
            provider,
            signer: Some(address),
        }
    }
}

#[async_trait]
impl LedgerClient for ProviderLedger {
    async fn block_number(&self) -> FastlaneRpcClientResult<u64> {
        self.provider
            .get_block_number()
            .await
            .map_err(FastlaneRpcClientError::GetBlockNumber)
    }

    async fn native_balance(
        &self,
        account: Address,
    ) -> FastlaneRpcClientResult<U256> {
        self.provider
            .get_balance(account)
            .await
            .map_err(|err| FastlaneRpcClientError::GetBalance(account, err))
    }

    async fn call(
        &self,
        to: Address,
        data: Bytes,
    ) -> FastlaneRpcClientResult<Bytes> {
        let tx = TransactionRequest::default().with_to(to).with_input(data);
        self.provider.call(tx).await.map_err(|err| {
            FastlaneRpcClientError::Call {
                to,
                reason: err.to_string(),
            }
        })
    }

    fn signer_address(&self) -> Option<Address> {
        self.signer
    }

    async fn send_transaction(
        &self,
        submission: TransactionSubmission,
    ) -> FastlaneRpcClientResult<TxHash> {
        let TransactionSubmission {
            to,
            data,
            value,
            gas_limit,
        } = submission;
        if self.signer.is_none() {
            return Err(FastlaneRpcClientError::WalletRequired);
        }

        let mut tx = TransactionRequest::default()
            .with_to(to)
            .with_input(data)
            .with_value(value);
        if let Some(gas_limit) = gas_limit {
            tx = tx.with_gas_limit(gas_limit);
        }

        let pending =
            self.provider.send_transaction(tx).await.map_err(|err| {
                FastlaneRpcClientError::SendTransaction {
                    to,
                    reason: err.to_string(),
                }
            })?;
        Ok(*pending.tx_hash())
    }

    async fn transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> FastlaneRpcClientResult<Option<LedgerReceipt>> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|err| {
                FastlaneRpcClientError::GetReceipt(tx_hash, err.to_string())
            })?;
        Ok(receipt.map(ledger_receipt))
    }
}

fn ledger_receipt(receipt: TransactionReceipt) -> LedgerReceipt {
    let logs = receipt
        .inner
        .logs()
        .iter()
        .map(|log| LedgerLog {
            address: log.address(),
            topics: log.topics().to_vec(),
            data: log.data().data.clone(),
        })
        .collect();

    LedgerReceipt {
        tx_hash: receipt.transaction_hash,
        block_number: receipt.block_number,
        success: receipt.status(),
        gas_used: receipt.gas_used,
        logs,
    }
}
