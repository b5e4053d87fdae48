use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use alloy::{
    primitives::{keccak256, Address, Bytes, TxHash, B256, U256},
    sol,
    sol_types::{SolEvent, SolValue},
};
use assert_matches::assert_matches;
use async_trait::async_trait;
use fastlane_rpc_client::{
    FastlaneRpcClient, FastlaneRpcClientError, FastlaneRpcClientResult,
    InclusionConfig, LedgerClient, LedgerLog, LedgerReceipt,
    TransactionSubmission,
};

sol! {
    event Ping(uint256 indexed id, uint64 value);
    event Pong(uint256 indexed id);

    function counter() external view returns (uint64);
}

/// Ledger that includes a transaction after a fixed number of receipt
/// lookups.
struct StubLedger {
    signer: Option<Address>,
    polls_until_included: usize,
    polls: AtomicUsize,
    sent: Mutex<Vec<TransactionSubmission>>,
    call_result: Bytes,
}

impl StubLedger {
    fn new(signer: Option<Address>, polls_until_included: usize) -> Self {
        Self {
            signer,
            polls_until_included,
            polls: AtomicUsize::new(0),
            sent: Mutex::default(),
            call_result: 42u64.abi_encode().into(),
        }
    }
}

#[async_trait]
impl LedgerClient for StubLedger {
    async fn block_number(&self) -> FastlaneRpcClientResult<u64> {
        Ok(1)
    }

    async fn native_balance(
        &self,
        _account: Address,
    ) -> FastlaneRpcClientResult<U256> {
        Ok(U256::ZERO)
    }

    async fn call(
        &self,
        _to: Address,
        _data: Bytes,
    ) -> FastlaneRpcClientResult<Bytes> {
        Ok(self.call_result.clone())
    }

    fn signer_address(&self) -> Option<Address> {
        self.signer
    }

    async fn send_transaction(
        &self,
        submission: TransactionSubmission,
    ) -> FastlaneRpcClientResult<TxHash> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(submission);
        Ok(keccak256(sent.len().to_be_bytes()))
    }

    async fn transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> FastlaneRpcClientResult<Option<LedgerReceipt>> {
        let polls = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        if polls < self.polls_until_included {
            return Ok(None);
        }
        Ok(Some(LedgerReceipt {
            tx_hash,
            block_number: Some(1),
            success: true,
            gas_used: 21_000,
            logs: vec![],
        }))
    }
}

fn client_for(ledger: StubLedger) -> (Arc<StubLedger>, FastlaneRpcClient) {
    let ledger = Arc::new(ledger);
    let client = FastlaneRpcClient::new(
        ledger.clone(),
        InclusionConfig::new(
            Duration::from_millis(100),
            Duration::from_millis(5),
        ),
    );
    (ledger, client)
}

fn signer() -> Address {
    Address::repeat_byte(0x11)
}

#[tokio::test]
async fn test_submit_requires_wallet() {
    let (ledger, client) = client_for(StubLedger::new(None, 1));

    let res = client
        .submit(Address::ZERO, &counterCall {}, U256::ZERO, None)
        .await;
    assert_matches!(res, Err(FastlaneRpcClientError::WalletRequired));
    assert!(res.unwrap_err().is_submission_error());
    assert!(ledger.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_typed_read() {
    let (_ledger, client) = client_for(StubLedger::new(None, 1));
    assert_eq!(client.read(Address::ZERO, &counterCall {}).await.unwrap(), 42);

    let mut ledger = StubLedger::new(None, 1);
    ledger.call_result = Bytes::from_static(&[1, 2]);
    let (_ledger, client) = client_for(ledger);
    assert_matches!(
        client.read(Address::ZERO, &counterCall {}).await,
        Err(FastlaneRpcClientError::DecodeReturn {
            call: "counter()",
            ..
        })
    );
}

#[tokio::test]
async fn test_one_outstanding_transaction() {
    let (ledger, client) = client_for(StubLedger::new(Some(signer()), 1));

    let first = client
        .submit(Address::ZERO, &counterCall {}, U256::ZERO, Some(50_000))
        .await
        .unwrap();

    // The second submission waits for the first to leave the pending state
    let blocked = tokio::time::timeout(
        Duration::from_millis(30),
        client.submit(Address::ZERO, &counterCall {}, U256::ZERO, None),
    )
    .await;
    assert!(blocked.is_err());
    assert_eq!(ledger.sent.lock().unwrap().len(), 1);

    let receipt = client.wait_for_inclusion(first).await.unwrap();
    assert!(receipt.success);

    let second = client
        .submit(Address::ZERO, &counterCall {}, U256::from(7), None)
        .await
        .unwrap();
    assert_ne!(second.tx_hash(), receipt.tx_hash);

    let sent = ledger.sent.lock().unwrap();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].gas_limit, Some(50_000));
    assert_eq!(sent[1].value, U256::from(7));
}

#[tokio::test]
async fn test_inclusion_after_polling() {
    let (ledger, client) = client_for(StubLedger::new(Some(signer()), 3));

    let receipt = client
        .send_and_confirm(Address::ZERO, &counterCall {}, U256::ZERO, None)
        .await
        .unwrap();
    assert_eq!(receipt.block_number, Some(1));
    assert_eq!(ledger.polls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_inclusion_timeout_releases_gate() {
    let (_ledger, client) =
        client_for(StubLedger::new(Some(signer()), usize::MAX));

    let pending = client
        .submit(Address::ZERO, &counterCall {}, U256::ZERO, None)
        .await
        .unwrap();
    let tx_hash = pending.tx_hash();
    let err = client.wait_for_inclusion(pending).await.unwrap_err();
    assert_eq!(err.tx_hash(), Some(tx_hash));
    assert_matches!(err, FastlaneRpcClientError::InclusionTimeout(_, _));
    assert!(!err.is_submission_error());

    // The permit went away with the pending transaction
    assert!(client
        .submit(Address::ZERO, &counterCall {}, U256::ZERO, None)
        .await
        .is_ok());
}

fn log_of<E: SolEvent>(address: Address, event: &E) -> LedgerLog {
    let data = event.encode_log_data();
    LedgerLog {
        address,
        topics: data.topics().to_vec(),
        data: data.data,
    }
}

#[test]
fn test_event_scan_skips_unrelated_logs() {
    let emitter = Address::repeat_byte(0xee);
    let other = Address::repeat_byte(0xaa);
    let ping = Ping {
        id: U256::from(1),
        value: 10,
    };

    let receipt = LedgerReceipt {
        tx_hash: B256::ZERO,
        block_number: Some(1),
        success: true,
        gas_used: 0,
        logs: vec![
            // same event from another contract
            log_of(other, &Ping {
                id: U256::from(9),
                value: 99,
            }),
            // other event from the same contract
            log_of(emitter, &Pong { id: U256::from(2) }),
            // right signature but truncated payload
            LedgerLog {
                address: emitter,
                topics: vec![Ping::SIGNATURE_HASH],
                data: Bytes::from_static(&[1]),
            },
            log_of(emitter, &ping),
        ],
    };

    let pings = receipt.decode_events::<Ping>(emitter);
    assert_eq!(pings.len(), 1);
    assert_eq!(pings[0].id, U256::from(1));
    assert_eq!(pings[0].value, 10);

    assert!(receipt.find_event::<Pong>(emitter).is_some());
    assert!(receipt.find_event::<Pong>(other).is_none());
}
