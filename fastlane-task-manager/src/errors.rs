use fastlane_core::{TaskId, TxHash};
use fastlane_rpc_client::FastlaneRpcClientError;
use thiserror::Error;

pub type TaskManagerResult<T> = Result<T, TaskManagerError>;

#[derive(Error, Debug)]
pub enum TaskManagerError {
    #[error("Failed to read {what} from the task manager: {source}")]
    Read {
        what: String,
        #[source]
        source: FastlaneRpcClientError,
    },

    #[error("Failed to estimate cost at block {target_block} for {gas_limit} gas: {source}")]
    CostEstimation {
        target_block: u64,
        gas_limit: u64,
        #[source]
        source: FastlaneRpcClientError,
    },

    #[error("Implausible cost estimate of zero at block {target_block} for {gas_limit} gas")]
    ImplausibleEstimate { target_block: u64, gas_limit: u64 },

    #[error("Transaction {tx_hash} was included without emitting TaskScheduled")]
    SchedulingConfirmation { tx_hash: TxHash },

    #[error("Transaction {tx_hash} emitted TaskScheduled with a zero task id")]
    MalformedTaskId { tx_hash: TxHash },

    #[error("Transaction {tx_hash} was included without emitting TasksExecuted")]
    ExecutionConfirmation { tx_hash: TxHash },

    #[error("Transaction {tx_hash} was included without emitting TaskCancelled for {task_id}")]
    CancelConfirmation { task_id: TaskId, tx_hash: TxHash },

    #[error("Updating the schedule of {task_id} reverted in {tx_hash}")]
    ScheduleUpdate { task_id: TaskId, tx_hash: TxHash },

    #[error("Cancelling {task_id} reverted in {tx_hash}")]
    Cancel { task_id: TaskId, tx_hash: TxHash },

    #[error("'{operation}' reverted in {tx_hash}")]
    TransactionReverted {
        operation: &'static str,
        tx_hash: TxHash,
    },

    #[error(transparent)]
    Ledger(#[from] FastlaneRpcClientError),
}

impl TaskManagerError {
    /// Returns the hash of the transaction that caused the error
    /// if available.
    pub fn tx_hash(&self) -> Option<TxHash> {
        use TaskManagerError::*;
        match self {
            SchedulingConfirmation { tx_hash }
            | MalformedTaskId { tx_hash }
            | ExecutionConfirmation { tx_hash }
            | CancelConfirmation { tx_hash, .. }
            | ScheduleUpdate { tx_hash, .. }
            | Cancel { tx_hash, .. }
            | TransactionReverted { tx_hash, .. } => Some(*tx_hash),
            Ledger(err) => err.tx_hash(),
            _ => None,
        }
    }

    /// `true` if the transaction was included and did not revert, but the
    /// event confirming it is missing or unusable.
    pub fn is_confirmation_failure(&self) -> bool {
        use TaskManagerError::*;
        matches!(
            self,
            SchedulingConfirmation { .. }
                | MalformedTaskId { .. }
                | ExecutionConfirmation { .. }
                | CancelConfirmation { .. }
        )
    }

    /// `true` if the transaction was included but reverted.
    pub fn is_revert(&self) -> bool {
        use TaskManagerError::*;
        matches!(
            self,
            ScheduleUpdate { .. } | Cancel { .. } | TransactionReverted { .. }
        )
    }
}
