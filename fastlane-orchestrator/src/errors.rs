use std::fmt;

use fastlane_address_hub::AddressHubError;
use fastlane_core::{ScheduleError, TaskId, TaskStatus, TxHash, U256};
use fastlane_rpc_client::FastlaneRpcClientError;
use fastlane_shmonad::ShMonadError;
use fastlane_task_manager::TaskManagerError;
use thiserror::Error;

/// Steps of a scheduling attempt, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStage {
    /// Checks and lookups before anything is estimated.
    Prepare,
    Estimate,
    CheckBond,
    TopUpBond,
    Submit,
    AwaitConfirmation,
    ExtractEvent,
}

impl WorkflowStage {
    /// Stage in which a failed task manager transaction failed.
    ///
    /// A transaction that was rejected or reverted failed in [Self::Submit],
    /// [Self::AwaitConfirmation] only covers not seeing it included.
    pub fn of_transaction(err: &TaskManagerError) -> Self {
        match err {
            TaskManagerError::Ledger(err) if err.is_submission_error() => {
                Self::Submit
            }
            err if err.is_revert() => Self::Submit,
            err if err.is_confirmation_failure() => Self::ExtractEvent,
            _ => Self::AwaitConfirmation,
        }
    }
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            Self::Prepare => "prepare",
            Self::Estimate => "estimate",
            Self::CheckBond => "check bond",
            Self::TopUpBond => "top up bond",
            Self::Submit => "submit",
            Self::AwaitConfirmation => "await confirmation",
            Self::ExtractEvent => "extract event",
        };
        f.write_str(stage)
    }
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(#[from] ScheduleError),

    #[error("Target block {target_block} is not after current block {current_block}")]
    TargetBlockPassed {
        target_block: u64,
        current_block: u64,
    },

    #[error("Task {task_id} is {status} and can no longer be changed")]
    TaskNotMutable { task_id: TaskId, status: TaskStatus },

    #[error("Bonded {bonded} does not cover required {required} after {top_ups} top-ups")]
    BondNotSatisfied {
        required: U256,
        bonded: U256,
        top_ups: u32,
    },

    #[error("Bond top-up reverted in {0}")]
    TopUpReverted(TxHash),

    #[error(transparent)]
    AddressHub(#[from] AddressHubError),

    #[error("Stage '{stage}' failed: {source}")]
    TaskManager {
        stage: WorkflowStage,
        #[source]
        source: TaskManagerError,
    },

    #[error("Stage '{stage}' failed: {source}")]
    ShMonad {
        stage: WorkflowStage,
        #[source]
        source: ShMonadError,
    },

    #[error("Stage '{stage}' failed: {source}")]
    Ledger {
        stage: WorkflowStage,
        #[source]
        source: FastlaneRpcClientError,
    },
}

impl OrchestratorError {
    /// The stage of the workflow that failed.
    pub fn stage(&self) -> WorkflowStage {
        use OrchestratorError::*;
        match self {
            InvalidSchedule(_)
            | TargetBlockPassed { .. }
            | TaskNotMutable { .. }
            | AddressHub(_) => WorkflowStage::Prepare,
            BondNotSatisfied { .. } => WorkflowStage::CheckBond,
            TopUpReverted(_) => WorkflowStage::TopUpBond,
            TaskManager { stage, .. }
            | ShMonad { stage, .. }
            | Ledger { stage, .. } => *stage,
        }
    }

    /// Returns the hash of the transaction that caused the error
    /// if available.
    pub fn tx_hash(&self) -> Option<TxHash> {
        use OrchestratorError::*;
        match self {
            TopUpReverted(tx_hash) => Some(*tx_hash),
            TaskManager { source, .. } => source.tx_hash(),
            ShMonad { source, .. } => source.ledger_error().tx_hash(),
            Ledger { source, .. } => source.tx_hash(),
            _ => None,
        }
    }

    pub(crate) fn task_manager(
        stage: WorkflowStage,
    ) -> impl FnOnce(TaskManagerError) -> Self {
        move |source| Self::TaskManager { stage, source }
    }

    pub(crate) fn shmonad(
        stage: WorkflowStage,
    ) -> impl FnOnce(ShMonadError) -> Self {
        move |source| Self::ShMonad { stage, source }
    }

    pub(crate) fn ledger(
        stage: WorkflowStage,
    ) -> impl FnOnce(FastlaneRpcClientError) -> Self {
        move |source| Self::Ledger { stage, source }
    }
}
