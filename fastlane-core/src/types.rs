use std::{fmt, str::FromStr};

use alloy::{
    hex,
    primitives::{Address, Bytes, B256, U256},
    sol_types::SolValue,
};
use thiserror::Error;

use crate::abi::ITaskManager;

// -----------------
// Identifiers
// -----------------

/// Identity the task manager assigns to a task once it accepted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub B256);

impl TaskId {
    /// A zero id is never handed out by the task manager.
    pub fn is_well_formed(&self) -> bool {
        !self.0.is_zero()
    }
}

impl From<B256> for TaskId {
    fn from(value: B256) -> Self {
        Self(value)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        B256::from_str(s).map(Self)
    }
}

/// The bonding policy the task manager draws execution funding from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PolicyId(pub u64);

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pointers understood by the address hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum ContractPointer {
    ShMonad = 4,
    TaskManager = 5,
}

impl ContractPointer {
    pub fn as_u64(self) -> u64 {
        self as u64
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::ShMonad => "shMonad",
            Self::TaskManager => "task manager",
        }
    }
}

impl TryFrom<u64> for ContractPointer {
    type Error = u64;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            4 => Ok(Self::ShMonad),
            5 => Ok(Self::TaskManager),
            other => Err(other),
        }
    }
}

impl fmt::Display for ContractPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_u64())
    }
}

// -----------------
// Task, Schedule, TaskDefinition
// -----------------

/// A single deferred contract invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub from: Address,
    pub gas: u64,
    pub target: Address,
    pub data: Bytes,
    /// Account scoped nonce, assigned by the task manager.
    pub nonce: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("Start block {start_block} is not before deadline {deadline}")]
    StartNotBeforeDeadline { start_block: u64, deadline: u64 },

    #[error("A schedule needs at least one execution")]
    NoExecutions,

    #[error("A repeating schedule needs a non-zero interval")]
    ZeroInterval,
}

/// When and how often a [Task] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub start_block: u64,
    /// Blocks in between executions, `0` for one-shot tasks.
    pub interval: u64,
    pub executions: u32,
    pub active: bool,
    pub deadline: u64,
}

impl Schedule {
    pub fn one_shot(start_block: u64, deadline: u64) -> Self {
        Self {
            start_block,
            interval: 0,
            executions: 1,
            active: true,
            deadline,
        }
    }

    pub fn is_one_shot(&self) -> bool {
        self.interval == 0 && self.executions == 1
    }

    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.start_block >= self.deadline {
            return Err(ScheduleError::StartNotBeforeDeadline {
                start_block: self.start_block,
                deadline: self.deadline,
            });
        }
        if self.executions == 0 {
            return Err(ScheduleError::NoExecutions);
        }
        if self.executions > 1 && self.interval == 0 {
            return Err(ScheduleError::ZeroInterval);
        }
        Ok(())
    }
}

/// Full payload of a scheduling request, it has no identity until the task
/// manager accepted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDefinition {
    pub task: Task,
    pub schedule: Schedule,
}

impl From<&TaskDefinition> for ITaskManager::TaskDefinition {
    fn from(definition: &TaskDefinition) -> Self {
        let TaskDefinition { task, schedule } = definition;
        Self {
            task: ITaskManager::Task {
                from: task.from,
                gas: task.gas,
                target: task.target,
                data: task.data.clone(),
                nonce: task.nonce,
            },
            schedule: ITaskManager::Schedule {
                startBlock: schedule.start_block,
                interval: schedule.interval,
                executions: schedule.executions,
                active: schedule.active,
                deadline: schedule.deadline,
            },
        }
    }
}

impl From<ITaskManager::TaskDefinition> for TaskDefinition {
    fn from(definition: ITaskManager::TaskDefinition) -> Self {
        let ITaskManager::TaskDefinition { task, schedule } = definition;
        Self {
            task: Task {
                from: task.from,
                gas: task.gas,
                target: task.target,
                data: task.data,
                nonce: task.nonce,
            },
            schedule: Schedule {
                start_block: schedule.startBlock,
                interval: schedule.interval,
                executions: schedule.executions,
                active: schedule.active,
                deadline: schedule.deadline,
            },
        }
    }
}

/// Packs `target` and `call_data` the way the execution environment
/// template expects them (`abi.encodePacked(address, bytes)`).
pub fn pack_environment_call(target: Address, call_data: &[u8]) -> Bytes {
    (target, Bytes::copy_from_slice(call_data))
        .abi_encode_packed()
        .into()
}

// -----------------
// Bonds
// -----------------

/// Snapshot of an account's collateral under one policy.
///
/// This is a projection of remote state and goes stale immediately, it is
/// never cached across checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PolicyBond {
    pub bonded: U256,
    pub unbonding: U256,
}

impl PolicyBond {
    pub fn covers(&self, required: U256) -> bool {
        self.bonded >= required
    }

    /// How much bonded collateral is missing to cover `required`.
    pub fn shortfall(&self, required: U256) -> U256 {
        required.saturating_sub(self.bonded)
    }
}

// -----------------
// Confirmations
// -----------------

/// Decoded `TaskScheduled` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTask {
    pub task_id: TaskId,
    pub owner: Address,
    pub target_block: u64,
}

impl From<ITaskManager::TaskScheduled> for ScheduledTask {
    fn from(event: ITaskManager::TaskScheduled) -> Self {
        Self {
            task_id: TaskId(event.taskId),
            owner: event.owner,
            target_block: event.targetBlock,
        }
    }
}

/// Decoded `TasksExecuted` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutionSummary {
    pub executed_count: U256,
    pub failed_count: U256,
}

impl ExecutionSummary {
    pub fn is_idle(&self) -> bool {
        self.executed_count.is_zero() && self.failed_count.is_zero()
    }
}

impl From<ITaskManager::TasksExecuted> for ExecutionSummary {
    fn from(event: ITaskManager::TasksExecuted) -> Self {
        Self {
            executed_count: event.executedCount,
            failed_count: event.failedCount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Executed,
    Cancelled,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            Self::Pending => "pending",
            Self::Executed => "executed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(status)
    }
}
