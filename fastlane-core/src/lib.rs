pub mod abi;
pub mod types;

pub use alloy::primitives::{
    utils::format_ether, Address, Bytes, TxHash, B256, U256,
};
pub use types::{
    pack_environment_call, ContractPointer, ExecutionSummary, PolicyBond,
    PolicyId, Schedule, ScheduleError, ScheduledTask, Task, TaskDefinition,
    TaskId, TaskStatus,
};
