mod errors;
mod keeper;
mod orchestrator;

pub use errors::{OrchestratorError, OrchestratorResult, WorkflowStage};
pub use keeper::KeeperService;
pub use orchestrator::{
    Orchestrator, ScheduleOutcome, ScheduleRequest, TaskCall, UpdateOutcome,
};
