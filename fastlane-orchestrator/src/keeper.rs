use std::time::Duration;

use fastlane_config::KeeperConfig;
use fastlane_core::{Address, ExecutionSummary, U256};
use log::*;
use tokio::{select, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    errors::{OrchestratorError, OrchestratorResult, WorkflowStage},
    Orchestrator,
};

/// Periodically triggers batched execution of the tasks that are due.
pub struct KeeperService {
    orchestrator: Orchestrator,
    payout: Address,
    min_gas_reserve: U256,
    tick_interval: Duration,
    lookahead_blocks: u64,
}

impl KeeperService {
    pub fn new(
        orchestrator: Orchestrator,
        payout: Address,
        config: &KeeperConfig,
    ) -> Self {
        Self {
            orchestrator,
            payout,
            min_gas_reserve: U256::from(config.min_gas_reserve),
            tick_interval: config.tick_interval(),
            lookahead_blocks: config.lookahead_blocks,
        }
    }

    pub fn start(self, token: CancellationToken) -> JoinHandle<()> {
        let mut interval = tokio::time::interval(self.tick_interval);
        info!(
            "Keeper started, paying out to {} every {:?}",
            self.payout, self.tick_interval
        );

        tokio::spawn(async move {
            loop {
                select! {
                    _ = interval.tick() => {
                        if let Err(e) = self.tick().await {
                            error!("Error in keeper tick ({}): {}", e.stage(), e);
                        }
                    }
                    _ = token.cancelled() => {
                        debug!("Keeper cancelled");
                        break;
                    }
                }
            }
        })
    }

    /// Executes due tasks if there are any, returns `None` otherwise.
    ///
    /// Blocks up to `lookahead_blocks` in the past are searched as well, so
    /// tasks missed by earlier ticks are still picked up.
    pub async fn tick(&self) -> OrchestratorResult<Option<ExecutionSummary>> {
        let task_manager = self.orchestrator.task_manager();
        let current = task_manager
            .rpc_client()
            .get_block_number()
            .await
            .map_err(OrchestratorError::ledger(WorkflowStage::Prepare))?;

        let start = current.saturating_sub(self.lookahead_blocks);
        let end = current.saturating_add(self.lookahead_blocks);
        let next = task_manager
            .get_next_execution_block_in_range(start, end)
            .await
            .map_err(OrchestratorError::task_manager(WorkflowStage::Prepare))?;

        match next {
            Some(block) if block <= current => {
                debug!("Tasks due since block {}, executing", block);
                let summary = self
                    .orchestrator
                    .execute_due_tasks(self.payout, self.min_gas_reserve)
                    .await?;
                Ok(Some(summary))
            }
            Some(block) => {
                debug!("Next task due at block {} (now {})", block, current);
                Ok(None)
            }
            None => {
                trace!("No tasks due up to block {}", end);
                Ok(None)
            }
        }
    }
}
