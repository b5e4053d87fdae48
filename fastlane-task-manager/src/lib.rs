use std::sync::Arc;

use alloy::sol_types::SolCall;
use fastlane_core::{
    abi::ITaskManager, Address, Bytes, ExecutionSummary, PolicyId,
    ScheduledTask, TaskDefinition, TaskId, TaskStatus, U256,
};
use fastlane_rpc_client::{FastlaneRpcClient, LedgerReceipt, PendingTransaction};
use log::*;
use tokio::sync::OnceCell;

mod errors;

pub use errors::{TaskManagerError, TaskManagerResult};

pub const DEFAULT_EXECUTE_GAS_LIMIT: u64 = 1_000_000;

/// Arguments of `scheduleTask`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleTaskParams {
    /// Contract the task manager calls, either the target itself or the
    /// execution environment template.
    pub environment: Address,
    pub gas_limit: u64,
    pub target_block: u64,
    /// Sent as transaction value.
    pub max_payment: U256,
    pub call_data: Bytes,
}

/// Client of the task manager contract.
#[derive(Clone)]
pub struct TaskManagerClient {
    rpc_client: FastlaneRpcClient,
    address: Address,
    policy_id: Arc<OnceCell<PolicyId>>,
    execute_gas_limit: u64,
}

impl TaskManagerClient {
    pub fn new(rpc_client: FastlaneRpcClient, address: Address) -> Self {
        Self {
            rpc_client,
            address,
            policy_id: Arc::default(),
            execute_gas_limit: DEFAULT_EXECUTE_GAS_LIMIT,
        }
    }

    pub fn with_execute_gas_limit(mut self, execute_gas_limit: u64) -> Self {
        self.execute_gas_limit = execute_gas_limit;
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn rpc_client(&self) -> &FastlaneRpcClient {
        &self.rpc_client
    }

    // -----------------
    // Reads
    // -----------------

    /// The policy the task manager draws from, constant for the lifetime of
    /// this client.
    pub async fn get_policy_id(&self) -> TaskManagerResult<PolicyId> {
        self.policy_id
            .get_or_try_init(|| async {
                let policy_id = self
                    .read("policy id", &ITaskManager::POLICY_IDCall {})
                    .await?;
                debug!(
                    "Task manager {} uses policy {}",
                    self.address, policy_id
                );
                Ok::<_, TaskManagerError>(PolicyId(policy_id))
            })
            .await
            .copied()
    }

    pub async fn execution_env_template(&self) -> TaskManagerResult<Address> {
        self.read(
            "execution environment template",
            &ITaskManager::EXECUTION_ENV_TEMPLATECall {},
        )
        .await
    }

    /// Estimated execution cost of a task with `gas_limit` at
    /// `target_block`. Only valid for that exact pair.
    pub async fn estimate_cost(
        &self,
        target_block: u64,
        gas_limit: u64,
    ) -> TaskManagerResult<U256> {
        let call = ITaskManager::estimateCostCall {
            targetBlock: target_block,
            maxTaskGas: U256::from(gas_limit),
        };
        let estimate =
            self.rpc_client.read(self.address, &call).await.map_err(
                |source| TaskManagerError::CostEstimation {
                    target_block,
                    gas_limit,
                    source,
                },
            )?;
        if estimate.is_zero() && gas_limit > 0 {
            return Err(TaskManagerError::ImplausibleEstimate {
                target_block,
                gas_limit,
            });
        }
        trace!(
            "Estimated {} for {} gas at block {}",
            estimate,
            gas_limit,
            target_block
        );
        Ok(estimate)
    }

    pub async fn is_task_executed(
        &self,
        task_id: TaskId,
    ) -> TaskManagerResult<bool> {
        self.read(
            format!("execution status of {task_id}"),
            &ITaskManager::isTaskExecutedCall { taskId: task_id.0 },
        )
        .await
    }

    pub async fn is_task_cancelled(
        &self,
        task_id: TaskId,
    ) -> TaskManagerResult<bool> {
        self.read(
            format!("cancellation status of {task_id}"),
            &ITaskManager::isTaskCancelledCall { taskId: task_id.0 },
        )
        .await
    }

    pub async fn task_status(
        &self,
        task_id: TaskId,
    ) -> TaskManagerResult<TaskStatus> {
        if self.is_task_cancelled(task_id).await? {
            return Ok(TaskStatus::Cancelled);
        }
        if self.is_task_executed(task_id).await? {
            return Ok(TaskStatus::Executed);
        }
        Ok(TaskStatus::Pending)
    }

    /// First block in `start..=end` that has a task due, `None` if there is
    /// none.
    pub async fn get_next_execution_block_in_range(
        &self,
        start: u64,
        end: u64,
    ) -> TaskManagerResult<Option<u64>> {
        let call = ITaskManager::getNextExecutionBlockInRangeCall {
            startBlock: start,
            endBlock: end,
        };
        let block = self
            .read(format!("next execution block in {start}..={end}"), &call)
            .await?;
        Ok((block != 0).then_some(block))
    }

    async fn read<C: SolCall>(
        &self,
        what: impl Into<String>,
        call: &C,
    ) -> TaskManagerResult<C::Return> {
        self.rpc_client.read(self.address, call).await.map_err(|source| {
            TaskManagerError::Read {
                what: what.into(),
                source,
            }
        })
    }

    // -----------------
    // Scheduling
    // -----------------

    /// Submits `scheduleTask` without waiting for its confirmation.
    pub async fn submit_schedule_task(
        &self,
        params: &ScheduleTaskParams,
    ) -> TaskManagerResult<PendingTransaction> {
        let call = ITaskManager::scheduleTaskCall {
            environment: params.environment,
            taskGasLimit: U256::from(params.gas_limit),
            targetBlock: params.target_block,
            maxPayment: params.max_payment,
            taskCallData: params.call_data.clone(),
        };
        let pending = self
            .rpc_client
            .submit(self.address, &call, params.max_payment, None)
            .await?;
        debug!(
            "Submitted task for block {} with max payment {}: {}",
            params.target_block,
            params.max_payment,
            pending.tx_hash()
        );
        Ok(pending)
    }

    /// Waits for a submitted `scheduleTask` and extracts the task it
    /// created from the `TaskScheduled` event.
    pub async fn confirm_scheduled_task(
        &self,
        pending: PendingTransaction,
    ) -> TaskManagerResult<ScheduledTask> {
        let receipt = self.rpc_client.wait_for_inclusion(pending).await?;
        let tx_hash = receipt.tx_hash;
        if !receipt.success {
            return Err(TaskManagerError::TransactionReverted {
                operation: "scheduleTask",
                tx_hash,
            });
        }

        let scheduled: ScheduledTask = receipt
            .find_event::<ITaskManager::TaskScheduled>(self.address)
            .ok_or(TaskManagerError::SchedulingConfirmation { tx_hash })?
            .into();
        if !scheduled.task_id.is_well_formed() {
            return Err(TaskManagerError::MalformedTaskId { tx_hash });
        }

        info!(
            "Scheduled task {} for block {} owned by {}",
            scheduled.task_id, scheduled.target_block, scheduled.owner
        );
        Ok(scheduled)
    }

    pub async fn schedule_task(
        &self,
        params: &ScheduleTaskParams,
    ) -> TaskManagerResult<ScheduledTask> {
        let pending = self.submit_schedule_task(params).await?;
        self.confirm_scheduled_task(pending).await
    }

    pub async fn update_task_schedule(
        &self,
        task_id: TaskId,
        definition: &TaskDefinition,
    ) -> TaskManagerResult<LedgerReceipt> {
        let call = ITaskManager::updateTaskScheduleCall {
            taskId: task_id.0,
            newDefinition: definition.into(),
        };
        let receipt = self
            .rpc_client
            .send_and_confirm(self.address, &call, U256::ZERO, None)
            .await?;
        if !receipt.success {
            return Err(TaskManagerError::ScheduleUpdate {
                task_id,
                tx_hash: receipt.tx_hash,
            });
        }
        info!(
            "Updated schedule of {} to start at block {}",
            task_id, definition.schedule.start_block
        );
        Ok(receipt)
    }

    pub async fn cancel_task(
        &self,
        task_id: TaskId,
    ) -> TaskManagerResult<LedgerReceipt> {
        let call = ITaskManager::cancelTaskCall { taskId: task_id.0 };
        let receipt = self
            .rpc_client
            .send_and_confirm(self.address, &call, U256::ZERO, None)
            .await?;
        let tx_hash = receipt.tx_hash;
        if !receipt.success {
            return Err(TaskManagerError::Cancel { task_id, tx_hash });
        }

        let cancelled = receipt
            .decode_events::<ITaskManager::TaskCancelled>(self.address)
            .into_iter()
            .any(|event| event.taskId == task_id.0);
        if !cancelled {
            return Err(TaskManagerError::CancelConfirmation {
                task_id,
                tx_hash,
            });
        }
        info!("Cancelled task {}", task_id);
        Ok(receipt)
    }

    // -----------------
    // Execution
    // -----------------

    /// Runs every due task the task manager can fit into its gas budget and
    /// pays the fee to `payout`.
    pub async fn execute_tasks(
        &self,
        payout: Address,
        min_gas_reserve: U256,
    ) -> TaskManagerResult<ExecutionSummary> {
        let call = ITaskManager::executeTasksCall {
            payoutAddress: payout,
            targetGasReserve: min_gas_reserve,
        };
        let receipt = self
            .rpc_client
            .send_and_confirm(
                self.address,
                &call,
                U256::ZERO,
                Some(self.execute_gas_limit),
            )
            .await?;
        let tx_hash = receipt.tx_hash;
        if !receipt.success {
            return Err(TaskManagerError::TransactionReverted {
                operation: "executeTasks",
                tx_hash,
            });
        }

        let summary: ExecutionSummary = receipt
            .find_event::<ITaskManager::TasksExecuted>(self.address)
            .ok_or(TaskManagerError::ExecutionConfirmation { tx_hash })?
            .into();
        if summary.is_idle() {
            debug!("No tasks were due in {}", tx_hash);
        } else {
            info!(
                "Executed {} tasks ({} failed) in {}",
                summary.executed_count, summary.failed_count, tx_hash
            );
        }
        Ok(summary)
    }
}
