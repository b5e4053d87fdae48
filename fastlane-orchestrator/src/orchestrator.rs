use fastlane_address_hub::{AddressHub, ResolvedAddresses};
use fastlane_config::SchedulingConfig;
use fastlane_core::{
    format_ether, pack_environment_call, Address, Bytes, ExecutionSummary,
    PolicyId, Schedule, TaskDefinition, TaskId, TaskStatus, TxHash, U256,
};
use fastlane_rpc_client::FastlaneRpcClient;
use fastlane_shmonad::ShMonadClient;
use fastlane_task_manager::{ScheduleTaskParams, TaskManagerClient};
use log::*;

use crate::errors::{OrchestratorError, OrchestratorResult, WorkflowStage};

/// The contract call a task performs once it is due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskCall {
    /// The task manager calls `target` with `call_data`.
    Direct { target: Address, call_data: Bytes },
    /// The call is routed through the execution environment template.
    Wrapped { target: Address, call_data: Bytes },
}

impl TaskCall {
    pub fn target(&self) -> Address {
        match self {
            Self::Direct { target, .. } | Self::Wrapped { target, .. } => {
                *target
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleRequest {
    pub call: TaskCall,
    pub gas_limit: u64,
    pub target_block: u64,
    /// When set the target block has to come before it.
    pub deadline: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleOutcome {
    pub task_id: TaskId,
    pub owner: Address,
    pub target_block: u64,
    pub estimated_cost: U256,
    /// Bond that was required and the value sent along with the task.
    pub max_payment: U256,
    pub top_ups: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub task_id: TaskId,
    pub estimated_cost: U256,
    pub required_bond: U256,
    pub tx_hash: TxHash,
}

/// Drives tasks through their lifecycle: estimating, bonding, scheduling,
/// updating, cancelling and executing them.
///
/// Nothing about remote state is cached between steps, except the policy id
/// which the task manager never changes.
#[derive(Clone)]
pub struct Orchestrator {
    task_manager: TaskManagerClient,
    shmonad: ShMonadClient,
    bond_multiplier: u64,
    max_top_ups: u32,
}

impl Orchestrator {
    pub fn new(
        task_manager: TaskManagerClient,
        shmonad: ShMonadClient,
        config: &SchedulingConfig,
    ) -> Self {
        Self {
            task_manager,
            shmonad,
            bond_multiplier: config.bond_multiplier,
            max_top_ups: config.max_top_ups,
        }
    }

    pub fn from_addresses(
        rpc_client: FastlaneRpcClient,
        addresses: &ResolvedAddresses,
        config: &SchedulingConfig,
    ) -> Self {
        let task_manager =
            TaskManagerClient::new(rpc_client.clone(), addresses.task_manager)
                .with_execute_gas_limit(config.execute_gas_limit);
        let shmonad = ShMonadClient::new(rpc_client, addresses.shmonad);
        Self::new(task_manager, shmonad, config)
    }

    /// Resolves the contracts through the address hub at `hub_address`.
    pub async fn connect(
        rpc_client: FastlaneRpcClient,
        hub_address: Address,
        config: &SchedulingConfig,
    ) -> OrchestratorResult<Self> {
        let hub = AddressHub::new(rpc_client.clone(), hub_address);
        let addresses = hub.resolve_session().await?;
        Ok(Self::from_addresses(rpc_client, &addresses, config))
    }

    pub fn task_manager(&self) -> &TaskManagerClient {
        &self.task_manager
    }

    pub fn shmonad(&self) -> &ShMonadClient {
        &self.shmonad
    }

    fn rpc_client(&self) -> &FastlaneRpcClient {
        self.task_manager.rpc_client()
    }

    /// Bond needed to schedule a task estimated at `estimate`.
    pub fn required_bond(&self, estimate: U256) -> U256 {
        estimate.saturating_mul(U256::from(self.bond_multiplier))
    }

    // -----------------
    // Scheduling
    // -----------------
    pub async fn schedule(
        &self,
        request: &ScheduleRequest,
    ) -> OrchestratorResult<ScheduleOutcome> {
        let ScheduleRequest {
            call,
            gas_limit,
            target_block,
            deadline,
        } = request;
        let (gas_limit, target_block) = (*gas_limit, *target_block);

        let owner = self
            .rpc_client()
            .require_signer()
            .map_err(OrchestratorError::ledger(WorkflowStage::Prepare))?;
        if let Some(deadline) = deadline {
            Schedule::one_shot(target_block, *deadline).validate()?;
        }
        self.ensure_future_block(target_block).await?;
        let (environment, call_data) = self.prepare_call(call).await?;
        debug!(
            "Preparing call to {} through {} for block {}",
            call.target(),
            environment,
            target_block
        );

        let estimated_cost = self
            .task_manager
            .estimate_cost(target_block, gas_limit)
            .await
            .map_err(OrchestratorError::task_manager(WorkflowStage::Estimate))?;
        let required = self.required_bond(estimated_cost);
        debug!(
            "Task for block {} estimated at {} MON, requiring {} MON bonded",
            target_block,
            format_ether(estimated_cost),
            format_ether(required)
        );

        let policy_id = self.policy_id().await?;
        let top_ups = self.ensure_bond(policy_id, owner, required).await?;

        let params = ScheduleTaskParams {
            environment,
            gas_limit,
            target_block,
            max_payment: required,
            call_data,
        };
        let pending = self
            .task_manager
            .submit_schedule_task(&params)
            .await
            .map_err(OrchestratorError::task_manager(WorkflowStage::Submit))?;
        let scheduled = self
            .task_manager
            .confirm_scheduled_task(pending)
            .await
            .map_err(|err| {
                let stage = WorkflowStage::of_transaction(&err);
                OrchestratorError::task_manager(stage)(err)
            })?;

        Ok(ScheduleOutcome {
            task_id: scheduled.task_id,
            owner: scheduled.owner,
            target_block: scheduled.target_block,
            estimated_cost,
            max_payment: required,
            top_ups,
        })
    }

    /// Moves an existing task to a new schedule.
    ///
    /// The cost is estimated again for the new start block and the bond is
    /// verified against it before anything is submitted. The bond is only
    /// checked here, never topped up.
    pub async fn update_schedule(
        &self,
        task_id: TaskId,
        definition: &TaskDefinition,
    ) -> OrchestratorResult<UpdateOutcome> {
        let owner = self
            .rpc_client()
            .require_signer()
            .map_err(OrchestratorError::ledger(WorkflowStage::Prepare))?;
        definition.schedule.validate()?;
        self.ensure_mutable(task_id).await?;

        let start_block = definition.schedule.start_block;
        let gas_limit = definition.task.gas;
        let estimated_cost = self
            .task_manager
            .estimate_cost(start_block, gas_limit)
            .await
            .map_err(OrchestratorError::task_manager(WorkflowStage::Estimate))?;
        let required_bond = self.required_bond(estimated_cost);

        let policy_id = self.policy_id().await?;
        self.require_bond(policy_id, owner, required_bond).await?;

        let receipt = self
            .task_manager
            .update_task_schedule(task_id, definition)
            .await
            .map_err(|err| {
                let stage = WorkflowStage::of_transaction(&err);
                OrchestratorError::task_manager(stage)(err)
            })?;

        Ok(UpdateOutcome {
            task_id,
            estimated_cost,
            required_bond,
            tx_hash: receipt.tx_hash,
        })
    }

    /// Cancels a pending task. Cancelling a task twice is an error.
    pub async fn cancel(&self, task_id: TaskId) -> OrchestratorResult<TxHash> {
        self.rpc_client()
            .require_signer()
            .map_err(OrchestratorError::ledger(WorkflowStage::Prepare))?;
        self.ensure_mutable(task_id).await?;

        let receipt =
            self.task_manager.cancel_task(task_id).await.map_err(|err| {
                let stage = WorkflowStage::of_transaction(&err);
                OrchestratorError::task_manager(stage)(err)
            })?;
        Ok(receipt.tx_hash)
    }

    pub async fn execute_due_tasks(
        &self,
        payout: Address,
        min_gas_reserve: U256,
    ) -> OrchestratorResult<ExecutionSummary> {
        self.task_manager
            .execute_tasks(payout, min_gas_reserve)
            .await
            .map_err(|err| {
                let stage = WorkflowStage::of_transaction(&err);
                OrchestratorError::task_manager(stage)(err)
            })
    }

    // -----------------
    // Steps
    // -----------------
    async fn ensure_future_block(
        &self,
        target_block: u64,
    ) -> OrchestratorResult<()> {
        let current_block = self
            .rpc_client()
            .get_block_number()
            .await
            .map_err(OrchestratorError::ledger(WorkflowStage::Prepare))?;
        if target_block <= current_block {
            return Err(OrchestratorError::TargetBlockPassed {
                target_block,
                current_block,
            });
        }
        Ok(())
    }

    async fn prepare_call(
        &self,
        call: &TaskCall,
    ) -> OrchestratorResult<(Address, Bytes)> {
        match call {
            TaskCall::Direct { target, call_data } => {
                Ok((*target, call_data.clone()))
            }
            TaskCall::Wrapped { target, call_data } => {
                let template =
                    self.task_manager.execution_env_template().await.map_err(
                        OrchestratorError::task_manager(WorkflowStage::Prepare),
                    )?;
                Ok((template, pack_environment_call(*target, call_data)))
            }
        }
    }

    async fn ensure_mutable(&self, task_id: TaskId) -> OrchestratorResult<()> {
        let status = self
            .task_manager
            .task_status(task_id)
            .await
            .map_err(OrchestratorError::task_manager(WorkflowStage::Prepare))?;
        match status {
            TaskStatus::Pending => Ok(()),
            status => {
                Err(OrchestratorError::TaskNotMutable { task_id, status })
            }
        }
    }

    async fn policy_id(&self) -> OrchestratorResult<PolicyId> {
        self.task_manager
            .get_policy_id()
            .await
            .map_err(OrchestratorError::task_manager(WorkflowStage::CheckBond))
    }

    /// Fails unless `owner` already has at least `required` bonded.
    async fn require_bond(
        &self,
        policy_id: PolicyId,
        owner: Address,
        required: U256,
    ) -> OrchestratorResult<()> {
        let bond = self
            .shmonad
            .get_policy_bond(policy_id, owner)
            .await
            .map_err(OrchestratorError::shmonad(WorkflowStage::CheckBond))?;
        if bond.covers(required) {
            return Ok(());
        }
        Err(OrchestratorError::BondNotSatisfied {
            required,
            bonded: bond.bonded,
            top_ups: 0,
        })
    }

    /// Makes sure `owner` has at least `required` bonded, topping up the
    /// shortfall if needed. The bond is read again after every top-up since
    /// other agents may unbond concurrently.
    ///
    /// Returns how many top-ups were needed.
    async fn ensure_bond(
        &self,
        policy_id: PolicyId,
        owner: Address,
        required: U256,
    ) -> OrchestratorResult<u32> {
        let mut top_ups = 0;
        loop {
            let bond = self
                .shmonad
                .get_policy_bond(policy_id, owner)
                .await
                .map_err(OrchestratorError::shmonad(WorkflowStage::CheckBond))?;
            if bond.covers(required) {
                return Ok(top_ups);
            }

            let shortfall = bond.shortfall(required);
            warn!(
                "Bond of {} under policy {} is short by {} MON (bonded {} MON, required {} MON)",
                owner,
                policy_id,
                format_ether(shortfall),
                format_ether(bond.bonded),
                format_ether(required)
            );
            if top_ups >= self.max_top_ups {
                return Err(OrchestratorError::BondNotSatisfied {
                    required,
                    bonded: bond.bonded,
                    top_ups,
                });
            }

            let pending = self
                .shmonad
                .deposit_and_bond(policy_id, owner, shortfall)
                .await
                .map_err(OrchestratorError::shmonad(WorkflowStage::TopUpBond))?;
            let receipt = self
                .rpc_client()
                .wait_for_inclusion(pending)
                .await
                .map_err(OrchestratorError::ledger(WorkflowStage::TopUpBond))?;
            if !receipt.success {
                return Err(OrchestratorError::TopUpReverted(receipt.tx_hash));
            }
            top_ups += 1;
            info!(
                "Topped up bond of {} by {} MON in {}",
                owner,
                format_ether(shortfall),
                receipt.tx_hash
            );
        }
    }
}
