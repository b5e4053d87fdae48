use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use alloy::{
    primitives::{keccak256, Address, Bytes, TxHash, B256, U256},
    sol_types::{SolCall, SolEvent, SolInterface, SolValue},
};
use async_trait::async_trait;
use fastlane_core::{
    abi::{IAddressHub, IShMonad, ITaskManager},
    ContractPointer, TaskDefinition, TaskId,
};
use fastlane_rpc_client::{
    FastlaneRpcClientError, FastlaneRpcClientResult, LedgerClient, LedgerLog,
    LedgerReceipt, TransactionSubmission,
};
use log::*;

pub const DEFAULT_POLICY_ID: u64 = 7;
const DEFAULT_GAS_PRICE: u64 = 1_000;
const STARTING_BLOCK: u64 = 1_000;
const GAS_PER_TX: u64 = 21_000;

/// Addresses the simulated FastLane contracts are deployed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatedDeployment {
    pub address_hub: Address,
    pub task_manager: Address,
    pub shmonad: Address,
    pub execution_env_template: Address,
}

impl Default for SimulatedDeployment {
    fn default() -> Self {
        Self {
            address_hub: Address::repeat_byte(0xa1),
            task_manager: Address::repeat_byte(0xa2),
            shmonad: Address::repeat_byte(0xa3),
            execution_env_template: Address::repeat_byte(0xa4),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedTask {
    pub owner: Address,
    pub environment: Address,
    pub gas_limit: U256,
    pub target_block: u64,
    pub max_payment: U256,
    pub call_data: Bytes,
    pub executed: bool,
    pub cancelled: bool,
}

impl SimulatedTask {
    fn is_pending(&self) -> bool {
        !self.executed && !self.cancelled
    }
}

#[derive(Debug, Default)]
struct ChainState {
    block: u64,
    native: HashMap<Address, U256>,
    hub: HashMap<u64, Address>,

    shmonad_balances: HashMap<Address, U256>,
    bonded: HashMap<(u64, Address), U256>,
    unbonding: HashMap<(u64, Address), U256>,
    /// Moved from bonded to unbonding right after each deposit.
    unbond_after_deposit: U256,

    policy_id: u64,
    gas_price: U256,
    fixed_estimate: Option<U256>,
    tasks: HashMap<B256, SimulatedTask>,
    task_order: Vec<B256>,
    failing_tasks: HashSet<B256>,
    task_nonce: u64,

    tx_count: u64,
    receipts: HashMap<TxHash, LedgerReceipt>,
    submissions: Vec<TransactionSubmission>,
    reads: Vec<[u8; 4]>,

    drop_events: bool,
    withhold_receipts: bool,
    reject_sends: Option<String>,
    reverting_selectors: HashSet<[u8; 4]>,
}

/// In-memory ledger hosting the FastLane contracts.
///
/// Calls and transactions are decoded with the real contract ABI, so code
/// under test goes through the exact encoding it uses against a node. Every
/// transaction is included right away and mines one block.
pub struct SimulatedLedger {
    deployment: SimulatedDeployment,
    signer: Option<Address>,
    state: Mutex<ChainState>,
}

impl SimulatedLedger {
    pub fn new(signer: Option<Address>) -> Self {
        Self::with_deployment(signer, SimulatedDeployment::default())
    }

    pub fn with_deployment(
        signer: Option<Address>,
        deployment: SimulatedDeployment,
    ) -> Self {
        let mut state = ChainState {
            block: STARTING_BLOCK,
            policy_id: DEFAULT_POLICY_ID,
            gas_price: U256::from(DEFAULT_GAS_PRICE),
            ..Default::default()
        };
        state
            .hub
            .insert(ContractPointer::ShMonad.as_u64(), deployment.shmonad);
        state.hub.insert(
            ContractPointer::TaskManager.as_u64(),
            deployment.task_manager,
        );
        Self {
            deployment,
            signer,
            state: Mutex::new(state),
        }
    }

    pub fn deployment(&self) -> SimulatedDeployment {
        self.deployment
    }

    // -----------------
    // Setup
    // -----------------
    pub fn fund(&self, account: Address, amount: U256) {
        let mut state = self.state.lock().unwrap();
        *state.native.entry(account).or_default() += amount;
    }

    pub fn set_bonded(&self, account: Address, amount: U256) {
        let mut state = self.state.lock().unwrap();
        let key = (state.policy_id, account);
        state.bonded.insert(key, amount);
    }

    pub fn set_unbonding(&self, account: Address, amount: U256) {
        let mut state = self.state.lock().unwrap();
        let key = (state.policy_id, account);
        state.unbonding.insert(key, amount);
    }

    pub fn set_shmonad_balance(&self, account: Address, amount: U256) {
        let mut state = self.state.lock().unwrap();
        state.shmonad_balances.insert(account, amount);
    }

    /// Simulates another agent unbonding `amount` right after every deposit.
    pub fn unbond_after_deposit(&self, amount: U256) {
        self.state.lock().unwrap().unbond_after_deposit = amount;
    }

    pub fn set_hub_pointer(&self, pointer: u64, address: Address) {
        self.state.lock().unwrap().hub.insert(pointer, address);
    }

    pub fn set_gas_price(&self, gas_price: U256) {
        self.state.lock().unwrap().gas_price = gas_price;
    }

    /// Makes `estimateCost` return `estimate` regardless of its inputs.
    pub fn set_fixed_estimate(&self, estimate: Option<U256>) {
        self.state.lock().unwrap().fixed_estimate = estimate;
    }

    pub fn advance_blocks(&self, blocks: u64) {
        self.state.lock().unwrap().block += blocks;
    }

    pub fn fail_task(&self, task_id: TaskId) {
        self.state.lock().unwrap().failing_tasks.insert(task_id.0);
    }

    /// Inserts a pending task as if scheduled by `owner`.
    pub fn insert_task(&self, owner: Address, target_block: u64) -> TaskId {
        let mut state = self.state.lock().unwrap();
        let task_id = next_task_id(&mut state, owner);
        state.tasks.insert(
            task_id,
            SimulatedTask {
                owner,
                environment: self.deployment.execution_env_template,
                gas_limit: U256::from(100_000),
                target_block,
                max_payment: U256::ZERO,
                call_data: Bytes::new(),
                executed: false,
                cancelled: false,
            },
        );
        state.task_order.push(task_id);
        TaskId(task_id)
    }

    // -----------------
    // Fault injection
    // -----------------

    /// Strips every FastLane event from future receipts.
    pub fn drop_events(&self, drop: bool) {
        self.state.lock().unwrap().drop_events = drop;
    }

    /// Accepts transactions but never reports them as included.
    pub fn withhold_receipts(&self, withhold: bool) {
        self.state.lock().unwrap().withhold_receipts = withhold;
    }

    pub fn reject_sends(&self, reason: Option<&str>) {
        self.state.lock().unwrap().reject_sends = reason.map(str::to_string);
    }

    /// Makes every read-only call of `C` revert.
    pub fn revert_calls<C: SolCall>(&self) {
        self.state
            .lock()
            .unwrap()
            .reverting_selectors
            .insert(C::SELECTOR);
    }

    // -----------------
    // Inspection
    // -----------------
    pub fn block(&self) -> u64 {
        self.state.lock().unwrap().block
    }

    pub fn native(&self, account: Address) -> U256 {
        let state = self.state.lock().unwrap();
        state.native.get(&account).copied().unwrap_or_default()
    }

    pub fn bonded(&self, account: Address) -> U256 {
        let state = self.state.lock().unwrap();
        bonded_of(&state, state.policy_id, account)
    }

    pub fn task(&self, task_id: TaskId) -> Option<SimulatedTask> {
        self.state.lock().unwrap().tasks.get(&task_id.0).cloned()
    }

    pub fn task_count(&self) -> usize {
        self.state.lock().unwrap().tasks.len()
    }

    pub fn submissions(&self) -> Vec<TransactionSubmission> {
        self.state.lock().unwrap().submissions.clone()
    }

    /// How often `C` was read through [LedgerClient::call].
    pub fn read_count<C: SolCall>(&self) -> usize {
        let state = self.state.lock().unwrap();
        state
            .reads
            .iter()
            .filter(|selector| **selector == C::SELECTOR)
            .count()
    }

    // -----------------
    // Contracts
    // -----------------
    fn handle_call(
        &self,
        state: &mut ChainState,
        to: Address,
        data: &[u8],
    ) -> Result<Bytes, String> {
        let SimulatedDeployment {
            address_hub,
            task_manager,
            shmonad,
            execution_env_template,
        } = self.deployment;

        if to == address_hub {
            use IAddressHub::IAddressHubCalls::*;
            let call = IAddressHub::IAddressHubCalls::abi_decode(data)
                .map_err(|err| err.to_string())?;
            let encoded = match call {
                getAddressFromPointer(c) => {
                    let pointer = u64::try_from(c.pointer).unwrap_or(u64::MAX);
                    let address =
                        state.hub.get(&pointer).copied().unwrap_or_default();
                    address.abi_encode()
                }
                getPointerFromAddress(c) => {
                    let pointer = state
                        .hub
                        .iter()
                        .find(|(_, address)| **address == c.target)
                        .map(|(pointer, _)| *pointer)
                        .unwrap_or_default();
                    U256::from(pointer).abi_encode()
                }
                isFastLane(c) => {
                    state.hub.values().any(|a| *a == c.target).abi_encode()
                }
            };
            return Ok(encoded.into());
        }

        if to == task_manager {
            use ITaskManager::ITaskManagerCalls::*;
            let call = ITaskManager::ITaskManagerCalls::abi_decode(data)
                .map_err(|err| err.to_string())?;
            let encoded = match call {
                POLICY_ID(_) => state.policy_id.abi_encode(),
                EXECUTION_ENV_TEMPLATE(_) => {
                    execution_env_template.abi_encode()
                }
                estimateCost(c) => {
                    if c.targetBlock <= state.block {
                        return Err("target block in the past".to_string());
                    }
                    state
                        .fixed_estimate
                        .unwrap_or(c.maxTaskGas * state.gas_price)
                        .abi_encode()
                }
                isTaskExecuted(c) => state
                    .tasks
                    .get(&c.taskId)
                    .is_some_and(|task| task.executed)
                    .abi_encode(),
                isTaskCancelled(c) => state
                    .tasks
                    .get(&c.taskId)
                    .is_some_and(|task| task.cancelled)
                    .abi_encode(),
                getNextExecutionBlockInRange(c) => {
                    let range = c.startBlock..=c.endBlock;
                    state
                        .tasks
                        .values()
                        .filter(|task| task.is_pending())
                        .map(|task| task.target_block)
                        .filter(|block| range.contains(block))
                        .min()
                        .unwrap_or_default()
                        .abi_encode()
                }
                _ => return Err("not a view function".to_string()),
            };
            return Ok(encoded.into());
        }

        if to == shmonad {
            use IShMonad::IShMonadCalls::*;
            let call = IShMonad::IShMonadCalls::abi_decode(data)
                .map_err(|err| err.to_string())?;
            let encoded = match call {
                balanceOf(c) => state
                    .shmonad_balances
                    .get(&c.account)
                    .copied()
                    .unwrap_or_default()
                    .abi_encode(),
                balanceOfBonded(c) => {
                    bonded_of(state, c.policyId, c.account).abi_encode()
                }
                balanceOfUnbonding(c) => state
                    .unbonding
                    .get(&(c.policyId, c.account))
                    .copied()
                    .unwrap_or_default()
                    .abi_encode(),
                _ => return Err("not a view function".to_string()),
            };
            return Ok(encoded.into());
        }

        Err(format!("no contract at {to}"))
    }

    /// Applies a transaction, returning the emitted logs or the revert
    /// reason.
    fn handle_transaction(
        &self,
        state: &mut ChainState,
        from: Address,
        submission: &TransactionSubmission,
    ) -> Result<Vec<LedgerLog>, String> {
        let SimulatedDeployment {
            task_manager,
            shmonad,
            ..
        } = self.deployment;
        let TransactionSubmission {
            to, data, value, ..
        } = submission;
        let (to, value) = (*to, *value);

        if to == shmonad {
            let call = IShMonad::depositAndBondCall::abi_decode(data)
                .map_err(|err| err.to_string())?;
            debit(state, from, value)?;
            let recipient = call.bondRecipient;
            let free = state.shmonad_balances.entry(recipient).or_default();
            *free += value;
            let bonding = call.amountToBond.min(*free);
            *free -= bonding;

            let key = (call.policyId, recipient);
            let drained = state.unbond_after_deposit;
            let bonded = state.bonded.entry(key).or_default();
            *bonded += bonding;
            let drained = drained.min(*bonded);
            *bonded -= drained;
            *state.unbonding.entry(key).or_default() += drained;
            return Ok(vec![]);
        }

        if to != task_manager {
            return Err(format!("no contract at {to}"));
        }

        use ITaskManager::ITaskManagerCalls::*;
        let call = ITaskManager::ITaskManagerCalls::abi_decode(data)
            .map_err(|err| err.to_string())?;
        // Unrelated log that every task manager interaction carries.
        let mut logs = vec![LedgerLog {
            address: shmonad,
            topics: vec![keccak256("Accessed(address)")],
            data: Bytes::new(),
        }];

        match call {
            scheduleTask(c) => {
                if c.targetBlock <= state.block {
                    return Err("target block in the past".to_string());
                }
                if value != c.maxPayment {
                    return Err("payment does not match".to_string());
                }
                let cost = state
                    .fixed_estimate
                    .unwrap_or(c.taskGasLimit * state.gas_price);
                if bonded_of(state, state.policy_id, from) < cost {
                    return Err("insufficient bond".to_string());
                }
                // The unused part of the payment is refunded right away.
                debit(state, from, cost.min(value))?;

                let task_id = next_task_id(state, from);
                state.tasks.insert(
                    task_id,
                    SimulatedTask {
                        owner: from,
                        environment: c.environment,
                        gas_limit: c.taskGasLimit,
                        target_block: c.targetBlock,
                        max_payment: c.maxPayment,
                        call_data: c.taskCallData,
                        executed: false,
                        cancelled: false,
                    },
                );
                state.task_order.push(task_id);
                let event = ITaskManager::TaskScheduled {
                    taskId: task_id,
                    owner: from,
                    targetBlock: c.targetBlock,
                };
                logs.push(event_log(task_manager, &event));
            }
            updateTaskSchedule(c) => {
                let task = state
                    .tasks
                    .get_mut(&c.taskId)
                    .filter(|task| task.owner == from && task.is_pending())
                    .ok_or_else(|| "task not updatable".to_string())?;
                let definition = TaskDefinition::from(c.newDefinition.clone());
                task.target_block = definition.schedule.start_block;
                task.gas_limit = U256::from(definition.task.gas);
            }
            cancelTask(c) => {
                let task = state
                    .tasks
                    .get_mut(&c.taskId)
                    .filter(|task| task.owner == from && task.is_pending())
                    .ok_or_else(|| "task not cancellable".to_string())?;
                task.cancelled = true;
                let event = ITaskManager::TaskCancelled {
                    taskId: c.taskId,
                    owner: from,
                };
                logs.push(event_log(task_manager, &event));
            }
            executeTasks(c) => {
                let current = state.block;
                let due = state
                    .task_order
                    .iter()
                    .copied()
                    .filter(|id| {
                        state.tasks.get(id).is_some_and(|task| {
                            task.is_pending() && task.target_block <= current
                        })
                    })
                    .collect::<Vec<_>>();

                let (mut executed, mut failed) = (0u64, 0u64);
                for id in due {
                    if state.failing_tasks.contains(&id) {
                        failed += 1;
                    } else {
                        executed += 1;
                    }
                    if let Some(task) = state.tasks.get_mut(&id) {
                        task.executed = true;
                    }
                }
                *state.native.entry(c.payoutAddress).or_default() +=
                    U256::from(executed) * state.gas_price;

                let event = ITaskManager::TasksExecuted {
                    executedCount: U256::from(executed),
                    failedCount: U256::from(failed),
                };
                logs.push(event_log(task_manager, &event));
            }
            _ => return Err("not a transaction".to_string()),
        }
        Ok(logs)
    }
}

fn bonded_of(state: &ChainState, policy_id: u64, account: Address) -> U256 {
    state
        .bonded
        .get(&(policy_id, account))
        .copied()
        .unwrap_or_default()
}

fn debit(
    state: &mut ChainState,
    account: Address,
    amount: U256,
) -> Result<(), String> {
    let balance = state.native.entry(account).or_default();
    if *balance < amount {
        return Err("insufficient funds".to_string());
    }
    *balance -= amount;
    Ok(())
}

fn next_task_id(state: &mut ChainState, owner: Address) -> B256 {
    state.task_nonce += 1;
    let mut preimage = owner.to_vec();
    preimage.extend_from_slice(&state.task_nonce.to_be_bytes());
    keccak256(preimage)
}

fn event_log<E: SolEvent>(address: Address, event: &E) -> LedgerLog {
    let data = event.encode_log_data();
    LedgerLog {
        address,
        topics: data.topics().to_vec(),
        data: data.data,
    }
}

#[async_trait]
impl LedgerClient for SimulatedLedger {
    async fn block_number(&self) -> FastlaneRpcClientResult<u64> {
        Ok(self.block())
    }

    async fn native_balance(
        &self,
        account: Address,
    ) -> FastlaneRpcClientResult<U256> {
        Ok(self.native(account))
    }

    async fn call(
        &self,
        to: Address,
        data: Bytes,
    ) -> FastlaneRpcClientResult<Bytes> {
        let mut state = self.state.lock().unwrap();
        let selector = data
            .get(..4)
            .and_then(|s| <[u8; 4]>::try_from(s).ok())
            .unwrap_or_default();
        state.reads.push(selector);
        if state.reverting_selectors.contains(&selector) {
            return Err(FastlaneRpcClientError::Call {
                to,
                reason: "execution reverted".to_string(),
            });
        }
        self.handle_call(&mut state, to, &data)
            .map_err(|reason| FastlaneRpcClientError::Call { to, reason })
    }

    fn signer_address(&self) -> Option<Address> {
        self.signer
    }

    async fn send_transaction(
        &self,
        submission: TransactionSubmission,
    ) -> FastlaneRpcClientResult<TxHash> {
        let Some(from) = self.signer else {
            return Err(FastlaneRpcClientError::WalletRequired);
        };
        let mut state = self.state.lock().unwrap();
        if let Some(reason) = &state.reject_sends {
            return Err(FastlaneRpcClientError::SendTransaction {
                to: submission.to,
                reason: reason.clone(),
            });
        }

        state.tx_count += 1;
        state.block += 1;
        let tx_hash = keccak256(state.tx_count.to_be_bytes());
        state.submissions.push(submission.clone());

        let task_manager = self.deployment.task_manager;
        let outcome = self.handle_transaction(&mut state, from, &submission);
        let receipt = match outcome {
            Ok(mut logs) => {
                if state.drop_events {
                    logs.retain(|log| log.address != task_manager);
                }
                LedgerReceipt {
                    tx_hash,
                    block_number: Some(state.block),
                    success: true,
                    gas_used: GAS_PER_TX,
                    logs,
                }
            }
            Err(reason) => {
                debug!("Simulated transaction {tx_hash} reverted: {reason}");
                LedgerReceipt {
                    tx_hash,
                    block_number: Some(state.block),
                    success: false,
                    gas_used: GAS_PER_TX,
                    logs: vec![],
                }
            }
        };
        if !state.withhold_receipts {
            state.receipts.insert(tx_hash, receipt);
        }
        Ok(tx_hash)
    }

    async fn transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> FastlaneRpcClientResult<Option<LedgerReceipt>> {
        Ok(self.state.lock().unwrap().receipts.get(&tx_hash).cloned())
    }
}
