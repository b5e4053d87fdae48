use std::sync::Arc;

use assert_matches::assert_matches;
use fastlane_address_hub::ResolvedAddresses;
use fastlane_config::SchedulingConfig;
use fastlane_core::{
    abi::{IShMonad, ITaskManager},
    Address, Bytes, Schedule, Task, TaskDefinition, TaskId, TaskStatus, B256,
    U256,
};
use fastlane_orchestrator::{
    Orchestrator, OrchestratorError, OrchestratorResult, ScheduleRequest,
    TaskCall, WorkflowStage,
};
use fastlane_rpc_client::FastlaneRpcClientError;
use fastlane_shmonad::ShMonadError;
use fastlane_task_manager::TaskManagerError;
use fastlane_test_kit::{init_logger, rpc_client_for, SimulatedLedger};

fn signer() -> Address {
    Address::repeat_byte(0x11)
}

fn target() -> Address {
    Address::repeat_byte(0x33)
}

fn setup_with(
    signer: Option<Address>,
    config: SchedulingConfig,
) -> (Arc<SimulatedLedger>, Orchestrator) {
    init_logger!();
    let ledger = Arc::new(SimulatedLedger::new(signer));
    let deployment = ledger.deployment();
    let addresses = ResolvedAddresses {
        address_hub: deployment.address_hub,
        task_manager: deployment.task_manager,
        shmonad: deployment.shmonad,
    };
    let orchestrator = Orchestrator::from_addresses(
        rpc_client_for(&ledger),
        &addresses,
        &config,
    );
    (ledger, orchestrator)
}

fn setup() -> (Arc<SimulatedLedger>, Orchestrator) {
    let (ledger, orchestrator) =
        setup_with(Some(signer()), SchedulingConfig::default());
    ledger.fund(signer(), U256::from(1_000_000_000_000u64));
    (ledger, orchestrator)
}

fn request(target_block: u64) -> ScheduleRequest {
    ScheduleRequest {
        call: TaskCall::Direct {
            target: target(),
            call_data: Bytes::from_static(&[1, 2, 3, 4]),
        },
        gas_limit: 100_000,
        target_block,
        deadline: None,
    }
}

fn definition(start_block: u64, gas: u64) -> TaskDefinition {
    TaskDefinition {
        task: Task {
            from: signer(),
            gas,
            target: target(),
            data: Bytes::new(),
            nonce: U256::ZERO,
        },
        schedule: Schedule::one_shot(start_block, start_block + 5_000),
    }
}

#[tokio::test]
async fn test_schedule_tops_up_shortfall_and_pays_twice_the_estimate(
) -> OrchestratorResult<()> {
    let (ledger, orchestrator) = setup();
    ledger.set_fixed_estimate(Some(U256::from(100)));
    ledger.set_bonded(signer(), U256::from(50));
    let target_block = ledger.block() + 10;

    let outcome = orchestrator.schedule(&request(target_block)).await?;
    assert_eq!(outcome.estimated_cost, U256::from(100));
    assert_eq!(outcome.max_payment, U256::from(200));
    assert_eq!(outcome.top_ups, 1);
    assert_eq!(outcome.owner, signer());
    assert_eq!(outcome.target_block, target_block);
    assert!(outcome.task_id.is_well_formed());

    let submissions = ledger.submissions();
    assert_eq!(submissions.len(), 2);
    assert_eq!(submissions[0].to, ledger.deployment().shmonad);
    assert!(submissions[0].value >= U256::from(150));
    assert_eq!(submissions[1].to, ledger.deployment().task_manager);
    assert_eq!(submissions[1].value, U256::from(200));

    // Once before and once after the top-up
    assert_eq!(ledger.read_count::<IShMonad::balanceOfBondedCall>(), 2);
    assert_eq!(ledger.bonded(signer()), U256::from(200));

    let status = orchestrator
        .task_manager()
        .task_status(outcome.task_id)
        .await
        .unwrap();
    assert_eq!(status, TaskStatus::Pending);
    Ok(())
}

#[tokio::test]
async fn test_schedule_with_sufficient_bond_skips_top_up() {
    let (ledger, orchestrator) = setup();
    ledger.set_fixed_estimate(Some(U256::from(100)));
    ledger.set_bonded(signer(), U256::from(500));

    let outcome = orchestrator
        .schedule(&request(ledger.block() + 10))
        .await
        .unwrap();
    assert_eq!(outcome.top_ups, 0);
    assert_eq!(ledger.submissions().len(), 1);
    assert_eq!(ledger.read_count::<IShMonad::balanceOfBondedCall>(), 1);
}

#[tokio::test]
async fn test_concurrent_unbonding_is_detected_after_top_up() {
    let (ledger, orchestrator) = setup();
    ledger.set_fixed_estimate(Some(U256::from(100)));
    ledger.set_bonded(signer(), U256::from(50));
    ledger.unbond_after_deposit(U256::from(100));

    let err = orchestrator
        .schedule(&request(ledger.block() + 10))
        .await
        .unwrap_err();
    assert_eq!(err.stage(), WorkflowStage::CheckBond);
    assert_matches!(
        err,
        OrchestratorError::BondNotSatisfied { top_ups: 1, bonded, required }
            if bonded == U256::from(100) && required == U256::from(200)
    );
    // Only the top-up went out, the task was never submitted
    assert_eq!(ledger.submissions().len(), 1);
    assert_eq!(ledger.task_count(), 0);
}

#[tokio::test]
async fn test_more_top_ups_when_allowed() {
    let config = SchedulingConfig {
        max_top_ups: 3,
        ..Default::default()
    };
    let (ledger, orchestrator) = setup_with(Some(signer()), config);
    ledger.fund(signer(), U256::from(1_000_000u64));
    ledger.set_fixed_estimate(Some(U256::from(100)));
    ledger.unbond_after_deposit(U256::from(150));

    // Every top-up is drained right after, leaving 50 bonded each time
    let err = orchestrator
        .schedule(&request(ledger.block() + 10))
        .await
        .unwrap_err();
    assert_matches!(
        err,
        OrchestratorError::BondNotSatisfied { top_ups: 3, .. }
    );
    assert_eq!(ledger.submissions().len(), 3);
}

#[tokio::test]
async fn test_reverted_top_up_aborts() {
    // Nothing to deposit from
    let (ledger, orchestrator) =
        setup_with(Some(signer()), SchedulingConfig::default());
    ledger.set_fixed_estimate(Some(U256::from(100)));

    let err = orchestrator
        .schedule(&request(ledger.block() + 10))
        .await
        .unwrap_err();
    assert_eq!(err.stage(), WorkflowStage::TopUpBond);
    assert!(err.tx_hash().is_some());
    assert_matches!(err, OrchestratorError::TopUpReverted(_));

    let submissions = ledger.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].to, ledger.deployment().shmonad);
    assert_eq!(ledger.task_count(), 0);
    assert_eq!(ledger.bonded(signer()), U256::ZERO);
}

#[tokio::test]
async fn test_rejected_top_up_aborts() {
    let (ledger, orchestrator) = setup();
    ledger.set_fixed_estimate(Some(U256::from(100)));
    ledger.reject_sends(Some("insufficient funds for gas"));

    let err = orchestrator
        .schedule(&request(ledger.block() + 10))
        .await
        .unwrap_err();
    assert_eq!(err.stage(), WorkflowStage::TopUpBond);
    assert_matches!(
        err,
        OrchestratorError::ShMonad {
            source: ShMonadError::DepositAndBond { .. },
            ..
        }
    );
    assert!(ledger.submissions().is_empty());
    assert_eq!(ledger.task_count(), 0);
}

#[tokio::test]
async fn test_missing_event_fails_without_task_id() {
    let (ledger, orchestrator) = setup();
    ledger.set_bonded(signer(), U256::from(1_000_000_000u64));
    ledger.drop_events(true);

    let err = orchestrator
        .schedule(&request(ledger.block() + 10))
        .await
        .unwrap_err();
    assert_eq!(err.stage(), WorkflowStage::ExtractEvent);
    assert!(err.tx_hash().is_some());
    assert_matches!(
        err,
        OrchestratorError::TaskManager {
            source: TaskManagerError::SchedulingConfirmation { .. },
            ..
        }
    );
    // No resubmission
    assert_eq!(ledger.submissions().len(), 1);
}

#[tokio::test]
async fn test_estimation_failure_aborts_before_bonding() {
    let (ledger, orchestrator) = setup();
    ledger.revert_calls::<ITaskManager::estimateCostCall>();

    let err = orchestrator
        .schedule(&request(ledger.block() + 10))
        .await
        .unwrap_err();
    assert_eq!(err.stage(), WorkflowStage::Estimate);
    assert_matches!(
        err,
        OrchestratorError::TaskManager {
            source: TaskManagerError::CostEstimation { .. },
            ..
        }
    );
    assert_eq!(ledger.read_count::<IShMonad::balanceOfBondedCall>(), 0);
    assert!(ledger.submissions().is_empty());
}

#[tokio::test]
async fn test_inclusion_timeout_is_not_a_confirmation_failure() {
    let (ledger, orchestrator) = setup();
    ledger.set_bonded(signer(), U256::from(1_000_000_000u64));
    ledger.withhold_receipts(true);

    let err = orchestrator
        .schedule(&request(ledger.block() + 10))
        .await
        .unwrap_err();
    assert_eq!(err.stage(), WorkflowStage::AwaitConfirmation);
    assert_matches!(
        err,
        OrchestratorError::TaskManager {
            source: TaskManagerError::Ledger(
                FastlaneRpcClientError::InclusionTimeout(..)
            ),
            ..
        }
    );
}

#[tokio::test]
async fn test_rejected_submission() {
    let (ledger, orchestrator) = setup();
    ledger.set_bonded(signer(), U256::from(1_000_000_000u64));
    ledger.reject_sends(Some("nonce too low"));

    let err = orchestrator
        .schedule(&request(ledger.block() + 10))
        .await
        .unwrap_err();
    assert_eq!(err.stage(), WorkflowStage::Submit);
}

#[tokio::test]
async fn test_schedule_preconditions() {
    let (ledger, orchestrator) = setup_with(None, SchedulingConfig::default());
    let err = orchestrator
        .schedule(&request(ledger.block() + 10))
        .await
        .unwrap_err();
    assert_eq!(err.stage(), WorkflowStage::Prepare);
    assert_matches!(
        err,
        OrchestratorError::Ledger {
            source: FastlaneRpcClientError::WalletRequired,
            ..
        }
    );

    let (ledger, orchestrator) = setup();
    assert_matches!(
        orchestrator.schedule(&request(ledger.block())).await,
        Err(OrchestratorError::TargetBlockPassed { .. })
    );

    let mut past_deadline = request(ledger.block() + 10);
    past_deadline.deadline = Some(ledger.block() + 5);
    assert_matches!(
        orchestrator.schedule(&past_deadline).await,
        Err(OrchestratorError::InvalidSchedule(_))
    );
    assert!(ledger.submissions().is_empty());
}

#[tokio::test]
async fn test_wrapped_call_goes_through_environment() {
    let (ledger, orchestrator) = setup();
    ledger.set_bonded(signer(), U256::from(1_000_000_000u64));
    let mut wrapped = request(ledger.block() + 10);
    wrapped.call = TaskCall::Wrapped {
        target: target(),
        call_data: Bytes::from_static(&[9, 9]),
    };
    wrapped.deadline = Some(ledger.block() + 5_000);

    let outcome = orchestrator.schedule(&wrapped).await.unwrap();
    let task = ledger.task(outcome.task_id).unwrap();
    assert_eq!(task.environment, ledger.deployment().execution_env_template);
    assert_eq!(&task.call_data[..20], target().as_slice());
    assert_eq!(&task.call_data[20..], &[9, 9]);
}

#[tokio::test]
async fn test_update_re_estimates_for_new_block() {
    let (ledger, orchestrator) = setup();
    ledger.set_bonded(signer(), U256::from(1_000_000_000u64));
    let target_block = ledger.block() + 10;
    let outcome = orchestrator.schedule(&request(target_block)).await.unwrap();
    assert_eq!(ledger.read_count::<ITaskManager::estimateCostCall>(), 1);

    let update = orchestrator
        .update_schedule(
            outcome.task_id,
            &definition(target_block + 20, 200_000),
        )
        .await
        .unwrap();
    assert_eq!(ledger.read_count::<ITaskManager::estimateCostCall>(), 2);
    assert_eq!(update.estimated_cost, U256::from(200_000_000u64));
    assert_eq!(update.required_bond, U256::from(400_000_000u64));
    assert_eq!(
        ledger.task(outcome.task_id).unwrap().target_block,
        target_block + 20
    );
}

#[tokio::test]
async fn test_update_never_tops_up_bond() {
    let (ledger, orchestrator) = setup();
    ledger.set_fixed_estimate(Some(U256::from(100)));
    ledger.set_bonded(signer(), U256::from(50));
    let unknown = TaskId(B256::repeat_byte(0x55));

    let err = orchestrator
        .update_schedule(unknown, &definition(ledger.block() + 10, 100_000))
        .await
        .unwrap_err();
    assert_eq!(err.stage(), WorkflowStage::CheckBond);
    assert_matches!(
        err,
        OrchestratorError::BondNotSatisfied { top_ups: 0, .. }
    );
    assert!(ledger.submissions().is_empty());
    assert_eq!(ledger.bonded(signer()), U256::from(50));
}

#[tokio::test]
async fn test_reverted_update_fails_in_submit_stage() {
    let (ledger, orchestrator) = setup();
    ledger.set_bonded(signer(), U256::from(1_000_000_000u64));
    let unknown = TaskId(B256::repeat_byte(0x55));

    let err = orchestrator
        .update_schedule(unknown, &definition(ledger.block() + 10, 100_000))
        .await
        .unwrap_err();
    assert_eq!(err.stage(), WorkflowStage::Submit);
    assert!(err.tx_hash().is_some());
    assert_matches!(
        err,
        OrchestratorError::TaskManager {
            source: TaskManagerError::ScheduleUpdate { task_id, .. },
            ..
        } if task_id == unknown
    );
    assert_eq!(ledger.submissions().len(), 1);
}

#[tokio::test]
async fn test_update_rejects_invalid_schedule() {
    let (ledger, orchestrator) = setup();
    ledger.set_bonded(signer(), U256::from(1_000_000_000u64));
    let target_block = ledger.block() + 10;
    let outcome = orchestrator.schedule(&request(target_block)).await.unwrap();

    let mut invalid = definition(target_block, 100_000);
    invalid.schedule.deadline = target_block;
    assert_matches!(
        orchestrator.update_schedule(outcome.task_id, &invalid).await,
        Err(OrchestratorError::InvalidSchedule(_))
    );
}

#[tokio::test]
async fn test_cancel_round_trip() {
    let (ledger, orchestrator) = setup();
    ledger.set_bonded(signer(), U256::from(1_000_000_000u64));
    let target_block = ledger.block() + 10;
    let task_id = orchestrator
        .schedule(&request(target_block))
        .await
        .unwrap()
        .task_id;

    orchestrator.cancel(task_id).await.unwrap();
    assert!(orchestrator
        .task_manager()
        .is_task_cancelled(task_id)
        .await
        .unwrap());

    assert_matches!(
        orchestrator
            .update_schedule(task_id, &definition(target_block + 5, 100_000))
            .await,
        Err(OrchestratorError::TaskNotMutable {
            status: TaskStatus::Cancelled,
            ..
        })
    );
    assert_matches!(
        orchestrator.cancel(task_id).await,
        Err(OrchestratorError::TaskNotMutable {
            status: TaskStatus::Cancelled,
            ..
        })
    );
}

#[tokio::test]
async fn test_execute_with_nothing_due_is_success() {
    let (_ledger, orchestrator) = setup();

    let summary = orchestrator
        .execute_due_tasks(signer(), U256::ZERO)
        .await
        .unwrap();
    assert_eq!(summary.executed_count, U256::ZERO);
    assert_eq!(summary.failed_count, U256::ZERO);
}

#[tokio::test]
async fn test_connect_through_address_hub() {
    init_logger!();
    let ledger = Arc::new(SimulatedLedger::new(Some(signer())));
    let orchestrator = Orchestrator::connect(
        rpc_client_for(&ledger),
        ledger.deployment().address_hub,
        &SchedulingConfig::default(),
    )
    .await
    .unwrap();
    assert_eq!(
        orchestrator.task_manager().address(),
        ledger.deployment().task_manager
    );
    assert_eq!(orchestrator.shmonad().address(), ledger.deployment().shmonad);

    let err = Orchestrator::connect(
        rpc_client_for(&ledger),
        Address::repeat_byte(0x01),
        &SchedulingConfig::default(),
    )
    .await
    .err()
    .unwrap();
    assert_eq!(err.stage(), WorkflowStage::Prepare);
}
