use std::sync::Arc;

use fastlane_address_hub::{AddressHub, AddressHubError, ResolvedAddresses};
use fastlane_config::{ConfigError, FastlaneConfig, KeeperArgs};
use fastlane_core::{
    format_ether, Address, Schedule, Task, TaskDefinition, U256,
};
use fastlane_orchestrator::{
    KeeperService, Orchestrator, OrchestratorError, ScheduleRequest, TaskCall,
};
use fastlane_rpc_client::{
    FastlaneRpcClient, FastlaneRpcClientError, InclusionConfig, LedgerClient,
    ProviderLedger,
};
use fastlane_shmonad::ShMonadError;
use fastlane_task_manager::TaskManagerError;
use log::*;
use tokio_util::sync::CancellationToken;

use crate::{
    cli::{Cli, Command, ScheduleArgs, UpdateArgs},
    shutdown::Shutdown,
};

#[derive(Debug, thiserror::Error)]
pub enum KeeperError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Ledger(#[from] FastlaneRpcClientError),

    #[error(transparent)]
    AddressHub(#[from] AddressHubError),

    #[error(transparent)]
    ShMonad(#[from] ShMonadError),

    #[error(transparent)]
    TaskManager(#[from] TaskManagerError),

    #[error("{} (stage: {})", .0, .0.stage())]
    Orchestrator(#[from] OrchestratorError),

    #[error("No account given and no private key configured")]
    MissingAccount,

    #[error("Block {current} plus {offset} blocks is out of range")]
    BlockOutOfRange { current: u64, offset: u64 },

    #[error("Failed to wait for shutdown signal: {0}")]
    Shutdown(#[from] std::io::Error),
}

pub type KeeperResult<T> = Result<T, KeeperError>;

/// Everything a command needs, set up once per invocation.
struct Session {
    config: FastlaneConfig,
    rpc_client: FastlaneRpcClient,
    addresses: ResolvedAddresses,
}

impl Session {
    async fn connect(args: &KeeperArgs) -> KeeperResult<Self> {
        let config = args.load_config()?;
        let rpc_url = config.chain.rpc_url.clone();
        let ledger: Arc<dyn LedgerClient> = match args.signer()? {
            Some(signer) => {
                info!("Signing as {}", signer.address());
                Arc::new(ProviderLedger::with_signer(rpc_url, signer))
            }
            None => Arc::new(ProviderLedger::read_only(rpc_url)),
        };
        let inclusion = InclusionConfig::new(
            config.scheduling.inclusion_timeout(),
            config.scheduling.poll_interval(),
        );
        let rpc_client = FastlaneRpcClient::new(ledger, inclusion);

        let hub = AddressHub::new(
            rpc_client.clone(),
            config.registry.address_hub()?,
        );
        let addresses = hub.resolve_session().await?;
        Ok(Self {
            config,
            rpc_client,
            addresses,
        })
    }

    fn orchestrator(&self) -> Orchestrator {
        Orchestrator::from_addresses(
            self.rpc_client.clone(),
            &self.addresses,
            &self.config.scheduling,
        )
    }

    fn account_or_signer(
        &self,
        account: Option<Address>,
    ) -> KeeperResult<Address> {
        account
            .or(self.rpc_client.signer_address())
            .ok_or(KeeperError::MissingAccount)
    }
}

pub async fn run(cli: Cli) -> KeeperResult<()> {
    let session = Session::connect(&cli.keeper).await?;
    let orchestrator = session.orchestrator();
    let task_manager = orchestrator.task_manager();
    let shmonad = orchestrator.shmonad();

    match cli.command {
        Command::Addresses => {
            let ResolvedAddresses {
                address_hub,
                task_manager,
                shmonad,
            } = session.addresses;
            println!("Address hub:  {address_hub}");
            println!("Task manager: {task_manager}");
            println!("shMonad:      {shmonad}");
        }
        Command::Environment => {
            let template = task_manager.execution_env_template().await?;
            let policy_id = task_manager.get_policy_id().await?;
            println!("Execution environment template: {template}");
            println!("Policy id: {policy_id}");
        }
        Command::Balance { account } => {
            let account = session.account_or_signer(account)?;
            let native = shmonad.get_native_balance(account).await?;
            let shares = shmonad.get_balance(account).await?;
            println!("Account: {account}");
            println!("Native balance:  {} MON", format_ether(native));
            println!("shMonad balance: {} shMON", format_ether(shares));
        }
        Command::PolicyBond { account, required } => {
            let account = session.account_or_signer(account)?;
            let policy_id = task_manager.get_policy_id().await?;
            let bond = shmonad.get_policy_bond(policy_id, account).await?;
            println!("Policy {policy_id} bond of {account}");
            println!("Bonded:    {} MON", format_ether(bond.bonded));
            println!("Unbonding: {} MON", format_ether(bond.unbonding));
            if let Some(required) = required {
                let sufficient = shmonad
                    .ensure_sufficient_bond(policy_id, account, required)
                    .await?;
                println!(
                    "Covers {} MON: {}",
                    format_ether(required),
                    sufficient
                );
            }
        }
        Command::Schedule(args) => {
            schedule(&session, &orchestrator, args).await?;
        }
        Command::Status { task_id } => {
            let status = task_manager.task_status(task_id).await?;
            println!("Task {task_id} is {status}");
        }
        Command::Update(args) => {
            update(&session, &orchestrator, args).await?;
        }
        Command::Cancel { task_id } => {
            let tx_hash = orchestrator.cancel(task_id).await?;
            println!("Cancelled task {task_id} in {tx_hash}");
        }
        Command::Execute {
            payout,
            min_gas_reserve,
        } => {
            let payout = payout.or(session.config.keeper.payout_address);
            let payout = session.account_or_signer(payout)?;
            let reserve = min_gas_reserve
                .unwrap_or(session.config.keeper.min_gas_reserve);
            let summary = orchestrator
                .execute_due_tasks(payout, U256::from(reserve))
                .await?;
            println!(
                "Executed {} tasks, {} failed",
                summary.executed_count, summary.failed_count
            );
        }
        Command::Run => {
            let payout = session
                .account_or_signer(session.config.keeper.payout_address)?;
            let keeper = KeeperService::new(
                orchestrator.clone(),
                payout,
                &session.config.keeper,
            );
            let token = CancellationToken::new();
            let handle = keeper.start(token.clone());

            Shutdown::wait().await?;
            token.cancel();
            if let Err(err) = handle.await {
                error!("Keeper task failed: {}", err);
            }
        }
    }
    Ok(())
}

async fn schedule(
    session: &Session,
    orchestrator: &Orchestrator,
    args: ScheduleArgs,
) -> KeeperResult<()> {
    let ScheduleArgs {
        target,
        call_data,
        wrapped,
        blocks_ahead,
        deadline_blocks,
        gas,
    } = args;
    let scheduling = &session.config.scheduling;
    let current = session.rpc_client.get_block_number().await?;
    let target_block = block_after(
        current,
        blocks_ahead.unwrap_or(scheduling.blocks_ahead),
    )?;
    let deadline = block_after(
        current,
        deadline_blocks.unwrap_or(scheduling.deadline_blocks),
    )?;

    let call = if wrapped {
        TaskCall::Wrapped { target, call_data }
    } else {
        TaskCall::Direct { target, call_data }
    };
    let request = ScheduleRequest {
        call,
        gas_limit: gas.unwrap_or(scheduling.task_gas_limit),
        target_block,
        deadline: Some(deadline),
    };
    let outcome = orchestrator.schedule(&request).await?;

    println!("Task id:        {}", outcome.task_id);
    println!("Owner:          {}", outcome.owner);
    println!("Target block:   {}", outcome.target_block);
    println!(
        "Estimated cost: {} MON",
        format_ether(outcome.estimated_cost)
    );
    println!("Max payment:    {} MON", format_ether(outcome.max_payment));
    println!("Bond top-ups:   {}", outcome.top_ups);
    Ok(())
}

fn block_after(current: u64, offset: u64) -> KeeperResult<u64> {
    current
        .checked_add(offset)
        .ok_or(KeeperError::BlockOutOfRange { current, offset })
}

async fn update(
    session: &Session,
    orchestrator: &Orchestrator,
    args: UpdateArgs,
) -> KeeperResult<()> {
    let UpdateArgs {
        task_id,
        start_block,
        deadline,
        interval,
        executions,
        target,
        call_data,
        gas,
    } = args;
    let from = session.rpc_client.require_signer()?;
    let definition = TaskDefinition {
        task: Task {
            from,
            gas: gas.unwrap_or(session.config.scheduling.task_gas_limit),
            target,
            data: call_data,
            nonce: U256::ZERO,
        },
        schedule: Schedule {
            start_block,
            interval,
            executions,
            active: true,
            deadline,
        },
    };
    let outcome = orchestrator.update_schedule(task_id, &definition).await?;

    println!("Updated task {} in {}", outcome.task_id, outcome.tx_hash);
    println!(
        "Estimated cost: {} MON, bond required: {} MON",
        format_ether(outcome.estimated_cost),
        format_ether(outcome.required_bond)
    );
    Ok(())
}
