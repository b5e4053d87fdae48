use clap::{Args, Parser, Subcommand};
use fastlane_config::KeeperArgs;
use fastlane_core::{Address, Bytes, TaskId, U256};

#[derive(Debug, Parser)]
#[command(
    name = "fastlane-keeper",
    version,
    about = "Schedules, funds and executes FastLane tasks"
)]
pub struct Cli {
    #[command(flatten)]
    pub keeper: KeeperArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the contract addresses resolved through the address hub
    Addresses,
    /// Print the execution environment template and the task manager policy
    Environment,
    /// Print native and shMonad balances, defaults to the signing account
    Balance { account: Option<Address> },
    /// Print the bond under the task manager policy
    PolicyBond {
        account: Option<Address>,
        /// Also check the bond against this amount (in wei)
        #[arg(long)]
        required: Option<U256>,
    },
    /// Schedule a task, topping up the bond if needed
    Schedule(ScheduleArgs),
    /// Print whether a task is pending, executed or cancelled
    Status { task_id: TaskId },
    /// Move a pending task to a new schedule
    Update(UpdateArgs),
    /// Cancel a pending task
    Cancel { task_id: TaskId },
    /// Execute all due tasks once
    Execute {
        /// Receives the fees, defaults to the config or the signing account
        #[arg(long)]
        payout: Option<Address>,
        #[arg(long)]
        min_gas_reserve: Option<u64>,
    },
    /// Keep executing due tasks until interrupted
    Run,
}

#[derive(Debug, Args)]
pub struct ScheduleArgs {
    /// Contract the task calls
    #[arg(long)]
    pub target: Address,

    #[arg(long, default_value = "0x")]
    pub call_data: Bytes,

    /// Route the call through the execution environment template
    #[arg(long)]
    pub wrapped: bool,

    #[arg(long)]
    pub blocks_ahead: Option<u64>,

    #[arg(long)]
    pub deadline_blocks: Option<u64>,

    #[arg(long)]
    pub gas: Option<u64>,
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    pub task_id: TaskId,

    #[arg(long)]
    pub start_block: u64,

    #[arg(long)]
    pub deadline: u64,

    #[arg(long, default_value_t = 0)]
    pub interval: u64,

    #[arg(long, default_value_t = 1)]
    pub executions: u32,

    #[arg(long)]
    pub target: Address,

    #[arg(long, default_value = "0x")]
    pub call_data: Bytes,

    #[arg(long)]
    pub gas: Option<u64>,
}
