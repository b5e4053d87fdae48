pub const DEFAULT_RPC_URL: &str = "http://localhost:8545";

/// Scheduling requires twice the estimated cost to be bonded.
pub const DEFAULT_BOND_MULTIPLIER: u64 = 2;
pub const DEFAULT_MAX_TOP_UPS: u32 = 1;
pub const DEFAULT_INCLUSION_TIMEOUT_MILLIS: u64 = 60_000;
pub const DEFAULT_POLL_INTERVAL_MILLIS: u64 = 500;
pub const DEFAULT_EXECUTE_GAS_LIMIT: u64 = 1_000_000;
pub const DEFAULT_TASK_GAS_LIMIT: u64 = 100_000;

/// ~20 seconds at Monad block times
pub const DEFAULT_BLOCKS_AHEAD: u64 = 10;
/// ~2.8 hours at Monad block times
pub const DEFAULT_DEADLINE_BLOCKS: u64 = 5_000;

pub const DEFAULT_MILLIS_PER_TICK: u64 = 1_000;
pub const DEFAULT_LOOKAHEAD_BLOCKS: u64 = 100;
