//! Contract interfaces of the FastLane deployment the keeper talks to.
#![allow(clippy::too_many_arguments)]

use alloy::sol;

sol! {
    /// Directory that maps pointers to the current address of each
    /// FastLane contract.
    interface IAddressHub {
        function getAddressFromPointer(uint256 pointer) external view returns (address);
        function getPointerFromAddress(address target) external view returns (uint256);
        function isFastLane(address target) external view returns (bool);
    }

    /// The task manager that schedules and executes deferred calls.
    interface ITaskManager {
        struct Task {
            address from;
            uint64 gas;
            address target;
            bytes data;
            uint256 nonce;
        }

        struct Schedule {
            uint64 startBlock;
            uint64 interval;
            uint32 executions;
            bool active;
            uint64 deadline;
        }

        struct TaskDefinition {
            Task task;
            Schedule schedule;
        }

        event TaskScheduled(bytes32 indexed taskId, address indexed owner, uint64 targetBlock);
        event TaskCancelled(bytes32 indexed taskId, address indexed owner);
        event TasksExecuted(uint256 executedCount, uint256 failedCount);

        function POLICY_ID() external view returns (uint64);
        function EXECUTION_ENV_TEMPLATE() external view returns (address);
        function estimateCost(uint64 targetBlock, uint256 maxTaskGas) external view returns (uint256);
        function scheduleTask(
            address environment,
            uint256 taskGasLimit,
            uint64 targetBlock,
            uint256 maxPayment,
            bytes calldata taskCallData
        ) external payable;
        function updateTaskSchedule(bytes32 taskId, TaskDefinition calldata newDefinition) external;
        function cancelTask(bytes32 taskId) external;
        function executeTasks(address payoutAddress, uint256 targetGasReserve) external returns (uint256);
        function isTaskExecuted(bytes32 taskId) external view returns (bool);
        function isTaskCancelled(bytes32 taskId) external view returns (bool);
        function getNextExecutionBlockInRange(uint64 startBlock, uint64 endBlock) external view returns (uint64);
    }

    /// The shMonad bonding contract backing task execution.
    interface IShMonad {
        function balanceOf(address account) external view returns (uint256);
        function balanceOfBonded(uint64 policyId, address account) external view returns (uint256);
        function balanceOfUnbonding(uint64 policyId, address account) external view returns (uint256);
        function depositAndBond(uint64 policyId, address bondRecipient, uint256 amountToBond) external payable;
    }
}
