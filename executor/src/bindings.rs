//! Solidity ABI bindings for the contracts the executor talks to.
//!
//! Only the members actually used are declared.

use ethers::contract::abigen;

abigen!(
    StableFlowHook,
    r#"[
        event RebalanceIntent(bytes32 indexed poolId, uint256 imbalanceBps)
    ]"#;

    ExecutionRegistry,
    r#"[
        function markExecuted(bytes32 intentId, bytes32 poolId, int256 imbalanceBps) external
    ]"#;

    ArcVault,
    r#"[
        function settleRebalance(bytes32 intentId, bytes32 poolId, int256 deltaUSDC) external
    ]"#;

    EnsRegistry,
    r#"[
        function resolver(bytes32 node) external view returns (address)
    ]"#;

    EnsTextResolver,
    r#"[
        function text(bytes32 node, string key) external view returns (string)
    ]"#
);
