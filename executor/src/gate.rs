//! Intent gate: the ordered policy checks an intent must pass before any chain write.
//!
//! Order matters. Authorisation and the pause/kill switches come first so operators can stop
//! execution regardless of what the intent carries.
//!
//! The threshold compares signed values (`imbalance < threshold`), no absolute value. A negative
//! imbalance under a positive threshold is therefore skipped; sources that want symmetric gating
//! must fold the sign before handing the intent over.

use alloy_primitives::Address;
use stableflow_types::{ExecutionMode, PolicySnapshot, RebalanceIntent, SkipReason};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateDecision {
    Proceed,
    Skip(SkipReason),
}

/// First failing check wins.
pub fn evaluate(intent: &RebalanceIntent, policy: &PolicySnapshot, caller: &Address) -> GateDecision {
    if !policy.executor.authorizes(caller) {
        return GateDecision::Skip(SkipReason::Unauthorized);
    }
    if !policy.status.is_active() {
        return GateDecision::Skip(SkipReason::Paused);
    }
    if !policy.execution_enabled {
        return GateDecision::Skip(SkipReason::Disabled);
    }
    if intent.imbalance_bps < policy.intent_threshold_bps {
        return GateDecision::Skip(SkipReason::BelowThreshold);
    }
    if policy.mode == ExecutionMode::Demo {
        return GateDecision::Skip(SkipReason::Demo);
    }
    GateDecision::Proceed
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{B256, I256};
    use stableflow_types::{policy::keys, ExecutorIdentity, PolicyRecords, ProtocolStatus};

    use super::*;

    fn caller() -> Address {
        Address::repeat_byte(0xca)
    }

    fn bps(v: i64) -> I256 {
        I256::try_from(v).unwrap()
    }

    fn live_policy(threshold: i64) -> PolicySnapshot {
        PolicySnapshot {
            hook_address: None,
            intent_threshold_bps: bps(threshold),
            status: ProtocolStatus::Active,
            executor: ExecutorIdentity::Designated(caller().to_string()),
            mode: ExecutionMode::Live,
            execution_enabled: true,
            chain: "sepolia".into(),
        }
    }

    fn intent(imbalance: i64) -> RebalanceIntent {
        RebalanceIntent::observed(B256::repeat_byte(1), bps(imbalance), B256::repeat_byte(2), 100)
    }

    #[test]
    fn test_compliant_intent_proceeds() {
        assert_eq!(evaluate(&intent(500), &live_policy(100), &caller()), GateDecision::Proceed);
    }

    #[test]
    fn test_foreign_executor_dominates() {
        let mut policy = live_policy(100);
        policy.executor = ExecutorIdentity::Designated(Address::repeat_byte(0x99).to_string());
        assert_eq!(
            evaluate(&intent(500), &policy, &caller()),
            GateDecision::Skip(SkipReason::Unauthorized)
        );

        // Even when every later check would also fail.
        policy.status = ProtocolStatus::Inactive;
        policy.execution_enabled = false;
        policy.mode = ExecutionMode::Demo;
        assert_eq!(
            evaluate(&intent(0), &policy, &caller()),
            GateDecision::Skip(SkipReason::Unauthorized)
        );
    }

    #[test]
    fn test_unknown_executor_allows_any_caller() {
        let mut policy = live_policy(0);
        policy.executor = ExecutorIdentity::Unknown;
        assert_eq!(evaluate(&intent(1), &policy, &Address::ZERO), GateDecision::Proceed);
    }

    #[test]
    fn test_pause_precedes_disable_and_threshold() {
        let mut policy = live_policy(1_000);
        policy.status = ProtocolStatus::Other("paused".into());
        policy.execution_enabled = false;
        assert_eq!(
            evaluate(&intent(1), &policy, &caller()),
            GateDecision::Skip(SkipReason::Paused)
        );
    }

    #[test]
    fn test_disabled_precedes_threshold() {
        let mut policy = live_policy(1_000);
        policy.execution_enabled = false;
        assert_eq!(
            evaluate(&intent(1), &policy, &caller()),
            GateDecision::Skip(SkipReason::Disabled)
        );
    }

    #[test]
    fn test_threshold_boundary() {
        let policy = live_policy(250);
        assert_eq!(evaluate(&intent(250), &policy, &caller()), GateDecision::Proceed);
        assert_eq!(
            evaluate(&intent(249), &policy, &caller()),
            GateDecision::Skip(SkipReason::BelowThreshold)
        );
    }

    #[test]
    fn test_negative_imbalance_is_compared_signed() {
        assert_eq!(
            evaluate(&intent(-500), &live_policy(100), &caller()),
            GateDecision::Skip(SkipReason::BelowThreshold)
        );
        assert_eq!(evaluate(&intent(-5), &live_policy(-10), &caller()), GateDecision::Proceed);
    }

    #[test]
    fn test_below_threshold_precedes_demo() {
        let mut policy = live_policy(100);
        policy.mode = ExecutionMode::Demo;
        assert_eq!(
            evaluate(&intent(10), &policy, &caller()),
            GateDecision::Skip(SkipReason::BelowThreshold)
        );
        assert_eq!(
            evaluate(&intent(100), &policy, &caller()),
            GateDecision::Skip(SkipReason::Demo)
        );
    }

    #[test]
    fn test_unknown_mode_proceeds() {
        let mut policy = live_policy(0);
        policy.mode = ExecutionMode::Unknown;
        assert_eq!(evaluate(&intent(1), &policy, &caller()), GateDecision::Proceed);
    }

    #[test]
    fn test_default_policy_is_paused() {
        let policy = PolicySnapshot::from_records(&PolicyRecords::new()).unwrap();
        assert_eq!(
            evaluate(&intent(10_000), &policy, &caller()),
            GateDecision::Skip(SkipReason::Paused)
        );

        // Unrelated records do not change that.
        let records: PolicyRecords = [(keys::MODE, "live"), (keys::EXECUTION, "enabled")]
            .into_iter()
            .collect();
        let policy = PolicySnapshot::from_records(&records).unwrap();
        assert_eq!(
            evaluate(&intent(10_000), &policy, &caller()),
            GateDecision::Skip(SkipReason::Paused)
        );
    }
}
