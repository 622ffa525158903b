//! Decision resolution

use crate::config::DecisionPolicy;
use crate::rules::{RuleImpact, TriggeredRule};
use crate::types::{BlockReason, DecisionHint, RiskLevel};

/// Resolve the final action.
///
/// Precedence, first match wins:
/// 1. a block-impact rule triggered
/// 2. reputation below the hard floor
/// 3. critical level, when blocking on critical risk
/// 4. a challenge-impact rule, or high level when challenging on high risk
/// 5. allow
pub fn resolve(
    level: RiskLevel,
    triggered: &[TriggeredRule],
    reputation: Option<f64>,
    policy: &DecisionPolicy,
) -> DecisionHint {
    let has_impact = |impact: RuleImpact| triggered.iter().any(|rule| rule.impact == Some(impact));

    if has_impact(RuleImpact::Block) {
        return DecisionHint::block(BlockReason::RuleBlock);
    }
    if reputation.is_some_and(|r| r < policy.reputation_floor) {
        return DecisionHint::block(BlockReason::CriticalReputation);
    }
    if policy.block_on_critical_risk && level == RiskLevel::Critical {
        return DecisionHint::block(BlockReason::CriticalRisk);
    }
    let high_risk = policy.challenge_on_high_risk && level >= RiskLevel::High;
    if has_impact(RuleImpact::Challenge) || high_risk {
        return DecisionHint::challenge();
    }
    DecisionHint::allow()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DecisionAction;

    const TOR: TriggeredRule = TriggeredRule {
        id: "TOR_NETWORK",
        impact: Some(RuleImpact::Block),
    };
    const PROXY: TriggeredRule = TriggeredRule {
        id: "PROXY_NETWORK",
        impact: Some(RuleImpact::Challenge),
    };
    const VPN: TriggeredRule = TriggeredRule {
        id: "VPN_NETWORK",
        impact: None,
    };

    #[test]
    fn test_rule_block_wins() {
        let hint = resolve(RiskLevel::Low, &[PROXY, TOR], Some(5.0), &DecisionPolicy::default());
        assert_eq!(hint, DecisionHint::block(BlockReason::RuleBlock));
    }

    #[test]
    fn test_reputation_floor() {
        let policy = DecisionPolicy::default();
        assert_eq!(
            resolve(RiskLevel::Low, &[], Some(9.5), &policy),
            DecisionHint::block(BlockReason::CriticalReputation)
        );
        assert_eq!(resolve(RiskLevel::Low, &[], Some(10.0), &policy), DecisionHint::allow());
    }

    #[test]
    fn test_level_overrides_follow_flags() {
        let policy = DecisionPolicy::default();
        assert_eq!(
            resolve(RiskLevel::Critical, &[], None, &policy),
            DecisionHint::block(BlockReason::CriticalRisk)
        );
        assert_eq!(resolve(RiskLevel::High, &[], None, &policy).action, DecisionAction::Challenge);

        let lenient = DecisionPolicy {
            block_on_critical_risk: false,
            challenge_on_high_risk: false,
            ..Default::default()
        };
        assert_eq!(resolve(RiskLevel::Critical, &[], None, &lenient), DecisionHint::allow());

        let challenge_only = DecisionPolicy {
            block_on_critical_risk: false,
            ..Default::default()
        };
        assert_eq!(
            resolve(RiskLevel::Critical, &[], None, &challenge_only),
            DecisionHint::challenge()
        );
    }

    #[test]
    fn test_challenge_rule_and_informational_rule() {
        let policy = DecisionPolicy::default();
        assert_eq!(
            resolve(RiskLevel::Low, &[VPN, PROXY], None, &policy),
            DecisionHint::challenge()
        );
        assert_eq!(resolve(RiskLevel::Medium, &[VPN], None, &policy), DecisionHint::allow());
    }
}
