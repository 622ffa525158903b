//! Login rule catalog
//!
//! Atomic rules test one fact of the [`RuleContext`]; composite rules are
//! conjunctions of atomic conditions built with the predicate algebra.
//! The catalog is prepared once (validated, priority-sorted) and evaluated
//! per assessment through the rule fold.

use crate::config::{AlgebraLimits, RuleEvaluationMode};
use crate::context::RuleContext;
use crate::types::DeviceType;
use crate::Result;
use eval_algebra::{
    predicate, rule, AllMatches, EvalConfig, FirstMatch, HookResult, Hooks, Predicate, RawRule,
    Rule, RuleSetConfig,
};
use serde::Serialize;
use tracing::{debug, trace};

/// Reputation strictly below this triggers `LOW_REPUTATION`
pub const LOW_REPUTATION_BELOW: f64 = 30.0;

/// Velocity at or above this triggers `HIGH_VELOCITY`
pub const HIGH_VELOCITY_FROM: f64 = 80.0;

/// Effect a triggered rule has on the decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleImpact {
    /// Step-up authentication
    Challenge,
    /// Refuse the login
    Block,
}

/// A rule whose predicate held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TriggeredRule {
    /// Rule identifier, e.g. `TOR_NETWORK`
    pub id: &'static str,

    /// Decision impact, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact: Option<RuleImpact>,
}

type Condition = fn(&RuleContext) -> bool;

fn unknown_device(c: &RuleContext) -> bool {
    c.device_type == DeviceType::Unknown
}

fn iot_device(c: &RuleContext) -> bool {
    c.device_type == DeviceType::Iot
}

fn tor(c: &RuleContext) -> bool {
    c.is_tor
}

fn proxy(c: &RuleContext) -> bool {
    c.is_proxy
}

fn vpn(c: &RuleContext) -> bool {
    c.is_vpn
}

fn high_risk_country(c: &RuleContext) -> bool {
    c.high_risk_country
}

fn low_reputation(c: &RuleContext) -> bool {
    c.reputation_score.is_some_and(|r| r < LOW_REPUTATION_BELOW)
}

fn high_velocity(c: &RuleContext) -> bool {
    c.velocity_score.is_some_and(|v| v >= HIGH_VELOCITY_FROM)
}

fn geo_mismatch(c: &RuleContext) -> bool {
    c.geo_mismatch
}

const ATOMIC: [(&str, Condition, Option<RuleImpact>); 9] = [
    ("UNKNOWN_DEVICE", unknown_device, Some(RuleImpact::Challenge)),
    ("IOT_DEVICE", iot_device, None),
    ("TOR_NETWORK", tor, Some(RuleImpact::Block)),
    ("PROXY_NETWORK", proxy, Some(RuleImpact::Challenge)),
    ("VPN_NETWORK", vpn, None),
    ("HIGH_RISK_COUNTRY", high_risk_country, Some(RuleImpact::Challenge)),
    ("LOW_REPUTATION", low_reputation, Some(RuleImpact::Challenge)),
    ("HIGH_VELOCITY", high_velocity, Some(RuleImpact::Challenge)),
    ("GEO_MISMATCH", geo_mismatch, None),
];

const COMPOSITE: [(&str, &[Condition], Option<RuleImpact>); 4] = [
    ("IOT_TOR", &[iot_device, tor], Some(RuleImpact::Block)),
    ("VPN_HIGH_RISK_COUNTRY", &[vpn, high_risk_country], Some(RuleImpact::Block)),
    ("UNKNOWN_DEVICE_LOW_REPUTATION", &[unknown_device, low_reputation], Some(RuleImpact::Block)),
    ("GEO_MISMATCH_HIGH_VELOCITY", &[geo_mismatch, high_velocity], Some(RuleImpact::Challenge)),
];

fn priority(impact: Option<RuleImpact>) -> f64 {
    match impact {
        Some(RuleImpact::Block) => 100.0,
        Some(RuleImpact::Challenge) => 50.0,
        None => 10.0,
    }
}

/// Traces each rule step
struct StepTrace;

impl<S, O> Hooks<S, O> for StepTrace {
    fn before_step(&self, index: usize, _state: &S) -> HookResult {
        trace!(index, "evaluating rule");
        Ok(())
    }
}

/// Prepared rule catalog
#[derive(Debug, Clone)]
pub struct RuleCatalog {
    rules: Vec<Rule<Predicate<RuleContext>, TriggeredRule>>,
    mode: RuleEvaluationMode,
    config: EvalConfig,
}

impl RuleCatalog {
    /// Build and prepare the standard login catalog
    pub fn standard(mode: RuleEvaluationMode, limits: &AlgebraLimits) -> Result<Self> {
        let config = limits.eval_config();
        let mut raw = Vec::with_capacity(ATOMIC.len() + COMPOSITE.len());

        for (id, condition, impact) in ATOMIC {
            let rule = RawRule::new(Predicate::new(condition), TriggeredRule { id, impact });
            raw.push(rule.with_priority(priority(impact)));
        }
        for (id, conditions, impact) in COMPOSITE {
            let combined = predicate::and(conditions.iter().map(|c| Predicate::new(*c)), &config)?;
            let rule = RawRule::new(combined, TriggeredRule { id, impact });
            raw.push(rule.with_priority(priority(impact)));
        }

        Self::prepare(raw, mode, config)
    }

    /// Prepare a caller-supplied catalog
    pub fn prepare(
        rules: Vec<RawRule<Predicate<RuleContext>, TriggeredRule>>,
        mode: RuleEvaluationMode,
        config: EvalConfig,
    ) -> Result<Self> {
        let set = RuleSetConfig {
            max_composition_size: config.max_composition_size,
            ..Default::default()
        };
        let rules = rule::prepare(rules, &set, None)?;
        debug!(rules = rules.len(), ?mode, "rule catalog prepared");

        Ok(Self { rules, mode, config })
    }

    /// Number of prepared rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Catalog has no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rule identifiers in evaluation order
    pub fn ids(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.result().id).collect()
    }

    /// Triggered rules, highest priority first
    pub fn evaluate(&self, context: &RuleContext) -> Result<Vec<TriggeredRule>> {
        let (rules, config) = (&self.rules, &self.config);
        let triggered = match self.mode {
            RuleEvaluationMode::AllMatches => {
                rule::operate(&AllMatches, rules, context, &(), config, &StepTrace)?
            }
            RuleEvaluationMode::FirstMatch => {
                rule::operate(&FirstMatch, rules, context, &(), config, &StepTrace)?
                    .into_iter()
                    .collect()
            }
        };

        debug!(
            triggered = ?triggered.iter().map(|r| r.id).collect::<Vec<_>>(),
            "rules evaluated"
        );
        Ok(triggered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eval_algebra::RuleFailure;
    use serde_json::Map;

    fn clean() -> RuleContext {
        RuleContext {
            device_type: DeviceType::Desktop,
            is_tor: false,
            is_proxy: false,
            is_vpn: false,
            high_risk_country: false,
            geo_mismatch: false,
            reputation_score: None,
            velocity_score: None,
            extensions: Map::new(),
        }
    }

    fn catalog(mode: RuleEvaluationMode) -> RuleCatalog {
        RuleCatalog::standard(mode, &AlgebraLimits::default()).unwrap()
    }

    fn ids(triggered: &[TriggeredRule]) -> Vec<&'static str> {
        triggered.iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_catalog_is_priority_sorted() {
        let catalog = catalog(RuleEvaluationMode::AllMatches);
        assert_eq!(catalog.len(), 13);
        assert_eq!(
            catalog.ids(),
            vec![
                "TOR_NETWORK",
                "IOT_TOR",
                "VPN_HIGH_RISK_COUNTRY",
                "UNKNOWN_DEVICE_LOW_REPUTATION",
                "UNKNOWN_DEVICE",
                "PROXY_NETWORK",
                "HIGH_RISK_COUNTRY",
                "LOW_REPUTATION",
                "HIGH_VELOCITY",
                "GEO_MISMATCH_HIGH_VELOCITY",
                "IOT_DEVICE",
                "VPN_NETWORK",
                "GEO_MISMATCH",
            ]
        );
    }

    #[test]
    fn test_clean_context_triggers_nothing() {
        assert!(catalog(RuleEvaluationMode::AllMatches).evaluate(&clean()).unwrap().is_empty());
    }

    #[test]
    fn test_composites_need_every_condition() {
        let catalog = catalog(RuleEvaluationMode::AllMatches);
        let iot_tor = RuleContext {
            device_type: DeviceType::Iot,
            is_tor: true,
            ..clean()
        };
        assert_eq!(
            ids(&catalog.evaluate(&iot_tor).unwrap()),
            vec!["TOR_NETWORK", "IOT_TOR", "IOT_DEVICE"]
        );

        let vpn_only = RuleContext {
            is_vpn: true,
            ..clean()
        };
        let triggered = catalog.evaluate(&vpn_only).unwrap();
        assert_eq!(ids(&triggered), vec!["VPN_NETWORK"]);
        assert_eq!(triggered[0].impact, None);
    }

    #[test]
    fn test_thresholds_are_exclusive_and_inclusive() {
        let catalog = catalog(RuleEvaluationMode::AllMatches);
        let edge = RuleContext {
            reputation_score: Some(30.0),
            velocity_score: Some(80.0),
            ..clean()
        };
        assert_eq!(ids(&catalog.evaluate(&edge).unwrap()), vec!["HIGH_VELOCITY"]);
    }

    #[test]
    fn test_first_match_reports_highest_priority_only() {
        let catalog = catalog(RuleEvaluationMode::FirstMatch);
        let context = RuleContext {
            device_type: DeviceType::Unknown,
            is_proxy: true,
            reputation_score: Some(5.0),
            ..clean()
        };
        let triggered = catalog.evaluate(&context).unwrap();
        assert_eq!(ids(&triggered), vec!["UNKNOWN_DEVICE_LOW_REPUTATION"]);
        assert_eq!(triggered[0].impact, Some(RuleImpact::Block));
    }

    #[test]
    fn test_catalog_respects_rule_limit() {
        let limits = AlgebraLimits {
            max_rules: Some(5),
            ..Default::default()
        };
        let err = RuleCatalog::standard(RuleEvaluationMode::AllMatches, &limits).unwrap_err();
        assert!(matches!(err, crate::Error::Rules(RuleFailure::CompositionError(_))));
    }

    #[test]
    fn test_failing_rule_reports_index() {
        let raw = vec![
            RawRule::new(Predicate::new(tor), TriggeredRule { id: "TOR", impact: None }),
            RawRule::new(
                Predicate::new(|_: &RuleContext| Err::<bool, _>("feed unavailable")),
                TriggeredRule { id: "FEED", impact: None },
            ),
        ];
        let catalog =
            RuleCatalog::prepare(raw, RuleEvaluationMode::AllMatches, EvalConfig::default())
                .unwrap();
        match catalog.evaluate(&clean()).unwrap_err() {
            crate::Error::Rules(failure) => {
                assert_eq!(failure.tag(), "COMPOSITION_ERROR");
                assert_eq!(failure.diagnostic().unwrap().index, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
