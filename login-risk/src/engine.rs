//! Login risk assessment engine

use crate::config::{EngineConfig, RiskPolicy};
use crate::context::{ContextBuilderPlugin, PluginChain, RuleContext, ScoringContext};
use crate::decision;
use crate::rules::RuleCatalog;
use crate::scoring::RiskScorer;
use crate::signals;
use crate::types::{Assessment, DecisionAction, DeviceInfo, RiskAssessmentResult, RiskContext};
use crate::Result;
use eval_algebra::{isolate, HookResult};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Observer called once for every challenged or blocked login
pub type AuditHook = Box<dyn Fn(&RiskAssessmentResult, &RiskContext) -> HookResult + Send + Sync>;

/// Risk assessment engine
pub struct RiskEngine {
    config: EngineConfig,
    high_risk_countries: BTreeSet<String>,
    scorer: RiskScorer,
    catalog: RuleCatalog,
    plugins: PluginChain,
    audit_hook: Option<AuditHook>,
}

impl RiskEngine {
    /// Validate the policy and prepare the rule catalog
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.policy.validate()?;

        let high_risk_countries: BTreeSet<String> = config
            .high_risk_countries
            .iter()
            .map(|c| c.trim().to_ascii_uppercase())
            .collect();
        let scorer = RiskScorer::new(config.policy.weights, high_risk_countries.clone());
        let catalog = RuleCatalog::standard(config.policy.decision.rule_mode, &config.limits)?;

        info!(
            rules = catalog.len(),
            high_risk_countries = high_risk_countries.len(),
            "risk engine ready"
        );

        Ok(Self {
            config,
            high_risk_countries,
            scorer,
            catalog,
            plugins: PluginChain::new(),
            audit_hook: None,
        })
    }

    /// Register a context plugin; plugins apply in registration order
    pub fn with_plugin(mut self, plugin: impl ContextBuilderPlugin + 'static) -> Self {
        self.plugins.register(Box::new(plugin));
        self
    }

    /// Set the audit hook
    pub fn with_audit_hook<H>(mut self, hook: H) -> Self
    where
        H: Fn(&RiskAssessmentResult, &RiskContext) -> HookResult + Send + Sync + 'static,
    {
        self.audit_hook = Some(Box::new(hook));
        self
    }

    /// Active configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Assess one login attempt.
    ///
    /// Fails only when a blocking signal violation is found or the rule
    /// catalog cannot be evaluated.
    pub fn assess(
        &self,
        device: &DeviceInfo,
        context: &RiskContext,
    ) -> Result<RiskAssessmentResult> {
        let validated = signals::validate(context)?;
        let confidence = validated.confidence();

        let scoring = self.plugins.scoring(ScoringContext::new(device, &validated));
        let rule_context = self
            .plugins
            .rule(RuleContext::from_scoring(&scoring, &self.high_risk_countries));

        let (category_scores, risk_score) = self.scorer.score(&scoring);
        let triggered_rules = self.catalog.evaluate(&rule_context)?;

        let decision_policy = &self.config.policy.decision;
        let risk_level = decision_policy.thresholds.level(risk_score);
        let decision_hint = decision::resolve(
            risk_level,
            &triggered_rules,
            scoring.signals.reputation_score,
            decision_policy,
        );
        debug!(?risk_level, ?decision_hint, "decision resolved");

        let assessment = self.plugins.assessment(Assessment {
            device: scoring.device,
            ip: scoring.ip,
            geo: scoring.geo,
            signals: scoring.signals,
            category_scores,
            confidence,
            violations: validated.violations,
            extensions: merge(scoring.extensions, rule_context.extensions),
        });

        let result = RiskAssessmentResult {
            risk_score,
            risk_level,
            triggered_rules,
            decision_hint,
            assessment,
        };

        info!(
            device_id = %device.device_id,
            user_id = context.user_id.as_deref().unwrap_or("-"),
            score = result.risk_score.score(),
            action = ?result.decision_hint.action,
            triggered = ?result.triggered_ids(),
            "login risk assessed"
        );

        if result.decision_hint.action != DecisionAction::Allow {
            if let Some(hook) = &self.audit_hook {
                isolate("audit", || hook(&result, context));
            }
        }

        Ok(result)
    }
}

impl std::fmt::Debug for RiskEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskEngine")
            .field("config", &self.config)
            .field("plugins", &self.plugins)
            .field("audit_hook", &self.audit_hook.is_some())
            .finish_non_exhaustive()
    }
}

/// Rule-context extensions never override scoring-context ones
fn merge(mut scoring: Map<String, Value>, rule: Map<String, Value>) -> Map<String, Value> {
    for (key, value) in rule {
        scoring.entry(key).or_insert(value);
    }
    scoring
}

/// Assess with the default configuration and the given policy
pub fn assess_login_risk(
    device: &DeviceInfo,
    context: &RiskContext,
    policy: &RiskPolicy,
) -> Result<RiskAssessmentResult> {
    let config = EngineConfig {
        policy: policy.clone(),
        ..Default::default()
    };
    RiskEngine::new(config)?.assess(device, context)
}
