//! Configuration for the login risk engine

use crate::types::{RiskLevel, RiskScore};
use crate::{Error, Result};
use eval_algebra::{EvalConfig, RawMetadata};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Countries scored and flagged as high risk by default
pub const DEFAULT_HIGH_RISK_COUNTRIES: [&str; 10] =
    ["IR", "KP", "SY", "CU", "VE", "AF", "MM", "SD", "BY", "RU"];

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Scoring and decision policy
    pub policy: RiskPolicy,

    /// Rule evaluation limits
    pub limits: AlgebraLimits,

    /// ISO country codes treated as high risk
    pub high_risk_countries: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            policy: RiskPolicy::default(),
            limits: AlgebraLimits::default(),
            high_risk_countries: DEFAULT_HIGH_RISK_COUNTRIES
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }
}

/// Scoring weights and decision policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskPolicy {
    /// Category weights
    pub weights: RiskWeights,

    /// Thresholds and override flags
    pub decision: DecisionPolicy,
}

impl RiskPolicy {
    /// Reject negative or non-finite weights, bad thresholds and floors
    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        self.decision.validate()
    }
}

/// Non-negative category weights
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    /// Device anomaly
    pub device: f64,
    /// Geographic anomaly
    pub geo: f64,
    /// Network anomaly
    pub network: f64,
    /// Velocity anomaly
    pub velocity: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            device: 0.30,
            geo: 0.25,
            network: 0.25,
            velocity: 0.20,
        }
    }
}

impl RiskWeights {
    fn validate(&self) -> Result<()> {
        let named = [
            ("device", self.device),
            ("geo", self.geo),
            ("network", self.network),
            ("velocity", self.velocity),
        ];
        for (name, weight) in named {
            if !weight.is_finite() || weight < 0.0 {
                return Err(Error::InvalidPolicy(format!(
                    "weight {} must be a finite non-negative number, got {}",
                    name, weight
                )));
            }
        }
        Ok(())
    }

    /// Sum of all weights
    pub fn total(&self) -> f64 {
        self.device + self.geo + self.network + self.velocity
    }
}

/// Ascending score thresholds for each level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    /// Lowest medium score
    pub medium: u8,
    /// Lowest high score
    pub high: u8,
    /// Lowest critical score
    pub critical: u8,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            medium: 30,
            high: 60,
            critical: 85,
        }
    }
}

impl RiskThresholds {
    /// Level for a score
    pub fn level(&self, score: RiskScore) -> RiskLevel {
        match score.score() {
            s if s >= self.critical => RiskLevel::Critical,
            s if s >= self.high => RiskLevel::High,
            s if s >= self.medium => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.medium < self.high && self.high < self.critical && self.critical <= 100 {
            return Ok(());
        }
        Err(Error::InvalidPolicy(format!(
            "thresholds must ascend within 0..=100, got medium {} high {} critical {}",
            self.medium, self.high, self.critical
        )))
    }
}

/// Which rules a rule evaluation reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleEvaluationMode {
    /// Every triggered rule
    #[default]
    AllMatches,
    /// Only the highest-priority triggered rule
    FirstMatch,
}

impl FromStr for RuleEvaluationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all_matches" => Ok(Self::AllMatches),
            "first_match" => Ok(Self::FirstMatch),
            other => Err(Error::Config(format!("unknown rule mode: {}", other))),
        }
    }
}

/// Decision thresholds and override flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionPolicy {
    /// Level thresholds
    pub thresholds: RiskThresholds,

    /// Reputation strictly below this blocks
    pub reputation_floor: f64,

    /// Challenge when the level is high or above
    pub challenge_on_high_risk: bool,

    /// Block when the level is critical
    pub block_on_critical_risk: bool,

    /// Rule reporting mode
    pub rule_mode: RuleEvaluationMode,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            thresholds: RiskThresholds::default(),
            reputation_floor: 10.0,
            challenge_on_high_risk: true,
            block_on_critical_risk: true,
            rule_mode: RuleEvaluationMode::AllMatches,
        }
    }
}

impl DecisionPolicy {
    fn validate(&self) -> Result<()> {
        self.thresholds.validate()?;
        if !(0.0..=100.0).contains(&self.reputation_floor) {
            return Err(Error::InvalidPolicy(format!(
                "reputation floor must lie within 0..=100, got {}",
                self.reputation_floor
            )));
        }
        Ok(())
    }
}

/// Limits applied to rule catalog preparation and evaluation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlgebraLimits {
    /// Maximum rules in the catalog
    pub max_rules: Option<usize>,

    /// Attach metadata to evaluation failures
    pub debug: bool,

    /// Metadata attached in debug mode
    pub metadata: Option<RawMetadata>,
}

impl AlgebraLimits {
    /// Evaluation config for the algebra
    pub fn eval_config(&self) -> EvalConfig {
        EvalConfig {
            max_composition_size: self.max_rules,
            debug: self.debug,
            metadata: self.metadata.clone(),
        }
    }
}

impl EngineConfig {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = EngineConfig::default();
        let weights = &mut config.policy.weights;
        let decision = &mut config.policy.decision;

        if let Some(weight) = env_var("RISK_ENGINE_WEIGHT_DEVICE")? {
            weights.device = weight;
        }
        if let Some(weight) = env_var("RISK_ENGINE_WEIGHT_GEO")? {
            weights.geo = weight;
        }
        if let Some(weight) = env_var("RISK_ENGINE_WEIGHT_NETWORK")? {
            weights.network = weight;
        }
        if let Some(weight) = env_var("RISK_ENGINE_WEIGHT_VELOCITY")? {
            weights.velocity = weight;
        }
        if let Some(floor) = env_var("RISK_ENGINE_REPUTATION_FLOOR")? {
            decision.reputation_floor = floor;
        }
        if let Some(mode) = env_var("RISK_ENGINE_RULE_MODE")? {
            decision.rule_mode = mode;
        }
        if let Some(max_rules) = env_var("RISK_ENGINE_MAX_RULES")? {
            config.limits.max_rules = Some(max_rules);
        }
        if let Some(debug) = env_var("RISK_ENGINE_DEBUG")? {
            config.limits.debug = debug;
        }
        if let Ok(countries) = std::env::var("RISK_ENGINE_HIGH_RISK_COUNTRIES") {
            config.high_risk_countries = countries
                .split(',')
                .map(|c| c.trim().to_ascii_uppercase())
                .filter(|c| !c.is_empty())
                .collect();
        }

        Ok(config)
    }
}

fn env_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("{}: {}", name, e))),
        Err(_) => Ok(None),
    }
}
