//! Scoring and rule contexts, and the plugin chain that extends them

use crate::signals::ValidatedSignals;
use crate::types::{Assessment, DeviceInfo, DeviceType, GeoInfo, RiskSignals};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use tracing::debug;

/// Normalized input for category scoring
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringContext {
    /// Device as supplied
    pub device: DeviceInfo,
    /// Validated IP
    pub ip: Option<String>,
    /// Validated location
    pub geo: Option<GeoInfo>,
    /// Validated signals
    pub signals: RiskSignals,
    /// Plugin values
    pub extensions: Map<String, Value>,
}

impl ScoringContext {
    /// Build from a device and validated signals
    pub fn new(device: &DeviceInfo, validated: &ValidatedSignals) -> Self {
        Self {
            device: device.clone(),
            ip: validated.ip.clone(),
            geo: validated.geo.clone(),
            signals: validated.signals.clone(),
            extensions: Map::new(),
        }
    }
}

/// Flattened facts the rule catalog is evaluated against
#[derive(Debug, Clone, PartialEq)]
pub struct RuleContext {
    /// Device class
    pub device_type: DeviceType,
    /// Tor connection
    pub is_tor: bool,
    /// Proxy connection
    pub is_proxy: bool,
    /// VPN connection
    pub is_vpn: bool,
    /// Current country is on the high-risk list
    pub high_risk_country: bool,
    /// Current and previous country differ
    pub geo_mismatch: bool,
    /// IP reputation
    pub reputation_score: Option<f64>,
    /// Login velocity
    pub velocity_score: Option<f64>,
    /// Plugin values
    pub extensions: Map<String, Value>,
}

impl RuleContext {
    /// Derive rule facts from a scoring context
    pub fn from_scoring(context: &ScoringContext, high_risk_countries: &BTreeSet<String>) -> Self {
        let country = context.geo.as_ref().map(|geo| geo.country.as_str());
        let previous = context.signals.previous_geo.as_ref().map(|geo| geo.country.as_str());

        Self {
            device_type: context.device.device_type,
            is_tor: context.signals.is_tor,
            is_proxy: context.signals.is_proxy,
            is_vpn: context.signals.is_vpn,
            high_risk_country: country.is_some_and(|c| high_risk_countries.contains(c)),
            geo_mismatch: matches!((country, previous), (Some(now), Some(before)) if now != before),
            reputation_score: context.signals.reputation_score,
            velocity_score: context.signals.velocity_score,
            extensions: Map::new(),
        }
    }
}

/// Pure transforms over the engine's contexts.
///
/// Each method receives the previous plugin's output and returns a new
/// value; the defaults return the input unchanged.
pub trait ContextBuilderPlugin: Send + Sync {
    /// Plugin identifier
    fn id(&self) -> &str;

    /// Extend the scoring context
    fn extend_scoring_context(&self, context: &ScoringContext) -> ScoringContext {
        context.clone()
    }

    /// Extend the rule context
    fn extend_rule_context(&self, context: &RuleContext) -> RuleContext {
        context.clone()
    }

    /// Extend the final assessment snapshot
    fn extend_assessment_context(&self, assessment: &Assessment) -> Assessment {
        assessment.clone()
    }
}

/// Plugins applied in registration order
#[derive(Default)]
pub struct PluginChain {
    plugins: Vec<Box<dyn ContextBuilderPlugin>>,
}

impl PluginChain {
    /// Empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a plugin
    pub fn register(&mut self, plugin: Box<dyn ContextBuilderPlugin>) {
        debug!(plugin = plugin.id(), position = self.plugins.len(), "registered context plugin");
        self.plugins.push(plugin);
    }

    /// Number of plugins
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// No plugins registered
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Fold the scoring context through every plugin
    pub fn scoring(&self, context: ScoringContext) -> ScoringContext {
        self.plugins.iter().fold(context, |acc, plugin| {
            debug!(plugin = plugin.id(), "extending scoring context");
            plugin.extend_scoring_context(&acc)
        })
    }

    /// Fold the rule context through every plugin
    pub fn rule(&self, context: RuleContext) -> RuleContext {
        self.plugins.iter().fold(context, |acc, plugin| {
            debug!(plugin = plugin.id(), "extending rule context");
            plugin.extend_rule_context(&acc)
        })
    }

    /// Fold the assessment snapshot through every plugin
    pub fn assessment(&self, assessment: Assessment) -> Assessment {
        self.plugins.iter().fold(assessment, |acc, plugin| {
            debug!(plugin = plugin.id(), "extending assessment");
            plugin.extend_assessment_context(&acc)
        })
    }
}

impl std::fmt::Debug for PluginChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.plugins.iter().map(|p| p.id())).finish()
    }
}
