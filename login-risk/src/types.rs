//! Core types for login risk assessment

use crate::rules::TriggeredRule;
use crate::scoring::CategoryScores;
use crate::signals::SignalViolation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Device class reported by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// Desktop browser
    Desktop,
    /// Phone
    Mobile,
    /// Tablet
    Tablet,
    /// Embedded or IoT device
    Iot,
    /// Could not be classified
    Unknown,
}

/// Device performing the login
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Stable device identifier
    pub device_id: String,

    /// Device class
    pub device_type: DeviceType,

    /// Operating system
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,

    /// Browser
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,

    /// Raw user agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl DeviceInfo {
    /// Device with only an id and a type
    pub fn new(device_id: impl Into<String>, device_type: DeviceType) -> Self {
        Self {
            device_id: device_id.into(),
            device_type,
            os: None,
            browser: None,
            user_agent: None,
        }
    }

    /// Set the user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

/// Geographic location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoInfo {
    /// ISO 3166-1 alpha-2 country code
    pub country: String,

    /// Region or state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// City
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    /// Latitude in degrees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,

    /// Longitude in degrees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
}

impl GeoInfo {
    /// Location known only by country
    pub fn country(country: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            region: None,
            city: None,
            lat: None,
            lng: None,
        }
    }

    /// Set coordinates
    pub fn at(mut self, lat: f64, lng: f64) -> Self {
        self.lat = Some(lat);
        self.lng = Some(lng);
        self
    }

    /// Both coordinates, when present
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.lat.zip(self.lng)
    }
}

/// Pre-computed network, device and velocity indicators
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskSignals {
    /// Connection through a VPN
    #[serde(default)]
    pub is_vpn: bool,

    /// Connection through Tor
    #[serde(default)]
    pub is_tor: bool,

    /// Connection through a proxy
    #[serde(default)]
    pub is_proxy: bool,

    /// IP reputation, 0 (worst) to 100 (best)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reputation_score: Option<f64>,

    /// Login velocity, 0 (normal) to 100 (extreme)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity_score: Option<f64>,

    /// Location of the previous session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_geo: Option<GeoInfo>,

    /// Opaque vendor signals
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub external_signals: Map<String, Value>,
}

/// Request metadata for one login attempt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskContext {
    /// Client IP address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    /// Client location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo: Option<GeoInfo>,

    /// Risk indicators
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signals: Option<RiskSignals>,

    /// Authenticating user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Previous session identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_session_id: Option<String>,

    /// When the attempt happened
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Risk score (0-100)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskScore(u8);

impl RiskScore {
    /// Create new risk score (0-100)
    pub fn new(score: u8) -> Self {
        Self(score.min(100))
    }

    /// Round and clamp a weighted score; NaN maps to 0
    pub fn from_weighted(score: f64) -> Self {
        if score.is_nan() {
            return Self(0);
        }
        Self(score.round().clamp(0.0, 100.0) as u8)
    }

    /// Get raw score
    pub fn score(&self) -> u8 {
        self.0
    }
}

/// Risk level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Low risk
    Low,
    /// Medium risk
    Medium,
    /// High risk
    High,
    /// Critical risk
    Critical,
}

/// Recommended action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionAction {
    /// Let the login through
    Allow,
    /// Require step-up authentication
    Challenge,
    /// Refuse the login
    Block,
}

/// Why a login was blocked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    /// A block-impact rule triggered
    RuleBlock,
    /// Reputation below the hard floor
    CriticalReputation,
    /// Score reached the critical threshold
    CriticalRisk,
}

/// Action plus an optional block reason
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionHint {
    /// Recommended action
    pub action: DecisionAction,

    /// Set only when `action` is block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_reason: Option<BlockReason>,
}

impl DecisionHint {
    /// Allow
    pub fn allow() -> Self {
        Self {
            action: DecisionAction::Allow,
            block_reason: None,
        }
    }

    /// Challenge
    pub fn challenge() -> Self {
        Self {
            action: DecisionAction::Challenge,
            block_reason: None,
        }
    }

    /// Block with a reason
    pub fn block(reason: BlockReason) -> Self {
        Self {
            action: DecisionAction::Block,
            block_reason: Some(reason),
        }
    }
}

/// Normalized input that produced an assessment
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    /// Device as supplied
    pub device: DeviceInfo,

    /// IP after validation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    /// Location after validation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo: Option<GeoInfo>,

    /// Signals after validation
    pub signals: RiskSignals,

    /// Per-category scores
    pub category_scores: CategoryScores,

    /// 1.0 minus 0.2 per degraded signal, floored at 0
    pub confidence: f64,

    /// Non-blocking violations found during validation
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<SignalViolation>,

    /// Values contributed by context plugins
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub extensions: Map<String, Value>,
}

/// Outcome of one login risk assessment
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessmentResult {
    /// Weighted score
    pub risk_score: RiskScore,

    /// Level derived from the score
    pub risk_level: RiskLevel,

    /// Rules whose predicate held, highest priority first. Serialized as
    /// the list of rule ids.
    #[serde(serialize_with = "rule_ids")]
    pub triggered_rules: Vec<TriggeredRule>,

    /// Resolved action
    pub decision_hint: DecisionHint,

    /// Normalized input snapshot
    pub assessment: Assessment,
}

fn rule_ids<S: Serializer>(rules: &[TriggeredRule], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(rules.iter().map(|rule| rule.id))
}

impl RiskAssessmentResult {
    /// Identifiers of the triggered rules, in order
    pub fn triggered_ids(&self) -> Vec<&'static str> {
        self.triggered_rules.iter().map(|rule| rule.id).collect()
    }
}
