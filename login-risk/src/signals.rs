//! Signal validation pre-pass
//!
//! Every signal with a declared range is checked before scoring. Each
//! violation carries a severity:
//!
//! - `block`: the signal is discarded and the assessment is refused
//! - `degrade`: the signal is discarded and confidence drops
//! - `ignore`: the signal is kept; the violation is informational

use crate::types::{GeoInfo, RiskContext, RiskSignals};
use crate::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::net::IpAddr;
use tracing::warn;

/// Maximum number of vendor signal entries before a violation is reported
pub const MAX_EXTERNAL_SIGNALS: usize = 64;

const CONFIDENCE_PENALTY: f64 = 0.2;

/// How a violation affects the assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Refuse the assessment
    Block,
    /// Drop the signal, reduce confidence
    Degrade,
    /// Keep the signal
    Ignore,
}

/// Violation code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalCode {
    /// `reputationScore` outside [0, 100]
    InvalidReputationScore,
    /// `velocityScore` outside [0, 100]
    InvalidVelocityScore,
    /// Current coordinates unusable
    InvalidCoordinates,
    /// Previous-session coordinates unusable
    InvalidPreviousCoordinates,
    /// IP address does not parse
    InvalidIp,
    /// Country is not a two-letter code
    InvalidCountryCode,
    /// Too many vendor signal entries
    ExcessiveExternalSignals,
}

impl SignalCode {
    /// Stable code string
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalCode::InvalidReputationScore => "INVALID_REPUTATION_SCORE",
            SignalCode::InvalidVelocityScore => "INVALID_VELOCITY_SCORE",
            SignalCode::InvalidCoordinates => "INVALID_COORDINATES",
            SignalCode::InvalidPreviousCoordinates => "INVALID_PREVIOUS_COORDINATES",
            SignalCode::InvalidIp => "INVALID_IP",
            SignalCode::InvalidCountryCode => "INVALID_COUNTRY_CODE",
            SignalCode::ExcessiveExternalSignals => "EXCESSIVE_EXTERNAL_SIGNALS",
        }
    }
}

impl fmt::Display for SignalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One violated signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignalViolation {
    /// What was violated
    pub code: SignalCode,
    /// Machine-readable reason, e.g. `out_of_range`
    pub reason: &'static str,
    /// Effect on the assessment
    pub severity: Severity,
}

impl SignalViolation {
    /// Create a violation
    pub fn new(code: SignalCode, reason: &'static str, severity: Severity) -> Self {
        Self { code, reason, severity }
    }
}

impl fmt::Display for SignalViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.code, self.reason)
    }
}

/// Input that survived validation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedSignals {
    /// Parsed IP, if valid
    pub ip: Option<String>,
    /// Location with invalid parts removed
    pub geo: Option<GeoInfo>,
    /// Signals with invalid values removed
    pub signals: RiskSignals,
    /// Non-blocking violations
    pub violations: Vec<SignalViolation>,
}

impl ValidatedSignals {
    /// 1.0 minus 0.2 per degraded signal, floored at 0
    pub fn confidence(&self) -> f64 {
        let degraded = self
            .violations
            .iter()
            .filter(|v| v.severity == Severity::Degrade)
            .count();
        (1.0 - CONFIDENCE_PENALTY * degraded as f64).max(0.0)
    }
}

/// Validate every ranged signal in a context.
///
/// Fails with [`Error::InvalidSignals`] when any violation blocks. The error
/// lists every violation found, blocking ones first.
pub fn validate(context: &RiskContext) -> Result<ValidatedSignals> {
    let mut violations = Vec::new();
    let mut signals = context.signals.clone().unwrap_or_default();

    signals.reputation_score = checked_score(
        signals.reputation_score,
        SignalCode::InvalidReputationScore,
        Severity::Block,
        &mut violations,
    );
    signals.velocity_score = checked_score(
        signals.velocity_score,
        SignalCode::InvalidVelocityScore,
        Severity::Degrade,
        &mut violations,
    );
    signals.previous_geo = signals
        .previous_geo
        .take()
        .and_then(|geo| checked_geo(geo, SignalCode::InvalidPreviousCoordinates, &mut violations));

    if signals.external_signals.len() > MAX_EXTERNAL_SIGNALS {
        violations.push(SignalViolation::new(
            SignalCode::ExcessiveExternalSignals,
            "too_many_entries",
            Severity::Ignore,
        ));
    }

    let ip = context.ip.as_deref().and_then(|raw| match raw.trim().parse::<IpAddr>() {
        Ok(addr) => Some(addr.to_string()),
        Err(_) => {
            let violation =
                SignalViolation::new(SignalCode::InvalidIp, "malformed", Severity::Degrade);
            violations.push(violation);
            None
        }
    });
    let geo = context
        .geo
        .clone()
        .and_then(|geo| checked_geo(geo, SignalCode::InvalidCoordinates, &mut violations));

    if violations.iter().any(|v| v.severity == Severity::Block) {
        violations.sort_by_key(|v| v.severity != Severity::Block);
        let err = Error::InvalidSignals {
            domain: "risk",
            violations,
        };
        warn!(error = %err, "refusing assessment");
        return Err(err);
    }

    for violation in violations.iter().filter(|v| v.severity == Severity::Degrade) {
        warn!(code = %violation.code, reason = violation.reason, "signal discarded");
    }

    Ok(ValidatedSignals {
        ip,
        geo,
        signals,
        violations,
    })
}

fn checked_score(
    value: Option<f64>,
    code: SignalCode,
    severity: Severity,
    violations: &mut Vec<SignalViolation>,
) -> Option<f64> {
    let score = value?;
    let reason = if !score.is_finite() {
        "not_finite"
    } else if !(0.0..=100.0).contains(&score) {
        "out_of_range"
    } else {
        return Some(score);
    };
    violations.push(SignalViolation::new(code, reason, severity));
    None
}

/// Normalize the country code and coordinates; a malformed country drops
/// the whole location
fn checked_geo(
    mut geo: GeoInfo,
    code: SignalCode,
    violations: &mut Vec<SignalViolation>,
) -> Option<GeoInfo> {
    let country = geo.country.trim().to_ascii_uppercase();
    if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
        violations.push(SignalViolation::new(
            SignalCode::InvalidCountryCode,
            "malformed",
            Severity::Degrade,
        ));
        return None;
    }
    geo.country = country;

    let reason = match (geo.lat, geo.lng) {
        (None, None) => None,
        (Some(_), None) | (None, Some(_)) => Some("incomplete_pair"),
        (Some(lat), Some(lng)) => {
            if !(-90.0..=90.0).contains(&lat) {
                Some("lat_out_of_range")
            } else if !(-180.0..=180.0).contains(&lng) {
                Some("lng_out_of_range")
            } else {
                None
            }
        }
    };
    if let Some(reason) = reason {
        violations.push(SignalViolation::new(code, reason, Severity::Degrade));
        geo.lat = None;
        geo.lng = None;
    }
    Some(geo)
}
