//! Risk scoring engine

use crate::config::RiskWeights;
use crate::context::ScoringContext;
use crate::types::{DeviceType, GeoInfo, RiskScore};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

const EARTH_RADIUS_KM: f64 = 6371.0;
const DISTANCE_ANOMALY_KM: f64 = 500.0;

/// Per-category anomaly scores, each within [0, 100]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CategoryScores {
    /// Device anomaly
    pub device: f64,
    /// Geographic anomaly
    pub geo: f64,
    /// Network anomaly
    pub network: f64,
    /// Velocity anomaly
    pub velocity: f64,
}

/// Risk scorer
#[derive(Debug, Clone)]
pub struct RiskScorer {
    weights: RiskWeights,
    high_risk_countries: BTreeSet<String>,
}

impl RiskScorer {
    /// Create new risk scorer
    pub fn new(weights: RiskWeights, high_risk_countries: BTreeSet<String>) -> Self {
        Self {
            weights,
            high_risk_countries,
        }
    }

    /// Score every category and combine them
    pub fn score(&self, context: &ScoringContext) -> (CategoryScores, RiskScore) {
        let categories = CategoryScores {
            device: self.device_risk(context),
            geo: self.geo_risk(context),
            network: self.network_risk(context),
            velocity: self.velocity_risk(context),
        };
        let score = self.combine(&categories);

        debug!(
            device = categories.device,
            geo = categories.geo,
            network = categories.network,
            velocity = categories.velocity,
            score = score.score(),
            "risk categories scored"
        );
        (categories, score)
    }

    /// Weighted mean of the category scores, rounded and clamped
    pub fn combine(&self, categories: &CategoryScores) -> RiskScore {
        let w = &self.weights;
        let total = w.total();
        if total <= 0.0 {
            return RiskScore::new(0);
        }

        let weighted = categories.device * w.device
            + categories.geo * w.geo
            + categories.network * w.network
            + categories.velocity * w.velocity;
        RiskScore::from_weighted(weighted / total)
    }

    fn device_risk(&self, context: &ScoringContext) -> f64 {
        let device = &context.device;
        let base = match device.device_type {
            DeviceType::Desktop | DeviceType::Mobile | DeviceType::Tablet => 0.0,
            DeviceType::Iot => 30.0,
            DeviceType::Unknown => 40.0,
        };
        let missing_agent =
            device.device_type != DeviceType::Unknown && device.user_agent.is_none();

        bounded(base + if missing_agent { 10.0 } else { 0.0 })
    }

    fn geo_risk(&self, context: &ScoringContext) -> f64 {
        let Some(geo) = &context.geo else {
            return 0.0;
        };
        let mut score = 0.0;

        if self.high_risk_countries.contains(&geo.country) {
            score += 60.0;
        }
        if let Some(previous) = &context.signals.previous_geo {
            if previous.country != geo.country {
                score += 40.0;
            } else if distance_km(geo, previous).is_some_and(|km| km > DISTANCE_ANOMALY_KM) {
                score += 20.0;
            }
        }

        bounded(score)
    }

    fn network_risk(&self, context: &ScoringContext) -> f64 {
        let signals = &context.signals;
        let mut score = 0.0;

        if signals.is_tor {
            score += 70.0;
        }
        if signals.is_proxy {
            score += 40.0;
        }
        if signals.is_vpn {
            score += 30.0;
        }
        if let Some(reputation) = signals.reputation_score {
            score += 0.3 * (100.0 - reputation);
        }
        if context.ip.is_none() {
            score += 10.0;
        }

        bounded(score)
    }

    fn velocity_risk(&self, context: &ScoringContext) -> f64 {
        bounded(context.signals.velocity_score.unwrap_or(0.0))
    }
}

impl Default for RiskScorer {
    fn default() -> Self {
        Self::new(RiskWeights::default(), BTreeSet::new())
    }
}

fn bounded(score: f64) -> f64 {
    score.clamp(0.0, 100.0)
}

/// Great-circle distance between two located points
fn distance_km(a: &GeoInfo, b: &GeoInfo) -> Option<f64> {
    let (lat1, lng1) = a.coordinates()?;
    let (lat2, lng2) = b.coordinates()?;

    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);

    Some(2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeviceInfo, RiskSignals};
    use serde_json::Map;

    fn context(device_type: DeviceType) -> ScoringContext {
        ScoringContext {
            device: DeviceInfo::new("d-1", device_type).with_user_agent("Mozilla/5.0"),
            ip: Some("198.51.100.4".to_string()),
            geo: None,
            signals: RiskSignals::default(),
            extensions: Map::new(),
        }
    }

    fn scorer() -> RiskScorer {
        RiskScorer::new(RiskWeights::default(), ["KP".to_string()].into_iter().collect())
    }

    #[test]
    fn test_device_scores() {
        let scorer = scorer();
        assert_eq!(scorer.score(&context(DeviceType::Desktop)).0.device, 0.0);
        assert_eq!(scorer.score(&context(DeviceType::Iot)).0.device, 30.0);
        assert_eq!(scorer.score(&context(DeviceType::Unknown)).0.device, 40.0);

        let mut bare = context(DeviceType::Mobile);
        bare.device.user_agent = None;
        assert_eq!(scorer.score(&bare).0.device, 10.0);

        let mut unknown_bare = context(DeviceType::Unknown);
        unknown_bare.device.user_agent = None;
        assert_eq!(scorer.score(&unknown_bare).0.device, 40.0);
    }

    #[test]
    fn test_geo_scores() {
        let scorer = scorer();
        let mut ctx = context(DeviceType::Desktop);
        ctx.geo = Some(GeoInfo::country("KP"));
        assert_eq!(scorer.score(&ctx).0.geo, 60.0);

        ctx.signals.previous_geo = Some(GeoInfo::country("DE"));
        assert_eq!(scorer.score(&ctx).0.geo, 100.0);

        // Berlin to Hamburg
        ctx.geo = Some(GeoInfo::country("DE").at(52.52, 13.40));
        ctx.signals.previous_geo = Some(GeoInfo::country("DE").at(53.55, 9.99));
        assert_eq!(scorer.score(&ctx).0.geo, 0.0);

        // Berlin to Lisbon, different country
        ctx.signals.previous_geo = Some(GeoInfo::country("PT").at(38.72, -9.14));
        assert_eq!(scorer.score(&ctx).0.geo, 40.0);

        // Same country, far apart
        ctx.geo = Some(GeoInfo::country("US").at(40.71, -74.01));
        ctx.signals.previous_geo = Some(GeoInfo::country("US").at(34.05, -118.24));
        assert_eq!(scorer.score(&ctx).0.geo, 20.0);
    }

    #[test]
    fn test_network_scores() {
        let scorer = scorer();
        let mut ctx = context(DeviceType::Desktop);
        assert_eq!(scorer.score(&ctx).0.network, 0.0);

        ctx.signals.is_tor = true;
        ctx.signals.reputation_score = Some(50.0);
        assert_eq!(scorer.score(&ctx).0.network, 85.0);

        ctx.signals.is_proxy = true;
        assert_eq!(scorer.score(&ctx).0.network, 100.0);

        ctx = context(DeviceType::Desktop);
        ctx.ip = None;
        assert_eq!(scorer.score(&ctx).0.network, 10.0);
    }

    #[test]
    fn test_combine_isolates_single_weight() {
        let only_device = RiskWeights {
            device: 1.0,
            geo: 0.0,
            network: 0.0,
            velocity: 0.0,
        };
        let scorer = RiskScorer::new(only_device, BTreeSet::new());
        let mut ctx = context(DeviceType::Unknown);
        ctx.signals.is_tor = true;
        ctx.signals.velocity_score = Some(99.0);
        assert_eq!(scorer.score(&ctx).1.score(), 40);
    }

    #[test]
    fn test_zero_weights_score_zero() {
        let none = RiskWeights {
            device: 0.0,
            geo: 0.0,
            network: 0.0,
            velocity: 0.0,
        };
        let scorer = RiskScorer::new(none, BTreeSet::new());
        assert_eq!(scorer.score(&context(DeviceType::Unknown)).1.score(), 0);
    }

    #[test]
    fn test_haversine_distance() {
        let berlin = GeoInfo::country("DE").at(52.52, 13.40);
        let paris = GeoInfo::country("FR").at(48.86, 2.35);
        let km = distance_km(&berlin, &paris).unwrap();
        assert!((km - 878.0).abs() < 10.0, "got {km}");
        assert_eq!(distance_km(&berlin, &GeoInfo::country("FR")), None);
    }
}
