//! Credit rules. The model set is closed, so dispatch is a plain `match` on
//! one enum rather than a trait object registry.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use mta_core::config::AttributionConfig;
use mta_core::error::{AttributionError, AttributionResult};
use mta_core::types::{ModelKind, ModelParams};
use mta_journey::Journey;

/// Channel → fractional credit. Ordered so output is reproducible.
pub type CreditMap = BTreeMap<String, f64>;

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "model")]
pub enum AttributionModel {
    /// Equal share to every touchpoint.
    Linear,
    /// All credit to the chronologically first touchpoint.
    FirstTouch,
    /// All credit to the chronologically last touchpoint.
    LastTouch,
    /// Exponential decay by whole days before the conversion instant.
    TimeDecay { half_life_days: f64 },
    /// Fixed shares for first and last touch, remainder spread over the
    /// interior.
    PositionBased {
        first_touch_weight: f64,
        last_touch_weight: f64,
    },
}

impl AttributionModel {
    /// Build a model from its tag and optional parameters. Unset parameters
    /// take the configured defaults; invalid ones are rejected.
    pub fn from_config(
        kind: ModelKind,
        params: &ModelParams,
        defaults: &AttributionConfig,
    ) -> AttributionResult<Self> {
        match kind {
            ModelKind::Linear => Ok(AttributionModel::Linear),
            ModelKind::FirstTouch => Ok(AttributionModel::FirstTouch),
            ModelKind::LastTouch => Ok(AttributionModel::LastTouch),
            ModelKind::TimeDecay => {
                Self::time_decay(params.half_life_days.unwrap_or(defaults.default_half_life_days))
            }
            ModelKind::PositionBased => Self::position_based(
                params
                    .first_touch_weight
                    .unwrap_or(defaults.default_first_touch_weight),
                params
                    .last_touch_weight
                    .unwrap_or(defaults.default_last_touch_weight),
            ),
        }
    }

    pub fn time_decay(half_life_days: f64) -> AttributionResult<Self> {
        if !half_life_days.is_finite() || half_life_days <= 0.0 {
            return Err(AttributionError::InvalidConfig(format!(
                "half_life_days must be a positive number, got {half_life_days}"
            )));
        }
        Ok(AttributionModel::TimeDecay { half_life_days })
    }

    pub fn position_based(first_touch_weight: f64, last_touch_weight: f64) -> AttributionResult<Self> {
        for (name, weight) in [
            ("first_touch_weight", first_touch_weight),
            ("last_touch_weight", last_touch_weight),
        ] {
            if !(0.0..=1.0).contains(&weight) {
                return Err(AttributionError::InvalidConfig(format!(
                    "{name} must be within [0, 1], got {weight}"
                )));
            }
        }
        if first_touch_weight + last_touch_weight > 1.0 + f64::EPSILON {
            return Err(AttributionError::InvalidConfig(format!(
                "first_touch_weight + last_touch_weight must not exceed 1, got {}",
                first_touch_weight + last_touch_weight
            )));
        }
        Ok(AttributionModel::PositionBased {
            first_touch_weight,
            last_touch_weight,
        })
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            AttributionModel::Linear => ModelKind::Linear,
            AttributionModel::FirstTouch => ModelKind::FirstTouch,
            AttributionModel::LastTouch => ModelKind::LastTouch,
            AttributionModel::TimeDecay { .. } => ModelKind::TimeDecay,
            AttributionModel::PositionBased { .. } => ModelKind::PositionBased,
        }
    }

    /// Credit for one journey. Non-empty journeys sum to 1.0 (a two-touch
    /// position-based journey only does so when both end weights match); an
    /// empty journey yields an empty map.
    pub fn compute(&self, journey: &Journey) -> CreditMap {
        if journey.is_empty() {
            return CreditMap::new();
        }
        match *self {
            AttributionModel::Linear => linear(journey),
            AttributionModel::FirstTouch => single(&journey.touchpoints[0].channel),
            AttributionModel::LastTouch => single(&journey.touchpoints[journey.len() - 1].channel),
            AttributionModel::TimeDecay { half_life_days } => time_decay(journey, half_life_days),
            AttributionModel::PositionBased {
                first_touch_weight,
                last_touch_weight,
            } => position_based(journey, first_touch_weight, last_touch_weight),
        }
    }
}

fn credit(map: &mut CreditMap, channel: &str, amount: f64) {
    *map.entry(channel.to_string()).or_insert(0.0) += amount;
}

fn single(channel: &str) -> CreditMap {
    CreditMap::from([(channel.to_string(), 1.0)])
}

fn linear(journey: &Journey) -> CreditMap {
    let share = 1.0 / journey.len() as f64;
    let mut map = CreditMap::new();
    for tp in &journey.touchpoints {
        credit(&mut map, &tp.channel, share);
    }
    map
}

fn time_decay(journey: &Journey, half_life_days: f64) -> CreditMap {
    let Some(conversion_time) = journey.conversion_time() else {
        return CreditMap::new();
    };

    // Whole days, truncated toward zero: touches on the conversion day all
    // weigh 1.0 regardless of the hour.
    let weights: Vec<f64> = journey
        .touchpoints
        .iter()
        .map(|tp| {
            let days = (conversion_time - tp.timestamp).num_seconds() / SECONDS_PER_DAY;
            2f64.powf(-(days as f64) / half_life_days)
        })
        .collect();
    let total: f64 = weights.iter().sum();

    let mut map = CreditMap::new();
    for (tp, weight) in journey.touchpoints.iter().zip(&weights) {
        credit(&mut map, &tp.channel, weight / total);
    }
    map
}

fn position_based(journey: &Journey, first_weight: f64, last_weight: f64) -> CreditMap {
    let tps = &journey.touchpoints;
    let middle_weight = 1.0 - first_weight - last_weight;
    let mut map = CreditMap::new();

    match tps.len() {
        1 => credit(&mut map, &tps[0].channel, 1.0),
        2 => {
            // Two touches: each takes its own end weight plus half the
            // unassigned middle share.
            let each = first_weight + middle_weight / 2.0;
            credit(&mut map, &tps[0].channel, each);
            credit(&mut map, &tps[1].channel, each);
        }
        n => {
            credit(&mut map, &tps[0].channel, first_weight);
            credit(&mut map, &tps[n - 1].channel, last_weight);
            let interior = middle_weight / (n - 2) as f64;
            for tp in &tps[1..n - 1] {
                credit(&mut map, &tp.channel, interior);
            }
        }
    }
    map
}
