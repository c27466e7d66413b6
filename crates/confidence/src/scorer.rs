//! Blends data quality, sample size, model fit and identity-resolution
//! reliability into one bounded score. Also scores each channel's share of
//! the result.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::debug;

use mta_core::config::ConfidenceConfig;
use mta_core::quality::DataQuality;
use mta_core::table::{Column, EventTable};
use mta_core::types::{LinkingMethod, ModelKind};
use mta_journey::Journey;

const MODEL_FIT_BONUS: f64 = 0.10;
const LONG_JOURNEY_BONUS: f64 = 0.05;
const MULTI_TOUCH_MIN_LENGTH: f64 = 3.0;
const SINGLE_TOUCH_MAX_LENGTH: f64 = 2.0;
const LONG_JOURNEY_LENGTH: f64 = 5.0;
const DECAY_MIN_SPAN_DAYS: f64 = 7.0;

/// Labeled components of the overall score. All values are in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    pub data_quality: f64,
    pub sample_size: f64,
    pub model_fit: f64,
    pub identity_resolution: f64,
    pub overall: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ConfidenceScorer {
    config: ConfidenceConfig,
}

impl ConfidenceScorer {
    pub fn new(config: ConfidenceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConfidenceConfig {
        &self.config
    }

    /// `log10(n) / saturation`, clamped; saturates around 1000 rows by
    /// default.
    pub fn sample_size_score(&self, sample_size: usize) -> f64 {
        if sample_size == 0 {
            return 0.0;
        }
        ((sample_size as f64).log10() / self.config.sample_size_saturation_log10).clamp(0.0, 1.0)
    }

    pub fn overall(
        &self,
        quality: &DataQuality,
        sample_size: usize,
        model_fit: f64,
        identity_confidence: f64,
    ) -> f64 {
        self.breakdown(quality, sample_size, model_fit, identity_confidence)
            .overall
    }

    pub fn breakdown(
        &self,
        quality: &DataQuality,
        sample_size: usize,
        model_fit: f64,
        identity_confidence: f64,
    ) -> ConfidenceBreakdown {
        let c = &self.config;
        let data_quality = quality.combined();
        let sample_size = self.sample_size_score(sample_size);
        let model_fit = model_fit.clamp(0.0, 1.0);
        let identity_resolution = identity_confidence.clamp(0.0, 1.0);

        let overall = (data_quality * c.quality_weight
            + sample_size * c.sample_size_weight
            + model_fit * c.model_fit_weight
            + identity_resolution * c.identity_weight)
            .clamp(0.0, 1.0);

        ConfidenceBreakdown {
            data_quality,
            sample_size,
            model_fit,
            identity_resolution,
            overall,
        }
    }

    /// How well the chosen model's assumptions match the journeys.
    ///
    /// Multi-touch rules earn a bonus when journeys average three or more
    /// touches; single-touch rules when they average two or fewer. Time decay
    /// also earns one when journeys span a week or more on average.
    pub fn model_fit(&self, kind: ModelKind, journeys: &[Journey]) -> f64 {
        if journeys.is_empty() {
            return 0.0;
        }
        let count = journeys.len() as f64;
        let avg_length = journeys.iter().map(|j| j.len() as f64).sum::<f64>() / count;
        let avg_span_days = journeys
            .iter()
            .map(|j| span_days(j.span()))
            .sum::<f64>()
            / count;

        let multi_touch = avg_length >= MULTI_TOUCH_MIN_LENGTH;
        let mut score = match kind {
            ModelKind::Linear => 0.70,
            ModelKind::FirstTouch | ModelKind::LastTouch => 0.60,
            ModelKind::TimeDecay | ModelKind::PositionBased => 0.80,
        };

        match kind {
            ModelKind::Linear => {
                if multi_touch {
                    score += MODEL_FIT_BONUS;
                }
                if avg_length >= LONG_JOURNEY_LENGTH {
                    score += LONG_JOURNEY_BONUS;
                }
            }
            ModelKind::FirstTouch | ModelKind::LastTouch => {
                if avg_length <= SINGLE_TOUCH_MAX_LENGTH {
                    score += MODEL_FIT_BONUS;
                }
            }
            ModelKind::TimeDecay => {
                if multi_touch {
                    score += MODEL_FIT_BONUS;
                }
                if avg_span_days >= DECAY_MIN_SPAN_DAYS {
                    score += MODEL_FIT_BONUS;
                }
            }
            ModelKind::PositionBased => {
                if multi_touch {
                    score += MODEL_FIT_BONUS;
                }
            }
        }

        let score = score.clamp(0.0, 1.0);
        debug!(model = %kind, avg_length, avg_span_days, score, "Scored model fit");
        score
    }

    /// Reliability of the linking method, scaled by how many rows carry the
    /// field(s) it links on.
    pub fn identity_confidence(&self, table: &EventTable, method: LinkingMethod) -> f64 {
        if table.is_empty() {
            return 0.0;
        }
        let (base, coverage) = match method {
            LinkingMethod::CustomerId => (0.95, table.non_null_fraction(Column::CustomerId)),
            LinkingMethod::SessionEmail => {
                let linked = table
                    .rows()
                    .iter()
                    .filter(|r| r.get(Column::SessionId).is_some() || r.get(Column::Email).is_some())
                    .count();
                (0.85, linked as f64 / table.len() as f64)
            }
            LinkingMethod::EmailOnly => (0.75, table.non_null_fraction(Column::Email)),
            LinkingMethod::Aggregate => (0.50, 1.0),
        };
        (base * coverage).clamp(0.0, 1.0)
    }

    /// Per-channel confidence: 40% touchpoint volume, 40% conversion rate
    /// (×10), 20% credit (×2), each clamped before blending.
    pub fn channel_confidence(&self, touchpoints: u64, conversions: f64, credit: f64) -> f64 {
        if touchpoints == 0 || credit <= 0.0 {
            return 0.0;
        }
        let volume = (touchpoints as f64 / self.config.channel_volume_saturation).clamp(0.0, 1.0);
        let rate = (conversions / touchpoints as f64 * 10.0).clamp(0.0, 1.0);
        let share = (credit * 2.0).clamp(0.0, 1.0);
        (0.4 * volume + 0.4 * rate + 0.2 * share).clamp(0.0, 1.0)
    }
}

fn span_days(span: Duration) -> f64 {
    span.num_seconds() as f64 / 86_400.0
}
