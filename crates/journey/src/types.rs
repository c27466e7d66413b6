use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use mta_core::types::Touchpoint;

/// One identity's touchpoints in chronological order, with precomputed
/// conversion count and revenue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Journey {
    pub journey_id: String,
    pub touchpoints: Vec<Touchpoint>,
    pub total_conversions: u64,
    pub total_revenue: f64,
}

impl Journey {
    /// Sort the touchpoints (stable, so equal timestamps keep their input
    /// order) and derive the totals.
    pub fn new(journey_id: impl Into<String>, mut touchpoints: Vec<Touchpoint>) -> Self {
        touchpoints.sort_by_key(|tp| tp.timestamp);

        let total_conversions = touchpoints.iter().filter(|tp| tp.is_conversion()).count() as u64;
        let total_revenue = touchpoints
            .iter()
            .filter(|tp| tp.is_conversion())
            .filter_map(|tp| tp.conversion_value)
            .sum();

        Self {
            journey_id: journey_id.into(),
            touchpoints,
            total_conversions,
            total_revenue,
        }
    }

    pub fn has_conversion(&self) -> bool {
        self.total_conversions > 0
    }

    pub fn len(&self) -> usize {
        self.touchpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.touchpoints.is_empty()
    }

    pub fn first(&self) -> Option<&Touchpoint> {
        self.touchpoints.first()
    }

    pub fn last(&self) -> Option<&Touchpoint> {
        self.touchpoints.last()
    }

    /// Latest timestamp in the journey, treated as the conversion instant by
    /// time-based models.
    pub fn conversion_time(&self) -> Option<DateTime<Utc>> {
        self.touchpoints.iter().map(|tp| tp.timestamp).max()
    }

    /// Time between the first and last touchpoint.
    pub fn span(&self) -> Duration {
        match (self.first(), self.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => Duration::zero(),
        }
    }

    /// Channel sequence rendered as `a -> b -> c`.
    pub fn path(&self) -> String {
        self.touchpoints
            .iter()
            .map(|tp| tp.channel.as_str())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}
