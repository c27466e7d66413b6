//! Aggregation of per-journey credit into per-channel totals.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use mta_journey::Journey;

use crate::model::{AttributionModel, CreditMap};

/// One channel's share of the converting journeys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelCredit {
    /// Fraction of all credit, renormalized so channels sum to 1.0.
    pub credit: f64,
    /// `credit × total_conversions`; an apportionment, not a count.
    pub conversions: f64,
    /// `credit × total_revenue`.
    pub revenue: f64,
    /// Touchpoints on this channel inside converting journeys.
    pub touchpoints: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateAttribution {
    pub channels: BTreeMap<String, ChannelCredit>,
    pub total_conversions: u64,
    pub total_revenue: f64,
    pub converting_journeys: usize,
}

impl AggregateAttribution {
    /// Channel → credit view of the result.
    pub fn credits(&self) -> CreditMap {
        self.channels
            .iter()
            .map(|(channel, c)| (channel.clone(), c.credit))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// Sum each converting journey's credit map, then renormalize to 1.0.
/// Journeys without a conversion contribute nothing, not even touchpoints.
pub fn aggregate(model: &AttributionModel, journeys: &[Journey]) -> AggregateAttribution {
    let converting: Vec<&Journey> = journeys.iter().filter(|j| j.has_conversion()).collect();

    let mut raw = CreditMap::new();
    let mut touchpoints: BTreeMap<String, u64> = BTreeMap::new();
    for journey in &converting {
        for (channel, credit) in model.compute(journey) {
            *raw.entry(channel).or_insert(0.0) += credit;
        }
        for tp in &journey.touchpoints {
            *touchpoints.entry(tp.channel.clone()).or_default() += 1;
        }
    }

    let total_conversions: u64 = converting.iter().map(|j| j.total_conversions).sum();
    let total_revenue: f64 = converting.iter().map(|j| j.total_revenue).sum();
    let raw_total: f64 = raw.values().sum();

    let channels = if raw_total > 0.0 {
        raw.into_iter()
            .map(|(channel, sum)| {
                let credit = sum / raw_total;
                let touchpoints = touchpoints.get(&channel).copied().unwrap_or(0);
                let entry = ChannelCredit {
                    credit,
                    conversions: credit * total_conversions as f64,
                    revenue: credit * total_revenue,
                    touchpoints,
                };
                (channel, entry)
            })
            .collect()
    } else {
        BTreeMap::new()
    };

    debug!(
        model = %model.kind(),
        journeys = journeys.len(),
        converting = converting.len(),
        channels = channels.len(),
        "Aggregated attribution"
    );

    AggregateAttribution {
        channels,
        total_conversions,
        total_revenue,
        converting_journeys: converting.len(),
    }
}
