//! Data-quality assessment of a raw event log.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::table::{Column, EventTable};
use crate::types::{parse_timestamp, EventKind};

/// Penalty score applied when the same channel appears under different casings.
const INCONSISTENT_CASING_SCORE: f64 = 0.7;

/// Snapshot of how complete, consistent and recent the input is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataQuality {
    pub completeness: f64,
    pub consistency: f64,
    pub freshness: f64,
}

impl DataQuality {
    pub fn zero() -> Self {
        Self {
            completeness: 0.0,
            consistency: 0.0,
            freshness: 0.0,
        }
    }

    /// Single quality figure: completeness 40%, consistency 30%, freshness 30%.
    pub fn combined(&self) -> f64 {
        (self.completeness * 0.4 + self.consistency * 0.3 + self.freshness * 0.3).clamp(0.0, 1.0)
    }
}

/// Assess the table against the current wall clock.
pub fn assess(table: &EventTable) -> DataQuality {
    assess_at(table, Utc::now())
}

/// Assess the table relative to `now`.
pub fn assess_at(table: &EventTable, now: DateTime<Utc>) -> DataQuality {
    if table.is_empty() {
        return DataQuality::zero();
    }
    let total = table.len() as f64;

    let required = [Column::Timestamp, Column::Channel, Column::EventType];
    let completeness =
        required.iter().map(|&c| table.non_null_fraction(c)).sum::<f64>() / required.len() as f64;

    let timestamps: Vec<DateTime<Utc>> = table
        .rows()
        .iter()
        .filter_map(|r| r.get(Column::Timestamp).and_then(parse_timestamp))
        .collect();

    let mut consistency_scores = Vec::with_capacity(3);
    if table.has_column(Column::Timestamp) {
        let not_future = timestamps.iter().filter(|ts| **ts <= now).count();
        consistency_scores.push(not_future as f64 / total);
    }
    consistency_scores.push(channel_consistency(table));
    if table.has_column(Column::EventType) {
        let known = table
            .rows()
            .iter()
            .filter(|r| r.get(Column::EventType).and_then(EventKind::parse).is_some())
            .count();
        consistency_scores.push(known as f64 / total);
    }
    let consistency = consistency_scores.iter().sum::<f64>() / consistency_scores.len() as f64;

    let freshness = if timestamps.is_empty() {
        0.0
    } else {
        timestamps
            .iter()
            .map(|ts| freshness_score((now - *ts).num_days()))
            .sum::<f64>()
            / timestamps.len() as f64
    };

    DataQuality {
        completeness,
        consistency,
        freshness,
    }
}

fn channel_consistency(table: &EventTable) -> f64 {
    if !table.has_column(Column::Channel) {
        return 0.0;
    }
    let channels: Vec<&str> = table.rows().iter().filter_map(|r| r.get(Column::Channel)).collect();
    let distinct: HashSet<&str> = channels.iter().copied().collect();
    let folded: HashSet<String> = distinct.iter().map(|c| c.to_lowercase()).collect();
    if folded.len() < distinct.len() {
        INCONSISTENT_CASING_SCORE
    } else {
        channels.len() as f64 / table.len() as f64
    }
}

/// Full score inside a week, linear decay to 0.5 at 30 days, then down to
/// zero over the following two months.
fn freshness_score(days_old: i64) -> f64 {
    let days = days_old as f64;
    if days_old <= 7 {
        1.0
    } else if days_old <= 30 {
        1.0 - (days - 7.0) / 46.0
    } else {
        (0.5 - (days - 30.0) / 60.0).max(0.0)
    }
}
