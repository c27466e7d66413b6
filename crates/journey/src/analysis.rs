//! Descriptive statistics over built journeys: length distribution, most
//! common converting paths and time from first touch to conversion.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::Journey;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthDistribution {
    pub one: usize,
    pub two: usize,
    pub three_to_five: usize,
    pub six_to_ten: usize,
    pub eleven_plus: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LengthSummary {
    pub average_length: f64,
    pub median_length: f64,
    pub distribution: LengthDistribution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathFrequency {
    pub path: String,
    pub frequency: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeToConversion {
    pub converting_journeys: usize,
    pub average_hours: f64,
    pub median_hours: f64,
}

/// Length statistics over journeys with at least one touchpoint. Empty
/// journeys are left out of the average, median and distribution alike.
pub fn length_summary(journeys: &[Journey]) -> LengthSummary {
    let mut lengths: Vec<f64> = Vec::with_capacity(journeys.len());
    let mut distribution = LengthDistribution::default();
    for journey in journeys {
        match journey.len() {
            0 => continue,
            1 => distribution.one += 1,
            2 => distribution.two += 1,
            3..=5 => distribution.three_to_five += 1,
            6..=10 => distribution.six_to_ten += 1,
            _ => distribution.eleven_plus += 1,
        }
        lengths.push(journey.len() as f64);
    }

    if lengths.is_empty() {
        return LengthSummary::default();
    }
    LengthSummary {
        average_length: mean(&lengths),
        median_length: median(&mut lengths),
        distribution,
    }
}

/// Most frequent channel paths among converting journeys, ties broken by
/// path text.
pub fn top_paths(journeys: &[Journey], limit: usize) -> Vec<PathFrequency> {
    let converting: Vec<&Journey> = journeys.iter().filter(|j| j.has_conversion()).collect();
    if converting.is_empty() {
        return Vec::new();
    }

    let mut counts: HashMap<String, usize> = HashMap::new();
    for journey in &converting {
        *counts.entry(journey.path()).or_default() += 1;
    }

    let total = converting.len() as f64;
    let mut paths: Vec<PathFrequency> = counts
        .into_iter()
        .map(|(path, frequency)| PathFrequency {
            path,
            frequency,
            percentage: frequency as f64 / total * 100.0,
        })
        .collect();
    paths.sort_by(|a, b| b.frequency.cmp(&a.frequency).then_with(|| a.path.cmp(&b.path)));
    paths.truncate(limit);
    paths
}

/// Hours from the first touchpoint to the first conversion event.
pub fn time_to_conversion(journeys: &[Journey]) -> TimeToConversion {
    let mut hours: Vec<f64> = journeys
        .iter()
        .filter_map(|j| {
            let start = j.first()?.timestamp;
            let converted = j.touchpoints.iter().find(|tp| tp.is_conversion())?.timestamp;
            Some((converted - start).num_seconds() as f64 / 3600.0)
        })
        .collect();

    if hours.is_empty() {
        return TimeToConversion::default();
    }
    TimeToConversion {
        converting_journeys: hours.len(),
        average_hours: mean(&hours),
        median_hours: median(&mut hours),
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
