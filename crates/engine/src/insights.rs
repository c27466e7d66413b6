//! Plain-language findings derived from a finished analysis.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use mta_core::config::InsightsConfig;

use crate::response::ChannelAttribution;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    TopChannel,
    UnderperformingChannel,
    DataCompleteness,
    SampleSize,
    LowConfidence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessInsight {
    pub kind: InsightKind,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    pub message: String,
}

/// Credit below this marks a channel as underperforming.
const UNDERPERFORMING_CREDIT: f64 = 0.1;

pub fn generate_insights(
    channels: &BTreeMap<String, ChannelAttribution>,
    completeness: f64,
    rows: usize,
    overall_confidence: f64,
    config: &InsightsConfig,
) -> Vec<BusinessInsight> {
    let mut insights = Vec::new();

    // BTreeMap order makes ties resolve to the lexicographically first channel.
    let top = channels
        .iter()
        .filter(|(_, c)| c.credit > 0.0)
        .fold(None::<(&String, &ChannelAttribution)>, |best, (name, c)| match best {
            Some((_, b)) if b.credit >= c.credit => best,
            _ => Some((name, c)),
        });
    if let Some((name, c)) = top {
        insights.push(BusinessInsight {
            kind: InsightKind::TopChannel,
            severity: Severity::Info,
            channel: Some(name.clone()),
            message: format!(
                "{name} is the top performing channel with {:.1}% of attributed credit",
                c.credit * 100.0
            ),
        });
    }

    if channels.len() > 2 {
        let lowest = channels
            .iter()
            .fold(None::<(&String, &ChannelAttribution)>, |worst, (name, c)| match worst {
                Some((_, w)) if w.credit <= c.credit => worst,
                _ => Some((name, c)),
            });
        if let Some((name, c)) = lowest.filter(|(_, c)| c.credit < UNDERPERFORMING_CREDIT) {
            insights.push(BusinessInsight {
                kind: InsightKind::UnderperformingChannel,
                severity: Severity::Warning,
                channel: Some(name.clone()),
                message: format!(
                    "{name} receives only {:.1}% of attributed credit; review its spend",
                    c.credit * 100.0
                ),
            });
        }
    }

    if completeness < config.minimum_data_completeness {
        insights.push(BusinessInsight {
            kind: InsightKind::DataCompleteness,
            severity: Severity::Warning,
            channel: None,
            message: format!(
                "Data completeness is {:.1}%, below the {:.0}% target",
                completeness * 100.0,
                config.minimum_data_completeness * 100.0
            ),
        });
    }

    if rows < config.minimum_sample_size {
        insights.push(BusinessInsight {
            kind: InsightKind::SampleSize,
            severity: Severity::Warning,
            channel: None,
            message: format!(
                "Only {rows} events analyzed; at least {} are recommended",
                config.minimum_sample_size
            ),
        });
    }

    if overall_confidence < config.confidence_threshold {
        insights.push(BusinessInsight {
            kind: InsightKind::LowConfidence,
            severity: Severity::Warning,
            channel: None,
            message: format!(
                "Overall confidence is {:.2}, below the {:.2} threshold",
                overall_confidence, config.confidence_threshold
            ),
        });
    }

    insights
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(credit: f64) -> ChannelAttribution {
        ChannelAttribution {
            credit,
            conversions: credit * 10.0,
            revenue: credit * 1000.0,
            touchpoints: 10,
            confidence: 0.5,
        }
    }

    fn channels(entries: &[(&str, f64)]) -> BTreeMap<String, ChannelAttribution> {
        entries
            .iter()
            .map(|&(name, credit)| (name.to_string(), channel(credit)))
            .collect()
    }

    fn kinds(insights: &[BusinessInsight]) -> Vec<InsightKind> {
        insights.iter().map(|i| i.kind).collect()
    }

    #[test]
    fn test_healthy_analysis_only_reports_top_channel() {
        let map = channels(&[("email", 0.5), ("social", 0.3), ("search", 0.2)]);
        let insights = generate_insights(&map, 0.95, 5000, 0.85, &InsightsConfig::default());
        assert_eq!(kinds(&insights), vec![InsightKind::TopChannel]);
        assert_eq!(insights[0].channel.as_deref(), Some("email"));
        assert!(insights[0].message.contains("50.0%"));
    }

    #[test]
    fn test_underperformer_needs_more_than_two_channels() {
        let config = InsightsConfig::default();
        let three = channels(&[("email", 0.6), ("social", 0.35), ("display", 0.05)]);
        let insights = generate_insights(&three, 1.0, 500, 0.9, &config);
        let under = insights
            .iter()
            .find(|i| i.kind == InsightKind::UnderperformingChannel)
            .unwrap();
        assert_eq!(under.channel.as_deref(), Some("display"));

        let two = channels(&[("email", 0.95), ("display", 0.05)]);
        let insights = generate_insights(&two, 1.0, 500, 0.9, &config);
        assert!(!kinds(&insights).contains(&InsightKind::UnderperformingChannel));
    }

    #[test]
    fn test_warnings_for_weak_data() {
        let insights =
            generate_insights(&BTreeMap::new(), 0.5, 12, 0.3, &InsightsConfig::default());
        assert_eq!(
            kinds(&insights),
            vec![
                InsightKind::DataCompleteness,
                InsightKind::SampleSize,
                InsightKind::LowConfidence
            ]
        );
        assert!(insights.iter().all(|i| i.severity == Severity::Warning));
    }

    #[test]
    fn test_top_channel_tie_prefers_first_name() {
        let map = channels(&[("social", 0.5), ("email", 0.5)]);
        let insights = generate_insights(&map, 1.0, 500, 0.9, &InsightsConfig::default());
        assert_eq!(insights[0].channel.as_deref(), Some("email"));
    }
}
