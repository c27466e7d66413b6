//! Wire shape of a finished analysis.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mta_attribution::AttributionModel;
use mta_confidence::ConfidenceBreakdown;
use mta_core::quality::DataQuality;
use mta_core::types::{LinkingMethod, ModelKind};
use mta_journey::analysis::{LengthSummary, PathFrequency, TimeToConversion};

use crate::insights::BusinessInsight;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionResponse {
    pub results: AttributionResults,
    pub metadata: AnalysisMetadata,
    pub insights: Vec<BusinessInsight>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionResults {
    pub total_conversions: u64,
    pub total_revenue: f64,
    /// Keyed by channel, in lexicographic order.
    pub channels: BTreeMap<String, ChannelAttribution>,
    pub overall_confidence: f64,
    pub confidence_breakdown: ConfidenceBreakdown,
    pub data_quality: DataQuality,
    pub journey_stats: JourneyStats,
}

impl AttributionResults {
    /// Channel → credit view.
    pub fn credits(&self) -> BTreeMap<String, f64> {
        self.channels
            .iter()
            .map(|(channel, c)| (channel.clone(), c.credit))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelAttribution {
    pub credit: f64,
    pub conversions: f64,
    pub revenue: f64,
    pub touchpoints: u64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JourneyStats {
    pub length: LengthSummary,
    pub top_paths: Vec<PathFrequency>,
    pub time_to_conversion: TimeToConversion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    pub analysis_id: Uuid,
    pub node_id: String,
    pub model: ModelKind,
    /// The model with every parameter resolved.
    pub parameters: AttributionModel,
    pub rows_analyzed: usize,
    pub journeys: usize,
    pub converting_journeys: usize,
    pub time_range: Option<TimeRange>,
    pub linking_method: LinkingMethod,
    pub processing_ms: u64,
    /// True when this response was served from the result cache.
    #[serde(default)]
    pub cached: bool,
    /// Instant freshness was measured against.
    pub quality_as_of: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
}
