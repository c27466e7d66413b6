//! The attribution pipeline wired end to end: validate the event table,
//! resolve identities, build journeys, credit channels, score confidence and
//! derive business insights.

#![warn(clippy::unwrap_used)]

pub mod insights;
pub mod response;
pub mod service;

pub use insights::{generate_insights, BusinessInsight, InsightKind, Severity};
pub use response::{
    AnalysisMetadata, AttributionResponse, AttributionResults, ChannelAttribution, JourneyStats,
    TimeRange,
};
pub use service::{AttributionRequest, AttributionService};
