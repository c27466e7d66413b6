//! Attribution service: runs one analysis over an event table.
//!
//! Pipeline order:
//! 1. Resolve the model and its parameters (bad config fails before any data
//!    is looked at).
//! 2. Validate the table, reporting every issue at once.
//! 3. Assess data quality.
//! 4. Select a linking method and partition rows by identity.
//! 5. Build journeys and credit channels.
//! 6. Score confidence and derive insights.
//!
//! Each stage reads immutable inputs and returns fresh values, so one service
//! can serve concurrent analyses.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use mta_attribution::{aggregate, AttributionModel};
use mta_cache::{result_key, ResultCache};
use mta_confidence::ConfidenceScorer;
use mta_core::config::AppConfig;
use mta_core::error::AttributionResult;
use mta_core::quality;
use mta_core::table::EventTable;
use mta_core::types::{ModelKind, ModelParams};
use mta_core::validation::ensure_valid;
use mta_identity::IdentityResolver;
use mta_journey::analysis::{length_summary, time_to_conversion, top_paths};
use mta_journey::JourneyBuilder;

use crate::insights::generate_insights;
use crate::response::{
    AnalysisMetadata, AttributionResponse, AttributionResults, ChannelAttribution, JourneyStats,
    TimeRange,
};

const TOP_PATHS: usize = 10;

/// Which model to run, with optional parameter overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionRequest {
    pub model: ModelKind,
    #[serde(flatten)]
    pub params: ModelParams,
    /// Reference instant for freshness scoring. Unset means the wall clock
    /// at the start of the analysis; set it to make data quality, and with
    /// it every confidence score, a function of the input alone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_of: Option<DateTime<Utc>>,
}

impl AttributionRequest {
    pub fn new(model: ModelKind) -> Self {
        Self::with_params(model, ModelParams::default())
    }

    pub fn with_params(model: ModelKind, params: ModelParams) -> Self {
        Self {
            model,
            params,
            as_of: None,
        }
    }

    pub fn as_of(mut self, as_of: DateTime<Utc>) -> Self {
        self.as_of = Some(as_of);
        self
    }
}

pub struct AttributionService {
    config: Arc<AppConfig>,
    resolver: IdentityResolver,
    builder: JourneyBuilder,
    scorer: ConfidenceScorer,
    cache: Option<Arc<ResultCache>>,
}

impl AttributionService {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            resolver: IdentityResolver::new(config.identity.clone()),
            builder: JourneyBuilder::new(),
            scorer: ConfidenceScorer::new(config.confidence.clone()),
            cache: None,
            config,
        }
    }

    /// Serve repeated analyses of identical input from `cache`.
    pub fn with_cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run the analysis, consulting the result cache when one is attached
    /// and caching is enabled. Cache failures are logged and never fail the
    /// analysis.
    pub async fn analyze(
        &self,
        table: &EventTable,
        request: &AttributionRequest,
    ) -> AttributionResult<AttributionResponse> {
        let cache = match &self.cache {
            Some(cache) if self.config.cache.enabled => cache,
            _ => return self.analyze_uncached(table, request),
        };

        let key = self.cache_key(table, request)?;

        match cache.get::<AttributionResponse>(&key).await {
            Ok(Some(mut response)) => {
                metrics::counter!("attribution.cache_hits").increment(1);
                debug!(key = %key, "Serving analysis from cache");
                response.metadata.cached = true;
                return Ok(response);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Result cache lookup failed"),
        }

        let response = self.analyze_uncached(table, request)?;
        if let Err(e) = cache.put(&key, &response).await {
            warn!(error = %e, "Failed to store analysis in result cache");
        }
        Ok(response)
    }

    /// Run the full pipeline without touching the cache.
    pub fn analyze_uncached(
        &self,
        table: &EventTable,
        request: &AttributionRequest,
    ) -> AttributionResult<AttributionResponse> {
        let started = Instant::now();
        metrics::counter!("attribution.analyses").increment(1);

        let model = self.resolve_model(request)?;

        if let Err(e) = ensure_valid(table) {
            metrics::counter!("attribution.validation_errors")
                .increment(e.issues().len() as u64);
            warn!(issues = e.issues().len(), "Rejected event table");
            return Err(e);
        }

        let as_of = request.as_of.unwrap_or_else(Utc::now);
        let data_quality = quality::assess_at(table, as_of);
        let method = self.resolver.select_method(table);
        let partition = self.resolver.resolve(table, method);
        let journeys = self.builder.build(table, &partition)?;
        let attribution = aggregate(&model, &journeys);

        let model_fit = self.scorer.model_fit(model.kind(), &journeys);
        let identity = self.scorer.identity_confidence(table, method);
        let breakdown = self
            .scorer
            .breakdown(&data_quality, table.len(), model_fit, identity);

        let channels: BTreeMap<String, ChannelAttribution> = attribution
            .channels
            .iter()
            .map(|(name, c)| {
                let entry = ChannelAttribution {
                    credit: c.credit,
                    conversions: c.conversions,
                    revenue: c.revenue,
                    touchpoints: c.touchpoints,
                    confidence: self
                        .scorer
                        .channel_confidence(c.touchpoints, c.conversions, c.credit),
                };
                (name.clone(), entry)
            })
            .collect();

        let insights = generate_insights(
            &channels,
            data_quality.completeness,
            table.len(),
            breakdown.overall,
            &self.config.insights,
        );

        let journey_stats = JourneyStats {
            length: length_summary(&journeys),
            top_paths: top_paths(&journeys, TOP_PATHS),
            time_to_conversion: time_to_conversion(&journeys),
        };

        let processing_ms = started.elapsed().as_millis() as u64;
        metrics::histogram!("attribution.processing_ms").record(processing_ms as f64);

        info!(
            model = %model.kind(),
            rows = table.len(),
            journeys = journeys.len(),
            converting = attribution.converting_journeys,
            channels = attribution.channels.len(),
            linking_method = %method,
            confidence = breakdown.overall,
            processing_ms,
            "Attribution analysis complete"
        );

        Ok(AttributionResponse {
            results: AttributionResults {
                total_conversions: attribution.total_conversions,
                total_revenue: attribution.total_revenue,
                channels,
                overall_confidence: breakdown.overall,
                confidence_breakdown: breakdown,
                data_quality,
                journey_stats,
            },
            metadata: AnalysisMetadata {
                analysis_id: Uuid::new_v4(),
                node_id: self.config.node_id.clone(),
                model: model.kind(),
                parameters: model,
                rows_analyzed: table.len(),
                journeys: journeys.len(),
                converting_journeys: attribution.converting_journeys,
                time_range: table
                    .time_range()
                    .map(|(start, end)| TimeRange { start, end }),
                linking_method: method,
                processing_ms,
                cached: false,
                quality_as_of: as_of,
                generated_at: Utc::now(),
            },
            insights,
        })
    }

    /// Run every model over the same table, scoring data quality against one
    /// shared instant (`as_of`, or now). Validation and config errors fail
    /// the whole comparison.
    pub fn compare_models(
        &self,
        table: &EventTable,
        params: &ModelParams,
        as_of: Option<DateTime<Utc>>,
    ) -> AttributionResult<Vec<AttributionResponse>> {
        let as_of = as_of.unwrap_or_else(Utc::now);
        ModelKind::ALL
            .into_iter()
            .map(|kind| {
                let request = AttributionRequest::with_params(kind, params.clone()).as_of(as_of);
                self.analyze_uncached(table, &request)
            })
            .collect()
    }

    /// Content key of an analysis: the table, the resolved model, the
    /// scoring config and the explicit reference instant, if any.
    fn cache_key(
        &self,
        table: &EventTable,
        request: &AttributionRequest,
    ) -> AttributionResult<String> {
        let model = self.resolve_model(request)?;
        let settings = (
            &model,
            request.as_of,
            &self.config.identity,
            &self.config.confidence,
            &self.config.insights,
        );
        result_key(table, &settings)
    }

    fn resolve_model(&self, request: &AttributionRequest) -> AttributionResult<AttributionModel> {
        AttributionModel::from_config(request.model, &request.params, &self.config.attribution)
            .inspect_err(|e| warn!(model = %request.model, error = %e, "Rejected model configuration"))
    }
}
