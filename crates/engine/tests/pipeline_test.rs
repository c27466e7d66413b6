//! End-to-end tests for the attribution pipeline: raw rows in, response out.

use std::sync::Arc;

use mta_cache::ResultCache;
use mta_core::config::AppConfig;
use mta_core::error::AttributionError;
use mta_core::table::{Column, EventRow, EventTable};
use mta_core::types::{LinkingMethod, ModelKind, ModelParams};
use mta_core::validation::{IssueCode, REQUIRED_COLUMNS};
use mta_engine::{AttributionRequest, AttributionService, InsightKind};

fn row(customer: &str, ts: &str, channel: &str, event: &str) -> EventRow {
    EventRow::default()
        .with(Column::CustomerId, customer)
        .with(Column::Timestamp, ts)
        .with(Column::Channel, channel)
        .with(Column::EventType, event)
}

fn service() -> AttributionService {
    AttributionService::new(Arc::new(AppConfig::default()))
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn single_customer_table() -> EventTable {
    EventTable::from_rows(vec![
        row("C1", "2024-03-01T10:00:00Z", "email", "touch"),
        row("C1", "2024-03-02T10:00:00Z", "social", "touch"),
        row("C1", "2024-03-03T10:00:00Z", "email", "conversion").with(Column::ConversionValue, "100"),
    ])
}

fn mixed_table() -> EventTable {
    let mut rows = Vec::new();
    for i in 0..30 {
        let customer = format!("C{i}");
        let day = 1 + i % 20;
        rows.push(row(&customer, &format!("2024-05-{day:02}T08:00:00Z"), "display", "view"));
        rows.push(row(&customer, &format!("2024-05-{day:02}T12:00:00Z"), ["email", "social", "search"][i % 3], "click"));
        if i % 2 == 0 {
            rows.push(
                row(&customer, &format!("2024-05-{:02}T18:00:00Z", day + 1), "direct", "purchase")
                    .with(Column::ConversionValue, format!("{}", 10 + i)),
            );
        }
    }
    EventTable::from_rows(rows)
}

#[test]
fn test_linear_single_customer_journey() {
    let response = service()
        .analyze_uncached(&single_customer_table(), &AttributionRequest::new(ModelKind::Linear))
        .unwrap();

    let results = &response.results;
    assert_eq!(results.channels.len(), 2);
    assert!(approx(results.channels["email"].credit, 2.0 / 3.0));
    assert!(approx(results.channels["social"].credit, 1.0 / 3.0));
    assert_eq!(results.total_conversions, 1);
    assert_eq!(results.total_revenue, 100.0);
    assert!(approx(results.channels["email"].revenue, 200.0 / 3.0));
    assert_eq!(results.channels["email"].touchpoints, 2);

    assert_eq!(response.metadata.linking_method, LinkingMethod::CustomerId);
    assert_eq!(response.metadata.journeys, 1);
    assert_eq!(response.metadata.rows_analyzed, 3);
}

#[test]
fn test_position_based_defaults_on_three_channels() {
    let table = EventTable::from_rows(vec![
        row("C1", "2024-03-01", "a", "view"),
        row("C1", "2024-03-02", "b", "click"),
        row("C1", "2024-03-03", "c", "purchase"),
    ]);
    let response = service()
        .analyze_uncached(&table, &AttributionRequest::new(ModelKind::PositionBased))
        .unwrap();
    let credits = response.results.credits();
    assert!(approx(credits["a"], 0.4));
    assert!(approx(credits["b"], 0.2));
    assert!(approx(credits["c"], 0.4));
}

#[test]
fn test_every_model_credits_sum_to_one() {
    let service = service();
    let table = mixed_table();
    for kind in ModelKind::ALL {
        let response = service
            .analyze_uncached(&table, &AttributionRequest::new(kind))
            .unwrap();
        let total: f64 = response.results.credits().values().sum();
        assert!(approx(total, 1.0), "{kind}: {total}");
        assert_eq!(response.results.total_conversions, 15);
        for channel in response.results.channels.values() {
            assert!((0.0..=1.0).contains(&channel.confidence));
        }
        let b = response.results.confidence_breakdown;
        for v in [b.data_quality, b.sample_size, b.model_fit, b.identity_resolution, b.overall] {
            assert!((0.0..=1.0).contains(&v), "{kind}: {v}");
        }
    }
}

#[test]
fn test_zero_conversions_yields_empty_attribution() {
    let table = EventTable::from_rows(vec![
        row("C1", "2024-03-01", "email", "view"),
        row("C2", "2024-03-02", "social", "click"),
    ]);
    let response = service()
        .analyze_uncached(&table, &AttributionRequest::new(ModelKind::Linear))
        .unwrap();
    assert!(response.results.channels.is_empty());
    assert_eq!(response.results.total_conversions, 0);
    assert_eq!(response.results.total_revenue, 0.0);
    assert_eq!(response.metadata.converting_journeys, 0);
    assert!(!response
        .insights
        .iter()
        .any(|i| i.kind == InsightKind::TopChannel));
}

#[test]
fn test_empty_table_is_well_formed() {
    let table = EventTable::new(REQUIRED_COLUMNS, Vec::new());
    let response = service()
        .analyze_uncached(&table, &AttributionRequest::new(ModelKind::Linear))
        .unwrap();
    assert!(response.results.channels.is_empty());
    assert_eq!(response.results.overall_confidence, 0.0);
    assert_eq!(response.metadata.journeys, 0);
    assert!(response.metadata.time_range.is_none());
    assert_eq!(response.metadata.linking_method, LinkingMethod::Aggregate);
}

#[test]
fn test_same_input_same_output() {
    let service = service();
    let table = mixed_table();
    let as_of = chrono::DateTime::parse_from_rfc3339("2024-06-01T00:00:00Z")
        .unwrap()
        .with_timezone(&chrono::Utc);
    let request = AttributionRequest::new(ModelKind::TimeDecay).as_of(as_of);
    let first = service.analyze_uncached(&table, &request).unwrap();
    let second = service.analyze_uncached(&table, &request).unwrap();
    assert_eq!(first.results, second.results);
    assert_eq!(first.insights, second.insights);
    assert_ne!(first.metadata.analysis_id, second.metadata.analysis_id);
}

#[test]
fn test_invalid_model_config_rejected_before_validation() {
    // Table is malformed too; the config error must win.
    let table = EventTable::from_rows(vec![EventRow::default().with(Column::Channel, "email")]);
    let request = AttributionRequest::with_params(
        ModelKind::TimeDecay,
        ModelParams {
            half_life_days: Some(0.0),
            ..Default::default()
        },
    );
    let err = service().analyze_uncached(&table, &request).unwrap_err();
    assert!(matches!(err, AttributionError::InvalidConfig(_)));

    let request = AttributionRequest::with_params(
        ModelKind::PositionBased,
        ModelParams {
            first_touch_weight: Some(0.7),
            last_touch_weight: Some(0.5),
            ..Default::default()
        },
    );
    let err = service()
        .analyze_uncached(&single_customer_table(), &request)
        .unwrap_err();
    assert!(matches!(err, AttributionError::InvalidConfig(_)));
}

#[test]
fn test_validation_reports_whole_batch() {
    let table = EventTable::from_rows(vec![
        row("C1", "2024-03-01", "email", "view"),
        row("C1", "not a date", "email", "view"),
        row("C1", "2024-03-03", "email", "purchase").with(Column::ConversionValue, "-5"),
        row("C1", "2024-03-04", "", "view"),
    ]);
    let err = service()
        .analyze_uncached(&table, &AttributionRequest::new(ModelKind::Linear))
        .unwrap_err();
    let codes: Vec<(Option<usize>, IssueCode)> =
        err.issues().iter().map(|i| (i.row, i.code)).collect();
    assert_eq!(
        codes,
        vec![
            (Some(1), IssueCode::InvalidTimestamp),
            (Some(2), IssueCode::NegativeValue),
            (Some(3), IssueCode::MissingValue),
        ]
    );
}

#[test]
fn test_missing_required_columns() {
    let table = EventTable::from_rows(vec![EventRow::default()
        .with(Column::Channel, "email")
        .with(Column::EventType, "view")]);
    let err = service()
        .analyze_uncached(&table, &AttributionRequest::new(ModelKind::Linear))
        .unwrap_err();
    let issues = err.issues();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].field, "timestamp");
    assert_eq!(issues[0].code, IssueCode::MissingRequiredColumn);
}

#[test]
fn test_aggregate_linking_without_identity_columns() {
    let table = EventTable::from_rows(vec![
        EventRow::default()
            .with(Column::Timestamp, "2024-03-01")
            .with(Column::Channel, "email")
            .with(Column::EventType, "view"),
        EventRow::default()
            .with(Column::Timestamp, "2024-03-02")
            .with(Column::Channel, "search")
            .with(Column::EventType, "purchase")
            .with(Column::ConversionValue, "20"),
    ]);
    let response = service()
        .analyze_uncached(&table, &AttributionRequest::new(ModelKind::LastTouch))
        .unwrap();
    assert_eq!(response.metadata.linking_method, LinkingMethod::Aggregate);
    assert_eq!(response.metadata.journeys, 1);
    assert!(approx(response.results.channels["search"].credit, 1.0));
    assert!(approx(response.results.confidence_breakdown.identity_resolution, 0.5));
}

#[test]
fn test_json_records_input() {
    let records: Vec<serde_json::Map<String, serde_json::Value>> = serde_json::from_str(
        r#"[
            {"Customer ID": "C1", "Timestamp": "2024-03-01T10:00:00Z", "Channel": "email", "Event Type": "touch"},
            {"Customer ID": "C1", "Timestamp": "2024-03-02T10:00:00Z", "Channel": "social", "Event Type": "touch"},
            {"Customer ID": "C1", "Timestamp": "2024-03-03T10:00:00Z", "Channel": "email", "Event Type": "conversion", "Conversion Value": 100}
        ]"#,
    )
    .unwrap();
    let table = EventTable::from_records(&records);
    let response = service()
        .analyze_uncached(&table, &AttributionRequest::new(ModelKind::Linear))
        .unwrap();
    assert!(approx(response.results.channels["email"].credit, 2.0 / 3.0));
    assert_eq!(response.results.total_revenue, 100.0);
}

#[test]
fn test_small_sample_insights() {
    let response = service()
        .analyze_uncached(&single_customer_table(), &AttributionRequest::new(ModelKind::Linear))
        .unwrap();
    let kinds: Vec<InsightKind> = response.insights.iter().map(|i| i.kind).collect();
    assert_eq!(kinds[0], InsightKind::TopChannel);
    assert!(kinds.contains(&InsightKind::SampleSize));
    assert!(kinds.contains(&InsightKind::LowConfidence));
}

#[tokio::test]
async fn test_concurrent_analyses_share_one_service() {
    let cache = Arc::new(ResultCache::in_memory(&AppConfig::default().cache));
    let service = Arc::new(service().with_cache(cache));
    let table = Arc::new(mixed_table());

    let handles: Vec<_> = ModelKind::ALL
        .into_iter()
        .map(|kind| {
            let service = service.clone();
            let table = table.clone();
            tokio::spawn(async move {
                service
                    .analyze(&table, &AttributionRequest::new(kind))
                    .await
            })
        })
        .collect();

    for handle in handles {
        let response = handle.await.unwrap().unwrap();
        let total: f64 = response.results.credits().values().sum();
        assert!(approx(total, 1.0));
    }
}

#[tokio::test]
async fn test_cached_replay_matches_fresh_result() {
    let cache = Arc::new(ResultCache::in_memory(&AppConfig::default().cache));
    let service = service().with_cache(cache);
    let request = AttributionRequest::new(ModelKind::Linear);
    let table = mixed_table();

    let fresh = service.analyze(&table, &request).await.unwrap();
    let replay = service.analyze(&table, &request).await.unwrap();
    assert!(replay.metadata.cached);
    assert_eq!(fresh.results, replay.results);
    assert_eq!(fresh.metadata.analysis_id, replay.metadata.analysis_id);
}
