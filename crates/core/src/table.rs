//! Tabular event log as handed over by the table loader.
//!
//! Cells stay as raw text until validation and journey construction parse
//! them, so every malformed value can be reported back in one batch.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::parse_timestamp;

/// Known columns of the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Timestamp,
    Channel,
    EventType,
    CustomerId,
    SessionId,
    Email,
    CampaignId,
    CreativeId,
    Cost,
    ConversionValue,
}

impl Column {
    pub const ALL: [Column; 10] = [
        Column::Timestamp,
        Column::Channel,
        Column::EventType,
        Column::CustomerId,
        Column::SessionId,
        Column::Email,
        Column::CampaignId,
        Column::CreativeId,
        Column::Cost,
        Column::ConversionValue,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Column::Timestamp => "timestamp",
            Column::Channel => "channel",
            Column::EventType => "event_type",
            Column::CustomerId => "customer_id",
            Column::SessionId => "session_id",
            Column::Email => "email",
            Column::CampaignId => "campaign_id",
            Column::CreativeId => "creative_id",
            Column::Cost => "cost",
            Column::ConversionValue => "conversion_value",
        }
    }

    /// Resolve a raw header after normalization. Unknown headers are `None`.
    pub fn from_name(raw: &str) -> Option<Self> {
        let name = normalize_column_name(raw);
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

/// Trim, lowercase, and fold spaces and dashes into underscores.
pub fn normalize_column_name(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

/// Cells the loader could not fill in. Blank text and the usual dataframe
/// null markers all count.
fn is_null_cell(value: &str) -> bool {
    let v = value.trim();
    v.is_empty()
        || v.eq_ignore_ascii_case("nan")
        || v.eq_ignore_ascii_case("null")
        || v.eq_ignore_ascii_case("none")
}

/// One raw row of the event log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    pub timestamp: Option<String>,
    pub channel: Option<String>,
    pub event_type: Option<String>,
    pub customer_id: Option<String>,
    pub session_id: Option<String>,
    pub email: Option<String>,
    pub campaign_id: Option<String>,
    pub creative_id: Option<String>,
    pub cost: Option<String>,
    pub conversion_value: Option<String>,
}

impl EventRow {
    fn slot(&self, column: Column) -> &Option<String> {
        match column {
            Column::Timestamp => &self.timestamp,
            Column::Channel => &self.channel,
            Column::EventType => &self.event_type,
            Column::CustomerId => &self.customer_id,
            Column::SessionId => &self.session_id,
            Column::Email => &self.email,
            Column::CampaignId => &self.campaign_id,
            Column::CreativeId => &self.creative_id,
            Column::Cost => &self.cost,
            Column::ConversionValue => &self.conversion_value,
        }
    }

    fn slot_mut(&mut self, column: Column) -> &mut Option<String> {
        match column {
            Column::Timestamp => &mut self.timestamp,
            Column::Channel => &mut self.channel,
            Column::EventType => &mut self.event_type,
            Column::CustomerId => &mut self.customer_id,
            Column::SessionId => &mut self.session_id,
            Column::Email => &mut self.email,
            Column::CampaignId => &mut self.campaign_id,
            Column::CreativeId => &mut self.creative_id,
            Column::Cost => &mut self.cost,
            Column::ConversionValue => &mut self.conversion_value,
        }
    }

    /// Non-null cell value, trimmed.
    pub fn get(&self, column: Column) -> Option<&str> {
        self.slot(column)
            .as_deref()
            .filter(|v| !is_null_cell(v))
            .map(str::trim)
    }

    pub fn set(&mut self, column: Column, value: Option<String>) {
        *self.slot_mut(column) = value;
    }

    pub fn with(mut self, column: Column, value: impl Into<String>) -> Self {
        self.set(column, Some(value.into()));
        self
    }
}

/// The event log: which columns exist plus the rows themselves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventTable {
    columns: BTreeSet<Column>,
    rows: Vec<EventRow>,
}

impl EventTable {
    /// Build a table with an explicit column set, as a loader that read the
    /// header would.
    pub fn new(columns: impl IntoIterator<Item = Column>, rows: Vec<EventRow>) -> Self {
        Self {
            columns: columns.into_iter().collect(),
            rows,
        }
    }

    /// Build a table whose columns are every field any row carries.
    pub fn from_rows(rows: Vec<EventRow>) -> Self {
        let columns = Column::ALL
            .into_iter()
            .filter(|&c| rows.iter().any(|r| r.slot(c).is_some()))
            .collect();
        Self { columns, rows }
    }

    /// Build a table from decoded JSON records. Header names are normalized,
    /// unknown keys are ignored, scalars are kept as their text form.
    pub fn from_records(records: &[serde_json::Map<String, serde_json::Value>]) -> Self {
        let mut columns = BTreeSet::new();
        let rows = records
            .iter()
            .map(|record| {
                let mut row = EventRow::default();
                for (key, value) in record {
                    let Some(column) = Column::from_name(key) else {
                        continue;
                    };
                    columns.insert(column);
                    let cell = match value {
                        serde_json::Value::Null => None,
                        serde_json::Value::String(s) => Some(s.clone()),
                        other => Some(other.to_string()),
                    };
                    row.set(column, cell);
                }
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn has_column(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    pub fn columns(&self) -> impl Iterator<Item = Column> + '_ {
        self.columns.iter().copied()
    }

    pub fn rows(&self) -> &[EventRow] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&EventRow> {
        self.rows.get(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Fraction of rows with a non-null value in `column`. Zero when the
    /// column is absent or the table is empty.
    pub fn non_null_fraction(&self, column: Column) -> f64 {
        if self.rows.is_empty() || !self.has_column(column) {
            return 0.0;
        }
        let present = self.rows.iter().filter(|r| r.get(column).is_some()).count();
        present as f64 / self.rows.len() as f64
    }

    /// Earliest and latest parseable timestamps.
    pub fn time_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let mut stamps = self
            .rows
            .iter()
            .filter_map(|r| r.get(Column::Timestamp).and_then(parse_timestamp));
        let first = stamps.next()?;
        Some(stamps.fold((first, first), |(lo, hi), ts| (lo.min(ts), hi.max(ts))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_column_name() {
        assert_eq!(normalize_column_name("  Customer ID "), "customer_id");
        assert_eq!(normalize_column_name("Event-Type"), "event_type");
        assert_eq!(Column::from_name("Conversion Value"), Some(Column::ConversionValue));
        assert_eq!(Column::from_name("utm_source"), None);
    }

    #[test]
    fn test_null_markers_are_not_values() {
        let row = EventRow::default()
            .with(Column::Email, "NaN")
            .with(Column::CustomerId, "  ")
            .with(Column::Channel, " email ");
        assert_eq!(row.get(Column::Email), None);
        assert_eq!(row.get(Column::CustomerId), None);
        assert_eq!(row.get(Column::Channel), Some("email"));
    }

    #[test]
    fn test_from_rows_infers_columns() {
        let table = EventTable::from_rows(vec![
            EventRow::default().with(Column::Timestamp, "2024-01-01"),
            EventRow::default().with(Column::Email, "a@x.io"),
        ]);
        assert!(table.has_column(Column::Timestamp));
        assert!(table.has_column(Column::Email));
        assert!(!table.has_column(Column::CustomerId));
        assert_eq!(table.non_null_fraction(Column::Email), 0.5);
        assert_eq!(table.non_null_fraction(Column::CustomerId), 0.0);
    }

    #[test]
    fn test_from_records_normalizes_and_stringifies() {
        let records = vec![
            json!({"Timestamp": "2024-01-02", "Channel": "email", "Conversion Value": 12.5, "utm": "x"}),
            json!({"Timestamp": "2024-01-01", "Channel": "social", "Customer ID": null}),
        ];
        let records: Vec<_> = records
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect();
        let table = EventTable::from_records(&records);

        assert_eq!(table.len(), 2);
        assert!(table.has_column(Column::CustomerId));
        assert_eq!(table.rows()[0].get(Column::ConversionValue), Some("12.5"));
        assert_eq!(table.rows()[1].get(Column::CustomerId), None);

        let (start, end) = table.time_range().unwrap();
        assert!(start < end);
    }

    #[test]
    fn test_empty_table() {
        let table = EventTable::default();
        assert!(table.is_empty());
        assert!(table.time_range().is_none());
        assert_eq!(table.non_null_fraction(Column::Timestamp), 0.0);
    }
}
