use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AttributionError;
use crate::table::{Column, EventRow};
use crate::validation::{IssueCode, ValidationIssue};

/// Kind of marketing event recorded on a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    View,
    Click,
    Conversion,
    Purchase,
    Signup,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::View,
        EventKind::Click,
        EventKind::Conversion,
        EventKind::Purchase,
        EventKind::Signup,
    ];

    /// Exact (case-insensitive) match on one of the five canonical labels.
    pub fn parse(label: &str) -> Option<Self> {
        let label = label.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|k| k.as_str() == label)
    }

    /// Lenient mapping used when building touchpoints: known aliases are
    /// folded onto the canonical kinds and anything unrecognised is a view.
    pub fn from_label(label: &str) -> Self {
        if let Some(kind) = Self::parse(label) {
            return kind;
        }
        match label.trim().to_ascii_lowercase().as_str() {
            "impression" | "visit" | "pageview" => EventKind::View,
            "ctr" => EventKind::Click,
            "convert" | "sale" => EventKind::Conversion,
            "buy" => EventKind::Purchase,
            "register" => EventKind::Signup,
            _ => EventKind::View,
        }
    }

    /// Only conversions and purchases count toward journey totals.
    pub fn is_conversion(self) -> bool {
        matches!(self, EventKind::Conversion | EventKind::Purchase)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::View => "view",
            EventKind::Click => "click",
            EventKind::Conversion => "conversion",
            EventKind::Purchase => "purchase",
            EventKind::Signup => "signup",
        }
    }
}

/// One parsed marketing interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Touchpoint {
    pub timestamp: DateTime<Utc>,
    pub channel: String,
    pub event_kind: EventKind,
    pub customer_id: Option<String>,
    pub session_id: Option<String>,
    pub email: Option<String>,
    pub campaign_id: Option<String>,
    pub creative_id: Option<String>,
    pub cost: Option<f64>,
    pub conversion_value: Option<f64>,
}

impl Touchpoint {
    /// Parse a raw table row. Every problem on the row is reported, not just
    /// the first one.
    pub fn from_row(row: &EventRow, index: usize) -> Result<Self, Vec<ValidationIssue>> {
        let mut issues = Vec::new();

        let timestamp = match row.get(Column::Timestamp) {
            Some(raw) => match parse_timestamp(raw) {
                Some(ts) => Some(ts),
                None => {
                    issues.push(ValidationIssue::row(
                        Column::Timestamp,
                        index,
                        IssueCode::InvalidTimestamp,
                        format!("'{raw}' is not a recognised timestamp"),
                        Some(raw),
                    ));
                    None
                }
            },
            None => {
                issues.push(ValidationIssue::missing_value(Column::Timestamp, index));
                None
            }
        };

        let channel = row.get(Column::Channel).map(str::trim).filter(|c| !c.is_empty());
        if channel.is_none() {
            issues.push(ValidationIssue::missing_value(Column::Channel, index));
        }

        let cost = parse_amount(row, Column::Cost, index, &mut issues);
        let conversion_value = parse_amount(row, Column::ConversionValue, index, &mut issues);

        match (timestamp, channel) {
            (Some(timestamp), Some(channel)) if issues.is_empty() => Ok(Touchpoint {
                timestamp,
                channel: channel.to_string(),
                event_kind: row
                    .get(Column::EventType)
                    .map(EventKind::from_label)
                    .unwrap_or(EventKind::View),
                customer_id: row.get(Column::CustomerId).map(str::to_string),
                session_id: row.get(Column::SessionId).map(str::to_string),
                email: row.get(Column::Email).map(str::to_string),
                campaign_id: row.get(Column::CampaignId).map(str::to_string),
                creative_id: row.get(Column::CreativeId).map(str::to_string),
                cost,
                conversion_value,
            }),
            _ => Err(issues),
        }
    }

    pub fn is_conversion(&self) -> bool {
        self.event_kind.is_conversion()
    }
}

fn parse_amount(
    row: &EventRow,
    column: Column,
    index: usize,
    issues: &mut Vec<ValidationIssue>,
) -> Option<f64> {
    let raw = row.get(column)?;
    match raw.trim().parse::<f64>() {
        Ok(value) if !value.is_finite() => {
            issues.push(ValidationIssue::row(
                column,
                index,
                IssueCode::InvalidNumber,
                format!("'{raw}' is not a finite number"),
                Some(raw),
            ));
            None
        }
        Ok(value) if value < 0.0 => {
            issues.push(ValidationIssue::row(
                column,
                index,
                IssueCode::NegativeValue,
                format!("{value} must not be negative"),
                Some(raw),
            ));
            None
        }
        Ok(value) => Some(value),
        Err(_) => {
            issues.push(ValidationIssue::row(
                column,
                index,
                IssueCode::InvalidNumber,
                format!("'{raw}' is not numeric"),
                Some(raw),
            ));
            None
        }
    }
}

/// Parse a timestamp cell into an absolute instant.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]`, `YYYY-MM-DDTHH:MM:SS[.f]`
/// and bare dates. Naive values are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Rule deciding which touchpoints share an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkingMethod {
    CustomerId,
    SessionEmail,
    EmailOnly,
    Aggregate,
}

impl LinkingMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkingMethod::CustomerId => "customer_id",
            LinkingMethod::SessionEmail => "session_email",
            LinkingMethod::EmailOnly => "email_only",
            LinkingMethod::Aggregate => "aggregate",
        }
    }
}

impl fmt::Display for LinkingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag selecting an attribution model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    FirstTouch,
    LastTouch,
    Linear,
    TimeDecay,
    PositionBased,
}

impl ModelKind {
    pub const ALL: [ModelKind; 5] = [
        ModelKind::FirstTouch,
        ModelKind::LastTouch,
        ModelKind::Linear,
        ModelKind::TimeDecay,
        ModelKind::PositionBased,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModelKind::FirstTouch => "first_touch",
            ModelKind::LastTouch => "last_touch",
            ModelKind::Linear => "linear",
            ModelKind::TimeDecay => "time_decay",
            ModelKind::PositionBased => "position_based",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = AttributionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_lowercase().replace('-', "_");
        ModelKind::ALL
            .into_iter()
            .find(|k| k.as_str() == tag)
            .ok_or_else(|| {
                let valid: Vec<&str> = ModelKind::ALL.iter().map(|k| k.as_str()).collect();
                AttributionError::InvalidConfig(format!(
                    "unknown attribution model '{s}', expected one of: {}",
                    valid.join(", ")
                ))
            })
    }
}

/// Optional per-request model parameters. Unset values fall back to the
/// configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub half_life_days: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_touch_weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_touch_weight: Option<f64>,
}
