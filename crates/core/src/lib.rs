//! Shared building blocks for the attribution pipeline: configuration,
//! error types, the raw event table, touchpoint parsing, input validation and
//! data-quality assessment.

pub mod config;
pub mod error;
pub mod quality;
pub mod table;
pub mod types;
pub mod validation;

pub use config::AppConfig;
pub use error::{AttributionError, AttributionResult};
pub use quality::DataQuality;
pub use table::{Column, EventRow, EventTable};
pub use types::{EventKind, LinkingMethod, ModelKind, ModelParams, Touchpoint};
pub use validation::{IssueCode, ValidationIssue};
