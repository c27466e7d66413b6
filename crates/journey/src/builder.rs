use tracing::{debug, warn};

use mta_core::error::{AttributionError, AttributionResult};
use mta_core::table::EventTable;
use mta_core::types::Touchpoint;
use mta_core::validation::ValidationIssue;
use mta_identity::IdentityPartition;

use crate::types::Journey;

/// Builds one journey per identity group. Stateless; each call owns the
/// journeys it returns.
#[derive(Debug, Clone, Default)]
pub struct JourneyBuilder;

impl JourneyBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Convert every group of the partition into a journey.
    ///
    /// Any row that fails to parse fails the whole build; all such rows are
    /// reported together.
    pub fn build(
        &self,
        table: &EventTable,
        partition: &IdentityPartition,
    ) -> AttributionResult<Vec<Journey>> {
        let mut journeys = Vec::with_capacity(partition.len());
        let mut issues: Vec<ValidationIssue> = Vec::new();

        for group in partition.groups() {
            let mut touchpoints = Vec::with_capacity(group.rows.len());
            for &idx in &group.rows {
                let Some(row) = table.row(idx) else {
                    warn!(identity = %group.key, row = idx, "Identity group references a missing row");
                    continue;
                };
                match Touchpoint::from_row(row, idx) {
                    Ok(tp) => touchpoints.push(tp),
                    Err(row_issues) => issues.extend(row_issues),
                }
            }
            journeys.push(Journey::new(group.key.clone(), touchpoints));
        }

        if !issues.is_empty() {
            return Err(AttributionError::Validation(issues));
        }

        debug!(
            journeys = journeys.len(),
            converting = journeys.iter().filter(|j| j.has_conversion()).count(),
            "Built journeys"
        );
        Ok(journeys)
    }
}
