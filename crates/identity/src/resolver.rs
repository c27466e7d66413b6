//! Identity Resolution: linking-method selection and deterministic
//! partitioning of rows into per-customer groups.
//!
//! The partition is a derived index over row numbers. Touchpoints never carry
//! a back-pointer to their identity, so nothing needs invalidating when a new
//! table arrives.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use mta_core::config::IdentityConfig;
use mta_core::table::{Column, EventRow, EventTable};
use mta_core::types::LinkingMethod;

/// Key of the single group produced by aggregate linking.
pub const AGGREGATE_KEY: &str = "aggregate";

/// One resolved identity and the rows that belong to it, in table order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityGroup {
    pub key: String,
    pub rows: Vec<usize>,
}

/// Mapping of identity key to row indices. Groups keep first-appearance
/// order so downstream results do not depend on hashing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityPartition {
    method: LinkingMethod,
    groups: Vec<IdentityGroup>,
}

impl IdentityPartition {
    pub fn linking_method(&self) -> LinkingMethod {
        self.method
    }

    pub fn groups(&self) -> &[IdentityGroup] {
        &self.groups
    }

    pub fn get(&self, key: &str) -> Option<&IdentityGroup> {
        self.groups.iter().find(|g| g.key == key)
    }

    /// Number of identities.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total rows placed into some group.
    pub fn covered_rows(&self) -> usize {
        self.groups.iter().map(|g| g.rows.len()).sum()
    }

    /// Share of `row_count` rows that were linked to an identity.
    pub fn coverage(&self, row_count: usize) -> f64 {
        if row_count == 0 {
            return 0.0;
        }
        self.covered_rows() as f64 / row_count as f64
    }
}

/// Chooses a linking method and resolves identities with it.
#[derive(Debug, Clone, Default)]
pub struct IdentityResolver {
    config: IdentityConfig,
}

impl IdentityResolver {
    pub fn new(config: IdentityConfig) -> Self {
        Self { config }
    }

    /// Pick the strongest linking method the table supports.
    ///
    /// Customer ids win when more than the configured share of rows carries
    /// one; otherwise session+email, then email alone, then one aggregate
    /// identity for the whole table.
    pub fn select_method(&self, table: &EventTable) -> LinkingMethod {
        let method = if table.has_column(Column::CustomerId)
            && table.non_null_fraction(Column::CustomerId) > self.config.customer_id_min_coverage
        {
            LinkingMethod::CustomerId
        } else if table.has_column(Column::SessionId) && table.has_column(Column::Email) {
            LinkingMethod::SessionEmail
        } else if table.has_column(Column::Email) {
            LinkingMethod::EmailOnly
        } else {
            LinkingMethod::Aggregate
        };
        debug!(method = %method, rows = table.len(), "Selected linking method");
        method
    }

    /// Partition row indices by identity. Rows without usable identity
    /// evidence are dropped, except under aggregate linking where every row
    /// joins the one group.
    pub fn resolve(&self, table: &EventTable, method: LinkingMethod) -> IdentityPartition {
        let groups = match method {
            LinkingMethod::Aggregate => {
                if table.is_empty() {
                    Vec::new()
                } else {
                    vec![IdentityGroup {
                        key: AGGREGATE_KEY.to_string(),
                        rows: (0..table.len()).collect(),
                    }]
                }
            }
            _ => group_rows(table, |row| identity_key(row, method)),
        };

        let partition = IdentityPartition { method, groups };
        debug!(
            method = %method,
            identities = partition.len(),
            covered = partition.covered_rows(),
            dropped = table.len() - partition.covered_rows(),
            "Resolved identities"
        );
        partition
    }

    /// `select_method` followed by `resolve`.
    pub fn resolve_auto(&self, table: &EventTable) -> IdentityPartition {
        let method = self.select_method(table);
        self.resolve(table, method)
    }
}

fn identity_key(row: &EventRow, method: LinkingMethod) -> Option<String> {
    match method {
        LinkingMethod::CustomerId => row.get(Column::CustomerId).map(str::to_string),
        LinkingMethod::SessionEmail => {
            let session = row.get(Column::SessionId);
            let email = row.get(Column::Email);
            if session.is_none() && email.is_none() {
                return None;
            }
            Some(format!("{}:{}", session.unwrap_or(""), email.unwrap_or("")))
        }
        LinkingMethod::EmailOnly => row.get(Column::Email).map(str::to_string),
        LinkingMethod::Aggregate => Some(AGGREGATE_KEY.to_string()),
    }
}

fn group_rows(table: &EventTable, key_of: impl Fn(&EventRow) -> Option<String>) -> Vec<IdentityGroup> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<IdentityGroup> = Vec::new();

    for (row_idx, row) in table.rows().iter().enumerate() {
        let Some(key) = key_of(row) else {
            continue;
        };
        match index.get(&key) {
            Some(&slot) => groups[slot].rows.push(row_idx),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(IdentityGroup {
                    key,
                    rows: vec![row_idx],
                });
            }
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn row(customer: Option<&str>, session: Option<&str>, email: Option<&str>) -> EventRow {
        let mut r = EventRow::default()
            .with(Column::Timestamp, "2024-01-01")
            .with(Column::Channel, "email")
            .with(Column::EventType, "click");
        r.customer_id = customer.map(str::to_string);
        r.session_id = session.map(str::to_string);
        r.email = email.map(str::to_string);
        r
    }

    fn resolver() -> IdentityResolver {
        IdentityResolver::default()
    }

    #[test]
    fn test_customer_id_selected_above_threshold() {
        let rows = (0..10)
            .map(|i| row(if i == 0 { None } else { Some("C1") }, None, None))
            .collect();
        let table = EventTable::from_rows(rows);
        // 90% coverage
        assert_eq!(resolver().select_method(&table), LinkingMethod::CustomerId);
    }

    #[test]
    fn test_customer_id_at_threshold_falls_through() {
        let rows = (0..10)
            .map(|i| row(if i < 2 { None } else { Some("C1") }, None, Some("a@x.io")))
            .collect();
        let table = EventTable::from_rows(rows);
        // exactly 80% is not enough
        assert_eq!(resolver().select_method(&table), LinkingMethod::EmailOnly);
    }

    #[test]
    fn test_method_priority() {
        let session_email = EventTable::from_rows(vec![row(None, Some("s1"), Some("a@x.io"))]);
        assert_eq!(resolver().select_method(&session_email), LinkingMethod::SessionEmail);

        let email = EventTable::from_rows(vec![row(None, None, Some("a@x.io"))]);
        assert_eq!(resolver().select_method(&email), LinkingMethod::EmailOnly);

        let bare = EventTable::from_rows(vec![row(None, None, None)]);
        assert_eq!(resolver().select_method(&bare), LinkingMethod::Aggregate);
    }

    #[test]
    fn test_threshold_is_configurable() {
        let rows = (0..10)
            .map(|i| row(if i < 5 { None } else { Some("C1") }, None, None))
            .collect();
        let table = EventTable::from_rows(rows);
        let lenient = IdentityResolver::new(IdentityConfig {
            customer_id_min_coverage: 0.4,
        });
        assert_eq!(lenient.select_method(&table), LinkingMethod::CustomerId);
        assert_eq!(resolver().select_method(&table), LinkingMethod::Aggregate);
    }

    #[test]
    fn test_customer_id_drops_rows_without_id() {
        let table = EventTable::from_rows(vec![
            row(Some("C1"), None, None),
            row(Some("C2"), None, None),
            row(None, None, None),
            row(Some("C1"), None, None),
            row(Some("nan"), None, None),
        ]);
        let partition = resolver().resolve(&table, LinkingMethod::CustomerId);
        assert_eq!(partition.len(), 2);
        assert_eq!(partition.get("C1").unwrap().rows, vec![0, 3]);
        assert_eq!(partition.get("C2").unwrap().rows, vec![1]);
        assert_eq!(partition.covered_rows(), 3);
        assert!((partition.coverage(table.len()) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_session_email_composite_key() {
        let table = EventTable::from_rows(vec![
            row(None, Some("s1"), Some("a@x.io")),
            row(None, Some("s1"), None),
            row(None, None, Some("a@x.io")),
            row(None, None, None),
            row(None, Some("s1"), Some("a@x.io")),
        ]);
        let partition = resolver().resolve(&table, LinkingMethod::SessionEmail);
        let keys: Vec<&str> = partition.groups().iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["s1:a@x.io", "s1:", ":a@x.io"]);
        assert_eq!(partition.get("s1:a@x.io").unwrap().rows, vec![0, 4]);
        assert_eq!(partition.covered_rows(), 4);
    }

    #[test]
    fn test_aggregate_keeps_every_row() {
        let table = EventTable::from_rows(vec![row(None, None, None), row(None, None, None)]);
        let partition = resolver().resolve(&table, LinkingMethod::Aggregate);
        assert_eq!(partition.len(), 1);
        assert_eq!(partition.groups()[0].key, AGGREGATE_KEY);
        assert_eq!(partition.groups()[0].rows, vec![0, 1]);

        let empty = resolver().resolve(&EventTable::default(), LinkingMethod::Aggregate);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_partition_is_disjoint_and_complete() {
        let table = EventTable::from_rows(
            (0..50)
                .map(|i| {
                    let email = format!("user{}@x.io", i % 7);
                    row(None, None, if i % 5 == 0 { None } else { Some(email.as_str()) })
                })
                .collect(),
        );
        let partition = resolver().resolve_auto(&table);
        assert_eq!(partition.linking_method(), LinkingMethod::EmailOnly);

        let mut seen = HashSet::new();
        for group in partition.groups() {
            for &idx in &group.rows {
                assert!(seen.insert(idx), "row {idx} appears in two groups");
            }
        }
        let expected: HashSet<usize> = (0..50).filter(|i| i % 5 != 0).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_partition_serializes() {
        let table = EventTable::from_rows(vec![row(Some("C1"), None, None)]);
        let partition = resolver().resolve(&table, LinkingMethod::CustomerId);
        let json = serde_json::to_string(&partition).unwrap();
        assert!(json.contains("customer_id"));
        assert!(json.contains("C1"));
    }
}
