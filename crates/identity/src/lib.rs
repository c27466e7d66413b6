//! Identity resolution: decides which touchpoints belong to the same
//! customer and partitions the event log accordingly.

pub mod resolver;

pub use resolver::{IdentityGroup, IdentityPartition, IdentityResolver, AGGREGATE_KEY};
