//! Attribution credit assignment: five interchangeable credit rules over a
//! single journey, and aggregation of their output across journeys.

pub mod aggregate;
pub mod model;

pub use aggregate::{aggregate, AggregateAttribution, ChannelCredit};
pub use model::{AttributionModel, CreditMap};
