//! Confidence scoring for attribution results.

pub mod scorer;

pub use scorer::{ConfidenceBreakdown, ConfidenceScorer};
