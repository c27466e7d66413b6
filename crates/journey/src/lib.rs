//! Journey construction: turns an identity partition into one time-ordered
//! customer journey per identity. Also descriptive journey analysis.

pub mod analysis;
pub mod builder;
pub mod types;

pub use builder::JourneyBuilder;
pub use types::Journey;
