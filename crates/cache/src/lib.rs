#![warn(clippy::unwrap_used)]

pub mod client;
pub mod key;
pub mod local;

pub use client::{CacheStats, ResultCache};
pub use key::result_key;
pub use local::LocalCache;
