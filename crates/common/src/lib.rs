//! Query building, caching and result shaping for the Squid bridge dashboard.
//!
//! Every dashboard section follows the same chain: collect parameters, build a
//! report query, fetch it through the [`cache::ResultCache`], then reshape the
//! returned [`table::ResultTable`] for display.

pub mod assets;
pub mod buckets;
pub mod cache;
pub mod chains;
pub mod config;
pub mod error;
pub mod numeric;
pub mod observability;
pub mod query;
pub mod shaper;
pub mod table;
pub mod types;
pub mod warehouse;
