//! Database Module
//!
//! # Module Structure
//! - `core`: GeoDB struct, open/create, stats
//! - `crud`: create/get/list/update/delete for points and polygons
//! - `spatial`: bounds, radius and containment queries (native or fallback)
//! - `filters`: category, layer group and value-range filters
//! - `transaction`: optimistic multi-operation transactions
//! - `import`: all-or-nothing batch polygon import

pub mod core;
pub mod crud;
pub mod filters;
pub mod import;
pub mod spatial;
pub mod transaction;

// Re-export main types
pub use core::{DatabaseStats, GeoDB};
pub use import::{ImportFeature, ImportRequest, ImportSummary};
pub use transaction::{Transaction, TransactionStats};
