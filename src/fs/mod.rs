//! Everything that touches the real filesystem: traversal policy, one-level
//! listing, recursive size aggregation, and filename search.

pub mod aggregator;
pub mod lister;
pub mod policy;
pub mod search;
