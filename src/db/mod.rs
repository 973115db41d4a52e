//! Explicit query/update statements, one file per entity. Rows are plain
//! data (`models.rs`); relationships are resolved here via foreign-key
//! columns and joins, never via navigable references.

pub mod credentials;
pub mod jobs;
pub mod non_mutual;
pub mod payments;
pub mod referrals;
pub mod sessions;
pub mod tariffs;
pub mod users;
