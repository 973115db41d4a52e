//! Closed outcome type for C1 fetches — re-exported from the shared error
//! module so the pipeline, the session manager, and the client agree on
//! one classification.

pub use crate::error::UpstreamError as UpstreamOutcome;
