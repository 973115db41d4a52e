//! Handler modules for the mutual-followers analysis API.
//!
//! - `users` — upsert and balance lookup
//! - `checks` — job admission, status polling, history
//! - `tariffs` — active tariff listing
//! - `payments` — native-currency payment lifecycle + external acquirer callback
//! - `admin` — session inspection/override, dashboards
//! - `health` — health and readiness

pub mod admin;
pub mod checks;
pub mod health;
pub mod payments;
pub mod tariffs;
pub mod users;

pub use admin::*;
pub use checks::*;
pub use health::*;
pub use payments::*;
pub use tariffs::*;
pub use users::*;
