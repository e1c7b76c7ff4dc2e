//! The Obligation Engine (§4.9) — durable units of work with cooperative
//! advisory leases, carried from PENDING through ACTIVE to SATISFIED, FAILED,
//! or ESCALATED. `engine` owns the state-machine transitions; `query` is the
//! read-only lookup surface other crates use without needing a mutable
//! handle on the engine itself.

pub mod engine;
pub mod error;
pub mod query;

pub use engine::ObligationEngine;
pub use error::ObligationError;
pub use query::ObligationQuery;
