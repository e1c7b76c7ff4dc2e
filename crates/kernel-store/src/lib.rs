pub mod db;
pub mod engine;
pub mod outbox;
pub mod query;

pub use db::Store;
pub use engine::{ExecutionError, ExecutionErrorCategory, ExecutionOutcome, KernelEngine};
pub use outbox::{OutboxEntry, OutboxStatus};
pub use query::LedgerQuery;
