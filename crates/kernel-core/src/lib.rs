pub mod budget;
pub mod canonical;
pub mod constants;
pub mod decision;
pub mod effect;
pub mod error;
pub mod ledger;
pub mod obligation;
pub mod policy;
pub mod reason_code;
pub mod receipt;
pub mod tape;
pub mod types;

pub use budget::Budget;
pub use canonical::{canonicalize, Canonical};
pub use decision::{DecisionRecord, Verdict};
pub use effect::Effect;
pub use error::KernelError;
pub use ledger::{LedgerEntry, LedgerType};
pub use obligation::{Attempt, Obligation, ObligationStatus};
pub use policy::{DataPolicy, EnforcementMode, NetworkPolicy, PerimeterPolicy, TemporalPolicy, ToolsPolicy};
pub use reason_code::ReasonCode;
pub use receipt::{Receipt, ReceiptStatus};
pub use tape::{TapeEntry, TapeEntryType, TapeManifest, TapeManifestEntry};
pub use types::*;
