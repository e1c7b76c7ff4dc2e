//! `EffectDriver` — the boundary the facade calls out through to actually
//! perform a Pass-disposed effect (shell out, call an API, write a file).
//! Grounded on the teacher's executor-loop shape: the driver is handed an
//! already-admitted `Effect` and returns an outcome classified the same way
//! `kernel_store::engine::ExecutionOutcome` is, so the facade never has to
//! translate between two different notions of success/failure.

use kernel_core::Effect;
use kernel_store::ExecutionErrorCategory;
use kernel_tape::EntryMetadata;

/// What a driver invocation produced, before it is folded into a Receipt.
/// `metadata` is mandatory on both arms because every tape entry the
/// facade records carries a data classification, residency region,
/// encryption, and retention basis — the driver is the only party that
/// knows what kind of data its own output is.
pub enum DriverOutcome {
    Success { output: Vec<u8>, blob: Option<Vec<u8>>, metadata: EntryMetadata },
    Failure { category: ExecutionErrorCategory, reason: String, metadata: EntryMetadata },
}

/// Implemented once per tool surface (shell, HTTP, file I/O, ...) and
/// handed to `Kernel::open`. Must not block indefinitely: the dispatch
/// loop is single-threaded per `Kernel` instance, so a hung driver stalls
/// every subsequent `apply`.
pub trait EffectDriver: Send + Sync {
    fn invoke(&self, effect: &Effect) -> DriverOutcome;
}
