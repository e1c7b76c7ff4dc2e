//! The VCR Tape (§4.3) — captures every nondeterministic input a run makes
//! (`recorder`), serves them back fail-closed during replay (`replayer`),
//! and commits to them by content (`manifest`). `query` is the read-only
//! lookup surface other crates use without needing a `TapeRecorder` handle.

pub mod error;
pub mod manifest;
pub mod query;
pub mod recorder;
pub mod replayer;

pub use error::TapeError;
pub use manifest::{build_manifest, verify_integrity, write as write_manifest};
pub use query::TapeQuery;
pub use recorder::{EntryMetadata, TapeRecorder};
pub use replayer::TapeReplayer;
