//! ─── Governance Kernel Constants ────────────────────────────────────────────

// ── Obligation Engine (§4.9) ──────────────────────────────────────────────────

/// Default number of failed attempts before an obligation escalates.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default advisory lease duration for a freshly-leased obligation.
pub const DEFAULT_LEASE_DURATION_SECS: i64 = 30;

// ── Outbox backoff (§4.7) ─────────────────────────────────────────────────────

/// Base delay for attempt 0 of the exponential backoff schedule.
pub const BACKOFF_BASE_MS: u64 = 200;

/// Upper bound on any single computed delay, regardless of attempt count.
pub const BACKOFF_MAX_MS: u64 = 60_000;

/// Upper bound (exclusive) on the deterministic jitter added to each delay.
pub const BACKOFF_MAX_JITTER_MS: u64 = 250;

// ── Rate limiting (§5, Open Question 3 — sliding, not tumbling) ─────────────

/// Sliding window width for per-connector / per-tenant rate limits.
pub const RATE_LIMIT_WINDOW_SECS: i64 = 60;

/// Default maximum passes per window absent an explicit policy override.
pub const DEFAULT_RATE_LIMIT_MAX_PER_WINDOW: u32 = 120;

// ── Budget (§3 Budget, §4.6 step 2) ───────────────────────────────────────────

pub const DEFAULT_DAILY_LIMIT: i64 = 1_000;
pub const DEFAULT_MONTHLY_LIMIT: i64 = 20_000;

// ── Evidence bundle (§4.10) ───────────────────────────────────────────────────

/// Manifest schema version embedded in every exported bundle.
pub const EVIDENCE_MANIFEST_VERSION: u32 = 1;

/// Fixed file mode for ordinary files inside an exported archive.
pub const TAR_FILE_MODE: u32 = 0o644;

/// Fixed file mode for directories inside an exported archive.
pub const TAR_DIR_MODE: u32 = 0o755;
