//! Deterministic Outbox backoff (§4.7 "Retry and backoff", §8 property 10).
//!
//! `delay(P,E,i,H) = min(MaxMs, BaseMs · 2^i) + jitter(P,E,i,H)` where the
//! jitter term is `SHA-256(P|E|i|H) mod MaxJitterMs`. A pure function of its
//! four inputs: two replayers computing the same `(policy_id, effect_id,
//! attempt, env_hash)` derive byte-identical schedules.

use kernel_core::constants::{BACKOFF_BASE_MS, BACKOFF_MAX_JITTER_MS, BACKOFF_MAX_MS};
use kernel_core::ContentHash;
use sha2::{Digest, Sha256};

/// Compute the backoff delay, in milliseconds, before attempt `i` of
/// dispatching effect `effect_id` under `policy_id` with environment
/// snapshot hash `env_hash`.
pub fn delay_ms(policy_id: &str, effect_id: &str, attempt: u32, env_hash: &ContentHash) -> u64 {
    let base = BACKOFF_BASE_MS.saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX));
    let capped = base.min(BACKOFF_MAX_MS);
    capped.saturating_add(jitter_ms(policy_id, effect_id, attempt, env_hash))
}

fn jitter_ms(policy_id: &str, effect_id: &str, attempt: u32, env_hash: &ContentHash) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(policy_id.as_bytes());
    hasher.update(b"|");
    hasher.update(effect_id.as_bytes());
    hasher.update(b"|");
    hasher.update(attempt.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(env_hash.to_string().as_bytes());
    let digest = hasher.finalize();

    // Reduce the first 8 bytes of the digest mod MaxJitterMs. The digest is
    // uniformly distributed, so this biases the result only negligibly for
    // any MaxJitterMs well below 2^64.
    let mut be = [0u8; 8];
    be.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(be) % BACKOFF_MAX_JITTER_MS
}
