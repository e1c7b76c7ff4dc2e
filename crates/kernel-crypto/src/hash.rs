use kernel_core::ContentHash;
use sha2::{Digest, Sha256};

/// SHA-256 of arbitrary bytes.
pub fn sha256_hash(data: &[u8]) -> ContentHash {
    let digest = Sha256::digest(data);
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&digest);
    ContentHash::from_bytes(arr)
}

/// The ledger entry hash preimage `H(sequence, type, payload_hash,
/// prev_hash)` (§4.4, §6 "bit-exact surfaces": `{"seq","type","data","prev"}`
/// in that key order after JCS).
pub fn ledger_entry_hash(sequence: u64, entry_type: &str, payload_hash: &ContentHash, prev_hash: &str) -> ContentHash {
    // Emitted by hand in the mandated key order; JCS would re-sort these
    // keys alphabetically ("data","prev","seq","type"), which is not the
    // preimage order the wire contract requires.
    let preimage = format!(
        "{{\"seq\":{},\"type\":\"{}\",\"data\":\"{}\",\"prev\":\"{}\"}}",
        sequence,
        entry_type,
        payload_hash,
        prev_hash,
    );
    sha256_hash(preimage.as_bytes())
}
