//! Canonical Normalization & Hashing (CSNF + JCS).
//!
//! Turns arbitrary structured input into a canonical byte form and a content
//! hash such that equivalent inputs produce byte-identical output on any
//! platform. Two stages: CSNF normalization (NFC strings, integer-only
//! numbers, explicit array kind, duplicate-key rejection), then JCS
//! (RFC 8785) emission — sorted object keys, no insignificant whitespace,
//! shortest round-tripping integer form.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

use crate::error::KernelError;
use crate::types::ContentHash;

/// The closed grammar every audit-path value is reduced to:
/// `null | bool | int64 | string | [Value] | {string -> Value}`.
///
/// Fractional numbers are forbidden. Arrays carry an explicit kind: `Ordered`
/// preserves insertion order, `Set` is sorted (and optionally deduped) by an
/// optional JSON-pointer sort key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Canonical {
    Null,
    Bool(bool),
    Int(i64),
    String(String),
    Array(Vec<Canonical>),
    Map(BTreeMap<String, Canonical>),
}

impl Canonical {
    pub fn map() -> Self {
        Canonical::Map(BTreeMap::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Canonical) -> Result<(), KernelError> {
        match self {
            Canonical::Map(m) => {
                let key = key.into();
                if m.contains_key(&key) {
                    return Err(KernelError::DuplicateKey(key));
                }
                m.insert(key, value);
                Ok(())
            }
            _ => Err(KernelError::UnsupportedType("insert on non-map Canonical".into())),
        }
    }

    /// Normalize an arbitrary `serde_json::Value` into CSNF form.
    ///
    /// Numbers that carry a fractional component are rejected with
    /// `FRACTIONAL_NUMBER`; integral floats (e.g. `2.0`) are coerced to
    /// `i64`. Object keys are required to be valid UTF-8 (guaranteed by
    /// `serde_json::Value` already) and duplicates are rejected. Strings are
    /// normalized to NFC. Arrays are treated as `Ordered` by default — call
    /// sites that need `Set` semantics sort/dedupe before handing the value
    /// here, since `serde_json::Value` has no array-kind metadata of its own.
    pub fn normalize(value: &serde_json::Value) -> Result<Canonical, KernelError> {
        match value {
            serde_json::Value::Null => Ok(Canonical::Null),
            serde_json::Value::Bool(b) => Ok(Canonical::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Canonical::Int(i))
                } else if let Some(f) = n.as_f64() {
                    if f.fract() == 0.0 && f.is_finite() && f.abs() < i64::MAX as f64 {
                        Ok(Canonical::Int(f as i64))
                    } else {
                        Err(KernelError::FractionalNumber(n.to_string()))
                    }
                } else {
                    Err(KernelError::FractionalNumber(n.to_string()))
                }
            }
            serde_json::Value::String(s) => Ok(Canonical::String(s.nfc().collect())),
            serde_json::Value::Array(arr) => {
                let mut out = Vec::with_capacity(arr.len());
                for v in arr {
                    out.push(Canonical::normalize(v)?);
                }
                Ok(Canonical::Array(out))
            }
            serde_json::Value::Object(obj) => {
                let mut map = BTreeMap::new();
                for (k, v) in obj {
                    let key: String = k.nfc().collect();
                    if map.contains_key(&key) {
                        return Err(KernelError::DuplicateKey(key));
                    }
                    map.insert(key, Canonical::normalize(v)?);
                }
                Ok(Canonical::Map(map))
            }
        }
    }

    /// Emit RFC 8785 canonical JSON bytes: sorted keys (guaranteed here by
    /// `BTreeMap`'s iteration order over UTF-8 byte-ordered `String` keys),
    /// no insignificant whitespace, shortest integer form, no HTML escaping.
    pub fn to_jcs_bytes(&self) -> Vec<u8> {
        let mut out = String::new();
        self.write_jcs(&mut out);
        out.into_bytes()
    }

    fn write_jcs(&self, out: &mut String) {
        match self {
            Canonical::Null => out.push_str("null"),
            Canonical::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Canonical::Int(i) => {
                let _ = write!(out, "{i}");
            }
            Canonical::String(s) => write_jcs_string(s, out),
            Canonical::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    item.write_jcs(out);
                }
                out.push(']');
            }
            Canonical::Map(map) => {
                out.push('{');
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    write_jcs_string(k, out);
                    out.push(':');
                    v.write_jcs(out);
                }
                out.push('}');
            }
        }
    }

    /// SHA-256 of the JCS-emitted bytes.
    pub fn content_hash(&self) -> ContentHash {
        let bytes = self.to_jcs_bytes();
        let digest = Sha256::digest(&bytes);
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&digest);
        ContentHash::from_bytes(arr)
    }
}

/// Escape a string per RFC 8785 §3.2.2.2 (minimal escaping, no HTML entities).
fn write_jcs_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Convenience: normalize then hash a `serde_json::Value` in one call.
pub fn canonicalize(value: &serde_json::Value) -> Result<(Canonical, ContentHash), KernelError> {
    let canon = Canonical::normalize(value)?;
    let hash = canon.content_hash();
    Ok((canon, hash))
}
