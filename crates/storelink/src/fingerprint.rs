//! Configuration fingerprints
//!
//! A fingerprint is a SHA-256 digest over the normalized fields of a backend
//! configuration. Multi-valued fields are sorted and fields are sorted by key
//! before hashing, so insertion order never changes the result.

use sha2::{Digest, Sha256};
use std::fmt;

use crate::config::{BackendKind, SensitiveString};

/// Cache key identifying one connection target
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Abbreviated hex form used in logs
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

/// Collects configuration fields and hashes them order-independently
#[derive(Debug, Clone)]
pub struct FingerprintBuilder {
    kind: BackendKind,
    fields: Vec<(String, Vec<String>)>,
}

impl FingerprintBuilder {
    /// Start a fingerprint for the given backend kind
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            fields: Vec::new(),
        }
    }

    /// Add a single-valued field
    pub fn field(mut self, key: &str, value: impl ToString) -> Self {
        self.fields.push((key.to_string(), vec![value.to_string()]));
        self
    }

    /// Add a secret field; only its digest input is affected, it is never stored elsewhere
    pub fn secret(self, key: &str, value: &SensitiveString) -> Self {
        self.field(key, value.expose())
    }

    /// Add a multi-valued field whose element order is irrelevant
    pub fn list<I, S>(mut self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        let mut values: Vec<String> = values.into_iter().map(|v| v.to_string()).collect();
        values.sort();
        self.fields.push((key.to_string(), values));
        self
    }

    /// Add every entry of a key/value map as `key.entry` fields
    pub fn entries<'a, I>(mut self, key: &str, entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        for (name, value) in entries {
            self.fields
                .push((format!("{}.{}", key, name), vec![value.clone()]));
        }
        self
    }

    /// Hash the collected fields
    pub fn finish(mut self) -> Fingerprint {
        self.fields.sort();

        let mut hasher = Sha256::new();
        hasher.update(self.kind.to_string().as_bytes());
        for (key, values) in &self.fields {
            update_len_prefixed(&mut hasher, key.as_bytes());
            hasher.update((values.len() as u64).to_le_bytes());
            for value in values {
                update_len_prefixed(&mut hasher, value.as_bytes());
            }
        }

        Fingerprint(hasher.finalize().into())
    }
}

// Length prefixes keep ("ab", "c") and ("a", "bc") apart.
fn update_len_prefixed(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}
