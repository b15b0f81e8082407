//! Cache keys derived from the inputs of a pipeline run

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::options::Options;

/// Hex SHA-256 over (analysis run id, normalized options, output format).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn compute(run_id: &str, options: &Options, format: &str) -> Result<Self> {
        let options_json = serde_json::to_vec(&options.normalized())
            .map_err(|e| Error::invalid_option("opts", "", e.to_string()))?;

        let mut hasher = Sha256::new();
        for part in [run_id.as_bytes(), options_json.as_slice(), format.as_bytes()] {
            // Length prefixes keep adjacent fields from running together.
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part);
        }
        Ok(Fingerprint(hex::encode(hasher.finalize())))
    }

    /// Rebuild a fingerprint read back from storage. Only lowercase hex
    /// digests are accepted so the value is always safe as a path segment.
    pub fn parse(value: &str) -> Option<Self> {
        let valid = value.len() == 64 && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        valid.then(|| Fingerprint(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
