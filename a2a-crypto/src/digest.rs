use serde::{Deserialize, Serialize};
use std::fmt;

/// A content digest produced by [`crate::CryptoProvider::hash`].
///
/// Wraps a fixed 32-byte BLAKE3 output. `ConsensusProposal.digest`, `Snapshot.hash`, and every
/// other hash-carrying field in the data model uses this type rather than a bare `Vec<u8>` so
/// digest comparisons are infallible and constant-size.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest([u8; 32]);

impl Digest {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", &self.to_hex()[..8])
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
