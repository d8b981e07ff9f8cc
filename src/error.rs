use thiserror::Error;

use crate::hashing::Encoding;

/// Alias for `core::result::Result<T, Error>`.
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for accumulator operations.
///
/// Digest mismatch during proof validation is NOT an error: validation
/// returns `Ok(false)` so that callers can tell "attack/corruption" apart
/// from "proof is structurally broken" ([`Error::MalformedProof`]).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The configured hash algorithm identifier is not in the registry.
    #[error("unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// A record cannot be represented under the configured text encoding.
    #[error("record not representable as {encoding}: {detail}")]
    Encoding {
        /// The encoding the record was checked against.
        encoding: Encoding,
        /// What exactly failed to encode or decode.
        detail: String,
    },

    /// A digest has the wrong width for the configured algorithm, or is
    /// not valid hex.
    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    /// Tried to read the root or generate a proof before any leaf was
    /// appended.
    #[error("tree has no leaves")]
    EmptyTree,

    /// Audit proof requested for a leaf index outside the tree state it
    /// was requested against.
    #[error("leaf index {index} out of range for length {length}")]
    IndexOutOfRange {
        /// The requested 0-based leaf index.
        index: u64,
        /// The leaf count the request was made against.
        length: u64,
    },

    /// A requested length pair is not an ordered pair of reachable tree
    /// states.
    #[error("invalid length range: {0} exceeds {1}")]
    InvalidLengthRange(u64, u64),

    /// The proof body does not match the shape its header declares
    /// (corrupted or tampered proof structure).
    #[error("malformed proof: {0}")]
    MalformedProof(String),
}
