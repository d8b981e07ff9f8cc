//! Proof value objects: self-describing header plus fold path.
//!
//! Audit and consistency proofs share one physical shape. The header
//! carries the complete hash configuration the proof was generated under,
//! so a validator reconstructs the engine from the proof alone and never
//! trusts caller-supplied configuration. The body is an ordered sequence
//! of `(side, digest)` steps folded left to right; a consistency proof
//! additionally carries the subroot digests of the earlier state.
//!
//! Proofs are immutable value objects with no reference back into the
//! tree, serializable with bincode (big-endian, bounded decode) and fully
//! exposable as plain structured data through the accessors.

use bincode::{Decode, Encode};

use crate::{
    Error, Result,
    hashing::{Digest, Encoding, HashConfig},
};

/// Which operand position a carried sibling digest takes when it is
/// recombined with the digest under construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum Side {
    /// The sibling is the left operand: `parent(sibling, current)`.
    Left,
    /// The sibling is the right operand: `parent(current, sibling)`.
    Right,
}

/// One step of a proof path: a sibling digest and the side it is
/// consumed on.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct ProofStep {
    /// Operand position of the sibling.
    pub side: Side,
    /// The sibling digest.
    pub digest: Digest,
}

impl ProofStep {
    /// Build a step from its parts.
    pub fn new(side: Side, digest: Digest) -> Self {
        ProofStep { side, digest }
    }
}

/// What a proof claims, and against which tree state(s).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum ProofKind {
    /// Inclusion of the leaf at `leaf_index` in the state of `length`
    /// leaves.
    Audit {
        /// 0-based index of the proved leaf.
        leaf_index: u64,
        /// Leaf count of the tree state proved against.
        length: u64,
    },
    /// The state of `old_length` leaves is a prefix of the state of
    /// `length` leaves.
    Consistency {
        /// Leaf count of the earlier state.
        old_length: u64,
        /// Leaf count of the later state.
        length: u64,
    },
}

/// Self-describing proof header: the full hash configuration plus the
/// proof kind and the lengths it was computed against.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct ProofHeader {
    /// Hash algorithm identifier, resolved through the registry at
    /// validation time.
    pub algorithm: String,
    /// Text encoding of the originating tree.
    pub encoding: Encoding,
    /// Raw-bytes mode of the originating tree.
    pub raw_bytes: bool,
    /// Security (domain separation) mode of the originating tree.
    pub security: bool,
    /// Proof kind and target lengths.
    pub kind: ProofKind,
}

/// A cryptographic proof issued by the accumulator.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Proof {
    header: ProofHeader,
    /// The digest under test: the proved leaf digest for audit proofs,
    /// the last (smallest) subroot for consistency proofs.
    base: Digest,
    /// Subroots of the earlier state's power-of-two decomposition, in
    /// leaf order. Empty for audit proofs.
    subroots: Vec<Digest>,
    /// The fold path up to the root of the later state.
    path: Vec<ProofStep>,
}

impl Proof {
    pub(crate) fn audit(
        config: &HashConfig,
        leaf_index: u64,
        length: u64,
        base: Digest,
        path: Vec<ProofStep>,
    ) -> Self {
        Proof {
            header: ProofHeader {
                algorithm: config.algorithm.clone(),
                encoding: config.encoding,
                raw_bytes: config.raw_bytes,
                security: config.security,
                kind: ProofKind::Audit { leaf_index, length },
            },
            base,
            subroots: Vec::new(),
            path,
        }
    }

    pub(crate) fn consistency(
        config: &HashConfig,
        old_length: u64,
        length: u64,
        base: Digest,
        subroots: Vec<Digest>,
        path: Vec<ProofStep>,
    ) -> Self {
        Proof {
            header: ProofHeader {
                algorithm: config.algorithm.clone(),
                encoding: config.encoding,
                raw_bytes: config.raw_bytes,
                security: config.security,
                kind: ProofKind::Consistency { old_length, length },
            },
            base,
            subroots,
            path,
        }
    }

    /// Reassemble a proof from externally stored parts.
    pub fn from_parts(
        header: ProofHeader,
        base: Digest,
        subroots: Vec<Digest>,
        path: Vec<ProofStep>,
    ) -> Self {
        Proof {
            header,
            base,
            subroots,
            path,
        }
    }

    /// The self-describing header.
    pub fn header(&self) -> &ProofHeader {
        &self.header
    }

    /// The proof kind and target lengths.
    pub fn kind(&self) -> ProofKind {
        self.header.kind
    }

    /// The digest under test.
    pub fn base(&self) -> &Digest {
        &self.base
    }

    /// The earlier state's subroot digests (empty for audit proofs).
    pub fn subroots(&self) -> &[Digest] {
        &self.subroots
    }

    /// The fold path.
    pub fn path(&self) -> &[ProofStep] {
        &self.path
    }

    /// Serialize this proof to bytes using bincode.
    pub fn encode_to_vec(&self) -> Result<Vec<u8>> {
        let config = bincode::config::standard()
            .with_big_endian()
            .with_no_limit();
        bincode::encode_to_vec(self, config)
            .map_err(|e| Error::MalformedProof(format!("failed to encode proof: {}", e)))
    }

    /// Deserialize a proof from bytes.
    ///
    /// The bincode size limit is capped at 100 MiB to prevent crafted
    /// length headers from causing huge allocations.
    pub fn decode_from_slice(bytes: &[u8]) -> Result<Self> {
        let config = bincode::config::standard()
            .with_big_endian()
            .with_limit::<{ 100 * 1024 * 1024 }>();
        let (proof, _) = bincode::decode_from_slice(bytes, config)
            .map_err(|e| Error::MalformedProof(format!("failed to decode proof: {}", e)))?;
        Ok(proof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_proof() -> Proof {
        Proof::audit(
            &HashConfig::default(),
            1,
            3,
            Digest::new(vec![0x11; 32]),
            vec![
                ProofStep::new(Side::Left, Digest::new(vec![0x22; 32])),
                ProofStep::new(Side::Right, Digest::new(vec![0x33; 32])),
            ],
        )
    }

    #[test]
    fn test_proof_encode_decode_roundtrip() {
        let proof = sample_proof();
        let bytes = proof.encode_to_vec().expect("encode proof");
        let decoded = Proof::decode_from_slice(&bytes).expect("decode proof");
        assert_eq!(proof, decoded);
    }

    #[test]
    fn test_decode_garbage_is_malformed() {
        let result = Proof::decode_from_slice(&[0xFF; 7]);
        assert!(matches!(result, Err(Error::MalformedProof(_))));
    }

    #[test]
    fn test_from_parts_preserves_fields() {
        let proof = sample_proof();
        let rebuilt = Proof::from_parts(
            proof.header().clone(),
            proof.base().clone(),
            proof.subroots().to_vec(),
            proof.path().to_vec(),
        );
        assert_eq!(proof, rebuilt);
        assert!(matches!(
            rebuilt.kind(),
            ProofKind::Audit {
                leaf_index: 1,
                length: 3
            }
        ));
    }
}
