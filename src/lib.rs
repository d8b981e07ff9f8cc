//! Balanced append-only Merkle accumulator with audit and consistency
//! proofs.
//!
//! Records are ingested one at a time; the tree stays perfectly balanced
//! after every append by running a binary-counter carry chain over the
//! perfect subtrees on its rightmost branch. No orphan leaves are ever
//! duplicated, only O(log n) nodes are touched per append, and the
//! topology is a pure function of the leaf count. Hashing is domain-separated
//! (`hash(0x00 || record)` for leaves, `hash(0x01 || left || right)` for
//! parents) to defeat leaf/node second-preimage substitution.
//!
//! # Core types
//!
//! - [`MerkleAccumulator`] — the tree (append, roots, proof generation).
//! - [`HashEngine`] / [`HashConfig`] — algorithm, encoding, raw-bytes and
//!   security mode; every hashing operation routes through one engine.
//! - [`AlgorithmRegistry`] — caller-constructed table of hash function
//!   capabilities, injectable for tests.
//! - [`Proof`] — self-describing audit or consistency proof
//!   (verify, two-stage consistency validation, bincode serialization).
//!
//! # Example
//!
//! ```
//! use merkle_accumulator::{AlgorithmRegistry, HashConfig, MerkleAccumulator};
//!
//! # fn main() -> merkle_accumulator::Result<()> {
//! let registry = AlgorithmRegistry::standard();
//! let mut tree = MerkleAccumulator::new(HashConfig::default(), &registry)?;
//! tree.append("a")?;
//! tree.append("b")?;
//! tree.append("c")?;
//!
//! let root = tree.root()?;
//! let proof = tree.audit_proof(1, 3)?;
//! assert!(proof.verify(&registry, &root)?);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod error;
mod hashing;
/// Pure position arithmetic over the power-of-two block decomposition.
pub(crate) mod helper;
mod node;
mod proof;
mod tree;
mod verify;


pub use error::{Error, Result};
pub use hashing::{
    AlgorithmRegistry, Digest, Encoding, HashConfig, HashEngine, HashFn, Record,
};
pub use proof::{Proof, ProofHeader, ProofKind, ProofStep, Side};
pub use tree::MerkleAccumulator;
pub use verify::ValidationReceipt;
