//! Proof validation: root recomputation from a proof path.
//!
//! Validation rebuilds a [`HashEngine`] strictly from the proof header,
//! folds the body left to right and compares the candidate root against
//! the expected digest. Digest disagreement is the normal `Ok(false)`
//! outcome; a body whose shape contradicts the header-declared lengths is
//! [`Error::MalformedProof`], so callers can always tell tampering from
//! lookup failure.
//!
//! Consistency proofs validate in two mandatory stages: the subroots must
//! bag into a previously trusted old root before the path into the new
//! root is trusted. Skipping the first stage would let an attacker-chosen
//! path "prove" an unrelated old root.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::{
    Error, Result,
    hashing::{AlgorithmRegistry, Digest, HashConfig, HashEngine, Record},
    helper::{audit_path_len, consistency_path_len},
    proof::{Proof, ProofKind, ProofStep, Side},
};

impl Proof {
    /// Validate an audit proof against the expected root digest.
    ///
    /// Returns `Ok(false)` on digest mismatch. Calling this on a
    /// consistency proof is an error: consistency validation is
    /// two-stage by design and must go through
    /// [`verify_consistency`](Proof::verify_consistency).
    pub fn verify(&self, registry: &AlgorithmRegistry, expected_root: &Digest) -> Result<bool> {
        let engine = self.build_engine(registry)?;
        if !matches!(self.kind(), ProofKind::Audit { .. }) {
            return Err(Error::MalformedProof(
                "consistency proofs require two-stage validation with a trusted old root".into(),
            ));
        }
        self.check_shape(&engine)?;
        Ok(fold_path(&engine, self.base().clone(), self.path()) == *expected_root)
    }

    /// Validate an audit proof for a concrete record.
    ///
    /// Recomputes the record's leaf digest with the engine described by
    /// the proof header and requires it to match the proof's base digest
    /// before folding. A record that was never ingested yields
    /// `Ok(false)`.
    pub fn verify_record<'r>(
        &self,
        registry: &AlgorithmRegistry,
        record: impl Into<Record<'r>>,
        expected_root: &Digest,
    ) -> Result<bool> {
        let engine = self.build_engine(registry)?;
        if engine.leaf_digest(record)? != *self.base() {
            return Ok(false);
        }
        self.verify(registry, expected_root)
    }

    /// Two-stage validation of a consistency proof.
    ///
    /// Stage one bags the carried subroots and compares them against
    /// `trusted_old_root`; stage two folds the path from the base
    /// subroot and compares against `expected_root`. Both must hold.
    /// A proof over the empty prefix (`old_length == 0`) validates
    /// vacuously.
    pub fn verify_consistency(
        &self,
        registry: &AlgorithmRegistry,
        trusted_old_root: &Digest,
        expected_root: &Digest,
    ) -> Result<bool> {
        let engine = self.build_engine(registry)?;
        let ProofKind::Consistency { old_length, .. } = self.kind() else {
            return Err(Error::MalformedProof(
                "audit proofs carry no prefix state to check consistency against".into(),
            ));
        };
        self.check_shape(&engine)?;
        if old_length == 0 {
            return Ok(true);
        }
        let old_candidate = bag_subroots(&engine, self.subroots());
        if old_candidate != *trusted_old_root {
            return Ok(false);
        }
        Ok(fold_path(&engine, self.base().clone(), self.path()) == *expected_root)
    }

    /// Validate and return a timestamped receipt of the verdict.
    ///
    /// `trusted_old_root` is required for consistency proofs and ignored
    /// for audit proofs.
    pub fn verify_with_receipt(
        &self,
        registry: &AlgorithmRegistry,
        trusted_old_root: Option<&Digest>,
        expected_root: &Digest,
    ) -> Result<ValidationReceipt> {
        let accepted = match self.kind() {
            ProofKind::Audit { .. } => self.verify(registry, expected_root)?,
            ProofKind::Consistency { .. } => {
                let old_root = trusted_old_root.ok_or_else(|| {
                    Error::MalformedProof(
                        "consistency validation requires a trusted old root".into(),
                    )
                })?;
                self.verify_consistency(registry, old_root, expected_root)?
            }
        };
        Ok(ValidationReceipt {
            timestamp: Utc::now(),
            algorithm: self.header().algorithm.clone(),
            kind: self.kind(),
            accepted,
        })
    }

    fn build_engine(&self, registry: &AlgorithmRegistry) -> Result<HashEngine> {
        let header = self.header();
        HashEngine::new(
            HashConfig {
                algorithm: header.algorithm.clone(),
                encoding: header.encoding,
                raw_bytes: header.raw_bytes,
                security: header.security,
            },
            registry,
        )
    }

    /// Structural checks of the body against the header-declared
    /// lengths. A failure here means corruption or tampering with the
    /// proof structure, never a digest mismatch.
    fn check_shape(&self, engine: &HashEngine) -> Result<()> {
        let width = engine.digest_width();
        for (position, step) in self.path().iter().enumerate() {
            if step.digest.len() != width {
                return Err(Error::MalformedProof(format!(
                    "path digest {} has width {}, expected {}",
                    position,
                    step.digest.len(),
                    width
                )));
            }
        }
        match self.kind() {
            ProofKind::Audit { leaf_index, length } => {
                if length == 0 || leaf_index >= length {
                    return Err(Error::MalformedProof(format!(
                        "audit header claims leaf {} of length {}",
                        leaf_index, length
                    )));
                }
                if !self.subroots().is_empty() {
                    return Err(Error::MalformedProof(
                        "audit proof carries subroots".into(),
                    ));
                }
                if self.base().len() != width {
                    return Err(Error::MalformedProof(format!(
                        "base digest has width {}, expected {}",
                        self.base().len(),
                        width
                    )));
                }
                let expected = audit_path_len(leaf_index, length);
                if self.path().len() != expected {
                    return Err(Error::MalformedProof(format!(
                        "audit path has {} steps, header demands {}",
                        self.path().len(),
                        expected
                    )));
                }
            }
            ProofKind::Consistency { old_length, length } => {
                if length == 0 || old_length > length {
                    return Err(Error::MalformedProof(format!(
                        "consistency header claims lengths {} -> {}",
                        old_length, length
                    )));
                }
                if self.subroots().len() != old_length.count_ones() as usize {
                    return Err(Error::MalformedProof(format!(
                        "{} subroots for old length {}",
                        self.subroots().len(),
                        old_length
                    )));
                }
                if old_length == 0 {
                    if !self.base().is_empty() {
                        return Err(Error::MalformedProof(
                            "empty-prefix proof carries a base digest".into(),
                        ));
                    }
                } else {
                    if self.base().len() != width {
                        return Err(Error::MalformedProof(format!(
                            "base digest has width {}, expected {}",
                            self.base().len(),
                            width
                        )));
                    }
                    for (position, subroot) in self.subroots().iter().enumerate() {
                        if subroot.len() != width {
                            return Err(Error::MalformedProof(format!(
                                "subroot {} has width {}, expected {}",
                                position,
                                subroot.len(),
                                width
                            )));
                        }
                    }
                }
                let expected = consistency_path_len(old_length, length);
                if self.path().len() != expected {
                    return Err(Error::MalformedProof(format!(
                        "consistency path has {} steps, header demands {}",
                        self.path().len(),
                        expected
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Fold the path left to right, combining the running digest with each
/// sibling on its recorded side.
fn fold_path(engine: &HashEngine, base: Digest, path: &[ProofStep]) -> Digest {
    path.iter().fold(base, |current, step| match step.side {
        Side::Left => engine.parent_digest(&step.digest, &current),
        Side::Right => engine.parent_digest(&current, &step.digest),
    })
}

/// Bag subroots right to left into the root of the earlier state.
/// `subroots` must be non-empty.
fn bag_subroots(engine: &HashEngine, subroots: &[Digest]) -> Digest {
    let mut iter = subroots.iter().rev();
    let mut acc = iter.next().expect("checked: non-empty").clone();
    for subroot in iter {
        acc = engine.parent_digest(subroot, &acc);
    }
    acc
}

/// A timestamped record of one validation run.
#[derive(Debug, Clone)]
pub struct ValidationReceipt {
    timestamp: DateTime<Utc>,
    algorithm: String,
    kind: ProofKind,
    accepted: bool,
}

impl ValidationReceipt {
    /// When the validation ran.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The hash algorithm the proof declared.
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// The validated proof's kind and lengths.
    pub fn kind(&self) -> ProofKind {
        self.kind
    }

    /// The verdict.
    pub fn accepted(&self) -> bool {
        self.accepted
    }
}

impl fmt::Display for ValidationReceipt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let verdict = if self.accepted { "ACCEPTED" } else { "REJECTED" };
        let claim = match self.kind {
            ProofKind::Audit { leaf_index, length } => {
                format!("audit of leaf {} at length {}", leaf_index, length)
            }
            ProofKind::Consistency { old_length, length } => {
                format!("consistency {} -> {}", old_length, length)
            }
        };
        write!(
            f,
            "{} {} ({}) at {}",
            verdict,
            claim,
            self.algorithm,
            self.timestamp.to_rfc3339()
        )
    }
}
