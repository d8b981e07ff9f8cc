//! The balanced append-only Merkle accumulator.
//!
//! Topology is a pure function of leaf count: appending a leaf runs a
//! binary-counter carry chain over the perfect subtrees on the rightmost
//! branch, so two trees fed the same records in the same order are
//! byte-identical, and the bulk of the tree is never touched by an
//! append. Completed subtrees are immutable, which is what lets proofs be
//! generated against any historical length from the live arena.

use crate::{
    Error, Result,
    hashing::{AlgorithmRegistry, Digest, HashConfig, HashEngine, Record},
    helper::{block_spans, locate_span, lowest_block},
    node::{Node, NodeId},
    proof::{Proof, ProofStep, Side},
};

/// A binary, always-balanced Merkle tree over an append-only sequence of
/// records.
///
/// `append` is the only mutator and must be externally serialized; reads
/// are safe to run concurrently with each other but not with an in-flight
/// append.
#[derive(Clone)]
pub struct MerkleAccumulator {
    engine: HashEngine,
    arena: Vec<Node>,
    /// Arena ids of the leaves, in insertion order.
    leaves: Vec<NodeId>,
    /// Arena ids of the perfect-subtree roots along the rightmost branch,
    /// in descending weight. Weights always spell the binary
    /// representation of the leaf count.
    spine: Vec<NodeId>,
    /// Root digest, recomputed from the spine on every append.
    root: Option<Digest>,
}

impl MerkleAccumulator {
    /// Build an empty accumulator from a configuration, resolving the
    /// hash algorithm through the registry.
    pub fn new(config: HashConfig, registry: &AlgorithmRegistry) -> Result<Self> {
        Ok(Self::with_engine(HashEngine::new(config, registry)?))
    }

    /// Build an empty accumulator around an existing engine.
    pub fn with_engine(engine: HashEngine) -> Self {
        MerkleAccumulator {
            engine,
            arena: Vec::new(),
            leaves: Vec::new(),
            spine: Vec::new(),
            root: None,
        }
    }

    /// The engine every hashing operation of this tree routes through.
    pub fn engine(&self) -> &HashEngine {
        &self.engine
    }

    /// The hash configuration the tree was built with.
    pub fn config(&self) -> &HashConfig {
        self.engine.config()
    }

    /// Number of leaves appended so far.
    pub fn leaf_count(&self) -> u64 {
        self.leaves.len() as u64
    }

    /// Total number of nodes (leaves plus bifurcation nodes).
    pub fn node_count(&self) -> u64 {
        self.arena.len() as u64
    }

    /// Returns `true` if no leaf has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Height of the tree: the longest root-to-leaf path,
    /// `ceil(log2(leaf_count))`.
    pub fn height(&self) -> u64 {
        match self.leaf_count() {
            0 | 1 => 0,
            n => u64::from(u64::BITS - (n - 1).leading_zeros()),
        }
    }

    // ── Ingestion ───────────────────────────────────────────────────

    /// Append one record and return the 1-based running leaf count.
    pub fn append<'r>(&mut self, record: impl Into<Record<'r>>) -> Result<u64> {
        let digest = self.engine.leaf_digest(record)?;
        Ok(self.ingest(digest))
    }

    /// Append a precomputed leaf digest, e.g. when replaying a snapshot
    /// taken by an external store. The digest width must match the
    /// configured algorithm.
    pub fn append_leaf_digest(&mut self, digest: Digest) -> Result<u64> {
        if digest.len() != self.engine.digest_width() {
            return Err(Error::InvalidDigest(format!(
                "expected {} bytes for {}, got {}",
                self.engine.digest_width(),
                self.config().algorithm,
                digest.len()
            )));
        }
        Ok(self.ingest(digest))
    }

    /// Carry-chain append: combine equal-weight subtrees off the spine
    /// exactly like incrementing a binary counter.
    fn ingest(&mut self, digest: Digest) -> u64 {
        let leaf = self.push_node(Node::leaf(digest));
        self.leaves.push(leaf);

        let mut carry = leaf;
        let mut weight = 1;
        while self
            .spine
            .last()
            .is_some_and(|&top| self.arena[top].weight == weight)
        {
            let left = self.spine.pop().expect("checked");
            weight *= 2;
            let parent = self
                .engine
                .parent_digest(&self.arena[left].digest, &self.arena[carry].digest);
            carry = self.push_node(Node::bifurcation(parent, left, carry, weight));
        }
        self.spine.push(carry);
        self.root = Some(self.bag_spine());
        self.leaves.len() as u64
    }

    fn push_node(&mut self, node: Node) -> NodeId {
        self.arena.push(node);
        self.arena.len() - 1
    }

    /// Bag the spine subroots right-to-left into the root digest.
    fn bag_spine(&self) -> Digest {
        let mut iter = self.spine.iter().rev();
        let last = iter.next().expect("spine is non-empty after append");
        let mut acc = self.arena[*last].digest.clone();
        for &id in iter {
            acc = self.engine.parent_digest(&self.arena[id].digest, &acc);
        }
        acc
    }

    // ── Reads ───────────────────────────────────────────────────────

    /// The current root digest.
    pub fn root(&self) -> Result<Digest> {
        self.root.clone().ok_or(Error::EmptyTree)
    }

    /// The root digest the tree had when it held `length` leaves.
    ///
    /// Balanced append never mutates completed subtrees, so every
    /// historical root is recomputable from the live arena.
    pub fn root_at(&self, length: u64) -> Result<Digest> {
        self.check_length(length)?;
        let mut digests = self.subroot_digests(length);
        let mut acc = digests.pop().expect("length is non-zero");
        for digest in digests.into_iter().rev() {
            acc = self.engine.parent_digest(&digest, &acc);
        }
        Ok(acc)
    }

    /// The digest stored by the leaf at `index`.
    pub fn leaf_digest(&self, index: u64) -> Result<&Digest> {
        self.leaves
            .get(index as usize)
            .map(|&id| &self.arena[id].digest)
            .ok_or(Error::IndexOutOfRange {
                index,
                length: self.leaf_count(),
            })
    }

    /// The leaf digests in insertion order. Together with the
    /// [`HashConfig`] this is sufficient for an external store to
    /// reconstruct the tree by replaying [`append_leaf_digest`].
    ///
    /// [`append_leaf_digest`]: MerkleAccumulator::append_leaf_digest
    pub fn leaf_digests(&self) -> impl Iterator<Item = &Digest> {
        self.leaves.iter().map(|&id| &self.arena[id].digest)
    }

    /// Find the first leaf holding the digest of `record`, if any.
    pub fn find_leaf<'r>(&self, record: impl Into<Record<'r>>) -> Result<Option<u64>> {
        let digest = self.engine.leaf_digest(record)?;
        Ok(self
            .leaves
            .iter()
            .position(|&id| self.arena[id].digest == digest)
            .map(|index| index as u64))
    }

    // ── Proof generation ────────────────────────────────────────────

    /// Prove that the leaf at `leaf_index` is included in the tree state
    /// of `length` leaves.
    ///
    /// `length` may be any historical length up to the current leaf
    /// count. Generation is a pure read; no nodes are created.
    pub fn audit_proof(&self, leaf_index: u64, length: u64) -> Result<Proof> {
        self.check_length(length)?;
        if leaf_index >= length {
            return Err(Error::IndexOutOfRange {
                index: leaf_index,
                length,
            });
        }
        let base = self.arena[self.leaves[leaf_index as usize]].digest.clone();
        let path = self.ascent_path(leaf_index, 1, length);
        Ok(Proof::audit(self.config(), leaf_index, length, base, path))
    }

    /// Prove that the tree state of `old_length` leaves is a prefix of
    /// the state of `length` leaves.
    ///
    /// The proof carries the subroots of `old_length`'s power-of-two
    /// decomposition (which bag into the old root) and the sibling path
    /// recombining them into the root at `length`.
    pub fn consistency_proof(&self, old_length: u64, length: u64) -> Result<Proof> {
        self.check_length(length)?;
        if old_length > length {
            return Err(Error::InvalidLengthRange(old_length, length));
        }
        if old_length == 0 {
            // The empty tree is a prefix of everything; nothing to carry.
            return Ok(Proof::consistency(
                self.config(),
                0,
                length,
                Digest::default(),
                Vec::new(),
                Vec::new(),
            ));
        }
        let subroots = self.subroot_digests(old_length);
        let base = subroots.last().expect("old_length is non-zero").clone();
        let low = lowest_block(old_length);
        let path = self.ascent_path(old_length - low, low, length);
        Ok(Proof::consistency(
            self.config(),
            old_length,
            length,
            base,
            subroots,
            path,
        ))
    }

    fn check_length(&self, length: u64) -> Result<()> {
        if length == 0 {
            return Err(Error::EmptyTree);
        }
        if length > self.leaf_count() {
            return Err(Error::InvalidLengthRange(length, self.leaf_count()));
        }
        Ok(())
    }

    /// Walk from the perfect subtree `[start, start + size)` up to the
    /// root of the tree state at `length`, recording each sibling and
    /// the side it is consumed on.
    ///
    /// Inside the containing block this is a plain perfect-tree climb;
    /// above it, the remaining blocks to the right are bagged into one
    /// step and the blocks to the left join one per step, nearest first.
    fn ascent_path(&self, start: u64, size: u64, length: u64) -> Vec<ProofStep> {
        let spans = block_spans(length);
        let block = locate_span(&spans, start);
        let (block_start, block_weight) = spans[block];

        let mut steps = Vec::new();
        let mut x = start;
        let mut s = size;
        while s < block_weight {
            if ((x - block_start) / s) % 2 == 0 {
                steps.push(ProofStep::new(Side::Right, self.range_digest(x + s, s)));
            } else {
                x -= s;
                steps.push(ProofStep::new(Side::Left, self.range_digest(x, s)));
            }
            s *= 2;
        }
        if block + 1 < spans.len() {
            let mut rest: Vec<Digest> = spans[block + 1..]
                .iter()
                .map(|&(span_start, weight)| self.range_digest(span_start, weight))
                .collect();
            let mut acc = rest.pop().expect("at least one block to the right");
            for digest in rest.into_iter().rev() {
                acc = self.engine.parent_digest(&digest, &acc);
            }
            steps.push(ProofStep::new(Side::Right, acc));
        }
        for &(span_start, weight) in spans[..block].iter().rev() {
            steps.push(ProofStep::new(Side::Left, self.range_digest(span_start, weight)));
        }
        steps
    }

    /// Digests of the perfect subtrees decomposing the first `length`
    /// leaves, in leaf order.
    fn subroot_digests(&self, length: u64) -> Vec<Digest> {
        block_spans(length)
            .into_iter()
            .map(|(start, weight)| self.range_digest(start, weight))
            .collect()
    }

    /// Digest of the perfect subtree over leaves `[start, start + size)`.
    ///
    /// The range must be dyadic-aligned and fully appended; such a
    /// subtree is always materialized in the arena because the carry
    /// chain completes it the moment its last leaf arrives.
    fn range_digest(&self, start: u64, size: u64) -> Digest {
        self.arena[self.range_node(start, size)].digest.clone()
    }

    fn range_node(&self, start: u64, size: u64) -> NodeId {
        let mut block_start = 0;
        let mut node = None;
        let mut weight = 0;
        for &id in &self.spine {
            let w = self.arena[id].weight;
            if start < block_start + w {
                node = Some(id);
                weight = w;
                break;
            }
            block_start += w;
        }
        let mut node = node.expect("validated: start below leaf count");
        while weight > size {
            weight /= 2;
            let current = &self.arena[node];
            node = if start < block_start + weight {
                current.left.expect("node above leaf level")
            } else {
                block_start += weight;
                current.right.expect("node above leaf level")
            };
        }
        node
    }
}
