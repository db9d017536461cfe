use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use transcript_types::Fingerprint;

/// Side of a sibling in a Merkle proof path, relative to the tracked node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

/// Cache state of a [`MerkleTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TreeState {
    /// No leaves.
    Empty,
    /// Leaves present, cached root absent or stale.
    Dirty,
    /// Cached root valid for the current leaves.
    Clean,
}

/// Binary Merkle tree over an ordered list of leaf fingerprints.
///
/// Odd layers are padded by duplicating their last element, which keeps the
/// tree binary without moving any leaf index. Parents are
/// `SHA256(left_hex || right_hex)` over the 64-char hex renderings (see
/// [`hash_pair`]). A tree is owned by one batch issuance and is not shared.
#[derive(Clone, Debug, Default)]
pub struct MerkleTree {
    leaves: Vec<Fingerprint>,
    /// Valid iff no leaf was added since it was computed.
    root: Option<Fingerprint>,
}

impl MerkleTree {
    /// An empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from leaves in order. The root is not computed yet.
    pub fn from_leaves(leaves: Vec<Fingerprint>) -> Self {
        Self { leaves, root: None }
    }

    /// Append a leaf and return its index. Invalidates the cached root.
    pub fn add_leaf(&mut self, leaf: Fingerprint) -> usize {
        self.leaves.push(leaf);
        self.root = None;
        self.leaves.len() - 1
    }

    /// Append several leaves in order. Invalidates the cached root.
    pub fn add_leaves(&mut self, leaves: impl IntoIterator<Item = Fingerprint>) {
        self.leaves.extend(leaves);
        self.root = None;
    }

    /// Empty, dirty (leaves added since the last root) or clean.
    pub fn state(&self) -> TreeState {
        match (self.leaves.is_empty(), self.root.is_some()) {
            (true, _) => TreeState::Empty,
            (false, false) => TreeState::Dirty,
            (false, true) => TreeState::Clean,
        }
    }

    /// The root, computing and caching it if the tree is dirty.
    ///
    /// Returns `None` for an empty tree. A single leaf is its own root.
    pub fn root(&mut self) -> Option<Fingerprint> {
        if self.root.is_none() {
            self.root = merkle_root(&self.leaves);
        }
        self.root
    }

    /// Number of leaves added so far.
    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Leaves in insertion order.
    pub fn leaves(&self) -> &[Fingerprint] {
        &self.leaves
    }

    /// Leaf at `index`, if present.
    pub fn leaf(&self, index: usize) -> Option<&Fingerprint> {
        self.leaves.get(index)
    }

    /// Drop all leaves and the cached root.
    pub fn reset(&mut self) {
        self.leaves.clear();
        self.root = None;
    }

    /// Generate an inclusion proof for the leaf at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range. Asking for a proof of a leaf that
    /// was never added is a caller bug, not a verification outcome.
    pub fn proof(&self, index: usize) -> MerkleProof {
        assert!(
            index < self.leaves.len(),
            "merkle proof requested for leaf {index} but the tree has {} leaves",
            self.leaves.len()
        );

        let mut path = Vec::new();
        let mut layer = self.leaves.clone();
        let mut idx = index;

        while layer.len() > 1 {
            pad_layer(&mut layer);
            let (sibling_idx, side) = if idx % 2 == 0 {
                (idx + 1, Side::Right)
            } else {
                (idx - 1, Side::Left)
            };
            if let Some(sibling) = layer.get(sibling_idx) {
                path.push(ProofStep {
                    sibling: *sibling,
                    side,
                });
            }
            layer = pair_layer(&layer);
            idx /= 2;
        }

        MerkleProof {
            leaf_index: index,
            path,
        }
    }
}

/// One step of an inclusion proof.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub sibling: Fingerprint,
    pub side: Side,
}

/// Merkle inclusion proof for the leaf at `leaf_index`.
///
/// Steps run from the leaf level up to the root. A proof means nothing on its
/// own: verify it against the claimed leaf fingerprint and the anchored root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub leaf_index: usize,
    pub path: Vec<ProofStep>,
}

impl MerkleProof {
    /// Verify that `leaf` is included under `root`.
    pub fn verify(&self, leaf: &Fingerprint, root: &Fingerprint) -> bool {
        verify_proof(leaf, self, root)
    }

    /// Number of steps in the path.
    pub fn len(&self) -> usize {
        self.path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }
}

/// Fold `proof` over `leaf` and compare the result with `root`.
///
/// Each step's side must agree with the corresponding bit of the leaf index
/// and the path must consume the whole index. Without that check a flipped
/// side on a duplicated tail node (sibling equal to the current node) would
/// still reproduce the root.
pub fn verify_proof(leaf: &Fingerprint, proof: &MerkleProof, root: &Fingerprint) -> bool {
    let mut current = *leaf;
    let mut idx = proof.leaf_index;

    for step in &proof.path {
        let expected = if idx % 2 == 0 { Side::Right } else { Side::Left };
        if step.side != expected {
            return false;
        }
        current = match step.side {
            Side::Right => hash_pair(&current, &step.sibling),
            Side::Left => hash_pair(&step.sibling, &current),
        };
        idx /= 2;
    }

    idx == 0 && current == *root
}

/// Root over `leaves` in order, or `None` when there are no leaves.
pub fn merkle_root(leaves: &[Fingerprint]) -> Option<Fingerprint> {
    let mut layer = leaves.to_vec();
    while layer.len() > 1 {
        pad_layer(&mut layer);
        layer = pair_layer(&layer);
    }
    layer.first().copied()
}

/// Parent of two nodes: SHA-256 over the concatenated hex renderings.
///
/// The hex (not raw byte) input and the left-then-right order are part of
/// the anchoring format; roots already on a ledger depend on both.
pub fn hash_pair(left: &Fingerprint, right: &Fingerprint) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(left.to_hex().as_bytes());
    hasher.update(right.to_hex().as_bytes());
    Fingerprint::from_hash(hasher.finalize().into())
}

fn pad_layer(layer: &mut Vec<Fingerprint>) {
    if layer.len() % 2 == 1 {
        if let Some(last) = layer.last().copied() {
            layer.push(last);
        }
    }
}

fn pair_layer(layer: &[Fingerprint]) -> Vec<Fingerprint> {
    layer
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => hash_pair(left, right),
            [single] => hash_pair(single, single),
            _ => unreachable!("chunks(2) yields one or two elements"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn leaf(seed: &str) -> Fingerprint {
        Fingerprint::digest(seed.as_bytes())
    }

    fn leaves(n: usize) -> Vec<Fingerprint> {
        (0..n).map(|i| leaf(&format!("leaf-{i}"))).collect()
    }

    #[test]
    fn hash_pair_uses_hex_concatenation() {
        let a = leaf("a");
        let b = leaf("b");
        let expected = Fingerprint::digest(format!("{}{}", a.to_hex(), b.to_hex()).as_bytes());
        assert_eq!(hash_pair(&a, &b), expected);
        assert_ne!(hash_pair(&a, &b), hash_pair(&b, &a));
    }

    #[test]
    fn empty_tree_has_no_root() {
        let mut tree = MerkleTree::new();
        assert_eq!(tree.state(), TreeState::Empty);
        assert!(tree.root().is_none());
        assert_eq!(tree.state(), TreeState::Empty);
        assert!(merkle_root(&[]).is_none());
    }

    #[test]
    fn single_leaf_is_root() {
        let a = leaf("a");
        let mut tree = MerkleTree::from_leaves(vec![a]);
        assert_eq!(tree.root(), Some(a));
        let proof = tree.proof(0);
        assert!(proof.is_empty());
        assert!(proof.verify(&a, &a));
    }

    #[test]
    fn odd_layer_duplicates_last_leaf() {
        let (a, b, c) = (leaf("a"), leaf("b"), leaf("c"));
        let mut tree = MerkleTree::from_leaves(vec![a, b, c]);
        let expected = hash_pair(&hash_pair(&a, &b), &hash_pair(&c, &c));
        assert_eq!(tree.root(), Some(expected));
        assert_eq!(
            expected.to_hex(),
            "0bdf27bf7ec894ca7cadfe491ec1a3ece840f117989e8c5e9bd7086467bf6c38"
        );
    }

    #[test]
    fn two_leaves_produce_parent() {
        let (a, b) = (leaf("a"), leaf("b"));
        assert_eq!(merkle_root(&[a, b]), Some(hash_pair(&a, &b)));
    }

    #[test]
    fn state_transitions() {
        let mut tree = MerkleTree::new();
        assert_eq!(tree.state(), TreeState::Empty);

        assert_eq!(tree.add_leaf(leaf("a")), 0);
        assert_eq!(tree.state(), TreeState::Dirty);

        let first = tree.root().unwrap();
        assert_eq!(tree.state(), TreeState::Clean);
        assert_eq!(tree.root(), Some(first));
        assert_eq!(tree.state(), TreeState::Clean);

        assert_eq!(tree.add_leaf(leaf("b")), 1);
        assert_eq!(tree.state(), TreeState::Dirty);
        let second = tree.root().unwrap();
        assert_ne!(first, second);

        tree.add_leaves(vec![leaf("c"), leaf("d")]);
        assert_eq!(tree.state(), TreeState::Dirty);

        tree.reset();
        assert_eq!(tree.state(), TreeState::Empty);
        assert_eq!(tree.leaf_count(), 0);
        assert!(tree.root().is_none());
    }

    #[test]
    fn root_is_stable_around_proof_generation() {
        let mut before = MerkleTree::from_leaves(leaves(11));
        let root_first = before.root().unwrap();
        let _ = before.proof(4);
        assert_eq!(before.root(), Some(root_first));

        let mut after = MerkleTree::from_leaves(leaves(11));
        let _ = after.proof(4);
        assert_eq!(after.root(), Some(root_first));
    }

    #[test]
    fn proof_verifies_for_all_leaves() {
        for n in 1..=33 {
            let ls = leaves(n);
            let mut tree = MerkleTree::from_leaves(ls.clone());
            let root = tree.root().unwrap();
            for (i, l) in ls.iter().enumerate() {
                let proof = tree.proof(i);
                assert_eq!(proof.leaf_index, i);
                assert!(proof.verify(l, &root), "leaf {i} of {n} should verify");
            }
        }
    }

    #[test]
    fn power_of_two_proofs_have_log_length() {
        let tree = MerkleTree::from_leaves(leaves(8));
        for i in 0..8 {
            assert_eq!(tree.proof(i).len(), 3);
        }
    }

    #[test]
    fn mutated_sibling_fails() {
        let ls = leaves(7);
        let mut tree = MerkleTree::from_leaves(ls.clone());
        let root = tree.root().unwrap();
        for (i, l) in ls.iter().enumerate() {
            let proof = tree.proof(i);
            for step in 0..proof.len() {
                let mut forged = proof.clone();
                forged.path[step].sibling = leaf("forged");
                assert!(!forged.verify(l, &root), "leaf {i} step {step}");
            }
        }
    }

    #[test]
    fn flipped_side_fails_everywhere() {
        for n in [2, 3, 5, 7] {
            let ls = leaves(n);
            let mut tree = MerkleTree::from_leaves(ls.clone());
            let root = tree.root().unwrap();
            for (i, l) in ls.iter().enumerate() {
                let proof = tree.proof(i);
                for step in 0..proof.len() {
                    let mut forged = proof.clone();
                    forged.path[step].side = match forged.path[step].side {
                        Side::Left => Side::Right,
                        Side::Right => Side::Left,
                    };
                    assert!(!forged.verify(l, &root), "n={n} leaf {i} step {step}");
                }
            }
        }
    }

    #[test]
    fn flipped_side_on_duplicated_tail_fails() {
        let (a, b, c) = (leaf("a"), leaf("b"), leaf("c"));
        let mut tree = MerkleTree::from_leaves(vec![a, b, c]);
        let root = tree.root().unwrap();
        let mut proof = tree.proof(2);
        assert_eq!(proof.path[0].sibling, c);
        assert!(proof.verify(&c, &root));

        proof.path[0].side = Side::Left;
        assert!(!proof.verify(&c, &root));
    }

    #[test]
    fn forged_leaf_fails() {
        let mut tree = MerkleTree::from_leaves(leaves(4));
        let root = tree.root().unwrap();
        assert!(!tree.proof(0).verify(&leaf("intruder"), &root));
    }

    #[test]
    fn truncated_proof_fails() {
        let ls = leaves(6);
        let mut tree = MerkleTree::from_leaves(ls.clone());
        let root = tree.root().unwrap();
        let mut proof = tree.proof(3);
        proof.path.pop();
        assert!(!proof.verify(&ls[3], &root));
    }

    #[test]
    fn reordered_proof_fails() {
        let ls = leaves(8);
        let mut tree = MerkleTree::from_leaves(ls.clone());
        let root = tree.root().unwrap();
        let mut proof = tree.proof(5);
        proof.path.swap(0, 2);
        assert!(!proof.verify(&ls[5], &root));
    }

    #[test]
    fn proof_for_other_index_fails() {
        let ls = leaves(4);
        let mut tree = MerkleTree::from_leaves(ls.clone());
        let root = tree.root().unwrap();
        let mut proof = tree.proof(1);
        proof.leaf_index = 0;
        assert!(!proof.verify(&ls[1], &root));
    }

    #[test]
    #[should_panic(expected = "merkle proof requested for leaf 5")]
    fn proof_out_of_range_panics() {
        MerkleTree::from_leaves(leaves(2)).proof(5);
    }

    #[test]
    #[should_panic]
    fn proof_on_empty_tree_panics() {
        MerkleTree::new().proof(0);
    }

    #[test]
    fn different_order_different_root() {
        let ls = leaves(4);
        let mut reversed = ls.clone();
        reversed.reverse();
        assert_ne!(merkle_root(&ls), merkle_root(&reversed));
    }

    #[test]
    fn proof_serializes_with_lowercase_sides() {
        let tree = MerkleTree::from_leaves(leaves(3));
        let json = serde_json::to_value(tree.proof(1)).unwrap();
        assert_eq!(json["leaf_index"], 1);
        assert_eq!(json["path"][0]["side"], "left");
        assert_eq!(json["path"][1]["side"], "right");
        let parsed: MerkleProof = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, tree.proof(1));
    }

    proptest! {
        #[test]
        fn every_leaf_is_included(n in 1usize..64, pick in any::<prop::sample::Index>()) {
            let ls = leaves(n);
            let mut tree = MerkleTree::from_leaves(ls.clone());
            let root = tree.root().unwrap();
            let i = pick.index(n);
            prop_assert!(verify_proof(&ls[i], &tree.proof(i), &root));
            prop_assert_eq!(Some(root), merkle_root(&ls));
        }
    }
}
