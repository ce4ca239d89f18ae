use crate::hash::Hash;

/// The sibling-hash-plus-orientation authentication path for a single
/// Merkle leaf. `orientations[i] == false` means the sibling at that
/// level is the right node (the leaf/accumulated hash is the left one);
/// `true` means the sibling is the left node, matching the plot proof's
/// path encoding in the data model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerklePath {
    pub siblings: Vec<Hash>,
    pub orientations: Vec<bool>,
}

impl MerklePath {
    /// Recomputes the root implied by `leaf` and this path. Used both by
    /// the proof validator (plot Merkle path) and available to anyone
    /// checking a transaction's inclusion in a block's transaction root.
    pub fn reconstruct_root(&self, leaf: &Hash) -> Hash {
        let mut acc = *leaf;
        for (sibling, is_left_sibling) in self.siblings.iter().zip(self.orientations.iter()) {
            acc = if *is_left_sibling {
                Hash::combine(sibling, &acc)
            } else {
                Hash::combine(&acc, sibling)
            };
        }
        acc
    }
}

/// Builds a Merkle root over an ordered list of leaves. Implementors are
/// the external streaming-builder collaborator named in the data model;
/// `SimpleMerkleTree` below is the reference implementation this
/// workspace uses on its own, grounded in the teacher's bottom-up,
/// duplicate-free-odd-node `MerkleTree::calculate_root`.
pub trait MerkleTreeStream {
    fn build(&self, leaves: &[Hash]) -> Hash;
}

/// Bottom-up pairwise Merkle tree. An odd trailing node is carried up
/// unchanged rather than duplicated, matching the teacher's
/// `core/src/crypto.rs::MerkleTree`.
#[derive(Default)]
pub struct SimpleMerkleTree;

impl MerkleTreeStream for SimpleMerkleTree {
    fn build(&self, leaves: &[Hash]) -> Hash {
        compute_root(leaves)
    }
}

pub fn compute_root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return Hash::ZERO;
    }
    if leaves.len() == 1 {
        return leaves[0];
    }

    let mut level = leaves.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let combined = if pair.len() == 2 {
                Hash::combine(&pair[0], &pair[1])
            } else {
                pair[0]
            };
            next.push(combined);
        }
        level = next;
    }
    level[0]
}

/// Builds the authentication path for `leaf_index` within `leaves`, using
/// the same odd-node-carries-up shape as `compute_root`. Exposed for
/// tests and for any proof-construction tooling built on this crate; the
/// proof validator itself only needs `MerklePath::reconstruct_root`.
pub fn build_path(leaves: &[Hash], leaf_index: usize) -> Option<MerklePath> {
    if leaf_index >= leaves.len() {
        return None;
    }

    let mut siblings = Vec::new();
    let mut orientations = Vec::new();
    let mut level = leaves.to_vec();
    let mut index = leaf_index;

    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for (i, pair) in level.chunks(2).enumerate() {
            let combined = if pair.len() == 2 {
                Hash::combine(&pair[0], &pair[1])
            } else {
                pair[0]
            };
            next.push(combined);

            if i == index / 2 && pair.len() == 2 {
                if index % 2 == 0 {
                    siblings.push(pair[1]);
                    orientations.push(false);
                } else {
                    siblings.push(pair[0]);
                    orientations.push(true);
                }
            }
        }
        index /= 2;
        level = next;
    }

    Some(MerklePath {
        siblings,
        orientations,
    })
}
