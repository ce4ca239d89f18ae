use num_bigint::BigUint;
use spacetime_core::{BlockHeader, BlockProof, Hash};

use crate::difficulty::DifficultyAdjuster;
use crate::error::ConsensusError;

/// Validates a block's proof-of-space-time evidence against its header,
/// in the fixed five-step order: challenge match, plot-root match, score
/// recompute, target comparison, Merkle path reconstruction. Grounded in
/// the teacher's `core::crypto::MerkleTree` (bottom-up hashing) plus
/// `node::validator::BlockValidator::validate_difficulty`, generalized
/// from a leading-zero-bits check to a big-integer target comparison.
pub struct ProofValidator;

impl ProofValidator {
    pub fn new() -> Self {
        ProofValidator
    }

    /// Cheap standalone check: does the header's claimed `proof_score`
    /// meet the target implied by its `difficulty`? Used by the block
    /// validator as an early-reject step before the more expensive full
    /// proof check (`validate`) recomputes the score from the plot proof
    /// and reconstructs its Merkle path.
    pub fn score_meets_target(
        &self,
        proof_score: &Hash,
        difficulty: i64,
        difficulty_adjuster: &DifficultyAdjuster,
    ) -> Result<(), ConsensusError> {
        let target = difficulty_adjuster.difficulty_to_target(difficulty);
        let score = BigUint::from_bytes_be(proof_score.as_bytes());
        if score > target {
            return Err(ConsensusError::TargetNotMet {
                score: score.to_str_radix(16),
                target: target.to_str_radix(16),
            });
        }
        Ok(())
    }

    pub fn validate(
        &self,
        header: &BlockHeader,
        proof: &BlockProof,
        parent_hash: &Hash,
        difficulty_adjuster: &DifficultyAdjuster,
    ) -> Result<(), ConsensusError> {
        // 1. Challenge match: the header's challenge must be exactly the
        // one this epoch and parent imply.
        let expected_challenge =
            crate::epoch::EpochManager::derive_challenge(parent_hash, header.epoch);
        if expected_challenge != header.challenge {
            return Err(ConsensusError::ChallengeMismatch {
                expected: expected_challenge,
                actual: header.challenge,
            });
        }

        // 2. Plot-root match: the header's committed plot root is the
        // plot's identity, so it must equal the proof metadata's plot_id.
        if header.plot_root != proof.metadata.plot_id {
            return Err(ConsensusError::PlotRootMismatch);
        }

        if proof.leaf_index < 0 || proof.leaf_index >= proof.metadata.leaf_count {
            return Err(ConsensusError::LeafIndexOutOfRange {
                index: proof.leaf_index,
                leaf_count: proof.metadata.leaf_count,
            });
        }

        // 3. Score recompute: score = SHA256(challenge || leaf_value).
        let expected_score = Hash::combine(&header.challenge, &proof.leaf_value);
        if expected_score != header.proof_score {
            return Err(ConsensusError::ScoreMismatch);
        }

        // 4. Target comparison: the score, read as a big-endian 256-bit
        // integer, must not exceed the target implied by the header's
        // difficulty.
        let target = difficulty_adjuster.difficulty_to_target(header.difficulty);
        let score = BigUint::from_bytes_be(expected_score.as_bytes());
        if score > target {
            return Err(ConsensusError::TargetNotMet {
                score: score.to_str_radix(16),
                target: target.to_str_radix(16),
            });
        }

        // 5. Merkle path reconstruction: the leaf plus its authentication
        // path must reconstruct the plot's committed root.
        let reconstructed = proof.path.reconstruct_root(&proof.leaf_value);
        if reconstructed != proof.metadata.plot_header_hash {
            return Err(ConsensusError::InvalidMerklePath);
        }

        Ok(())
    }
}

impl Default for ProofValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spacetime_core::merkle::build_path;
    use spacetime_core::BlockPlotMetadata;

    fn make_header_and_proof(leaf_index: i64, tamper_score: bool) -> (BlockHeader, BlockProof, Hash) {
        let parent_hash = Hash::digest(b"parent");
        let epoch = 0i64;
        let challenge = crate::epoch::EpochManager::derive_challenge(&parent_hash, epoch);

        let leaves: Vec<Hash> = (0..4u8).map(|i| Hash::digest(&[i])).collect();
        let plot_root = spacetime_core::compute_root(&leaves);
        let leaf_value = leaves[leaf_index as usize];
        let path = build_path(&leaves, leaf_index as usize).unwrap();

        let mut score = Hash::combine(&challenge, &leaf_value);
        if tamper_score {
            score = Hash::digest(b"wrong score");
        }

        // Proof validation never checks the miner key itself, only header
        // commitments, so any valid key will do.
        let miner_id = spacetime_core::KeyPair::generate(&mut rand::rngs::OsRng).public_key();

        let header = BlockHeader::new_unsigned(
            parent_hash,
            1,
            1_700_000_000,
            1,
            epoch,
            challenge,
            plot_root,
            score,
            Hash::ZERO,
            miner_id,
        );

        let proof = BlockProof {
            metadata: BlockPlotMetadata {
                leaf_count: leaves.len() as i64,
                plot_id: plot_root,
                plot_header_hash: plot_root,
                version: 1,
            },
            leaf_value,
            leaf_index,
            path,
        };

        (header, proof, parent_hash)
    }

    fn easy_adjuster() -> DifficultyAdjuster {
        DifficultyAdjuster::new(crate::difficulty::DifficultyConfig {
            target_block_time_secs: 30,
            adjustment_window_blocks: 10,
            min_difficulty: 1,
            max_difficulty: 1,
            dampening_factor: 4,
        })
    }

    #[test]
    fn valid_proof_passes() {
        let (header, proof, parent) = make_header_and_proof(1, false);
        let validator = ProofValidator::new();
        assert!(validator
            .validate(&header, &proof, &parent, &easy_adjuster())
            .is_ok());
    }

    #[test]
    fn tampered_score_is_rejected() {
        let (header, proof, parent) = make_header_and_proof(1, true);
        let validator = ProofValidator::new();
        let err = validator
            .validate(&header, &proof, &parent, &easy_adjuster())
            .unwrap_err();
        assert_eq!(err, ConsensusError::ScoreMismatch);
    }

    #[test]
    fn wrong_parent_breaks_challenge_match() {
        let (header, proof, _parent) = make_header_and_proof(1, false);
        let validator = ProofValidator::new();
        let wrong_parent = Hash::digest(b"someone else's parent");
        let err = validator
            .validate(&header, &proof, &wrong_parent, &easy_adjuster())
            .unwrap_err();
        assert!(matches!(err, ConsensusError::ChallengeMismatch { .. }));
    }

    #[test]
    fn out_of_range_leaf_index_is_rejected() {
        let (header, mut proof, parent) = make_header_and_proof(1, false);
        proof.leaf_index = proof.metadata.leaf_count;
        let validator = ProofValidator::new();
        let err = validator
            .validate(&header, &proof, &parent, &easy_adjuster())
            .unwrap_err();
        assert!(matches!(err, ConsensusError::LeafIndexOutOfRange { .. }));
    }

    #[test]
    fn tampered_path_breaks_merkle_reconstruction() {
        let (header, mut proof, parent) = make_header_and_proof(1, false);
        proof.path.siblings[0] = Hash::digest(b"wrong sibling");
        let validator = ProofValidator::new();
        let err = validator
            .validate(&header, &proof, &parent, &easy_adjuster())
            .unwrap_err();
        assert_eq!(err, ConsensusError::InvalidMerklePath);
    }
}
