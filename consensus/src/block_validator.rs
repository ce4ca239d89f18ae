use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use spacetime_core::{compute_root, Block, Hash, HEADER_VERSION};
use tracing::{debug, warn};

use crate::chain_context::ChainContext;
use crate::difficulty::DifficultyAdjuster;
use crate::epoch::EpochManager;
use crate::error::ConsensusError;
use crate::overlay::StateOverlay;
use crate::proof_validator::ProofValidator;
use crate::tx_validator::TransactionValidator;

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct BlockValidatorConfig {
    pub max_future_drift_secs: i64,
}

impl Default for BlockValidatorConfig {
    fn default() -> Self {
        BlockValidatorConfig {
            max_future_drift_secs: 120,
        }
    }
}

impl BlockValidatorConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_future_drift_secs < 0 {
            return Err("max_future_drift_secs must be non-negative".into());
        }
        Ok(())
    }
}

/// Runs the nine-step ordered validation pipeline for a non-genesis
/// block: version, header-signed, timestamp skew, header signature,
/// context against chain state, transaction root, per-transaction
/// rules, proof score against target, and full proof validity.
/// Grounded in the teacher's `node::validator::BlockValidator::validate_block`
/// (same ordered-pipeline shape, typed error per step).
pub struct BlockValidator {
    config: BlockValidatorConfig,
    epoch_manager: EpochManager,
    difficulty_adjuster: DifficultyAdjuster,
    proof_validator: ProofValidator,
    tx_validator: TransactionValidator,
}

impl BlockValidator {
    pub fn new(
        config: BlockValidatorConfig,
        epoch_manager: EpochManager,
        difficulty_adjuster: DifficultyAdjuster,
        tx_validator: TransactionValidator,
    ) -> Self {
        BlockValidator {
            config,
            epoch_manager,
            difficulty_adjuster,
            proof_validator: ProofValidator::new(),
            tx_validator,
        }
    }

    pub fn validate_block<C: ChainContext>(
        &self,
        block: &Block,
        chain: &C,
        now: i64,
    ) -> Result<(), ConsensusError> {
        let result = self.validate_block_steps(block, chain, now);
        match &result {
            Ok(()) => debug!(height = block.header.height, hash = %block.hash(), "block passed validation"),
            Err(err) => warn!(height = block.header.height, hash = %block.hash(), %err, "block rejected"),
        }
        result
    }

    fn validate_block_steps<C: ChainContext>(
        &self,
        block: &Block,
        chain: &C,
        now: i64,
    ) -> Result<(), ConsensusError> {
        let header = &block.header;

        // 1. Version.
        if header.version != HEADER_VERSION {
            return Err(ConsensusError::UnsupportedVersion(header.version));
        }

        // 2. Header signed.
        if !header.is_signed() {
            return Err(ConsensusError::HeaderNotSigned);
        }

        // 3. Timestamp skew: not further in the future than tolerated.
        if header.timestamp > now + self.config.max_future_drift_secs {
            return Err(ConsensusError::TimestampTooFarInFuture {
                timestamp: header.timestamp,
                now,
                max_drift: self.config.max_future_drift_secs,
            });
        }

        // 4. Header signature.
        if !header.verify_signature() {
            return Err(ConsensusError::InvalidHeaderSignature);
        }

        // 5. Context against chain state: parent exists, height follows
        // it, timestamp is monotonic, and epoch/challenge are consistent
        // with the parent and height.
        let parent = chain
            .get_header(&header.parent_hash)
            .ok_or(ConsensusError::ParentNotFound)?;
        if header.height != parent.height + 1 {
            return Err(ConsensusError::InvalidHeight {
                expected: parent.height + 1,
                actual: header.height,
            });
        }
        if header.timestamp <= parent.timestamp {
            return Err(ConsensusError::TimestampNotMonotonic {
                timestamp: header.timestamp,
                parent_timestamp: parent.timestamp,
            });
        }
        self.epoch_manager
            .validate(&header.parent_hash, header.epoch, &header.challenge)?;
        debug!(height = header.height, "context against chain state ok");

        // 6. Transaction root.
        let tx_hashes = block.body.transaction_hashes()?;
        let computed_root = compute_root(&tx_hashes);
        if computed_root != header.tx_root {
            return Err(ConsensusError::InvalidTransactionRoot {
                expected: computed_root,
                actual: header.tx_root,
            });
        }

        // 7. Per-transaction rules, including in-block double-spend
        // detection via a state overlay seeded from committed state.
        let mut overlay = StateOverlay::new(chain);
        let mut seen: HashSet<Hash> = HashSet::new();
        for (index, tx) in block.body.transactions.iter().enumerate() {
            self.tx_validator
                .validate_and_apply(tx, chain, &mut overlay, &mut seen)
                .map_err(|source| ConsensusError::InvalidTransactionAt {
                    index,
                    source: Box::new(source),
                })?;
        }

        // 8. Proof score against target: cheap early check on the
        // header's claimed score before the full proof is examined.
        self.proof_validator.score_meets_target(
            &header.proof_score,
            header.difficulty,
            &self.difficulty_adjuster,
        )?;

        // 9. Full proof validity: challenge, plot root, score
        // recomputation, and Merkle path reconstruction.
        self.proof_validator
            .validate(
                header,
                &block.body.proof,
                &header.parent_hash,
                &self.difficulty_adjuster,
            )
            .map_err(|e| ConsensusError::InvalidProof(Box::new(e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account_reader::AccountStateReader;
    use crate::difficulty::DifficultyConfig;
    use crate::epoch::{EpochConfig, EpochState};
    use crate::tx_validator::TransactionValidatorConfig;
    use rand::rngs::OsRng;
    use spacetime_core::merkle::build_path;
    use spacetime_core::{
        AccountState, BlockBody, BlockHeader, BlockPlotMetadata, BlockProof, KeyPair, PublicKey,
        Transaction,
    };
    use std::collections::HashMap;

    struct FakeChain {
        headers: HashMap<Hash, BlockHeader>,
        accounts: HashMap<PublicKey, AccountState>,
        confirmed: std::collections::HashSet<Hash>,
    }

    impl AccountStateReader for FakeChain {
        fn get_account(&self, address: &PublicKey) -> Option<AccountState> {
            self.accounts.get(address).copied()
        }
    }

    impl ChainContext for FakeChain {
        fn get_header(&self, hash: &Hash) -> Option<BlockHeader> {
            self.headers.get(hash).cloned()
        }

        fn is_transaction_confirmed(&self, tx_id: &Hash) -> bool {
            self.confirmed.contains(tx_id)
        }
    }

    fn validator() -> BlockValidator {
        BlockValidator::new(
            BlockValidatorConfig::default(),
            EpochManager::new(
                EpochConfig {
                    epoch_duration_secs: 1_000_000,
                },
                EpochState {
                    current_epoch: 0,
                    current_challenge: Hash::ZERO,
                    epoch_start_time: 0,
                },
            ),
            DifficultyAdjuster::new(DifficultyConfig {
                target_block_time_secs: 30,
                adjustment_window_blocks: 10,
                min_difficulty: 1,
                max_difficulty: 1,
                dampening_factor: 4,
            }),
            TransactionValidator::new(TransactionValidatorConfig::default()),
        )
    }

    fn build_valid_block(
        miner: &KeyPair,
        parent_hash: Hash,
        parent_timestamp: i64,
        height: i64,
        timestamp: i64,
        transactions: Vec<Transaction>,
    ) -> Block {
        let epoch = 0i64;
        let _ = parent_timestamp;
        let challenge = EpochManager::derive_challenge(&parent_hash, epoch);
        let leaves: Vec<Hash> = (0..4u8).map(|i| Hash::digest(&[i])).collect();
        let plot_root = compute_root(&leaves);
        let leaf_index = 0usize;
        let leaf_value = leaves[leaf_index];
        let path = build_path(&leaves, leaf_index).unwrap();
        let score = Hash::combine(&challenge, &leaf_value);

        let tx_hashes: Vec<Hash> = transactions.iter().map(|t| t.id().unwrap()).collect();
        let tx_root = compute_root(&tx_hashes);

        let header = BlockHeader::new_unsigned(
            parent_hash,
            height,
            timestamp,
            1,
            epoch,
            challenge,
            plot_root,
            score,
            tx_root,
            miner.public_key(),
        )
        .sign(miner);

        let proof = BlockProof {
            metadata: BlockPlotMetadata {
                leaf_count: leaves.len() as i64,
                plot_id: plot_root,
                plot_header_hash: plot_root,
                version: 1,
            },
            leaf_value,
            leaf_index: leaf_index as i64,
            path,
        };

        Block {
            header,
            body: BlockBody {
                transactions,
                proof,
            },
        }
    }

    fn genesis_and_chain() -> (KeyPair, FakeChain) {
        let miner = KeyPair::generate(&mut OsRng);
        let genesis = build_valid_block(&miner, Hash::ZERO, 0, 0, 1_700_000_000, vec![]);
        let mut headers = HashMap::new();
        headers.insert(Hash::ZERO, genesis.header.clone());
        let chain = FakeChain {
            headers,
            accounts: HashMap::new(),
            confirmed: std::collections::HashSet::new(),
        };
        (miner, chain)
    }

    #[test]
    fn valid_block_passes_full_pipeline() {
        let (miner, chain) = genesis_and_chain();
        let block = build_valid_block(&miner, Hash::ZERO, 1_700_000_000, 1, 1_700_000_030, vec![]);
        let result = validator().validate_block(&block, &chain, 1_700_000_100);
        assert!(result.is_ok(), "{:?}", result);
    }

    #[test]
    fn wrong_height_is_rejected() {
        let (miner, chain) = genesis_and_chain();
        let mut block =
            build_valid_block(&miner, Hash::ZERO, 1_700_000_000, 1, 1_700_000_030, vec![]);
        block.header = BlockHeader::new_unsigned(
            block.header.parent_hash,
            5,
            block.header.timestamp,
            block.header.difficulty,
            block.header.epoch,
            block.header.challenge,
            block.header.plot_root,
            block.header.proof_score,
            block.header.tx_root,
            block.header.miner_id,
        )
        .sign(&miner);
        let err = validator()
            .validate_block(&block, &chain, 1_700_000_100)
            .unwrap_err();
        assert!(matches!(err, ConsensusError::InvalidHeight { .. }));
    }

    #[test]
    fn future_timestamp_is_rejected() {
        let (miner, chain) = genesis_and_chain();
        let block = build_valid_block(
            &miner,
            Hash::ZERO,
            1_700_000_000,
            1,
            1_700_000_000 + 10_000,
            vec![],
        );
        let err = validator()
            .validate_block(&block, &chain, 1_700_000_100)
            .unwrap_err();
        assert!(matches!(err, ConsensusError::TimestampTooFarInFuture { .. }));
    }

    #[test]
    fn missing_parent_is_rejected() {
        let (miner, chain) = genesis_and_chain();
        let block = build_valid_block(
            &miner,
            Hash::digest(b"no such parent"),
            1_700_000_000,
            1,
            1_700_000_030,
            vec![],
        );
        let err = validator()
            .validate_block(&block, &chain, 1_700_000_100)
            .unwrap_err();
        assert_eq!(err, ConsensusError::ParentNotFound);
    }

    #[test]
    fn transaction_with_bad_signature_is_rejected() {
        let (miner, mut chain) = genesis_and_chain();
        let sender = KeyPair::generate(&mut OsRng);
        let recipient = KeyPair::generate(&mut OsRng);
        chain
            .accounts
            .insert(sender.public_key(), AccountState::new(100, 0));
        let mut tx =
            Transaction::new_unsigned(sender.public_key(), recipient.public_key(), 10, 0, 1)
                .sign(&sender);
        tx.signature[0] ^= 0xff;
        let block = build_valid_block(
            &miner,
            Hash::ZERO,
            1_700_000_000,
            1,
            1_700_000_030,
            vec![tx],
        );
        let err = validator()
            .validate_block(&block, &chain, 1_700_000_100)
            .unwrap_err();
        assert!(matches!(err, ConsensusError::InvalidTransactionAt { .. }));
    }
}
