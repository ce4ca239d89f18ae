use std::collections::HashMap;

use crate::account::AccountState;
use crate::crypto::{KeyPair, PublicKey};
use crate::error::CoreError;
use crate::hash::Hash;
use crate::merkle::{build_path, compute_root};
use crate::proof::{Block, BlockBody, BlockPlotMetadata, BlockProof};
use crate::block::BlockHeader;

/// Genesis parameters, recognized options per the data model: network
/// identity (which also seeds the genesis challenge), the initial
/// difficulty/epoch/timestamp a height-0 header carries, the epoch and
/// retarget timing new blocks are judged against, and a premine map of
/// hex-encoded compressed public keys to starting balances. Grounded in
/// the teacher's `node::genesis::GenesisConfig`, generalized from a
/// single `genesis_address`/`initial_supply` pair to a full allocation map.
#[derive(Clone, Debug)]
pub struct GenesisConfig {
    pub network_id: String,
    pub initial_timestamp: i64,
    pub initial_difficulty: i64,
    pub initial_epoch: i64,
    pub epoch_duration_seconds: i64,
    pub target_block_time_secs: i64,
    pub premined_allocations: HashMap<String, i64>,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        GenesisConfig {
            network_id: "spacetime-mainnet".to_string(),
            initial_timestamp: 1_735_689_600,
            initial_difficulty: 1,
            initial_epoch: 0,
            epoch_duration_seconds: 1_209_600,
            target_block_time_secs: 30,
            premined_allocations: HashMap::new(),
        }
    }
}

impl GenesisConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.initial_difficulty <= 0 {
            return Err("initial_difficulty must be positive".into());
        }
        if self.initial_epoch < 0 {
            return Err("initial_epoch must be non-negative".into());
        }
        if self.epoch_duration_seconds <= 0 {
            return Err("epoch_duration_seconds must be positive".into());
        }
        if self.target_block_time_secs <= 0 {
            return Err("target_block_time_secs must be positive".into());
        }
        for (key, balance) in &self.premined_allocations {
            if *balance < 0 {
                return Err(format!("premined allocation for {key} must be non-negative"));
            }
        }
        Ok(())
    }

    /// `SHA256(network_id_utf8)`, the fixed challenge every height-0
    /// header must carry regardless of the epoch manager's normal
    /// `parent_hash`-derived formula (genesis has no parent).
    pub fn genesis_challenge(&self) -> Hash {
        Hash::digest(self.network_id.as_bytes())
    }

    /// Parses `premined_allocations`' hex-encoded keys into an account
    /// map ready for `ChainStateManager::initialize_genesis`.
    pub fn premine_accounts(&self) -> Result<HashMap<PublicKey, AccountState>, CoreError> {
        let mut accounts = HashMap::with_capacity(self.premined_allocations.len());
        for (hex_key, balance) in &self.premined_allocations {
            let bytes = hex::decode(hex_key).map_err(|_| CoreError::InvalidFieldRange {
                field: "premined_allocations",
                reason: format!("'{hex_key}' is not valid hex"),
            })?;
            let key = PublicKey::from_slice(&bytes)?;
            accounts.insert(key, AccountState::new(*balance, 0));
        }
        Ok(accounts)
    }
}

/// Builds the genesis block: a height-0, empty-body block whose header
/// carries the config's fixed challenge and a single-leaf plot proof
/// trivially consistent with that challenge, signed by `miner`. Grounded
/// in the teacher's `node::genesis::create_genesis_block`, adapted from a
/// coinbase-transaction issuance model to this chain's direct premine
/// account credits.
pub fn build_genesis(config: &GenesisConfig, miner: &KeyPair) -> Block {
    let challenge = config.genesis_challenge();
    let leaves = vec![Hash::digest(
        format!("{}-genesis-plot", config.network_id).as_bytes(),
    )];
    let plot_root = compute_root(&leaves);
    let path = build_path(&leaves, 0).expect("single-leaf path always builds");
    let score = Hash::combine(&challenge, &leaves[0]);

    let header = BlockHeader::new_unsigned(
        Hash::ZERO,
        0,
        config.initial_timestamp,
        config.initial_difficulty,
        config.initial_epoch,
        challenge,
        plot_root,
        score,
        Hash::ZERO,
        miner.public_key(),
    )
    .sign(miner);

    let proof = BlockProof {
        metadata: BlockPlotMetadata {
            leaf_count: 1,
            plot_id: plot_root,
            plot_header_hash: plot_root,
            version: 1,
        },
        leaf_value: leaves[0],
        leaf_index: 0,
        path,
    };

    Block {
        header,
        body: BlockBody {
            transactions: vec![],
            proof,
        },
    }
}

/// Checks that a block is a valid genesis for `config`: height 0, zero
/// parent, the config's fixed challenge, and an internally consistent
/// plot proof. Does not check the miner's signature against any
/// particular expected key — any validly signed key may mine genesis.
pub fn is_valid_genesis(block: &Block, config: &GenesisConfig) -> bool {
    let header = &block.header;
    if header.height != 0 || header.parent_hash != Hash::ZERO {
        return false;
    }
    if !block.body.transactions.is_empty() {
        return false;
    }
    if header.challenge != config.genesis_challenge() {
        return false;
    }
    if header.plot_root != block.body.proof.metadata.plot_id {
        return false;
    }
    let expected_score = Hash::combine(&header.challenge, &block.body.proof.leaf_value);
    if expected_score != header.proof_score {
        return false;
    }
    let reconstructed = block
        .body
        .proof
        .path
        .reconstruct_root(&block.body.proof.leaf_value);
    reconstructed == block.body.proof.metadata.plot_header_hash
}
