use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};
use spacetime_core::{AccountState, Block, BlockHeader, Hash, PublicKey};

use crate::error::StateError;

const BLOCKS_TABLE: TableDefinition<&[u8; 32], &[u8]> = TableDefinition::new("blocks");
const METADATA_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("metadata");
const HEIGHT_INDEX_TABLE: TableDefinition<i64, &[u8; 32]> = TableDefinition::new("height_index");
const DIFFICULTY_TABLE: TableDefinition<&[u8; 32], &[u8]> =
    TableDefinition::new("cumulative_difficulty");
const ACCOUNTS_TABLE: TableDefinition<&[u8; 33], &[u8]> = TableDefinition::new("accounts");
const TX_INDEX_TABLE: TableDefinition<&[u8; 32], &[u8]> = TableDefinition::new("transaction_index");

const BEST_HASH_KEY: &str = "best_hash";
const BEST_HEIGHT_KEY: &str = "best_height";
const GENESIS_HASH_KEY: &str = "genesis_hash";

/// Where a transaction can be found once it is committed to a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransactionLocation {
    pub block_hash: Hash,
    pub index: u32,
}

impl TransactionLocation {
    fn encode(&self) -> [u8; 36] {
        let mut out = [0u8; 36];
        out[..32].copy_from_slice(self.block_hash.as_bytes());
        out[32..].copy_from_slice(&self.index.to_le_bytes());
        out
    }

    fn decode(bytes: &[u8]) -> Result<Self, StateError> {
        if bytes.len() != 36 {
            return Err(StateError::Codec(spacetime_core::CoreError::InvalidSize {
                expected: 36,
                actual: bytes.len(),
            }));
        }
        let mut hash_bytes = [0u8; 32];
        hash_bytes.copy_from_slice(&bytes[..32]);
        let mut index_bytes = [0u8; 4];
        index_bytes.copy_from_slice(&bytes[32..]);
        Ok(TransactionLocation {
            block_hash: Hash::new(hash_bytes),
            index: u32::from_le_bytes(index_bytes),
        })
    }
}

/// Everything a newly-accepted block changes, written in a single redb
/// write transaction so the blocks, metadata, accounts, and transaction
/// index columns never observe a torn update. `extends_best` controls
/// whether the height index and best-hash/height metadata move forward;
/// a block stored without extending the best chain (a competing fork
/// tip) still gets its block/account/tx-index rows written.
pub struct BlockWriteBatch {
    pub block: Block,
    pub cumulative_difficulty: Vec<u8>,
    pub account_updates: HashMap<PublicKey, AccountState>,
    pub extends_best: bool,
}

/// The four logical columns the block and transaction validators, the
/// chain state manager, and the reorganizer consult. Grounded in the
/// teacher's `node::chain::ChainState` and `state::accounts::AccountState`
/// redb table layouts, reshaped behind trait seams so callers never touch
/// `redb` types directly.
pub trait BlocksColumn {
    fn get_block(&self, hash: &Hash) -> Result<Option<Block>, StateError>;
    fn get_header(&self, hash: &Hash) -> Result<Option<BlockHeader>, StateError>;
}

pub trait MetadataColumn {
    fn best_hash(&self) -> Result<Option<Hash>, StateError>;
    fn best_height(&self) -> Result<Option<i64>, StateError>;
    fn genesis_hash(&self) -> Result<Option<Hash>, StateError>;
    fn hash_at_height(&self, height: i64) -> Result<Option<Hash>, StateError>;
    fn cumulative_difficulty(&self, hash: &Hash) -> Result<Option<Vec<u8>>, StateError>;
}

pub trait AccountsColumn {
    fn get_account(&self, address: &PublicKey) -> Result<Option<AccountState>, StateError>;
}

pub trait TransactionIndexColumn {
    fn get_transaction_location(&self, tx_id: &Hash)
        -> Result<Option<TransactionLocation>, StateError>;
}

pub trait Storage: BlocksColumn + MetadataColumn + AccountsColumn + TransactionIndexColumn {
    fn apply_block_batch(&self, batch: BlockWriteBatch) -> Result<(), StateError>;

    /// Records the genesis block and seeds its premined account
    /// balances. Distinct from `apply_block_batch` because a genesis
    /// block has no parent to check continuity against.
    fn store_genesis(
        &self,
        block: Block,
        cumulative_difficulty: Vec<u8>,
        account_updates: HashMap<PublicKey, AccountState>,
    ) -> Result<(), StateError>;
}

/// `redb`-backed reference implementation of the storage interface.
pub struct RedbStorage {
    db: Arc<Database>,
}

impl RedbStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StateError> {
        let db = Database::create(path)?;
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(BLOCKS_TABLE)?;
            let _ = write_txn.open_table(METADATA_TABLE)?;
            let _ = write_txn.open_table(HEIGHT_INDEX_TABLE)?;
            let _ = write_txn.open_table(DIFFICULTY_TABLE)?;
            let _ = write_txn.open_table(ACCOUNTS_TABLE)?;
            let _ = write_txn.open_table(TX_INDEX_TABLE)?;
        }
        write_txn.commit()?;
        Ok(RedbStorage { db: Arc::new(db) })
    }

    pub fn from_db(db: Arc<Database>) -> Self {
        RedbStorage { db }
    }
}

impl BlocksColumn for RedbStorage {
    fn get_block(&self, hash: &Hash) -> Result<Option<Block>, StateError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(BLOCKS_TABLE)?;
        match table.get(hash.as_bytes())? {
            Some(value) => Ok(Some(Block::decode(value.value())?)),
            None => Ok(None),
        }
    }

    fn get_header(&self, hash: &Hash) -> Result<Option<BlockHeader>, StateError> {
        Ok(self.get_block(hash)?.map(|b| b.header))
    }
}

impl MetadataColumn for RedbStorage {
    fn best_hash(&self) -> Result<Option<Hash>, StateError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(METADATA_TABLE)?;
        match table.get(BEST_HASH_KEY)? {
            Some(value) => Ok(Some(Hash::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    fn best_height(&self) -> Result<Option<i64>, StateError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(METADATA_TABLE)?;
        match table.get(BEST_HEIGHT_KEY)? {
            Some(value) => {
                let bytes: [u8; 8] = value
                    .value()
                    .try_into()
                    .map_err(|_| spacetime_core::CoreError::InvalidSize {
                        expected: 8,
                        actual: value.value().len(),
                    })?;
                Ok(Some(i64::from_le_bytes(bytes)))
            }
            None => Ok(None),
        }
    }

    fn genesis_hash(&self) -> Result<Option<Hash>, StateError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(METADATA_TABLE)?;
        match table.get(GENESIS_HASH_KEY)? {
            Some(value) => Ok(Some(Hash::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    fn hash_at_height(&self, height: i64) -> Result<Option<Hash>, StateError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(HEIGHT_INDEX_TABLE)?;
        match table.get(height)? {
            Some(value) => Ok(Some(Hash::new(*value.value()))),
            None => Ok(None),
        }
    }

    fn cumulative_difficulty(&self, hash: &Hash) -> Result<Option<Vec<u8>>, StateError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DIFFICULTY_TABLE)?;
        Ok(table.get(hash.as_bytes())?.map(|v| v.value().to_vec()))
    }
}

impl AccountsColumn for RedbStorage {
    fn get_account(&self, address: &PublicKey) -> Result<Option<AccountState>, StateError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ACCOUNTS_TABLE)?;
        match table.get(address.as_bytes())? {
            Some(value) => Ok(Some(AccountState::decode(value.value())?)),
            None => Ok(None),
        }
    }
}

impl TransactionIndexColumn for RedbStorage {
    fn get_transaction_location(
        &self,
        tx_id: &Hash,
    ) -> Result<Option<TransactionLocation>, StateError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TX_INDEX_TABLE)?;
        match table.get(tx_id.as_bytes())? {
            Some(value) => Ok(Some(TransactionLocation::decode(value.value())?)),
            None => Ok(None),
        }
    }
}

impl Storage for RedbStorage {
    fn apply_block_batch(&self, batch: BlockWriteBatch) -> Result<(), StateError> {
        let block_hash = batch.block.hash();
        let block_bytes = batch.block.encode()?;
        let tx_hashes = batch.block.body.transaction_hashes()?;

        let write_txn = self.db.begin_write()?;
        {
            let mut blocks = write_txn.open_table(BLOCKS_TABLE)?;
            blocks.insert(block_hash.as_bytes(), block_bytes.as_slice())?;

            let mut difficulty = write_txn.open_table(DIFFICULTY_TABLE)?;
            difficulty.insert(block_hash.as_bytes(), batch.cumulative_difficulty.as_slice())?;

            let mut accounts = write_txn.open_table(ACCOUNTS_TABLE)?;
            for (address, state) in &batch.account_updates {
                accounts.insert(address.as_bytes(), state.encode().as_slice())?;
            }

            let mut tx_index = write_txn.open_table(TX_INDEX_TABLE)?;
            for (i, tx_hash) in tx_hashes.iter().enumerate() {
                let location = TransactionLocation {
                    block_hash,
                    index: i as u32,
                };
                tx_index.insert(tx_hash.as_bytes(), location.encode().as_slice())?;
            }

            if batch.extends_best {
                let mut height_index = write_txn.open_table(HEIGHT_INDEX_TABLE)?;
                height_index.insert(batch.block.header.height, block_hash.as_bytes())?;

                let mut metadata = write_txn.open_table(METADATA_TABLE)?;
                metadata.insert(BEST_HASH_KEY, block_hash.as_bytes().as_slice())?;
                metadata.insert(
                    BEST_HEIGHT_KEY,
                    batch.block.header.height.to_le_bytes().as_slice(),
                )?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn store_genesis(
        &self,
        block: Block,
        cumulative_difficulty: Vec<u8>,
        account_updates: HashMap<PublicKey, AccountState>,
    ) -> Result<(), StateError> {
        let block_hash = block.hash();
        let block_bytes = block.encode()?;

        let write_txn = self.db.begin_write()?;
        {
            let mut blocks = write_txn.open_table(BLOCKS_TABLE)?;
            blocks.insert(block_hash.as_bytes(), block_bytes.as_slice())?;

            let mut difficulty = write_txn.open_table(DIFFICULTY_TABLE)?;
            difficulty.insert(block_hash.as_bytes(), cumulative_difficulty.as_slice())?;

            let mut accounts = write_txn.open_table(ACCOUNTS_TABLE)?;
            for (address, state) in &account_updates {
                accounts.insert(address.as_bytes(), state.encode().as_slice())?;
            }

            let mut height_index = write_txn.open_table(HEIGHT_INDEX_TABLE)?;
            height_index.insert(block.header.height, block_hash.as_bytes())?;

            let mut metadata = write_txn.open_table(METADATA_TABLE)?;
            metadata.insert(BEST_HASH_KEY, block_hash.as_bytes().as_slice())?;
            metadata.insert(BEST_HEIGHT_KEY, block.header.height.to_le_bytes().as_slice())?;
            metadata.insert(GENESIS_HASH_KEY, block_hash.as_bytes().as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;
    use spacetime_core::merkle::{build_path, compute_root};
    use spacetime_core::{BlockBody, BlockHeader, BlockPlotMetadata, BlockProof, KeyPair};

    fn genesis_block(miner: &KeyPair) -> Block {
        let leaves: Vec<Hash> = (0..4u8).map(|i| Hash::digest(&[i])).collect();
        let plot_root = compute_root(&leaves);
        let path = build_path(&leaves, 0).unwrap();
        let challenge = Hash::digest(b"genesis challenge");
        let score = Hash::combine(&challenge, &leaves[0]);
        let header = BlockHeader::new_unsigned(
            Hash::ZERO,
            0,
            1_700_000_000,
            1,
            0,
            challenge,
            plot_root,
            score,
            Hash::ZERO,
            miner.public_key(),
        )
        .sign(miner);
        Block {
            header,
            body: BlockBody {
                transactions: vec![],
                proof: BlockProof {
                    metadata: BlockPlotMetadata {
                        leaf_count: leaves.len() as i64,
                        plot_id: Hash::digest(b"plot"),
                        plot_header_hash: plot_root,
                        version: 1,
                    },
                    leaf_value: leaves[0],
                    leaf_index: 0,
                    path,
                },
            },
        }
    }

    #[test]
    fn store_and_read_genesis() {
        let path = "spacetime_test_store_and_read_genesis.redb";
        let _ = std::fs::remove_file(path);
        let storage = RedbStorage::open(path).unwrap();
        let miner = KeyPair::generate(&mut OsRng);
        let block = genesis_block(&miner);
        let hash = block.hash();

        storage
            .store_genesis(block.clone(), vec![0u8], HashMap::new())
            .unwrap();

        assert_eq!(storage.get_block(&hash).unwrap(), Some(block));
        assert_eq!(storage.best_hash().unwrap(), Some(hash));
        assert_eq!(storage.best_height().unwrap(), Some(0));
        assert_eq!(storage.genesis_hash().unwrap(), Some(hash));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn account_and_tx_index_round_trip() {
        let path = "spacetime_test_account_and_tx_index.redb";
        let _ = std::fs::remove_file(path);
        let storage = RedbStorage::open(path).unwrap();
        let miner = KeyPair::generate(&mut OsRng);
        let sender = KeyPair::generate(&mut OsRng);
        let recipient = KeyPair::generate(&mut OsRng);

        let tx = spacetime_core::Transaction::new_unsigned(
            sender.public_key(),
            recipient.public_key(),
            10,
            0,
            1,
        )
        .sign(&sender);

        let mut genesis = genesis_block(&miner);
        genesis.body.transactions = vec![tx.clone()];
        genesis.header.tx_root = compute_root(&genesis.body.transaction_hashes().unwrap());
        let genesis = genesis_with_resigned_header(genesis, &miner);

        let mut updates = HashMap::new();
        updates.insert(sender.public_key(), AccountState::new(89, 1));
        updates.insert(recipient.public_key(), AccountState::new(10, 0));

        storage
            .store_genesis(genesis.clone(), vec![0u8], updates)
            .unwrap();

        assert_eq!(
            storage.get_account(&sender.public_key()).unwrap(),
            Some(AccountState::new(89, 1))
        );
        let location = storage
            .get_transaction_location(&tx.id().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(location.block_hash, genesis.hash());
        assert_eq!(location.index, 0);
        std::fs::remove_file(path).ok();
    }

    fn genesis_with_resigned_header(mut block: Block, miner: &KeyPair) -> Block {
        block.header.signature.clear();
        block.header = block.header.sign(miner);
        block
    }
}
