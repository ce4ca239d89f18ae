use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use num_bigint::BigUint;
use spacetime_consensus::{AccountStateReader, ChainContext};
use spacetime_core::{AccountState, Block, BlockHeader, Hash, PublicKey};

use crate::error::StateError;
use crate::storage::{BlockWriteBatch, Storage, TransactionIndexColumn};

/// One previously-applied block's undo information, kept around only as
/// long as `max_revert_depth` allows. Reverting past this window means
/// re-syncing from storage rather than rewinding in place.
struct AppliedBlock {
    hash: Hash,
    height: i64,
    parent_hash: Hash,
    pre_accounts: HashMap<PublicKey, Option<AccountState>>,
}

/// A restore point returned by `snapshot`, naming the chain tip at the
/// moment it was taken.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainSnapshot {
    pub height: i64,
    pub hash: Hash,
}

/// Read-only chain introspection, returned by `ChainStateManager::stats`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainStats {
    pub best_height: i64,
    pub best_hash: Hash,
    pub genesis_hash: Hash,
}

/// Wraps a `Storage` with the account-balance application logic and a
/// bounded undo log, and exposes the consensus crate's read-only
/// `AccountStateReader`/`ChainContext` seams so the validator never needs
/// to know this crate exists. Grounded in the teacher's
/// `node::chain::ChainState`, which plays the same role over its
/// `BLOCKS_TABLE`/`METADATA_TABLE` pair.
pub struct ChainStateManager<S: Storage> {
    storage: Arc<S>,
    max_revert_depth: usize,
    undo_log: Mutex<VecDeque<AppliedBlock>>,
}

impl<S: Storage> ChainStateManager<S> {
    pub fn new(storage: Arc<S>, max_revert_depth: usize) -> Self {
        ChainStateManager {
            storage,
            max_revert_depth,
            undo_log: Mutex::new(VecDeque::new()),
        }
    }

    pub fn best_hash(&self) -> Result<Option<Hash>, StateError> {
        self.storage.best_hash()
    }

    pub fn best_height(&self) -> Result<Option<i64>, StateError> {
        self.storage.best_height()
    }

    pub fn genesis_hash(&self) -> Result<Option<Hash>, StateError> {
        self.storage.genesis_hash()
    }

    pub fn cumulative_difficulty(&self, hash: &Hash) -> Result<BigUint, StateError> {
        match self.storage.cumulative_difficulty(hash)? {
            Some(bytes) => Ok(BigUint::from_bytes_be(&bytes)),
            None => Ok(BigUint::from(0u8)),
        }
    }

    pub fn get_block(&self, hash: &Hash) -> Result<Option<Block>, StateError> {
        self.storage.get_block(hash)
    }

    /// Read-only snapshot of chain height/tip/genesis, grounded in the
    /// teacher's `node::chain::ChainState::get_stats`.
    pub fn stats(&self) -> Result<ChainStats, StateError> {
        Ok(ChainStats {
            best_height: self.storage.best_height()?.unwrap_or(0),
            best_hash: self.storage.best_hash()?.unwrap_or(Hash::ZERO),
            genesis_hash: self.storage.genesis_hash()?.unwrap_or(Hash::ZERO),
        })
    }

    /// Records a block that does not extend the live best chain. Its
    /// account effects are not applied; `ChainReorganizer` reapplies them
    /// later if the side chain it belongs to overtakes the best chain.
    pub fn store_side_chain_block(&self, block: Block) -> Result<Hash, StateError> {
        let parent_difficulty = self.cumulative_difficulty(&block.header.parent_hash)?;
        let new_difficulty = parent_difficulty + BigUint::from(block.header.difficulty.max(0) as u64);
        let hash = block.hash();
        self.storage.apply_block_batch(BlockWriteBatch {
            block,
            cumulative_difficulty: new_difficulty.to_bytes_be(),
            account_updates: HashMap::new(),
            extends_best: false,
        })?;
        Ok(hash)
    }

    pub fn initialize_genesis(
        &self,
        block: Block,
        premine: HashMap<PublicKey, AccountState>,
    ) -> Result<(), StateError> {
        let difficulty = BigUint::from(block.header.difficulty.max(0) as u64);
        self.storage
            .store_genesis(block, difficulty.to_bytes_be(), premine)
    }

    /// Reads an account's current value, consulting `account_updates`
    /// first so a sender/recipient touched earlier in the same block
    /// sees its own pending delta, and records the pre-block value in
    /// `pre_accounts` the first time any given address is touched.
    fn fetch_account(
        &self,
        address: &PublicKey,
        account_updates: &HashMap<PublicKey, AccountState>,
        pre_accounts: &mut HashMap<PublicKey, Option<AccountState>>,
    ) -> Result<AccountState, StateError> {
        if let Some(state) = account_updates.get(address) {
            return Ok(*state);
        }
        let existing = self.storage.get_account(address)?;
        pre_accounts.entry(*address).or_insert(existing);
        Ok(existing.unwrap_or_default())
    }

    /// Applies an already-validated block on top of the current best
    /// chain: debits senders, credits recipients and the miner (fees
    /// only — there is no coinbase/subsidy in this account model), and
    /// advances the height index and best-hash metadata in one storage
    /// transaction.
    pub fn apply_block(&self, block: Block) -> Result<Hash, StateError> {
        let parent_hash = block.header.parent_hash;
        let parent_difficulty = self.cumulative_difficulty(&parent_hash)?;
        let new_difficulty = parent_difficulty + BigUint::from(block.header.difficulty.max(0) as u64);

        let mut account_updates: HashMap<PublicKey, AccountState> = HashMap::new();
        let mut pre_accounts: HashMap<PublicKey, Option<AccountState>> = HashMap::new();
        let mut fees_collected: i64 = 0;

        for tx in &block.body.transactions {
            let mut sender = self.fetch_account(&tx.sender, &account_updates, &mut pre_accounts)?;
            sender.balance -= tx.amount + tx.fee;
            sender.nonce += 1;
            account_updates.insert(tx.sender, sender);

            let mut recipient =
                self.fetch_account(&tx.recipient, &account_updates, &mut pre_accounts)?;
            recipient.balance += tx.amount;
            account_updates.insert(tx.recipient, recipient);

            fees_collected += tx.fee;
        }

        let mut miner =
            self.fetch_account(&block.header.miner_id, &account_updates, &mut pre_accounts)?;
        miner.balance += fees_collected;
        account_updates.insert(block.header.miner_id, miner);

        let hash = block.hash();
        let height = block.header.height;
        let batch = BlockWriteBatch {
            block,
            cumulative_difficulty: new_difficulty.to_bytes_be(),
            account_updates,
            extends_best: true,
        };
        self.storage.apply_block_batch(batch)?;

        let mut undo_log = self.undo_log.lock().expect("undo log mutex poisoned");
        undo_log.push_back(AppliedBlock {
            hash,
            height,
            parent_hash,
            pre_accounts,
        });
        while undo_log.len() > self.max_revert_depth {
            undo_log.pop_front();
        }

        Ok(hash)
    }

    /// Names the current tip as a point the caller may later attempt to
    /// `revert` to, as long as it is still within `max_revert_depth`
    /// blocks of the live tip.
    pub fn snapshot(&self) -> Result<ChainSnapshot, StateError> {
        let height = self.storage.best_height()?.unwrap_or(0);
        let hash = self
            .storage
            .best_hash()?
            .ok_or(StateError::HeightNotFound(height))?;
        Ok(ChainSnapshot { height, hash })
    }

    /// Undoes blocks back to (but not including) `target`, restoring the
    /// account balances each of them overwrote and moving the best-chain
    /// pointer back to `target.hash`. Fails if `target` is deeper than
    /// the retained undo log.
    pub fn revert(&self, target: ChainSnapshot) -> Result<(), StateError> {
        let mut undo_log = self.undo_log.lock().expect("undo log mutex poisoned");
        let available = undo_log.len();
        let current_height = self.storage.best_height()?.unwrap_or(0);
        let requested = current_height - target.height;
        if requested < 0 || requested as usize > available {
            return Err(StateError::RevertDepthExceeded {
                requested: requested.max(0),
                available: available as i64,
            });
        }

        let mut restored_accounts: HashMap<PublicKey, AccountState> = HashMap::new();
        let mut cursor_hash = self
            .storage
            .best_hash()?
            .ok_or(StateError::HeightNotFound(current_height))?;

        while let Some(applied) = undo_log.back() {
            if applied.hash != cursor_hash || applied.height <= target.height {
                break;
            }
            for (address, pre_state) in &applied.pre_accounts {
                restored_accounts
                    .entry(*address)
                    .or_insert(pre_state.unwrap_or_default());
            }
            cursor_hash = applied.parent_hash;
            undo_log.pop_back();
        }

        let target_block = self
            .storage
            .get_block(&target.hash)?
            .ok_or(StateError::BlockNotFound(target.hash))?;
        let cumulative = self
            .storage
            .cumulative_difficulty(&target.hash)?
            .ok_or(StateError::BlockNotFound(target.hash))?;

        self.storage.apply_block_batch(BlockWriteBatch {
            block: target_block,
            cumulative_difficulty: cumulative,
            account_updates: restored_accounts,
            extends_best: true,
        })
    }

    /// Drops undo-log entries older than `keep_depth` blocks behind the
    /// live tip; those blocks remain on disk but can no longer be
    /// reverted to in place.
    pub fn release(&self, keep_depth: usize) {
        let mut undo_log = self.undo_log.lock().expect("undo log mutex poisoned");
        while undo_log.len() > keep_depth {
            undo_log.pop_front();
        }
    }
}

impl<S: Storage> AccountStateReader for ChainStateManager<S> {
    fn get_account(&self, address: &PublicKey) -> Option<AccountState> {
        self.storage.get_account(address).ok().flatten()
    }
}

impl<S: Storage> ChainContext for ChainStateManager<S> {
    fn get_header(&self, hash: &Hash) -> Option<BlockHeader> {
        self.storage.get_header(hash).ok().flatten()
    }

    fn is_transaction_confirmed(&self, tx_id: &Hash) -> bool {
        matches!(self.storage.get_transaction_location(tx_id), Ok(Some(_)))
    }
}
