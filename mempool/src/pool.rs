// Spacetime transaction mempool with fee prioritization
// Fee-first, insertion-order-second priority queue over pending transactions.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use spacetime_consensus::{TransactionValidator, TransactionValidatorConfig};
use spacetime_core::{Hash, Transaction};
use tracing::debug;

/// A transaction plus the priority metadata the heap orders by. Grounded
/// in the teacher's `PooledTransaction`, with `received_at` replaced by
/// a monotonic insertion counter so ordering is deterministic for
/// equal-fee transactions regardless of clock skew between nodes.
#[derive(Clone, Debug)]
struct PooledTransaction {
    tx: Transaction,
    tx_id: Hash,
    fee: i64,
    sequence: u64,
}

impl PartialEq for PooledTransaction {
    fn eq(&self, other: &Self) -> bool {
        self.tx_id == other.tx_id
    }
}

impl Eq for PooledTransaction {}

impl PartialOrd for PooledTransaction {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PooledTransaction {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match self.fee.cmp(&other.fee) {
            std::cmp::Ordering::Equal => other.sequence.cmp(&self.sequence),
            ordering => ordering,
        }
    }
}

/// Pool configuration.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Maximum number of transactions the pool retains.
    pub max_transactions: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            max_transactions: 10_000,
        }
    }
}

/// Pool statistics.
#[derive(Clone, Debug, Default)]
pub struct PoolStats {
    pub total_transactions: usize,
    pub transactions_added: u64,
    pub transactions_removed: u64,
    pub transactions_rejected: u64,
}

/// Error types for pool operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("transaction already in pool")]
    DuplicateTransaction,
    #[error("pool is full")]
    PoolFull,
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),
}

/// Fee-prioritized transaction pool, bounded by `PoolConfig::max_transactions`.
/// Admission validates standalone transaction rules (signature, fee bounds,
/// basic field sanity) via the consensus crate's `TransactionValidator`;
/// nonce and balance checks against live chain state happen later, when a
/// block is actually assembled, since the mempool has no chain context of
/// its own.
pub struct TransactionPool {
    queue: BinaryHeap<PooledTransaction>,
    by_hash: HashMap<Hash, Transaction>,
    seen: HashSet<Hash>,
    config: PoolConfig,
    validator: TransactionValidator,
    stats: PoolStats,
    next_sequence: u64,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    pub fn with_config(config: PoolConfig) -> Self {
        TransactionPool {
            queue: BinaryHeap::new(),
            by_hash: HashMap::new(),
            seen: HashSet::new(),
            config,
            validator: TransactionValidator::new(TransactionValidatorConfig::default()),
            stats: PoolStats::default(),
            next_sequence: 0,
        }
    }

    /// Admits a transaction, enforcing standalone validity, duplicate
    /// rejection, and capacity (evicting the lowest-fee entry when a
    /// higher-fee transaction arrives at a full pool).
    pub fn add(&mut self, tx: Transaction) -> Result<Hash, PoolError> {
        let tx_id = tx
            .id()
            .map_err(|e| PoolError::InvalidTransaction(e.to_string()))?;

        if self.seen.contains(&tx_id) {
            self.stats.transactions_rejected += 1;
            debug!(tx_id = %tx_id, "rejected duplicate transaction");
            return Err(PoolError::DuplicateTransaction);
        }

        self.validator
            .validate_standalone(&tx)
            .map_err(|e| {
                self.stats.transactions_rejected += 1;
                debug!(tx_id = %tx_id, error = %e, "rejected transaction failing standalone validation");
                PoolError::InvalidTransaction(e.to_string())
            })?;

        if self.stats.total_transactions >= self.config.max_transactions {
            match self.queue.peek() {
                Some(lowest) if tx.fee > lowest.fee => self.evict_lowest(),
                _ => {
                    self.stats.transactions_rejected += 1;
                    debug!(tx_id = %tx_id, fee = tx.fee, "rejected transaction, pool full at equal or lower fee");
                    return Err(PoolError::PoolFull);
                }
            }
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let pooled = PooledTransaction {
            tx: tx.clone(),
            tx_id,
            fee: tx.fee,
            sequence,
        };

        self.queue.push(pooled);
        self.by_hash.insert(tx_id, tx);
        self.seen.insert(tx_id);

        self.stats.total_transactions = self.queue.len();
        self.stats.transactions_added += 1;

        Ok(tx_id)
    }

    /// Pending transactions ordered fee-descending, insertion-order
    /// ascending among equal fees.
    pub fn get_pending(&self) -> Vec<Transaction> {
        let mut sorted: Vec<_> = self.queue.iter().cloned().collect();
        sorted.sort_by(|a, b| b.cmp(a));
        sorted.into_iter().map(|p| p.tx).collect()
    }

    pub fn get_top_n(&self, n: usize) -> Vec<Transaction> {
        let mut sorted: Vec<_> = self.queue.iter().cloned().collect();
        sorted.sort_by(|a, b| b.cmp(a));
        sorted.into_iter().take(n).map(|p| p.tx).collect()
    }

    pub fn get(&self, tx_id: &Hash) -> Option<&Transaction> {
        self.by_hash.get(tx_id)
    }

    pub fn contains(&self, tx_id: &Hash) -> bool {
        self.seen.contains(tx_id)
    }

    /// Removes a transaction, typically because it was just mined.
    pub fn remove(&mut self, tx_id: &Hash) -> Option<Transaction> {
        let tx = self.by_hash.remove(tx_id)?;
        self.seen.remove(tx_id);

        let remaining: Vec<_> = self.queue.drain().filter(|p| &p.tx_id != tx_id).collect();
        self.queue = BinaryHeap::from(remaining);

        self.stats.total_transactions = self.queue.len();
        self.stats.transactions_removed += 1;

        Some(tx)
    }

    pub fn remove_batch(&mut self, tx_ids: &[Hash]) {
        for tx_id in tx_ids {
            self.remove(tx_id);
        }
    }

    fn evict_lowest(&mut self) {
        let mut min_heap: BinaryHeap<Reverse<PooledTransaction>> =
            self.queue.drain().map(Reverse).collect();

        if let Some(Reverse(lowest)) = min_heap.pop() {
            self.by_hash.remove(&lowest.tx_id);
            self.seen.remove(&lowest.tx_id);
            self.stats.transactions_removed += 1;
        }

        self.queue = min_heap.into_iter().map(|Reverse(p)| p).collect();
        self.stats.total_transactions = self.queue.len();
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.by_hash.clear();
        self.seen.clear();
        self.stats.total_transactions = 0;
    }

    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Default for TransactionPool {
    fn default() -> Self {
        Self::new()
    }
}
