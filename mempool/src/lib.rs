pub mod pool;

pub use pool::{PoolConfig, PoolError, PoolStats, TransactionPool};
