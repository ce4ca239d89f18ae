pub mod chain_state;
pub mod error;
pub mod reorg;
pub mod storage;

pub use chain_state::{ChainSnapshot, ChainStateManager, ChainStats};
pub use error::StateError;
pub use reorg::{ChainReorganized, ChainReorganizer, ReorgOutcome};
pub use storage::{
    AccountsColumn, BlockWriteBatch, BlocksColumn, MetadataColumn, RedbStorage, Storage,
    TransactionIndexColumn, TransactionLocation,
};
