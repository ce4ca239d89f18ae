use thiserror::Error;
use spacetime_core::Hash;

/// Grounded in the teacher's `node::chain::ChainError` and
/// `state::accounts::StateError`: one `thiserror` enum per crate with
/// `#[from]` conversions for every `redb` failure mode it can surface.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),
    #[error("redb database error: {0}")]
    Database(#[from] redb::DatabaseError),
    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("redb transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),
    #[error("core codec error: {0}")]
    Codec(#[from] spacetime_core::CoreError),

    #[error("block {0} not found")]
    BlockNotFound(Hash),
    #[error("no block at height {0}")]
    HeightNotFound(i64),
    #[error("revert requested past {requested} blocks, chain only has {available}")]
    RevertDepthExceeded { requested: i64, available: i64 },

    #[error("reorg would require walking back more than {available} blocks (requested {requested})")]
    ReorgTooDeep { requested: i64, available: i64 },
    #[error("the two branches share no common ancestor within the retained chain")]
    NoCommonAncestor,
    #[error("reorg to {attempted_tip} failed reapplying the heavier branch, rolled back to {rolled_back_to}: {source}")]
    ReorgFailed {
        attempted_tip: Hash,
        rolled_back_to: Hash,
        #[source]
        source: Box<StateError>,
    },
}
