use spacetime_core::{BlockHeader, Hash};

use crate::account_reader::AccountStateReader;

/// What the block validator needs from chain state: the parent header
/// addressed by a block's `parent_hash`, whether a transaction is
/// already confirmed in some earlier block, and (via the supertrait) the
/// committed account balances and nonces transactions are checked
/// against. Grounded in the teacher's RPC crate's `BlockchainReader`
/// trait — the same decoupling idiom, reused at the seam the block
/// validator actually needs. Kept deliberately thin (a `bool`, not the
/// storage crate's location type) so this crate never depends on
/// `spacetime-state`.
pub trait ChainContext: AccountStateReader {
    fn get_header(&self, hash: &Hash) -> Option<BlockHeader>;

    /// Whether `tx_id` is already confirmed in some earlier block on
    /// this chain, i.e. the transaction index has a location for it.
    fn is_transaction_confirmed(&self, tx_id: &Hash) -> bool;
}
