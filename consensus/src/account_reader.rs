use spacetime_core::{AccountState, PublicKey};

/// The seam the transaction and block validators consult for account
/// state, so neither depends on the storage crate's concrete type —
/// the same decoupling idiom as the teacher's RPC crate's
/// `BlockchainReader` trait, reapplied here for account lookups.
pub trait AccountStateReader {
    fn get_account(&self, address: &PublicKey) -> Option<AccountState>;
}
