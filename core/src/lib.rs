pub mod account;
pub mod block;
pub mod codec;
pub mod crypto;
pub mod error;
pub mod genesis;
pub mod hash;
pub mod merkle;
pub mod proof;
pub mod transaction;

pub use account::AccountState;
pub use block::{BlockHeader, HEADER_SIGNED_LEN, HEADER_UNSIGNED_LEN, HEADER_VERSION};
pub use crypto::{KeyPair, PublicKey, Signature};
pub use error::CoreError;
pub use genesis::{build_genesis, is_valid_genesis, GenesisConfig};
pub use hash::Hash;
pub use merkle::{build_path, compute_root, MerklePath, MerkleTreeStream, SimpleMerkleTree};
pub use proof::{Block, BlockBody, BlockPlotMetadata, BlockProof};
pub use transaction::{Transaction, TRANSACTION_VERSION, TX_SIGNED_LEN, TX_UNSIGNED_LEN};
