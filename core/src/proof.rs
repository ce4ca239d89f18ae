use crate::block::BlockHeader;
use crate::codec::{Reader, Writer};
use crate::error::CoreError;
use crate::hash::Hash;
use crate::merkle::MerklePath;
use crate::transaction::{Transaction, TX_SIGNED_LEN};

/// Identifying metadata for the plot a proof was drawn from.
/// Fixed width: leaf_count(8) + plot_id(32) + plot_header_hash(32) + version(1) = 73.
pub const PLOT_METADATA_LEN: usize = 8 + 32 + 32 + 1;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockPlotMetadata {
    pub leaf_count: i64,
    pub plot_id: Hash,
    pub plot_header_hash: Hash,
    pub version: u8,
}

impl BlockPlotMetadata {
    pub fn encode(&self) -> [u8; PLOT_METADATA_LEN] {
        let mut w = Writer::with_capacity(PLOT_METADATA_LEN);
        w.put_i64(self.leaf_count);
        w.put_bytes(self.plot_id.as_bytes());
        w.put_bytes(self.plot_header_hash.as_bytes());
        w.put_u8(self.version);
        w.into_vec()
            .try_into()
            .expect("writer emits exactly PLOT_METADATA_LEN bytes")
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, CoreError> {
        let leaf_count = r.get_i64()?;
        let plot_id = Hash::new(r.get_array()?);
        let plot_header_hash = Hash::new(r.get_array()?);
        let version = r.get_u8()?;
        Ok(BlockPlotMetadata {
            leaf_count,
            plot_id,
            plot_header_hash,
            version,
        })
    }
}

/// The proof-of-space-time evidence carried alongside a block: which
/// plot leaf was selected, and the authentication path proving it
/// belongs to the plot committed to by the header's `plot_root`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockProof {
    pub metadata: BlockPlotMetadata,
    pub leaf_value: Hash,
    pub leaf_index: i64,
    pub path: MerklePath,
}

impl BlockProof {
    pub fn encode(&self) -> Vec<u8> {
        let path_len = self.path.siblings.len();
        let mut w = Writer::with_capacity(PLOT_METADATA_LEN + 32 + 8 + 4 + path_len * 33);
        w.put_bytes(&self.metadata.encode());
        w.put_bytes(self.leaf_value.as_bytes());
        w.put_i64(self.leaf_index);
        w.put_u32(path_len as u32);
        for sibling in &self.path.siblings {
            w.put_bytes(sibling.as_bytes());
        }
        for orientation in &self.path.orientations {
            w.put_u8(if *orientation { 1 } else { 0 });
        }
        w.into_vec()
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, CoreError> {
        let metadata = BlockPlotMetadata::decode(r)?;
        let leaf_value = Hash::new(r.get_array()?);
        let leaf_index = r.get_i64()?;
        let path_len = r.get_u32()? as usize;
        let mut siblings = Vec::with_capacity(path_len);
        for _ in 0..path_len {
            siblings.push(Hash::new(r.get_array()?));
        }
        let mut orientations = Vec::with_capacity(path_len);
        for _ in 0..path_len {
            orientations.push(r.get_u8()? != 0);
        }
        Ok(BlockProof {
            metadata,
            leaf_value,
            leaf_index,
            path: MerklePath {
                siblings,
                orientations,
            },
        })
    }
}

/// Transactions plus the proof-of-space-time evidence for a block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockBody {
    pub transactions: Vec<Transaction>,
    pub proof: BlockProof,
}

impl BlockBody {
    pub fn encode(&self) -> Result<Vec<u8>, CoreError> {
        let mut w = Writer::with_capacity(4 + self.transactions.len() * TX_SIGNED_LEN);
        w.put_u32(self.transactions.len() as u32);
        for tx in &self.transactions {
            w.put_bytes(&tx.encode_signed()?);
        }
        let mut out = w.into_vec();
        out.extend_from_slice(&self.proof.encode());
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        let mut r = Reader::new(bytes);
        let tx_count = r.get_u32()? as usize;
        let mut transactions = Vec::with_capacity(tx_count);
        for _ in 0..tx_count {
            transactions.push(Transaction::decode(r.get_bytes(TX_SIGNED_LEN)?)?);
        }
        let proof = BlockProof::decode(&mut r)?;
        r.expect_exhausted()?;
        Ok(BlockBody {
            transactions,
            proof,
        })
    }

    /// Transaction hashes in block order, the leaf set consumed by the
    /// transaction root.
    pub fn transaction_hashes(&self) -> Result<Vec<Hash>, CoreError> {
        self.transactions.iter().map(Transaction::id).collect()
    }
}

/// A full block: header plus body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub body: BlockBody,
}

impl Block {
    pub fn encode(&self) -> Result<Vec<u8>, CoreError> {
        let mut out = self.header.encode_signed()?.to_vec();
        out.extend_from_slice(&self.body.encode()?);
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        if bytes.len() < crate::block::HEADER_SIGNED_LEN {
            return Err(CoreError::InvalidSize {
                expected: crate::block::HEADER_SIGNED_LEN,
                actual: bytes.len(),
            });
        }
        let (header_bytes, body_bytes) = bytes.split_at(crate::block::HEADER_SIGNED_LEN);
        let header = BlockHeader::decode(header_bytes)?;
        let body = BlockBody::decode(body_bytes)?;
        Ok(Block { header, body })
    }

    pub fn hash(&self) -> Hash {
        self.header.hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::merkle::{build_path, compute_root};
    use rand::rngs::OsRng;

    fn sample_proof() -> BlockProof {
        let leaves: Vec<Hash> = (0..4u8).map(|i| Hash::digest(&[i])).collect();
        let path = build_path(&leaves, 1).unwrap();
        BlockProof {
            metadata: BlockPlotMetadata {
                leaf_count: leaves.len() as i64,
                plot_id: Hash::digest(b"plot"),
                plot_header_hash: Hash::digest(b"plot-header"),
                version: 1,
            },
            leaf_value: leaves[1],
            leaf_index: 1,
            path,
        }
    }

    #[test]
    fn proof_round_trips() {
        let proof = sample_proof();
        let bytes = proof.encode();
        let mut r = Reader::new(&bytes);
        let decoded = BlockProof::decode(&mut r).unwrap();
        r.expect_exhausted().unwrap();
        assert_eq!(decoded, proof);
    }

    #[test]
    fn proof_path_reconstructs_plot_root() {
        let leaves: Vec<Hash> = (0..4u8).map(|i| Hash::digest(&[i])).collect();
        let root = compute_root(&leaves);
        let proof = sample_proof();
        assert_eq!(proof.path.reconstruct_root(&proof.leaf_value), root);
    }

    #[test]
    fn block_round_trips() {
        let miner = KeyPair::generate(&mut OsRng);
        let sender = KeyPair::generate(&mut OsRng);
        let recipient = KeyPair::generate(&mut OsRng);
        let tx = Transaction::new_unsigned(sender.public_key(), recipient.public_key(), 10, 0, 1)
            .sign(&sender);
        let body = BlockBody {
            transactions: vec![tx],
            proof: sample_proof(),
        };
        let tx_root = compute_root(&body.transaction_hashes().unwrap());
        let header = BlockHeader::new_unsigned(
            Hash::digest(b"parent"),
            1,
            1_700_000_000,
            1_000,
            0,
            Hash::digest(b"challenge"),
            Hash::digest(b"plot_root"),
            Hash::digest(b"score"),
            tx_root,
            miner.public_key(),
        )
        .sign(&miner);
        let block = Block { header, body };

        let bytes = block.encode().unwrap();
        let decoded = Block::decode(&bytes).unwrap();
        assert_eq!(decoded, block);
    }
}
