use crate::codec::{Reader, Writer};
use crate::crypto::{KeyPair, PublicKey, Signature, SIGNATURE_LEN};
use crate::error::CoreError;
use crate::hash::Hash;

/// Unsigned-field width: version(1) + parent_hash(32) + height(8) +
/// timestamp(8) + difficulty(8) + epoch(8) + challenge(32) + plot_root(32)
/// + proof_score(32) + tx_root(32) + miner_id(33).
pub const HEADER_UNSIGNED_LEN: usize = 1 + 32 + 8 + 8 + 8 + 8 + 32 + 32 + 32 + 32 + 33;
pub const HEADER_SIGNED_LEN: usize = HEADER_UNSIGNED_LEN + SIGNATURE_LEN;

pub const HEADER_VERSION: u8 = 1;

/// A block header. `signature` is empty on an unsigned header built by
/// `new_unsigned`, and 64 bytes once `sign` has been called — the header
/// hash is always computed over the unsigned encoding, so signing a
/// header never changes its identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: u8,
    pub parent_hash: Hash,
    pub height: i64,
    pub timestamp: i64,
    pub difficulty: i64,
    pub epoch: i64,
    pub challenge: Hash,
    pub plot_root: Hash,
    pub proof_score: Hash,
    pub tx_root: Hash,
    pub miner_id: PublicKey,
    pub signature: Vec<u8>,
}

#[allow(clippy::too_many_arguments)]
impl BlockHeader {
    pub fn new_unsigned(
        parent_hash: Hash,
        height: i64,
        timestamp: i64,
        difficulty: i64,
        epoch: i64,
        challenge: Hash,
        plot_root: Hash,
        proof_score: Hash,
        tx_root: Hash,
        miner_id: PublicKey,
    ) -> Self {
        BlockHeader {
            version: HEADER_VERSION,
            parent_hash,
            height,
            timestamp,
            difficulty,
            epoch,
            challenge,
            plot_root,
            proof_score,
            tx_root,
            miner_id,
            signature: Vec::new(),
        }
    }

    pub fn is_signed(&self) -> bool {
        self.signature.len() == SIGNATURE_LEN
    }

    pub fn encode_unsigned(&self) -> [u8; HEADER_UNSIGNED_LEN] {
        let mut w = Writer::with_capacity(HEADER_UNSIGNED_LEN);
        w.put_u8(self.version);
        w.put_bytes(self.parent_hash.as_bytes());
        w.put_i64(self.height);
        w.put_i64(self.timestamp);
        w.put_i64(self.difficulty);
        w.put_i64(self.epoch);
        w.put_bytes(self.challenge.as_bytes());
        w.put_bytes(self.plot_root.as_bytes());
        w.put_bytes(self.proof_score.as_bytes());
        w.put_bytes(self.tx_root.as_bytes());
        w.put_bytes(self.miner_id.as_bytes());
        w.into_vec()
            .try_into()
            .expect("writer emits exactly HEADER_UNSIGNED_LEN bytes")
    }

    pub fn encode_signed(&self) -> Result<[u8; HEADER_SIGNED_LEN], CoreError> {
        if self.signature.len() != SIGNATURE_LEN {
            return Err(CoreError::InvalidSignatureLength(self.signature.len()));
        }
        let mut out = [0u8; HEADER_SIGNED_LEN];
        out[..HEADER_UNSIGNED_LEN].copy_from_slice(&self.encode_unsigned());
        out[HEADER_UNSIGNED_LEN..].copy_from_slice(&self.signature);
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        if bytes.len() != HEADER_UNSIGNED_LEN && bytes.len() != HEADER_SIGNED_LEN {
            return Err(CoreError::InvalidSize {
                expected: HEADER_SIGNED_LEN,
                actual: bytes.len(),
            });
        }
        let mut r = Reader::new(bytes);
        let version = r.get_u8()?;
        let parent_hash = Hash::new(r.get_array()?);
        let height = r.get_i64()?;
        let timestamp = r.get_i64()?;
        let difficulty = r.get_i64()?;
        let epoch = r.get_i64()?;
        let challenge = Hash::new(r.get_array()?);
        let plot_root = Hash::new(r.get_array()?);
        let proof_score = Hash::new(r.get_array()?);
        let tx_root = Hash::new(r.get_array()?);
        let miner_id = PublicKey::from_slice(r.get_bytes(33)?)?;
        let signature = if r.remaining() == SIGNATURE_LEN {
            r.get_bytes(SIGNATURE_LEN)?.to_vec()
        } else {
            Vec::new()
        };
        r.expect_exhausted()?;
        Ok(BlockHeader {
            version,
            parent_hash,
            height,
            timestamp,
            difficulty,
            epoch,
            challenge,
            plot_root,
            proof_score,
            tx_root,
            miner_id,
            signature,
        })
    }

    /// The header's identity hash. Independent of `signature` by
    /// construction — it is always taken over the unsigned encoding.
    pub fn hash(&self) -> Hash {
        Hash::digest(&self.encode_unsigned())
    }

    /// Builder step: produces a new, signed header over this one's
    /// unsigned bytes. Consuming `self` keeps a half-signed header from
    /// being mistaken for a fully built one.
    pub fn sign(self, keypair: &KeyPair) -> BlockHeader {
        let sig = keypair.sign(&self.encode_unsigned());
        BlockHeader {
            signature: sig.as_bytes().to_vec(),
            ..self
        }
    }

    pub fn verify_signature(&self) -> bool {
        let Ok(sig) = Signature::from_slice(&self.signature) else {
            return false;
        };
        self.miner_id.verify(&self.encode_unsigned(), &sig)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn sample_header(miner: PublicKey) -> BlockHeader {
        BlockHeader::new_unsigned(
            Hash::digest(b"parent"),
            1,
            1_700_000_000,
            1_000,
            0,
            Hash::digest(b"challenge"),
            Hash::digest(b"plot_root"),
            Hash::digest(b"score"),
            Hash::digest(b"tx_root"),
            miner,
        )
    }

    #[test]
    fn hash_is_independent_of_signature() {
        let keypair = KeyPair::generate(&mut OsRng);
        let unsigned = sample_header(keypair.public_key());
        let hash_before = unsigned.hash();
        let signed = unsigned.clone().sign(&keypair);
        assert_eq!(hash_before, signed.hash());
    }

    #[test]
    fn sign_then_verify() {
        let keypair = KeyPair::generate(&mut OsRng);
        let signed = sample_header(keypair.public_key()).sign(&keypair);
        assert!(signed.is_signed());
        assert!(signed.verify_signature());
    }

    #[test]
    fn unsigned_header_is_not_signed() {
        let keypair = KeyPair::generate(&mut OsRng);
        let header = sample_header(keypair.public_key());
        assert!(!header.is_signed());
        assert!(!header.verify_signature());
    }

    #[test]
    fn decode_round_trips_signed() {
        let keypair = KeyPair::generate(&mut OsRng);
        let signed = sample_header(keypair.public_key()).sign(&keypair);
        let bytes = signed.encode_signed().unwrap();
        assert_eq!(bytes.len(), HEADER_SIGNED_LEN);
        let decoded = BlockHeader::decode(&bytes).unwrap();
        assert_eq!(decoded, signed);
    }

    #[test]
    fn tampered_field_breaks_signature() {
        let keypair = KeyPair::generate(&mut OsRng);
        let mut signed = sample_header(keypair.public_key()).sign(&keypair);
        signed.height = 2;
        assert!(!signed.verify_signature());
    }
}
