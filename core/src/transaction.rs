use crate::codec::{Reader, Writer};
use crate::crypto::{PublicKey, Signature, SIGNATURE_LEN};
use crate::error::CoreError;
use crate::hash::Hash;

/// Unsigned-field width: version(1) + sender(33) + recipient(33) +
/// amount(8) + nonce(8) + fee(8).
pub const TX_UNSIGNED_LEN: usize = 1 + 33 + 33 + 8 + 8 + 8;
pub const TX_SIGNED_LEN: usize = TX_UNSIGNED_LEN + SIGNATURE_LEN;

pub const TRANSACTION_VERSION: u8 = 1;

/// A single value transfer between two accounts. The account model has
/// no script or contract variants — every transaction moves `amount`
/// from `sender` to `recipient`, paying `fee` to whichever miner's block
/// includes it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub version: u8,
    pub sender: PublicKey,
    pub recipient: PublicKey,
    pub amount: i64,
    pub nonce: i64,
    pub fee: i64,
    /// Empty until signed, 64 bytes once signed.
    pub signature: Vec<u8>,
}

impl Transaction {
    pub fn new_unsigned(
        sender: PublicKey,
        recipient: PublicKey,
        amount: i64,
        nonce: i64,
        fee: i64,
    ) -> Self {
        Transaction {
            version: TRANSACTION_VERSION,
            sender,
            recipient,
            amount,
            nonce,
            fee,
            signature: Vec::new(),
        }
    }

    pub fn is_signed(&self) -> bool {
        self.signature.len() == SIGNATURE_LEN
    }

    pub fn encode_unsigned(&self) -> [u8; TX_UNSIGNED_LEN] {
        let mut w = Writer::with_capacity(TX_UNSIGNED_LEN);
        w.put_u8(self.version);
        w.put_bytes(self.sender.as_bytes());
        w.put_bytes(self.recipient.as_bytes());
        w.put_i64(self.amount);
        w.put_i64(self.nonce);
        w.put_i64(self.fee);
        let bytes = w.into_vec();
        bytes
            .try_into()
            .expect("writer emits exactly TX_UNSIGNED_LEN bytes")
    }

    pub fn encode_signed(&self) -> Result<[u8; TX_SIGNED_LEN], CoreError> {
        if self.signature.len() != SIGNATURE_LEN {
            return Err(CoreError::InvalidSignatureLength(self.signature.len()));
        }
        let mut out = [0u8; TX_SIGNED_LEN];
        out[..TX_UNSIGNED_LEN].copy_from_slice(&self.encode_unsigned());
        out[TX_UNSIGNED_LEN..].copy_from_slice(&self.signature);
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        if bytes.len() != TX_UNSIGNED_LEN && bytes.len() != TX_SIGNED_LEN {
            return Err(CoreError::InvalidSize {
                expected: TX_SIGNED_LEN,
                actual: bytes.len(),
            });
        }
        let mut r = Reader::new(bytes);
        let version = r.get_u8()?;
        let sender = PublicKey::from_slice(r.get_bytes(33)?)?;
        let recipient = PublicKey::from_slice(r.get_bytes(33)?)?;
        let amount = r.get_i64()?;
        let nonce = r.get_i64()?;
        let fee = r.get_i64()?;
        let signature = if r.remaining() == SIGNATURE_LEN {
            r.get_bytes(SIGNATURE_LEN)?.to_vec()
        } else {
            Vec::new()
        };
        r.expect_exhausted()?;
        Ok(Transaction {
            version,
            sender,
            recipient,
            amount,
            nonce,
            fee,
            signature,
        })
    }

    /// The hash used as a transaction's identity for mempool indexing,
    /// duplicate detection, and the transaction index column. Computed
    /// over the unsigned encoding so that identity is independent of the
    /// signature, the same way a block header's identity is independent
    /// of its signature — re-signing (or an alternate valid signature
    /// over the same fields) never changes a transaction's hash.
    pub fn id(&self) -> Result<Hash, CoreError> {
        Ok(Hash::digest(&self.encode_unsigned()))
    }

    pub fn sign(&self, keypair: &crate::crypto::KeyPair) -> Transaction {
        let sig = keypair.sign(&self.encode_unsigned());
        let mut signed = self.clone();
        signed.signature = sig.as_bytes().to_vec();
        signed
    }

    pub fn verify_signature(&self) -> bool {
        let Ok(sig) = Signature::from_slice(&self.signature) else {
            return false;
        };
        self.sender.verify(&self.encode_unsigned(), &sig)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use rand::rngs::OsRng;

    fn keypair() -> KeyPair {
        KeyPair::generate(&mut OsRng)
    }

    #[test]
    fn sign_then_verify() {
        let sender = keypair();
        let recipient = keypair();
        let tx = Transaction::new_unsigned(sender.public_key(), recipient.public_key(), 100, 0, 1);
        let signed = tx.sign(&sender);
        assert!(signed.is_signed());
        assert!(signed.verify_signature());
    }

    #[test]
    fn decode_round_trips_signed() {
        let sender = keypair();
        let recipient = keypair();
        let tx = Transaction::new_unsigned(sender.public_key(), recipient.public_key(), 100, 3, 1);
        let signed = tx.sign(&sender);
        let bytes = signed.encode_signed().unwrap();
        assert_eq!(bytes.len(), TX_SIGNED_LEN);
        let decoded = Transaction::decode(&bytes).unwrap();
        assert_eq!(decoded, signed);
    }

    #[test]
    fn decode_round_trips_unsigned() {
        let sender = keypair();
        let recipient = keypair();
        let tx = Transaction::new_unsigned(sender.public_key(), recipient.public_key(), 5, 0, 0);
        let bytes = tx.encode_unsigned();
        let decoded = Transaction::decode(&bytes).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn tampered_amount_fails_verification() {
        let sender = keypair();
        let recipient = keypair();
        let tx = Transaction::new_unsigned(sender.public_key(), recipient.public_key(), 100, 0, 1);
        let mut signed = tx.sign(&sender);
        signed.amount = 999;
        assert!(!signed.verify_signature());
    }

    #[test]
    fn different_signatures_produce_different_ids() {
        let sender = keypair();
        let recipient = keypair();
        let tx = Transaction::new_unsigned(sender.public_key(), recipient.public_key(), 100, 0, 1);
        let signed_a = tx.sign(&sender);
        let mut signed_b = signed_a.clone();
        signed_b.signature[0] ^= 0xff;
        assert_ne!(signed_a.id().unwrap(), signed_b.id().unwrap());
    }
}
