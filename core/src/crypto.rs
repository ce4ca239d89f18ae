use std::fmt;

use secp256k1::ecdsa;
use secp256k1::{Message, PublicKey as Secp256k1PublicKey, Secp256k1, SecretKey};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;
use crate::hash::Hash;

pub const PUBLIC_KEY_LEN: usize = 33;
pub const SIGNATURE_LEN: usize = 64;

/// A 33-byte compressed secp256k1 public key. Doubles as an account
/// address: the account map and transaction sender/recipient fields key
/// directly off this type rather than a derived hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey([u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_LEN]) -> Result<Self, CoreError> {
        Secp256k1PublicKey::from_slice(&bytes).map_err(|_| CoreError::InvalidPublicKey)?;
        Ok(PublicKey(bytes))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CoreError> {
        if bytes.len() != PUBLIC_KEY_LEN {
            return Err(CoreError::InvalidSize {
                expected: PUBLIC_KEY_LEN,
                actual: bytes.len(),
            });
        }
        let mut out = [0u8; PUBLIC_KEY_LEN];
        out.copy_from_slice(bytes);
        Self::from_bytes(out)
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    fn inner(&self) -> Secp256k1PublicKey {
        Secp256k1PublicKey::from_slice(&self.0).expect("validated at construction")
    }

    /// A fixed-width 32-byte identifier derived from the compressed key,
    /// used anywhere a `Hash`-shaped address is more convenient than the
    /// raw 33-byte key (e.g. indexing into the account column).
    pub fn to_address(&self) -> Hash {
        Hash::digest(&self.0)
    }

    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let secp = Secp256k1::verification_only();
        let digest = Hash::digest(message);
        let msg = match Message::from_digest_slice(digest.as_bytes()) {
            Ok(m) => m,
            Err(_) => return false,
        };
        let sig = match ecdsa::Signature::from_compact(&signature.0) {
            Ok(s) => s,
            Err(_) => return false,
        };
        secp.verify_ecdsa(&msg, &sig, &self.inner()).is_ok()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.0))
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = <[u8; PUBLIC_KEY_LEN]>::deserialize(deserializer)?;
        PublicKey::from_bytes(bytes).map_err(DeError::custom)
    }
}

/// A 64-byte compact (r || s) ECDSA signature. `secp256k1::ecdsa::Signature`
/// carries no serde impl, and serde's blanket array support stops at 32
/// elements, so this gets a manual impl the same way the teacher's
/// `Ed25519Signature` does for its own 64-byte array.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; SIGNATURE_LEN]);

impl Signature {
    pub fn from_bytes(bytes: [u8; SIGNATURE_LEN]) -> Self {
        Signature(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CoreError> {
        if bytes.len() != SIGNATURE_LEN {
            return Err(CoreError::InvalidSize {
                expected: SIGNATURE_LEN,
                actual: bytes.len(),
            });
        }
        let mut out = [0u8; SIGNATURE_LEN];
        out.copy_from_slice(bytes);
        Ok(Signature(out))
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(self.0))
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = <[u8; SIGNATURE_LEN]>::deserialize(deserializer)?;
        Ok(Signature(bytes))
    }
}

/// Holds a secret key and signs messages with it. Key custody and on-disk
/// key file formats live outside this crate; this is purely the arithmetic.
pub struct KeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl KeyPair {
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Result<Self, CoreError> {
        let secret = SecretKey::from_slice(&bytes).map_err(|_| CoreError::InvalidPublicKey)?;
        let secp = Secp256k1::signing_only();
        let public_key = Secp256k1PublicKey::from_secret_key(&secp, &secret);
        let public = PublicKey::from_bytes(public_key.serialize())?;
        Ok(KeyPair { secret, public })
    }

    pub fn generate<R: rand::RngCore + rand::CryptoRng>(rng: &mut R) -> Self {
        let secp = Secp256k1::signing_only();
        let (secret, public_key) = secp.generate_keypair(rng);
        let public = PublicKey::from_bytes(public_key.serialize()).expect("valid generated key");
        KeyPair { secret, public }
    }

    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        let secp = Secp256k1::signing_only();
        let digest = Hash::digest(message);
        let msg = Message::from_digest_slice(digest.as_bytes()).expect("digest is 32 bytes");
        let sig = secp.sign_ecdsa(&msg, &self.secret);
        Signature(sig.serialize_compact())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn sign_and_verify_round_trip() {
        let keypair = KeyPair::generate(&mut OsRng);
        let message = b"block header bytes";
        let sig = keypair.sign(message);
        assert!(keypair.public_key().verify(message, &sig));
    }

    #[test]
    fn verify_rejects_tampered_message() {
        let keypair = KeyPair::generate(&mut OsRng);
        let sig = keypair.sign(b"original");
        assert!(!keypair.public_key().verify(b"tampered", &sig));
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let a = KeyPair::generate(&mut OsRng);
        let b = KeyPair::generate(&mut OsRng);
        let sig = a.sign(b"message");
        assert!(!b.public_key().verify(b"message", &sig));
    }

    #[test]
    fn address_is_stable() {
        let keypair = KeyPair::generate(&mut OsRng);
        assert_eq!(
            keypair.public_key().to_address(),
            keypair.public_key().to_address()
        );
    }
}
