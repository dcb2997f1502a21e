//! Signature primitives: secp256k1 keys, ECDSA signatures and the 97-byte
//! wire sign structure (compressed pubkey + compact signature).

use crate::address::Address;
use crate::codec::{CodecError, Reader, WireFormat};
use crate::primitives::Hash256;
use crate::serde_utils::SliceHex;
use once_cell::sync::Lazy;
use secp256k1::{All, Secp256k1};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

static SECP256K1_INSTANCE: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

/// Shared secp256k1 context for signing and verification.
pub fn secp256k1_instance() -> &'static Secp256k1<All> {
    &SECP256K1_INSTANCE
}

const PUBKEY_SIZE: usize = 33;
const SIGNATURE_SIZE: usize = 64;

/// Byte width of the wire sign structure: pubkey(33) + signature(64).
pub const SIGN_SIZE: usize = PUBKEY_SIZE + SIGNATURE_SIZE;

// ============================================================
// Pubkey
// ============================================================

/// A compressed secp256k1 public key. Stores the serialized form directly
/// for fast comparison and hashing.
#[serde_as]
#[derive(Copy, Clone, PartialOrd, Ord, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pubkey(#[serde_as(as = "SliceHex")] pub [u8; 33]);

impl std::fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Pubkey({})", hex::encode(self.0))
    }
}

impl std::fmt::Display for Pubkey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Pubkey {
    pub fn serialize(&self) -> [u8; PUBKEY_SIZE] {
        self.0
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self, secp256k1::Error> {
        // Validate by parsing, then store the bytes directly.
        let _ = secp256k1::PublicKey::from_slice(slice)?;
        let mut bytes = [0u8; PUBKEY_SIZE];
        bytes.copy_from_slice(slice);
        Ok(Pubkey(bytes))
    }

    /// The ledger address this key hashes to.
    pub fn address(&self) -> Address {
        Address::from_pubkey(self)
    }
}

impl TryFrom<Vec<u8>> for Pubkey {
    type Error = secp256k1::Error;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        Pubkey::from_slice(&value)
    }
}

impl From<secp256k1::PublicKey> for Pubkey {
    fn from(pk: secp256k1::PublicKey) -> Pubkey {
        Pubkey(pk.serialize())
    }
}

impl From<Pubkey> for secp256k1::PublicKey {
    fn from(pk: Pubkey) -> Self {
        secp256k1::PublicKey::from_slice(&pk.0)
            .expect("Pubkey should always contain valid serialized public key")
    }
}

impl From<&Pubkey> for secp256k1::PublicKey {
    fn from(val: &Pubkey) -> Self {
        secp256k1::PublicKey::from_slice(&val.0)
            .expect("Pubkey should always contain valid serialized public key")
    }
}

// ============================================================
// Privkey
// ============================================================

/// A wrapper for a secp256k1 secret key.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Privkey(pub secp256k1::SecretKey);

impl Privkey {
    pub fn from_slice(key: &[u8]) -> Self {
        secp256k1::SecretKey::from_slice(key)
            .expect("Invalid secret key")
            .into()
    }

    pub fn pubkey(&self) -> Pubkey {
        Pubkey::from(self.0.public_key(secp256k1_instance()))
    }

    pub fn address(&self) -> Address {
        self.pubkey().address()
    }

    /// ECDSA signature over a 32-byte digest.
    pub fn sign_digest(&self, digest: &Hash256) -> EcdsaSignature {
        let message = secp256k1::Message::from_digest(*digest.as_bytes());
        EcdsaSignature(secp256k1_instance().sign_ecdsa(&message, &self.0))
    }

    /// Produce the full wire sign structure over a digest.
    pub fn sign(&self, digest: &Hash256) -> Sign {
        Sign {
            pubkey: self.pubkey(),
            signature: self.sign_digest(digest),
        }
    }
}

impl From<[u8; 32]> for Privkey {
    fn from(k: [u8; 32]) -> Self {
        Privkey(secp256k1::SecretKey::from_slice(&k).expect("Invalid secret key"))
    }
}

impl From<secp256k1::SecretKey> for Privkey {
    fn from(sk: secp256k1::SecretKey) -> Self {
        Self(sk)
    }
}

// ============================================================
// EcdsaSignature
// ============================================================

/// A wrapper around a secp256k1 ECDSA signature.
#[derive(Clone, PartialOrd, Ord, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
pub struct EcdsaSignature(pub secp256k1::ecdsa::Signature);

impl EcdsaSignature {
    pub fn verify(&self, pubkey: &Pubkey, digest: &Hash256) -> bool {
        let message = secp256k1::Message::from_digest(*digest.as_bytes());
        let pk = secp256k1::PublicKey::from_slice(&pubkey.0)
            .expect("Pubkey should always contain valid serialized public key");
        secp256k1_instance()
            .verify_ecdsa(&message, &self.0, &pk)
            .is_ok()
    }

    pub fn serialize(&self) -> [u8; SIGNATURE_SIZE] {
        self.0.serialize_compact()
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self, secp256k1::Error> {
        secp256k1::ecdsa::Signature::from_compact(slice).map(EcdsaSignature)
    }
}

impl From<secp256k1::ecdsa::Signature> for EcdsaSignature {
    fn from(sig: secp256k1::ecdsa::Signature) -> Self {
        Self(sig)
    }
}

// ============================================================
// Sign
// ============================================================

/// The wire sign structure: `pubkey(33) + signature(64)`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
pub struct Sign {
    pub pubkey: Pubkey,
    pub signature: EcdsaSignature,
}

impl Sign {
    /// The address the embedded pubkey hashes to.
    pub fn address(&self) -> Address {
        self.pubkey.address()
    }

    /// Verify the embedded signature over `digest` with the embedded pubkey.
    pub fn verify(&self, digest: &Hash256) -> bool {
        self.signature.verify(&self.pubkey, digest)
    }
}

impl WireFormat for Sign {
    fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.pubkey.0);
        buf.extend_from_slice(&self.signature.serialize());
    }

    fn read(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        let pubkey = Pubkey::from_slice(reader.take(PUBKEY_SIZE)?)
            .map_err(|err| CodecError::Malformed(format!("invalid pubkey: {}", err)))?;
        let signature = EcdsaSignature::from_slice(reader.take(SIGNATURE_SIZE)?)
            .map_err(|err| CodecError::Malformed(format!("invalid signature: {}", err)))?;
        Ok(Sign { pubkey, signature })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::hash256;

    fn test_key(fill: u8) -> Privkey {
        Privkey::from([fill; 32])
    }

    #[test]
    fn test_sign_and_verify() {
        let key = test_key(42);
        let digest = hash256(b"payload");
        let sign = key.sign(&digest);
        assert!(sign.verify(&digest));
        assert!(!sign.verify(&hash256(b"other payload")));
        assert_eq!(sign.address(), key.address());
    }

    #[test]
    fn test_random_key_sign_verify() {
        let key = Privkey(secp256k1::SecretKey::new(&mut rand::thread_rng()));
        let digest = hash256(b"random key payload");
        assert!(key.sign(&digest).verify(&digest));
    }

    #[test]
    fn test_sign_wire_round_trip() {
        let key = test_key(7);
        let sign = key.sign(&hash256(b"x"));
        let bytes = sign.to_vec();
        assert_eq!(bytes.len(), SIGN_SIZE);
        let back = Sign::from_slice(&bytes).unwrap();
        assert_eq!(sign, back);
        assert!(back.verify(&hash256(b"x")));
    }
}
