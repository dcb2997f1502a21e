//! Basic primitive types: Hash256, HalfHash, ChannelId.

use crate::codec::{CodecError, Reader, WireFormat};
use crate::serde_utils::SliceHex;
use bitcoin::hashes::{sha256, Hash};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

// ============================================================
// Hash256
// ============================================================

/// A 256-bit digest, used for signing digests and commitment hashes.
#[serde_as]
#[derive(Copy, Clone, Serialize, Deserialize, Hash, Eq, PartialEq, Default)]
pub struct Hash256(#[serde_as(as = "SliceHex")] [u8; 32]);

/// sha256 digest of arbitrary bytes.
pub fn hash256(data: &[u8]) -> Hash256 {
    Hash256(sha256::Hash::hash(data).to_byte_array())
}

impl Hash256 {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(value: [u8; 32]) -> Self {
        Self(value)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for Hash256 {
    type Error = anyhow::Error;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        if value.len() != 32 {
            return Err(anyhow::anyhow!("Invalid hash length"));
        }
        let mut data = [0u8; 32];
        data.copy_from_slice(value);
        Ok(Hash256(data))
    }
}

impl TryFrom<Vec<u8>> for Hash256 {
    type Error = anyhow::Error;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        Hash256::try_from(value.as_slice())
    }
}

impl ::core::fmt::LowerHex for Hash256 {
    fn fmt(&self, f: &mut ::core::fmt::Formatter) -> ::core::fmt::Result {
        if f.alternate() {
            write!(f, "0x")?;
        }
        write!(f, "{}", hex::encode(self.0))
    }
}

impl ::core::fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut ::core::fmt::Formatter) -> ::core::fmt::Result {
        write!(f, "Hash256({:#x})", self)
    }
}

impl ::core::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut ::core::fmt::Formatter) -> ::core::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl std::str::FromStr for Hash256 {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim_start_matches("0x");
        let bytes = hex::decode(s)?;
        Hash256::try_from(bytes.as_slice())
    }
}

// ============================================================
// HalfHash
// ============================================================

/// A truncated 128-bit hash, the compact privacy-preserving commitment to a
/// larger off-chain structure ("half-hash checker").
#[serde_as]
#[derive(Copy, Clone, Serialize, Deserialize, Hash, Eq, PartialEq, Default, PartialOrd, Ord)]
pub struct HalfHash(#[serde_as(as = "SliceHex")] [u8; 16]);

impl HalfHash {
    /// First 16 bytes of the sha256 digest of `data`.
    pub fn checker_of(data: &[u8]) -> Self {
        let digest = sha256::Hash::hash(data).to_byte_array();
        let mut half = [0u8; 16];
        half.copy_from_slice(&digest[..16]);
        HalfHash(half)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl From<[u8; 16]> for HalfHash {
    fn from(value: [u8; 16]) -> Self {
        Self(value)
    }
}

impl AsRef<[u8]> for HalfHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<Vec<u8>> for HalfHash {
    type Error = anyhow::Error;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        if value.len() != 16 {
            return Err(anyhow::anyhow!("Invalid half hash length"));
        }
        let mut data = [0u8; 16];
        data.copy_from_slice(&value);
        Ok(HalfHash(data))
    }
}

impl ::core::fmt::Debug for HalfHash {
    fn fmt(&self, f: &mut ::core::fmt::Formatter) -> ::core::fmt::Result {
        write!(f, "HalfHash(0x{})", hex::encode(self.0))
    }
}

impl ::core::fmt::Display for HalfHash {
    fn fmt(&self, f: &mut ::core::fmt::Formatter) -> ::core::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl WireFormat for HalfHash {
    fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.0);
    }

    fn read(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(HalfHash(reader.read_array()?))
    }
}

// ============================================================
// ChannelId
// ============================================================

/// A 16-byte channel identifier. The first and last byte are reserved marker
/// space and must be non-zero for a well-formed id.
#[serde_as]
#[derive(Copy, Clone, Serialize, Deserialize, Hash, Eq, PartialEq, Default, PartialOrd, Ord)]
pub struct ChannelId(#[serde_as(as = "SliceHex")] [u8; 16]);

impl ChannelId {
    pub fn new(bytes: [u8; 16]) -> Self {
        ChannelId(bytes)
    }

    pub fn is_valid(&self) -> bool {
        self.0[0] != 0 && self.0[15] != 0
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl From<[u8; 16]> for ChannelId {
    fn from(value: [u8; 16]) -> Self {
        Self(value)
    }
}

impl AsRef<[u8]> for ChannelId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<Vec<u8>> for ChannelId {
    type Error = anyhow::Error;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        if value.len() != 16 {
            return Err(anyhow::anyhow!("Invalid channel id length"));
        }
        let mut data = [0u8; 16];
        data.copy_from_slice(&value);
        Ok(ChannelId(data))
    }
}

impl ::core::fmt::Debug for ChannelId {
    fn fmt(&self, f: &mut ::core::fmt::Formatter) -> ::core::fmt::Result {
        write!(f, "ChannelId(0x{})", hex::encode(self.0))
    }
}

impl ::core::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut ::core::fmt::Formatter) -> ::core::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl std::str::FromStr for ChannelId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim_start_matches("0x");
        ChannelId::try_from(hex::decode(s)?)
    }
}

impl WireFormat for ChannelId {
    fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.0);
    }

    fn read(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(ChannelId(reader.read_array()?))
    }
}
