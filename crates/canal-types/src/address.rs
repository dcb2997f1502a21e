//! Ledger addresses: `version(1) + ripemd160(sha256(pubkey))(20)`,
//! base58check-encoded for display.

use crate::codec::{CodecError, Reader, WireFormat};
use crate::serde_utils::SliceBase58Check;
use crate::sign::Pubkey;
use bitcoin::hashes::{ripemd160, sha256, Hash};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

/// Byte width of an address on the wire.
pub const ADDRESS_SIZE: usize = 21;

/// Version byte of ordinary pubkey-hash addresses.
pub const ADDRESS_VERSION_NORMAL: u8 = 0;

/// A 21-byte account address.
#[serde_as]
#[derive(Copy, Clone, PartialOrd, Ord, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(#[serde_as(as = "SliceBase58Check")] [u8; ADDRESS_SIZE]);

impl Address {
    pub fn new(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Address(bytes)
    }

    /// Derive the address of a public key: version byte followed by
    /// ripemd160(sha256(pubkey)).
    pub fn from_pubkey(pubkey: &Pubkey) -> Self {
        Self::from_pubkey_with_version(pubkey, ADDRESS_VERSION_NORMAL)
    }

    pub fn from_pubkey_with_version(pubkey: &Pubkey, version: u8) -> Self {
        let sha = sha256::Hash::hash(&pubkey.serialize());
        let rip = ripemd160::Hash::hash(sha.as_byte_array());
        let mut bytes = [0u8; ADDRESS_SIZE];
        bytes[0] = version;
        bytes[1..].copy_from_slice(rip.as_byte_array());
        Address(bytes)
    }

    pub fn version(&self) -> u8 {
        self.0[0]
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<Vec<u8>> for Address {
    type Error = anyhow::Error;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        if value.len() != ADDRESS_SIZE {
            return Err(anyhow::anyhow!("Invalid address length: {}", value.len()));
        }
        let mut bytes = [0u8; ADDRESS_SIZE];
        bytes.copy_from_slice(&value);
        Ok(Address(bytes))
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", bs58::encode(&self.0).with_check().into_string())
    }
}

impl std::fmt::Debug for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl std::str::FromStr for Address {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .with_check(None)
            .into_vec()
            .map_err(|err| anyhow::anyhow!("invalid base58check address: {}", err))?;
        Address::try_from(bytes)
    }
}

impl WireFormat for Address {
    fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.0);
    }

    fn read(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Address(reader.read_array()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sign::Privkey;
    use std::str::FromStr;

    #[test]
    fn test_address_display_round_trip() {
        let key = Privkey::from([3u8; 32]);
        let address = key.address();
        assert_eq!(address.version(), ADDRESS_VERSION_NORMAL);
        let display = address.to_string();
        let parsed = Address::from_str(&display).unwrap();
        assert_eq!(address, parsed);
    }

    #[test]
    fn test_address_checksum_rejected_on_corruption() {
        let key = Privkey::from([9u8; 32]);
        let mut display = key.address().to_string();
        // Flip the last character to break the 4-byte checksum.
        let last = display.pop().unwrap();
        display.push(if last == '1' { '2' } else { '1' });
        assert!(Address::from_str(&display).is_err());
    }

    #[test]
    fn test_address_serde_is_base58() {
        let address = Privkey::from([5u8; 32]).address();
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json.trim_matches('"'), address.to_string());
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(address, back);
    }
}
