//! Core domain types for the canal payment-channel ledger.
//!
//! This crate provides the type definitions shared across the ledger core:
//! - Primitive types: `Hash256`, `HalfHash`, `ChannelId`
//! - Account addresses and signature primitives: `Address`, `Pubkey`,
//!   `Privkey`, `EcdsaSignature`, `Sign`
//! - The arbitrary-precision decimal `Amount`
//! - The big-endian wire codec helpers
//! - Serde utilities for hex and base58check serialization

pub mod address;
pub mod amount;
pub mod codec;
pub mod primitives;
pub mod serde_utils;
pub mod sign;

pub use address::{Address, ADDRESS_SIZE, ADDRESS_VERSION_NORMAL};
pub use amount::{Amount, AmountError, AMOUNT_MAX_MANTISSA_BYTES};
pub use codec::{CodecError, Reader, WireFormat, HEIGHT_WIDTH};
pub use primitives::{hash256, ChannelId, HalfHash, Hash256};
pub use sign::{secp256k1_instance, EcdsaSignature, Privkey, Pubkey, Sign, SIGN_SIZE};
