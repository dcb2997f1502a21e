//! The chain-state contract consumed by the channel subsystem.
//!
//! Everything here is a narrow keyed-CRUD view over the surrounding chain
//! state machine: balances, channel records, atomic-exchange records, the
//! pending block height and the named total-supply counters. All operations
//! are synchronous read-modify-write; the caller applies actions in
//! transaction order within a block and rolls a block back by replaying
//! each action's recover in strict reverse order.

mod memory;

pub use memory::MemoryChainState;

use crate::channel::Channel;
use canal_types::{Address, Amount, AmountError, ChannelId, CodecError, HalfHash, Reader, WireFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================
// Balance
// ============================================================

/// An account's spendable funds: the native coin plus a BTC-denominated
/// satoshi sub-balance.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub coin: Amount,
    pub satoshi: u64,
}

impl Balance {
    pub fn with_coin(coin: Amount) -> Self {
        Balance { coin, satoshi: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.coin.is_zero() && self.satoshi == 0
    }
}

impl WireFormat for Balance {
    fn write(&self, buf: &mut Vec<u8>) {
        self.coin.write(buf);
        canal_types::codec::write_u64(buf, self.satoshi);
    }

    fn read(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Balance {
            coin: Amount::read(reader)?,
            satoshi: reader.read_u64()?,
        })
    }
}

// ============================================================
// Chaswap
// ============================================================

/// One-time-use record binding an off-chain channel transfer proof to an
/// on-chain transfer, keyed by the prove-body half-hash checker. Its mere
/// existence is the replay guard for atomic exchange.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chaswap {
    pub is_used: bool,
    /// Ordered required signers, 2 or 3; the first is the on-chain source.
    pub addresses: Vec<Address>,
}

impl WireFormat for Chaswap {
    fn write(&self, buf: &mut Vec<u8>) {
        buf.push(self.is_used as u8);
        buf.push(self.addresses.len() as u8);
        for address in &self.addresses {
            address.write(buf);
        }
    }

    fn read(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        let is_used = match reader.read_u8()? {
            0 => false,
            1 => true,
            other => {
                return Err(CodecError::Malformed(format!(
                    "invalid chaswap used flag: {}",
                    other
                )))
            }
        };
        let count = reader.read_u8()? as usize;
        if !(2..=3).contains(&count) {
            return Err(CodecError::Malformed(format!(
                "invalid chaswap address count: {}",
                count
            )));
        }
        let mut addresses = Vec::with_capacity(count);
        for _ in 0..count {
            addresses.push(Address::read(reader)?);
        }
        Ok(Chaswap { is_used, addresses })
    }
}

// ============================================================
// Total-supply counters
// ============================================================

/// Named aggregate counters maintained alongside the ledger.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum SupplyCounter {
    /// Total coin value currently locked inside open channels.
    LocatedInChannel,
    /// Total interest ever issued by channel settlement.
    ChannelInterest,
}

/// The total-supply aggregate, threaded through every action as an explicit
/// read-modify-write value. Each action's contribution carries a matching
/// inverse delta in its recover.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalSupply {
    counters: HashMap<SupplyCounter, Amount>,
}

impl TotalSupply {
    pub fn get(&self, counter: SupplyCounter) -> Amount {
        self.counters.get(&counter).cloned().unwrap_or_default()
    }

    pub fn do_add(&mut self, counter: SupplyCounter, delta: &Amount) -> Result<(), AmountError> {
        let next = self.get(counter).checked_add(delta)?;
        self.set(counter, next);
        Ok(())
    }

    pub fn do_sub(&mut self, counter: SupplyCounter, delta: &Amount) -> Result<(), AmountError> {
        let next = self.get(counter).checked_sub(delta)?;
        self.set(counter, next);
        Ok(())
    }

    // A counter at zero and an absent counter are the same state; never
    // store the zero form.
    fn set(&mut self, counter: SupplyCounter, value: Amount) {
        if value.is_zero() {
            self.counters.remove(&counter);
        } else {
            self.counters.insert(counter, value);
        }
    }
}

// ============================================================
// ChainState
// ============================================================

/// Keyed CRUD over the chain state consumed by channel actions.
///
/// Writes take effect immediately; validation belongs to the action layer,
/// which must check everything before mutating anything.
pub trait ChainState {
    fn balance(&self, address: &Address) -> Option<Balance>;
    fn balance_set(&mut self, address: Address, balance: Balance);
    fn balance_del(&mut self, address: &Address);

    fn channel(&self, id: &ChannelId) -> Option<Channel>;
    fn channel_create(&mut self, id: ChannelId, channel: Channel);
    fn channel_update(&mut self, id: ChannelId, channel: Channel);
    fn channel_delete(&mut self, id: &ChannelId);

    fn chaswap(&self, checker: &HalfHash) -> Option<Chaswap>;
    fn chaswap_create(&mut self, checker: HalfHash, record: Chaswap);
    fn chaswap_delete(&mut self, checker: &HalfHash);

    /// Height of the block currently being applied.
    fn pending_block_height(&self) -> u64;

    fn total_supply(&self) -> TotalSupply;
    fn update_total_supply(&mut self, supply: TotalSupply);
}

#[cfg(test)]
mod tests {
    use super::*;
    use canal_types::Privkey;

    #[test]
    fn test_chaswap_codec() {
        let record = Chaswap {
            is_used: false,
            addresses: vec![
                Privkey::from([1u8; 32]).address(),
                Privkey::from([2u8; 32]).address(),
                Privkey::from([3u8; 32]).address(),
            ],
        };
        let bytes = record.to_vec();
        assert_eq!(bytes.len(), 2 + 3 * 21);
        assert_eq!(Chaswap::from_slice(&bytes).unwrap(), record);

        // A single-address record is malformed.
        let bad = [0u8, 1];
        assert!(Chaswap::from_slice(&bad).is_err());
    }

    #[test]
    fn test_supply_counters_add_sub() {
        let mut supply = TotalSupply::default();
        let five = Amount::new(5, 0).unwrap();
        let two = Amount::new(2, 0).unwrap();
        supply.do_add(SupplyCounter::LocatedInChannel, &five).unwrap();
        supply.do_sub(SupplyCounter::LocatedInChannel, &two).unwrap();
        assert_eq!(
            supply.get(SupplyCounter::LocatedInChannel),
            Amount::new(3, 0).unwrap()
        );
        assert_eq!(supply.get(SupplyCounter::ChannelInterest), Amount::zero());
    }
}
