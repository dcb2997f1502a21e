//! HashMap-backed chain state, the reference implementation of the
//! `ChainState` contract and the store used throughout the test suite.

use super::{Balance, ChainState, Chaswap, TotalSupply};
use crate::channel::Channel;
use canal_types::{Address, ChannelId, HalfHash};
use std::collections::HashMap;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryChainState {
    balances: HashMap<Address, Balance>,
    channels: HashMap<ChannelId, Channel>,
    chaswaps: HashMap<HalfHash, Chaswap>,
    supply: TotalSupply,
    pending_height: u64,
}

impl MemoryChainState {
    pub fn new(pending_height: u64) -> Self {
        MemoryChainState {
            pending_height,
            ..Default::default()
        }
    }

    /// Advance (or rewind) the pending block height.
    pub fn set_pending_height(&mut self, height: u64) {
        self.pending_height = height;
    }
}

impl ChainState for MemoryChainState {
    fn balance(&self, address: &Address) -> Option<Balance> {
        self.balances.get(address).cloned()
    }

    fn balance_set(&mut self, address: Address, balance: Balance) {
        self.balances.insert(address, balance);
    }

    fn balance_del(&mut self, address: &Address) {
        self.balances.remove(address);
    }

    fn channel(&self, id: &ChannelId) -> Option<Channel> {
        self.channels.get(id).cloned()
    }

    fn channel_create(&mut self, id: ChannelId, channel: Channel) {
        self.channels.insert(id, channel);
    }

    fn channel_update(&mut self, id: ChannelId, channel: Channel) {
        self.channels.insert(id, channel);
    }

    fn channel_delete(&mut self, id: &ChannelId) {
        self.channels.remove(id);
    }

    fn chaswap(&self, checker: &HalfHash) -> Option<Chaswap> {
        self.chaswaps.get(checker).cloned()
    }

    fn chaswap_create(&mut self, checker: HalfHash, record: Chaswap) {
        self.chaswaps.insert(checker, record);
    }

    fn chaswap_delete(&mut self, checker: &HalfHash) {
        self.chaswaps.remove(checker);
    }

    fn pending_block_height(&self) -> u64 {
        self.pending_height
    }

    fn total_supply(&self) -> TotalSupply {
        self.supply.clone()
    }

    fn update_total_supply(&mut self, supply: TotalSupply) {
        self.supply = supply;
    }
}
