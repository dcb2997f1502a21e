//! Shared fixtures: deterministic keys, funded states and signed bills.

use crate::channel::bill::{MustSign, OffChainBill, RealtimeReconciliation};
use crate::channel::{
    ChannelChainTransferProof, ChannelChainTransferProveBody, OpenChannel, TxSigners,
};
use crate::store::{Balance, ChainState, MemoryChainState};
use canal_types::{Address, Amount, ChannelId, Hash256, Privkey};
use std::sync::Once;

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn coins(mantissa: i128, unit: u8) -> Amount {
    Amount::new(mantissa, unit).unwrap()
}

pub fn cid(fill: u8) -> ChannelId {
    assert_ne!(fill, 0);
    ChannelId::new([fill; 16])
}

#[derive(Clone)]
pub struct Party {
    pub key: Privkey,
    pub address: Address,
}

pub fn party(fill: u8) -> Party {
    let key = Privkey::from([fill; 32]);
    let address = key.address();
    Party { key, address }
}

pub fn signers(parties: &[&Party]) -> TxSigners {
    TxSigners::new(parties.iter().map(|p| p.address))
}

pub fn funded_state(height: u64, funds: &[(Address, Amount)]) -> MemoryChainState {
    let mut state = MemoryChainState::new(height);
    for (address, amount) in funds {
        state.balance_set(*address, Balance::with_coin(amount.clone()));
    }
    state
}

pub fn coin_of(state: &MemoryChainState, address: &Address) -> Amount {
    state.balance(address).unwrap_or_default().coin
}

/// Fund two parties and open a channel with the given pledges.
pub fn open_channel(
    height: u64,
    id: ChannelId,
    left: &Party,
    left_amount: Amount,
    right: &Party,
    right_amount: Amount,
) -> MemoryChainState {
    let mut state = funded_state(
        height,
        &[
            (left.address, left_amount.clone()),
            (right.address, right_amount.clone()),
        ],
    );
    OpenChannel {
        channel_id: id,
        left_address: left.address,
        left_amount,
        right_address: right.address,
        right_amount,
    }
    .apply(&mut state, &signers(&[left, right]))
    .unwrap();
    state
}

/// A both-signed realtime reconciliation bill for the given split.
pub fn realtime_bill(
    id: ChannelId,
    reuse_version: u32,
    bill_auto_number: u64,
    left: &Party,
    left_balance: Amount,
    right: &Party,
    right_balance: Amount,
) -> OffChainBill {
    let placeholder = left.key.sign(&Hash256::default());
    let mut bill = RealtimeReconciliation {
        channel_id: id,
        reuse_version,
        bill_auto_number,
        left_balance,
        right_balance,
        left_satoshi: None,
        right_satoshi: None,
        timestamp: 1_700_000,
        left_sign: placeholder.clone(),
        right_sign: placeholder,
    };
    let digest = bill.digest();
    bill.left_sign = left.key.sign(&digest);
    bill.right_sign = right.key.sign(&digest);
    OffChainBill::Realtime(bill)
}

/// A transfer proof committing to the given hop bodies, signed by every
/// listed party.
pub fn build_proof(
    bodies: &[&ChannelChainTransferProveBody],
    parties: &[&Party],
) -> ChannelChainTransferProof {
    let placeholder = parties[0].key.sign(&Hash256::default());
    let mut proof = ChannelChainTransferProof {
        timestamp: 1_700_000,
        order_note_checker: canal_types::HalfHash::checker_of(b"order note"),
        prove_body_checkers: bodies.iter().map(|b| b.checker()).collect(),
        must_signs: parties
            .iter()
            .map(|p| MustSign {
                address: p.address,
                sign: placeholder.clone(),
            })
            .collect(),
    };
    let digest = proof.digest();
    for (must_sign, p) in proof.must_signs.iter_mut().zip(parties) {
        must_sign.sign = p.key.sign(&digest);
    }
    proof
}
