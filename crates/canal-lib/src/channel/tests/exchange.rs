//! Atomic channel/on-chain exchange and its replay guard.

use super::utils::*;
use crate::channel::bill::MustSign;
use crate::channel::{ChannelChainTransferProveBody, ChannelOnchainAtomicExchange, PayDirection, TxSigners};
use crate::errors::ChannelError;
use crate::store::ChainState;
use canal_types::{Amount, HalfHash, Hash256};

fn hop_body(left: &Party, right: &Party) -> ChannelChainTransferProveBody {
    ChannelChainTransferProveBody {
        channel_id: cid(9),
        reuse_version: 1,
        bill_auto_number: 12,
        pay_direction: PayDirection::CoinLeftToRight,
        pay_amount: coins(5, 0),
        pay_satoshi: None,
        left_balance: coins(15, 0),
        right_balance: coins(85, 0),
        left_satoshi: None,
        right_satoshi: None,
        left_address: left.address,
        right_address: right.address,
    }
}

fn signed_exchange(
    checker: HalfHash,
    to: &Party,
    amount: Amount,
    parties: &[&Party],
) -> ChannelOnchainAtomicExchange {
    let placeholder = parties[0].key.sign(&Hash256::default());
    let mut exchange = ChannelOnchainAtomicExchange {
        prove_body_checker: checker,
        onchain_to: to.address,
        onchain_amount: amount,
        must_signs: parties
            .iter()
            .map(|p| MustSign {
                address: p.address,
                sign: placeholder.clone(),
            })
            .collect(),
    };
    let digest = exchange.digest();
    for (must_sign, p) in exchange.must_signs.iter_mut().zip(parties) {
        must_sign.sign = p.key.sign(&digest);
    }
    exchange
}

#[test]
fn test_atomic_exchange_transfers_and_blocks_replay() {
    let (source, receiver) = (party(1), party(2));
    let checker = hop_body(&source, &receiver).checker();
    let mut state = funded_state(100, &[(source.address, coins(50, 0))]);
    let exchange = signed_exchange(checker, &receiver, coins(20, 0), &[&source, &receiver]);

    exchange.apply(&mut state, &TxSigners::default()).unwrap();
    assert_eq!(coin_of(&state, &source.address), coins(30, 0));
    assert_eq!(coin_of(&state, &receiver.address), coins(20, 0));
    let record = state.chaswap(&checker).unwrap();
    assert!(!record.is_used);
    assert_eq!(record.addresses, vec![source.address, receiver.address]);

    // The consumed checker blocks any second pass, even a fresh evidence
    // structure over the same hop.
    let replay = signed_exchange(checker, &receiver, coins(1, 0), &[&source, &receiver]);
    let err = replay.apply(&mut state, &TxSigners::default()).unwrap_err();
    assert!(matches!(err, ChannelError::Consistency(_)));
    assert_eq!(coin_of(&state, &source.address), coins(30, 0));
}

#[test]
fn test_atomic_exchange_signature_binding() {
    let (source, receiver, third) = (party(1), party(2), party(3));
    let checker = hop_body(&source, &receiver).checker();
    let state = funded_state(100, &[(source.address, coins(50, 0))]);

    // Tampering with the amount after signing voids every signature.
    let mut tampered = signed_exchange(checker, &receiver, coins(20, 0), &[&source, &receiver]);
    tampered.onchain_amount = coins(21, 0);
    let mut s = state.clone();
    let err = tampered.apply(&mut s, &TxSigners::default()).unwrap_err();
    assert!(matches!(err, ChannelError::Signature(_)));

    // Swapping the address column breaks the position binding.
    let mut swapped = signed_exchange(checker, &receiver, coins(20, 0), &[&source, &receiver]);
    let address = swapped.must_signs[0].address;
    swapped.must_signs[0].address = swapped.must_signs[1].address;
    swapped.must_signs[1].address = address;
    let mut s = state.clone();
    let err = swapped.apply(&mut s, &TxSigners::default()).unwrap_err();
    assert!(matches!(err, ChannelError::Signature(_)));

    // 2 or 3 signers, nothing else.
    let lone = signed_exchange(checker, &receiver, coins(20, 0), &[&source]);
    let mut s = state.clone();
    let err = lone.apply(&mut s, &TxSigners::default()).unwrap_err();
    assert!(matches!(err, ChannelError::InvalidParameter(_)));
    let crowd = signed_exchange(
        checker,
        &receiver,
        coins(20, 0),
        &[&source, &receiver, &third, &party(4)],
    );
    let mut s = state.clone();
    let err = crowd.apply(&mut s, &TxSigners::default()).unwrap_err();
    assert!(matches!(err, ChannelError::InvalidParameter(_)));

    // The first listed signer is the funds source and must cover the amount.
    let broke = signed_exchange(checker, &receiver, coins(51, 0), &[&source, &receiver]);
    let mut s = state.clone();
    let err = broke.apply(&mut s, &TxSigners::default()).unwrap_err();
    assert!(matches!(err, ChannelError::InsufficientBalance { .. }));

    assert_eq!(s, state);
}

#[test]
fn test_atomic_exchange_recover_symmetry() {
    let (source, receiver, routing) = (party(1), party(2), party(3));
    let checker = hop_body(&source, &receiver).checker();
    let mut state = funded_state(100, &[(source.address, coins(50, 0))]);
    let snapshot = state.clone();
    let exchange = signed_exchange(
        checker,
        &receiver,
        coins(20, 0),
        &[&source, &receiver, &routing],
    );
    exchange.apply(&mut state, &TxSigners::default()).unwrap();
    assert_ne!(state, snapshot);
    exchange.recover(&mut state);
    assert_eq!(state, snapshot);
}
