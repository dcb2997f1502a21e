//! Wire layouts of stored records and presented bills.

use super::utils::*;
use crate::channel::{
    Channel, ChannelArbitration, ChannelStatus, OffChainBill,
};
use canal_types::{Amount, WireFormat};

/// Fixed prefix of the channel record: belong_height(5) + lock_block(2) +
/// left_addr(21) + left_amount(6) + right_addr(21) + right_amount(6) +
/// status(1) + config_mark(2) + reserved(16).
const CHANNEL_FIXED_LEN: usize = 5 + 2 + 21 + 6 + 21 + 6 + 1 + 2 + 16;

#[test]
fn test_channel_record_fixed_layout() {
    let (left, right) = (party(1), party(2));
    let channel = Channel::open(
        1_000_000,
        left.address,
        coins(70, 0),
        right.address,
        coins(30, 0),
        1,
    );
    let bytes = channel.to_vec();
    assert_eq!(bytes.len(), CHANNEL_FIXED_LEN);
    assert_eq!(Channel::from_slice(&bytes).unwrap(), channel);
}

#[test]
fn test_channel_record_optional_sections() {
    let (left, right) = (party(1), party(2));
    let mut channel = Channel::open(
        500,
        left.address,
        coins(70, 0),
        right.address,
        coins(30, 0),
        3,
    );
    channel.status = ChannelStatus::ArbitrationClosed;
    channel.arbitration = Some(ChannelArbitration {
        launch_height: 600,
        assert_bill_number: 42,
        assert_address: left.address,
        assert_left: coins(20, 0),
        assert_right: coins(80, 0),
    });
    channel.final_left_distribution = Some(Amount::zero());

    let bytes = channel.to_vec();
    assert!(bytes.len() > CHANNEL_FIXED_LEN);
    let back = Channel::from_slice(&bytes).unwrap();
    assert_eq!(back, channel);
    assert_eq!(back.reuse_version, 3);

    // Trailing garbage is rejected, not ignored.
    let mut extended = bytes.clone();
    extended.push(0);
    assert!(Channel::from_slice(&extended).is_err());
    // Truncation too.
    assert!(Channel::from_slice(&bytes[..bytes.len() - 1]).is_err());

    // A reopened record nests the superseded one as a flagged section.
    let mut reopened = Channel::open(
        900,
        left.address,
        coins(40, 0),
        right.address,
        coins(25, 0),
        4,
    );
    reopened.reused_from = Some(Box::new(channel.clone()));
    let nested_bytes = reopened.to_vec();
    assert_eq!(Channel::from_slice(&nested_bytes).unwrap(), reopened);
}

#[test]
fn test_bill_wire_round_trip() {
    let (left, right) = (party(1), party(2));
    let bill = realtime_bill(cid(9), 1, 5, &left, coins(20, 0), &right, coins(80, 0));
    let bytes = bill.to_vec();
    assert_eq!(OffChainBill::from_slice(&bytes).unwrap(), bill);

    // Unknown kind tag.
    let mut bad = bytes.clone();
    bad[0] = 99;
    assert!(OffChainBill::from_slice(&bad).is_err());
}

#[test]
fn test_action_json_round_trip() {
    let (left, right) = (party(1), party(2));
    let action = crate::channel::ChannelAction::UnilateralCloseByBill(
        crate::channel::UnilateralCloseByBill {
            bill: realtime_bill(cid(9), 1, 5, &left, coins(20, 0), &right, coins(80, 0)),
            assert_address: right.address,
        },
    );
    let json = serde_json::to_string(&action).unwrap();
    let back: crate::channel::ChannelAction = serde_json::from_str(&json).unwrap();
    assert_eq!(back, action);
}

#[test]
fn test_proof_position_binding() {
    let (a, b, c) = (party(1), party(2), party(3));
    let body = crate::channel::ChannelChainTransferProveBody {
        channel_id: cid(9),
        reuse_version: 1,
        bill_auto_number: 12,
        pay_direction: crate::channel::PayDirection::CoinLeftToRight,
        pay_amount: coins(5, 0),
        pay_satoshi: None,
        left_balance: coins(15, 0),
        right_balance: coins(85, 0),
        left_satoshi: None,
        right_satoshi: None,
        left_address: a.address,
        right_address: b.address,
    };
    let proof = build_proof(&[&body], &[&a, &b, &c]);
    proof.verify().unwrap();
    proof.verify_for_body(&body).unwrap();

    // Reordering the must-sign set changes the common digest, so every
    // signature dies at once.
    let mut shuffled = proof.clone();
    shuffled.must_signs.swap(0, 2);
    assert!(shuffled.verify().is_err());

    // So does reordering the hop checker list.
    let other_body = crate::channel::ChannelChainTransferProveBody {
        bill_auto_number: 13,
        ..body.clone()
    };
    let two_hop = build_proof(&[&body, &other_body], &[&a, &b, &c]);
    two_hop.verify_for_body(&body).unwrap();
    let mut swapped = two_hop.clone();
    swapped.prove_body_checkers.swap(0, 1);
    assert!(swapped.verify().is_err());

    // A hop not committed in the proof cannot borrow it.
    let foreign_body = crate::channel::ChannelChainTransferProveBody {
        bill_auto_number: 99,
        ..body.clone()
    };
    assert!(proof.verify_for_body(&foreign_body).is_err());

    // A hop whose endpoint never signed is unsettled.
    let stranger_body = crate::channel::ChannelChainTransferProveBody {
        right_address: party(4).address,
        ..body.clone()
    };
    let stranger_proof = build_proof(&[&stranger_body], &[&a, &b, &c]);
    assert!(stranger_proof.verify_for_body(&stranger_body).is_err());

    // Wire round trip preserves signatures.
    let bytes = proof.to_vec();
    let back = crate::channel::ChannelChainTransferProof::from_slice(&bytes).unwrap();
    assert_eq!(back, proof);
    back.verify().unwrap();
}

#[test]
fn test_proof_hop_checker_list_bounds() {
    let (a, b) = (party(1), party(2));
    let placeholder = a.key.sign(&canal_types::Hash256::default());
    let proof_with = |checkers: Vec<canal_types::HalfHash>| crate::channel::ChannelChainTransferProof {
        timestamp: 1_700_000,
        order_note_checker: canal_types::HalfHash::checker_of(b"order note"),
        prove_body_checkers: checkers,
        must_signs: vec![
            crate::channel::MustSign {
                address: a.address,
                sign: placeholder.clone(),
            },
            crate::channel::MustSign {
                address: b.address,
                sign: placeholder.clone(),
            },
        ],
    };

    // A hop list long enough to wrap the one-byte wire length prefix is
    // rejected before any digest is taken.
    let hop = canal_types::HalfHash::checker_of(b"hop");
    let err = proof_with(vec![hop; 256]).verify().unwrap_err();
    assert!(matches!(err, crate::errors::ChannelError::InvalidParameter(_)));
    // So is anything past the protocol hop cap.
    let err = proof_with(vec![hop; crate::channel::TRANSFER_HOP_MAX + 1])
        .verify()
        .unwrap_err();
    assert!(matches!(err, crate::errors::ChannelError::InvalidParameter(_)));

    // A proof committing to no hops proves nothing.
    let err = proof_with(Vec::new()).verify().unwrap_err();
    assert!(matches!(err, crate::errors::ChannelError::InvalidParameter(_)));
}
