//! Off-chain reconciliation bills and multi-hop transfer proofs.
//!
//! Bills are ephemeral off-chain artifacts: they are never stored, only
//! interpreted when presented on-chain as the basis of a close, challenge
//! or arbitration. The known kinds form a closed tagged union interpreted
//! exhaustively at that single point.

use crate::channel::model::Channel;
use crate::errors::{ChannelError, Result};
use canal_types::codec::{write_height, write_u32, write_u64};
use canal_types::{hash256, Address, Amount, ChannelId, CodecError, HalfHash, Hash256, Reader, Sign, WireFormat};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

/// Bounds of the must-sign set of a cross-node transfer proof.
pub const MUST_SIGN_MIN: usize = 2;
pub const MUST_SIGN_MAX: usize = 200;

/// Bounds of the hop checker list of a cross-node transfer proof. The cap
/// keeps the list well inside its one-byte wire length prefix.
pub const TRANSFER_HOP_MIN: usize = 1;
pub const TRANSFER_HOP_MAX: usize = 200;

const BILL_KIND_REALTIME: u8 = 1;
const BILL_KIND_TRANSFER_PROVE: u8 = 2;

/// Asset and direction of a single channel hop payment.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    IntoPrimitive,
    TryFromPrimitive,
    strum::Display,
)]
#[repr(u8)]
pub enum PayDirection {
    CoinLeftToRight = 1,
    CoinRightToLeft = 2,
    SatoshiLeftToRight = 3,
    SatoshiRightToLeft = 4,
}

fn write_opt_u64(buf: &mut Vec<u8>, value: &Option<u64>) {
    match value {
        None => buf.push(0),
        Some(v) => {
            buf.push(1);
            write_u64(buf, *v);
        }
    }
}

fn read_opt_u64(reader: &mut Reader<'_>) -> std::result::Result<Option<u64>, CodecError> {
    match reader.read_u8()? {
        0 => Ok(None),
        1 => Ok(Some(reader.read_u64()?)),
        other => Err(CodecError::Malformed(format!(
            "invalid optional mark byte: {}",
            other
        ))),
    }
}

// ============================================================
// Realtime reconciliation bill
// ============================================================

/// A signed off-chain snapshot of a channel's balance split. Unverified
/// until presented on-chain; `bill_auto_number` is the strictly increasing
/// per-channel sequence resolving "most recent wins" in disputes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimeReconciliation {
    pub channel_id: ChannelId,
    pub reuse_version: u32,
    pub bill_auto_number: u64,
    pub left_balance: Amount,
    pub right_balance: Amount,
    /// Optional BTC-denominated sub-balances.
    pub left_satoshi: Option<u64>,
    pub right_satoshi: Option<u64>,
    pub timestamp: u64,
    pub left_sign: Sign,
    pub right_sign: Sign,
}

impl RealtimeReconciliation {
    fn write_unsigned(&self, buf: &mut Vec<u8>) {
        self.channel_id.write(buf);
        write_u32(buf, self.reuse_version);
        write_u64(buf, self.bill_auto_number);
        self.left_balance.write(buf);
        self.right_balance.write(buf);
        write_opt_u64(buf, &self.left_satoshi);
        write_opt_u64(buf, &self.right_satoshi);
        write_height(buf, self.timestamp);
    }

    /// The digest both parties sign.
    pub fn digest(&self) -> Hash256 {
        let mut buf = Vec::new();
        self.write_unsigned(&mut buf);
        hash256(&buf)
    }

    /// Both embedded signs must verify and bind to the channel's parties,
    /// left sign to left address and right sign to right address.
    pub fn verify_signatures(&self, left_address: &Address, right_address: &Address) -> Result<()> {
        let digest = self.digest();
        for (sign, address, side) in [
            (&self.left_sign, left_address, "left"),
            (&self.right_sign, right_address, "right"),
        ] {
            if &sign.address() != address {
                return Err(ChannelError::Signature(format!(
                    "bill {} sign pubkey does not hash to party address {}",
                    side, address
                )));
            }
            if !sign.verify(&digest) {
                return Err(ChannelError::Signature(format!(
                    "bill {} signature invalid",
                    side
                )));
            }
        }
        Ok(())
    }
}

impl WireFormat for RealtimeReconciliation {
    fn write(&self, buf: &mut Vec<u8>) {
        self.write_unsigned(buf);
        self.left_sign.write(buf);
        self.right_sign.write(buf);
    }

    fn read(reader: &mut Reader<'_>) -> std::result::Result<Self, CodecError> {
        Ok(RealtimeReconciliation {
            channel_id: ChannelId::read(reader)?,
            reuse_version: reader.read_u32()?,
            bill_auto_number: reader.read_u64()?,
            left_balance: Amount::read(reader)?,
            right_balance: Amount::read(reader)?,
            left_satoshi: read_opt_u64(reader)?,
            right_satoshi: read_opt_u64(reader)?,
            timestamp: reader.read_height()?,
            left_sign: Sign::read(reader)?,
            right_sign: Sign::read(reader)?,
        })
    }
}

// ============================================================
// Channel-chain transfer prove body
// ============================================================

/// The per-hop structure of a multi-hop payment: one channel's resulting
/// state after the hop payment. Only its half-hash checker is embedded in
/// the cross-node proof, keeping hop details private from non-participants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelChainTransferProveBody {
    pub channel_id: ChannelId,
    pub reuse_version: u32,
    pub bill_auto_number: u64,
    pub pay_direction: PayDirection,
    pub pay_amount: Amount,
    pub pay_satoshi: Option<u64>,
    pub left_balance: Amount,
    pub right_balance: Amount,
    pub left_satoshi: Option<u64>,
    pub right_satoshi: Option<u64>,
    pub left_address: Address,
    pub right_address: Address,
}

impl ChannelChainTransferProveBody {
    /// The half-hash commitment embedded in a cross-node proof and used as
    /// the chaswap key.
    pub fn checker(&self) -> HalfHash {
        HalfHash::checker_of(&self.to_vec())
    }
}

impl WireFormat for ChannelChainTransferProveBody {
    fn write(&self, buf: &mut Vec<u8>) {
        self.channel_id.write(buf);
        write_u32(buf, self.reuse_version);
        write_u64(buf, self.bill_auto_number);
        buf.push(self.pay_direction.into());
        self.pay_amount.write(buf);
        write_opt_u64(buf, &self.pay_satoshi);
        self.left_balance.write(buf);
        self.right_balance.write(buf);
        write_opt_u64(buf, &self.left_satoshi);
        write_opt_u64(buf, &self.right_satoshi);
        self.left_address.write(buf);
        self.right_address.write(buf);
    }

    fn read(reader: &mut Reader<'_>) -> std::result::Result<Self, CodecError> {
        Ok(ChannelChainTransferProveBody {
            channel_id: ChannelId::read(reader)?,
            reuse_version: reader.read_u32()?,
            bill_auto_number: reader.read_u64()?,
            pay_direction: PayDirection::try_from(reader.read_u8()?)
                .map_err(|err| CodecError::Malformed(format!("invalid pay direction: {}", err)))?,
            pay_amount: Amount::read(reader)?,
            pay_satoshi: read_opt_u64(reader)?,
            left_balance: Amount::read(reader)?,
            right_balance: Amount::read(reader)?,
            left_satoshi: read_opt_u64(reader)?,
            right_satoshi: read_opt_u64(reader)?,
            left_address: Address::read(reader)?,
            right_address: Address::read(reader)?,
        })
    }
}

// ============================================================
// Cross-node transfer proof
// ============================================================

/// One position-bound (address, sign) pair of the must-sign set. Keeping
/// the pair in a single vector makes the pairing invariant impossible to
/// violate structurally.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MustSign {
    pub address: Address,
    pub sign: Sign,
}

impl WireFormat for MustSign {
    fn write(&self, buf: &mut Vec<u8>) {
        self.address.write(buf);
        self.sign.write(buf);
    }

    fn read(reader: &mut Reader<'_>) -> std::result::Result<Self, CodecError> {
        Ok(MustSign {
            address: Address::read(reader)?,
            sign: Sign::read(reader)?,
        })
    }
}

/// The end-to-end proof binding all hops of a multi-hop payment under one
/// signature set. The signed digest covers the unsigned prefix, the hop
/// checker list and the must-sign address list, so reordering either list
/// invalidates every signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelChainTransferProof {
    pub timestamp: u64,
    /// Half-hash of the order note describing the overall payment.
    pub order_note_checker: HalfHash,
    /// Ordered-but-shuffled hop prove-body checkers.
    pub prove_body_checkers: Vec<HalfHash>,
    /// Shuffled union of all hop endpoints, each bound to its signature by
    /// position.
    pub must_signs: Vec<MustSign>,
}

impl ChannelChainTransferProof {
    /// The digest every must-sign member signs.
    pub fn digest(&self) -> Hash256 {
        let mut buf = Vec::new();
        write_height(&mut buf, self.timestamp);
        self.order_note_checker.write(&mut buf);
        assert!(
            self.prove_body_checkers.len() <= u8::MAX as usize,
            "hop checker list exceeds the one-byte length prefix"
        );
        buf.push(self.prove_body_checkers.len() as u8);
        for checker in &self.prove_body_checkers {
            checker.write(&mut buf);
        }
        assert!(
            self.must_signs.len() <= u8::MAX as usize,
            "must-sign list exceeds the one-byte length prefix"
        );
        buf.push(self.must_signs.len() as u8);
        for must_sign in &self.must_signs {
            must_sign.address.write(&mut buf);
        }
        hash256(&buf)
    }

    /// Verify the whole signature set: member count bounds, position-bound
    /// pubkey/address equality, and every signature over the common digest.
    /// Any single failure aborts the whole route.
    pub fn verify(&self) -> Result<()> {
        let count = self.must_signs.len();
        if !(MUST_SIGN_MIN..=MUST_SIGN_MAX).contains(&count) {
            return Err(ChannelError::InvalidParameter(format!(
                "proof must-sign count {} outside {}..={}",
                count, MUST_SIGN_MIN, MUST_SIGN_MAX
            )));
        }
        let hops = self.prove_body_checkers.len();
        if !(TRANSFER_HOP_MIN..=TRANSFER_HOP_MAX).contains(&hops) {
            return Err(ChannelError::InvalidParameter(format!(
                "proof hop checker count {} outside {}..={}",
                hops, TRANSFER_HOP_MIN, TRANSFER_HOP_MAX
            )));
        }
        let digest = self.digest();
        for (position, must_sign) in self.must_signs.iter().enumerate() {
            if must_sign.sign.address() != must_sign.address {
                return Err(ChannelError::Signature(format!(
                    "proof sign at position {} does not hash to address {}",
                    position, must_sign.address
                )));
            }
            if !must_sign.sign.verify(&digest) {
                return Err(ChannelError::Signature(format!(
                    "proof signature at position {} invalid",
                    position
                )));
            }
        }
        Ok(())
    }

    /// Verify the proof for settling one specific hop: the hop's prove-body
    /// checker must be committed in the proof and both hop endpoints must be
    /// members of the must-sign set.
    pub fn verify_for_body(&self, body: &ChannelChainTransferProveBody) -> Result<()> {
        self.verify()?;
        let checker = body.checker();
        if !self.prove_body_checkers.contains(&checker) {
            return Err(ChannelError::Consistency(format!(
                "prove body checker {} not committed in proof",
                checker
            )));
        }
        for address in [&body.left_address, &body.right_address] {
            if !self.must_signs.iter().any(|m| &m.address == address) {
                return Err(ChannelError::Consistency(format!(
                    "hop endpoint {} missing from proof must-sign set",
                    address
                )));
            }
        }
        Ok(())
    }
}

impl WireFormat for ChannelChainTransferProof {
    fn write(&self, buf: &mut Vec<u8>) {
        write_height(buf, self.timestamp);
        self.order_note_checker.write(buf);
        assert!(
            self.prove_body_checkers.len() <= u8::MAX as usize,
            "hop checker list exceeds the one-byte length prefix"
        );
        buf.push(self.prove_body_checkers.len() as u8);
        for checker in &self.prove_body_checkers {
            checker.write(buf);
        }
        assert!(
            self.must_signs.len() <= u8::MAX as usize,
            "must-sign list exceeds the one-byte length prefix"
        );
        buf.push(self.must_signs.len() as u8);
        for must_sign in &self.must_signs {
            must_sign.write(buf);
        }
    }

    fn read(reader: &mut Reader<'_>) -> std::result::Result<Self, CodecError> {
        let timestamp = reader.read_height()?;
        let order_note_checker = HalfHash::read(reader)?;
        let checker_count = reader.read_u8()? as usize;
        let mut prove_body_checkers = Vec::with_capacity(checker_count);
        for _ in 0..checker_count {
            prove_body_checkers.push(HalfHash::read(reader)?);
        }
        let sign_count = reader.read_u8()? as usize;
        let mut must_signs = Vec::with_capacity(sign_count);
        for _ in 0..sign_count {
            must_signs.push(MustSign::read(reader)?);
        }
        Ok(ChannelChainTransferProof {
            timestamp,
            order_note_checker,
            prove_body_checkers,
            must_signs,
        })
    }
}

// ============================================================
// OffChainBill
// ============================================================

/// The closed union of off-chain bill kinds a close, challenge or
/// arbitration may be based on. Settlement is the one place bills are
/// interpreted; matching is exhaustive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OffChainBill {
    Realtime(RealtimeReconciliation),
    TransferProve {
        proof: Box<ChannelChainTransferProof>,
        body: Box<ChannelChainTransferProveBody>,
    },
}

impl OffChainBill {
    pub fn channel_id(&self) -> ChannelId {
        match self {
            OffChainBill::Realtime(bill) => bill.channel_id,
            OffChainBill::TransferProve { body, .. } => body.channel_id,
        }
    }

    pub fn reuse_version(&self) -> u32 {
        match self {
            OffChainBill::Realtime(bill) => bill.reuse_version,
            OffChainBill::TransferProve { body, .. } => body.reuse_version,
        }
    }

    pub fn bill_auto_number(&self) -> u64 {
        match self {
            OffChainBill::Realtime(bill) => bill.bill_auto_number,
            OffChainBill::TransferProve { body, .. } => body.bill_auto_number,
        }
    }

    pub fn left_balance(&self) -> &Amount {
        match self {
            OffChainBill::Realtime(bill) => &bill.left_balance,
            OffChainBill::TransferProve { body, .. } => &body.left_balance,
        }
    }

    pub fn right_balance(&self) -> &Amount {
        match self {
            OffChainBill::Realtime(bill) => &bill.right_balance,
            OffChainBill::TransferProve { body, .. } => &body.right_balance,
        }
    }

    pub fn left_satoshi(&self) -> Option<u64> {
        match self {
            OffChainBill::Realtime(bill) => bill.left_satoshi,
            OffChainBill::TransferProve { body, .. } => body.left_satoshi,
        }
    }

    pub fn right_satoshi(&self) -> Option<u64> {
        match self {
            OffChainBill::Realtime(bill) => bill.right_satoshi,
            OffChainBill::TransferProve { body, .. } => body.right_satoshi,
        }
    }

    /// Verify the bill against the stored channel record it claims to
    /// settle: id and reuse version must match, the parties must be the
    /// channel's, and the embedded signature material must verify.
    pub fn verify(&self, channel_id: &ChannelId, channel: &Channel) -> Result<()> {
        if &self.channel_id() != channel_id {
            return Err(ChannelError::Consistency(format!(
                "bill is for channel {}, not {}",
                self.channel_id(),
                channel_id
            )));
        }
        if self.reuse_version() != channel.reuse_version {
            return Err(ChannelError::Consistency(format!(
                "bill reuse version {} does not match channel reuse version {}",
                self.reuse_version(),
                channel.reuse_version
            )));
        }
        match self {
            OffChainBill::Realtime(bill) => {
                bill.verify_signatures(&channel.left_address, &channel.right_address)
            }
            OffChainBill::TransferProve { proof, body } => {
                if body.left_address != channel.left_address
                    || body.right_address != channel.right_address
                {
                    return Err(ChannelError::Consistency(
                        "prove body parties do not match the channel record".to_string(),
                    ));
                }
                proof.verify_for_body(body)
            }
        }
    }
}

impl WireFormat for OffChainBill {
    fn write(&self, buf: &mut Vec<u8>) {
        match self {
            OffChainBill::Realtime(bill) => {
                buf.push(BILL_KIND_REALTIME);
                bill.write(buf);
            }
            OffChainBill::TransferProve { proof, body } => {
                buf.push(BILL_KIND_TRANSFER_PROVE);
                proof.write(buf);
                body.write(buf);
            }
        }
    }

    fn read(reader: &mut Reader<'_>) -> std::result::Result<Self, CodecError> {
        match reader.read_u8()? {
            BILL_KIND_REALTIME => Ok(OffChainBill::Realtime(RealtimeReconciliation::read(reader)?)),
            BILL_KIND_TRANSFER_PROVE => Ok(OffChainBill::TransferProve {
                proof: Box::new(ChannelChainTransferProof::read(reader)?),
                body: Box::new(ChannelChainTransferProveBody::read(reader)?),
            }),
            other => Err(CodecError::Malformed(format!(
                "unknown bill kind tag: {}",
                other
            ))),
        }
    }
}
