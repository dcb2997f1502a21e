//! The persistent channel record and its store model.

use crate::errors::{ChannelError, Result};
use crate::store::ChainState;
use bitflags::bitflags;
use canal_types::codec::{write_height, write_u16, write_u32, write_u64};
use canal_types::{Address, Amount, ChannelId, CodecError, Reader, WireFormat};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

/// Wire width of the two locked-amount columns. Capping the encoded width
/// bounds worst-case interest-compounded growth so settlement payouts still
/// serialize.
pub const CHANNEL_AMOUNT_WIDTH: usize = 6;

/// Protocol challenge window: blocks a unilateral close must wait before it
/// can be finalized.
pub const CHANNEL_LOCK_BLOCK: u16 = 5000;

// ============================================================
// Status
// ============================================================

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
pub enum ChannelStatus {
    /// Live and usable for off-chain payments.
    Opening = 0,
    /// Closed amicably; the id may be reused by the same two parties.
    AgreementClosed = 1,
    /// Closed by on-chain arbitration. Terminal; the id is burned.
    ArbitrationClosed = 2,
    /// A unilateral close is pending its challenge window.
    Challenging = 3,
}

impl ChannelStatus {
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            ChannelStatus::AgreementClosed | ChannelStatus::ArbitrationClosed
        )
    }
}

bitflags! {
    /// Flags in the `config_mark` column gating the optional trailing
    /// sections of the record.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ChannelMark: u16 {
        const HAVE_ARBITRATION = 0b001;
        const HAVE_DISTRIBUTION = 0b010;
        const HAVE_PRIOR = 0b100;
    }
}

/// Which side of the channel an address is.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChannelSide {
    Left,
    Right,
}

// ============================================================
// Arbitration data
// ============================================================

/// Pending-unilateral-close data, recorded while a channel is challenging
/// and retained after final arbitration for audit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelArbitration {
    /// Height the unilateral close was submitted at; the challenge window
    /// runs from here for `lock_block` blocks.
    pub launch_height: u64,
    /// Sequence number of the bill the closer asserted (0 = no bill).
    pub assert_bill_number: u64,
    /// The party that asserted the close.
    pub assert_address: Address,
    pub assert_left: Amount,
    pub assert_right: Amount,
}

impl WireFormat for ChannelArbitration {
    fn write(&self, buf: &mut Vec<u8>) {
        write_height(buf, self.launch_height);
        write_u64(buf, self.assert_bill_number);
        self.assert_address.write(buf);
        self.assert_left.write(buf);
        self.assert_right.write(buf);
    }

    fn read(reader: &mut Reader<'_>) -> std::result::Result<Self, CodecError> {
        Ok(ChannelArbitration {
            launch_height: reader.read_height()?,
            assert_bill_number: reader.read_u64()?,
            assert_address: Address::read(reader)?,
            assert_left: Amount::read(reader)?,
            assert_right: Amount::read(reader)?,
        })
    }
}

// ============================================================
// Channel record
// ============================================================

/// The persistent record of a payment channel.
///
/// Fixed wire layout: `belong_height(5) + lock_block(2) + left_addr(21) +
/// left_amount(6, zero-padded) + right_addr(21) + right_amount(6) +
/// status(1) + config_mark(2) + reserved(16)`, where the first four reserved
/// bytes carry `reuse_version`. Optional sections flagged in `config_mark`
/// follow the fixed layout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub belong_height: u64,
    pub lock_block: u16,
    pub left_address: Address,
    pub left_amount: Amount,
    pub right_address: Address,
    pub right_amount: Amount,
    pub status: ChannelStatus,
    /// Incremented each time a fully-and-amicably-closed id is reopened by
    /// the same two parties. Starts at 1.
    pub reuse_version: u32,
    pub arbitration: Option<ChannelArbitration>,
    /// Audit copy of the agreed pre-interest left split, recorded at
    /// settlement; recover re-derives payouts from it.
    pub final_left_distribution: Option<Amount>,
    /// The superseded amicably-closed record this open overwrote when the id
    /// was reused. Rolling back the reopen restores it verbatim; nested
    /// reuses chain through here.
    pub reused_from: Option<Box<Channel>>,
}

impl Channel {
    pub fn open(
        belong_height: u64,
        left_address: Address,
        left_amount: Amount,
        right_address: Address,
        right_amount: Amount,
        reuse_version: u32,
    ) -> Self {
        Channel {
            belong_height,
            lock_block: CHANNEL_LOCK_BLOCK,
            left_address,
            left_amount,
            right_address,
            right_amount,
            status: ChannelStatus::Opening,
            reuse_version,
            arbitration: None,
            final_left_distribution: None,
            reused_from: None,
        }
    }

    /// The coin total locked in the channel.
    pub fn total_locked(&self) -> Result<Amount> {
        Ok(self.left_amount.checked_add(&self.right_amount)?)
    }

    pub fn side_of(&self, address: &Address) -> Option<ChannelSide> {
        if address == &self.left_address {
            Some(ChannelSide::Left)
        } else if address == &self.right_address {
            Some(ChannelSide::Right)
        } else {
            None
        }
    }

    pub fn same_parties(&self, left: &Address, right: &Address) -> bool {
        &self.left_address == left && &self.right_address == right
    }

    fn mark(&self) -> ChannelMark {
        let mut mark = ChannelMark::empty();
        if self.arbitration.is_some() {
            mark |= ChannelMark::HAVE_ARBITRATION;
        }
        if self.final_left_distribution.is_some() {
            mark |= ChannelMark::HAVE_DISTRIBUTION;
        }
        if self.reused_from.is_some() {
            mark |= ChannelMark::HAVE_PRIOR;
        }
        mark
    }
}

impl WireFormat for Channel {
    fn write(&self, buf: &mut Vec<u8>) {
        write_height(buf, self.belong_height);
        write_u16(buf, self.lock_block);
        self.left_address.write(buf);
        self.left_amount
            .write_padded(buf, CHANNEL_AMOUNT_WIDTH)
            .expect("locked left amount fits the channel column");
        self.right_address.write(buf);
        self.right_amount
            .write_padded(buf, CHANNEL_AMOUNT_WIDTH)
            .expect("locked right amount fits the channel column");
        buf.push(self.status.into());
        write_u16(buf, self.mark().bits());
        write_u32(buf, self.reuse_version);
        buf.extend_from_slice(&[0u8; 12]);
        if let Some(arbitration) = &self.arbitration {
            arbitration.write(buf);
        }
        if let Some(distribution) = &self.final_left_distribution {
            distribution.write(buf);
        }
        if let Some(prior) = &self.reused_from {
            prior.write(buf);
        }
    }

    fn read(reader: &mut Reader<'_>) -> std::result::Result<Self, CodecError> {
        let belong_height = reader.read_height()?;
        let lock_block = reader.read_u16()?;
        let left_address = Address::read(reader)?;
        let left_amount = Amount::read_padded(reader, CHANNEL_AMOUNT_WIDTH)?;
        let right_address = Address::read(reader)?;
        let right_amount = Amount::read_padded(reader, CHANNEL_AMOUNT_WIDTH)?;
        let status = ChannelStatus::try_from(reader.read_u8()?)
            .map_err(|err| CodecError::Malformed(format!("invalid channel status: {}", err)))?;
        let mark = ChannelMark::from_bits(reader.read_u16()?)
            .ok_or_else(|| CodecError::Malformed("unknown channel mark bits".to_string()))?;
        let reuse_version = reader.read_u32()?;
        let _reserved = reader.take(12)?;
        let arbitration = if mark.contains(ChannelMark::HAVE_ARBITRATION) {
            Some(ChannelArbitration::read(reader)?)
        } else {
            None
        };
        let final_left_distribution = if mark.contains(ChannelMark::HAVE_DISTRIBUTION) {
            Some(Amount::read(reader)?)
        } else {
            None
        };
        let reused_from = if mark.contains(ChannelMark::HAVE_PRIOR) {
            Some(Box::new(Channel::read(reader)?))
        } else {
            None
        };
        Ok(Channel {
            belong_height,
            lock_block,
            left_address,
            left_amount,
            right_address,
            right_amount,
            status,
            reuse_version,
            arbitration,
            final_left_distribution,
            reused_from,
        })
    }
}

// ============================================================
// Store model
// ============================================================

/// Validate a channel-create against the id-reuse precondition and return
/// the reuse version the new record must carry.
///
/// Creation is allowed when no record exists (version 1), or when the
/// existing record is `AgreementClosed` with the same two addresses in the
/// same left/right order (prior version + 1). A record closed by final
/// arbitration burns the id forever.
pub fn check_channel_create<S: ChainState>(
    state: &S,
    id: &ChannelId,
    left_address: &Address,
    right_address: &Address,
) -> Result<u32> {
    if !id.is_valid() {
        return Err(ChannelError::InvalidParameter(format!(
            "channel id {} first and last byte must be non-zero",
            id
        )));
    }
    if left_address == right_address {
        return Err(ChannelError::InvalidParameter(format!(
            "channel parties must differ, got {} twice",
            left_address
        )));
    }
    match state.channel(id) {
        None => Ok(1),
        Some(prior) => {
            if prior.status != ChannelStatus::AgreementClosed {
                return Err(ChannelError::InvalidState(format!(
                    "channel {} already exists with status {}",
                    id, prior.status
                )));
            }
            if !prior.same_parties(left_address, right_address) {
                return Err(ChannelError::Consistency(format!(
                    "channel {} can only be reused by the same two parties",
                    id
                )));
            }
            Ok(prior.reuse_version + 1)
        }
    }
}
