//! The channel lifecycle controller.
//!
//! Every state transition is a pair of inverse operations: `apply` validates
//! everything against stored state and only then mutates, `recover` is its
//! exact left-inverse. A block is rolled back by replaying recover calls in
//! strict reverse order, so recover is only ever invoked on state the system
//! itself produced; impossible states there are upstream bugs and panic.

use crate::channel::bill::{MustSign, OffChainBill};
use crate::channel::interest::accrue_interest;
use crate::channel::model::{check_channel_create, Channel, ChannelArbitration, ChannelSide, ChannelStatus, CHANNEL_AMOUNT_WIDTH};
use crate::errors::{ChannelError, Result};
use crate::store::{Balance, ChainState, Chaswap, SupplyCounter};
use canal_types::{hash256, Address, Amount, ChannelId, CodecError, HalfHash, Hash256, Reader, WireFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

// ============================================================
// Transaction signer set
// ============================================================

/// The addresses that signed the enclosing transaction. Cooperative channel
/// transitions require specific parties among them.
#[derive(Clone, Debug, Default)]
pub struct TxSigners(HashSet<Address>);

impl TxSigners {
    pub fn new(addresses: impl IntoIterator<Item = Address>) -> Self {
        TxSigners(addresses.into_iter().collect())
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.0.contains(address)
    }

    fn require(&self, address: &Address) -> Result<()> {
        if self.contains(address) {
            Ok(())
        } else {
            Err(ChannelError::Signature(format!(
                "transaction is not signed by {}",
                address
            )))
        }
    }
}

// ============================================================
// Shared helpers
// ============================================================

fn load_channel<S: ChainState>(state: &S, id: &ChannelId) -> Result<Channel> {
    state
        .channel(id)
        .ok_or(ChannelError::ChannelNotFound(*id))
}

fn require_status(id: &ChannelId, channel: &Channel, expected: ChannelStatus) -> Result<()> {
    if channel.status != expected {
        return Err(ChannelError::InvalidState(format!(
            "channel {} is {}, expected {}",
            id, channel.status, expected
        )));
    }
    Ok(())
}

fn require_party(id: &ChannelId, channel: &Channel, address: &Address) -> Result<ChannelSide> {
    channel.side_of(address).ok_or_else(|| {
        ChannelError::Consistency(format!("{} is not a party of channel {}", address, id))
    })
}

fn credit_coin<S: ChainState>(state: &mut S, address: &Address, amount: &Amount) -> Result<()> {
    if let Some(balance) = checked_credit(state, address, amount)? {
        state.balance_set(*address, balance);
    }
    Ok(())
}

/// Compute the credited balance without writing it. `None` means a zero
/// credit, which must not materialize an empty record.
fn checked_credit<S: ChainState>(
    state: &S,
    address: &Address,
    amount: &Amount,
) -> Result<Option<Balance>> {
    if amount.is_zero() {
        return Ok(None);
    }
    let mut balance = state.balance(address).unwrap_or_default();
    balance.coin = balance.coin.checked_add(amount)?;
    Ok(Some(balance))
}

fn check_debit_coin<S: ChainState>(state: &S, address: &Address, amount: &Amount) -> Result<Balance> {
    let balance = state
        .balance(address)
        .ok_or(ChannelError::BalanceNotFound(*address))?;
    if balance.coin < *amount {
        return Err(ChannelError::InsufficientBalance {
            address: *address,
            needs: amount.clone(),
            has: balance.coin,
        });
    }
    Ok(balance)
}

fn debit_coin<S: ChainState>(state: &mut S, address: &Address, amount: &Amount) -> Result<()> {
    if amount.is_zero() {
        return Ok(());
    }
    let mut balance = check_debit_coin(state, address, amount)?;
    balance.coin = balance.coin.checked_sub(amount)?;
    // Fully-drained records are removed, never stored as empty.
    if balance.is_empty() {
        state.balance_del(address);
    } else {
        state.balance_set(*address, balance);
    }
    Ok(())
}

/// Recover-path debit: inconsistency here means the rollback driver handed
/// us state this subsystem never produced.
fn recover_debit_coin<S: ChainState>(state: &mut S, address: &Address, amount: &Amount) {
    if amount.is_zero() {
        return;
    }
    let mut balance = state
        .balance(address)
        .expect("recover: balance credited at apply time exists");
    balance.coin = balance
        .coin
        .checked_sub(amount)
        .expect("recover: balance arithmetic mirrors apply");
    assert!(
        !balance.coin.is_negative(),
        "recover: debit of {} exceeds balance of {}",
        amount,
        address
    );
    if balance.is_empty() {
        state.balance_del(address);
    } else {
        state.balance_set(*address, balance);
    }
}

fn recover_credit_coin<S: ChainState>(state: &mut S, address: &Address, amount: &Amount) {
    if amount.is_zero() {
        return;
    }
    let mut balance = state.balance(address).unwrap_or_default();
    balance.coin = balance
        .coin
        .checked_add(amount)
        .expect("recover: balance arithmetic mirrors apply");
    state.balance_set(*address, balance);
}

/// The satoshi legs of a presented split must reconcile with the satoshi
/// locked in the channel, which is zero in this core.
fn require_satoshi_reconciled(left: Option<u64>, right: Option<u64>) -> Result<()> {
    if left.unwrap_or(0) != 0 || right.unwrap_or(0) != 0 {
        return Err(ChannelError::Consistency(
            "satoshi split does not reconcile with locked satoshi".to_string(),
        ));
    }
    Ok(())
}

// ============================================================
// Settlement core
// ============================================================

/// The shared close/settlement core. Verifies the split against the stored
/// record, accrues interest, pays out, flips the status and maintains the
/// supply counters. Everything is validated before the first write.
fn settle_channel<S: ChainState>(
    state: &mut S,
    id: &ChannelId,
    mut channel: Channel,
    left_final: &Amount,
    right_final: &Amount,
    left_satoshi: Option<u64>,
    right_satoshi: Option<u64>,
    to_status: ChannelStatus,
) -> Result<()> {
    if left_final.is_negative() || right_final.is_negative() {
        return Err(ChannelError::Consistency(
            "settlement split is negative on one side".to_string(),
        ));
    }
    // Anti-theft check: the claimed split must sum to the total locked in the
    // stored record, which the caller cannot forge because pledges were
    // debited at open time under on-chain signature.
    let locked_total = channel.total_locked()?;
    let split_total = left_final.checked_add(right_final)?;
    if split_total != locked_total {
        return Err(ChannelError::Consistency(format!(
            "settlement split {} does not sum to locked total {}",
            split_total, locked_total
        )));
    }
    require_satoshi_reconciled(left_satoshi, right_satoshi)?;

    let outcome = accrue_interest(
        channel.belong_height,
        state.pending_block_height(),
        left_final,
        right_final,
    )?;
    let mut supply = state.total_supply();
    supply.do_sub(SupplyCounter::LocatedInChannel, &locked_total)?;
    if outcome.applied {
        let payout_total = outcome.left.checked_add(&outcome.right)?;
        let interest = payout_total.checked_sub(&locked_total)?;
        supply.do_add(SupplyCounter::ChannelInterest, &interest)?;
    }
    // Compute both payout balances before the first write so an arithmetic
    // failure cannot leave a half-settled channel.
    let left_write = checked_credit(state, &channel.left_address, &outcome.left)?;
    let right_write = checked_credit(state, &channel.right_address, &outcome.right)?;

    if let Some(balance) = left_write {
        state.balance_set(channel.left_address, balance);
    }
    if let Some(balance) = right_write {
        state.balance_set(channel.right_address, balance);
    }
    state.update_total_supply(supply);
    channel.status = to_status;
    channel.final_left_distribution = Some(left_final.clone());
    state.channel_update(*id, channel);
    debug!(channel_id = %id, status = %to_status, "channel settled");
    Ok(())
}

/// Exact inverse of [`settle_channel`]: re-derives the split from the audit
/// record, recomputes interest at the same heights, claws back the payouts
/// and restores the previous status.
fn recover_settle_channel<S: ChainState>(
    state: &mut S,
    id: &ChannelId,
    from_status: ChannelStatus,
    restore_status: ChannelStatus,
) {
    let mut channel = state
        .channel(id)
        .expect("recover: settled channel record exists");
    assert_eq!(
        channel.status, from_status,
        "recover: channel {} status does not match the settlement being undone",
        id
    );
    let left_final = channel
        .final_left_distribution
        .take()
        .expect("recover: settled channel records the final left split");
    let locked_total = channel
        .total_locked()
        .expect("recover: locked totals were summed at apply time");
    let right_final = locked_total
        .checked_sub(&left_final)
        .expect("recover: split arithmetic mirrors apply");
    let outcome = accrue_interest(
        channel.belong_height,
        state.pending_block_height(),
        &left_final,
        &right_final,
    )
    .expect("recover: interest computation mirrors apply");

    recover_debit_coin(state, &channel.left_address, &outcome.left);
    recover_debit_coin(state, &channel.right_address, &outcome.right);

    let mut supply = state.total_supply();
    supply
        .do_add(SupplyCounter::LocatedInChannel, &locked_total)
        .expect("recover: supply arithmetic mirrors apply");
    if outcome.applied {
        let payout_total = outcome
            .left
            .checked_add(&outcome.right)
            .expect("recover: payout arithmetic mirrors apply");
        let interest = payout_total
            .checked_sub(&locked_total)
            .expect("recover: payout arithmetic mirrors apply");
        supply
            .do_sub(SupplyCounter::ChannelInterest, &interest)
            .expect("recover: supply arithmetic mirrors apply");
    }
    state.update_total_supply(supply);

    channel.status = restore_status;
    state.channel_update(*id, channel);
}

// ============================================================
// Open
// ============================================================

/// Open a payment channel, locking a pledge from each party.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenChannel {
    pub channel_id: ChannelId,
    pub left_address: Address,
    pub left_amount: Amount,
    pub right_address: Address,
    pub right_amount: Amount,
}

impl OpenChannel {
    pub fn apply<S: ChainState>(&self, state: &mut S, signers: &TxSigners) -> Result<()> {
        let reuse_version =
            check_channel_create(state, &self.channel_id, &self.left_address, &self.right_address)?;
        for (amount, side) in [(&self.left_amount, "left"), (&self.right_amount, "right")] {
            if amount.is_negative() {
                return Err(ChannelError::InvalidParameter(format!(
                    "{} pledge is negative",
                    side
                )));
            }
            if !amount.fits_width(CHANNEL_AMOUNT_WIDTH) {
                return Err(ChannelError::InvalidParameter(format!(
                    "{} pledge does not fit {} serialized bytes",
                    side, CHANNEL_AMOUNT_WIDTH
                )));
            }
        }
        if self.left_amount.is_zero() && self.right_amount.is_zero() {
            return Err(ChannelError::InvalidParameter(
                "channel pledges must not both be zero".to_string(),
            ));
        }
        signers.require(&self.left_address)?;
        signers.require(&self.right_address)?;
        if !self.left_amount.is_zero() {
            check_debit_coin(state, &self.left_address, &self.left_amount)?;
        }
        if !self.right_amount.is_zero() {
            check_debit_coin(state, &self.right_address, &self.right_amount)?;
        }
        let total = self.left_amount.checked_add(&self.right_amount)?;
        let mut supply = state.total_supply();
        supply.do_add(SupplyCounter::LocatedInChannel, &total)?;

        // Reopening overwrites the amicably-closed record; keep it inside the
        // new one so a rollback restores it verbatim.
        let superseded = if reuse_version > 1 {
            state.channel(&self.channel_id).map(Box::new)
        } else {
            None
        };

        debit_coin(state, &self.left_address, &self.left_amount)?;
        debit_coin(state, &self.right_address, &self.right_amount)?;
        state.update_total_supply(supply);
        let mut channel = Channel::open(
            state.pending_block_height(),
            self.left_address,
            self.left_amount.clone(),
            self.right_address,
            self.right_amount.clone(),
            reuse_version,
        );
        channel.reused_from = superseded;
        state.channel_create(self.channel_id, channel);
        debug!(channel_id = %self.channel_id, reuse_version, "channel opened");
        Ok(())
    }

    pub fn recover<S: ChainState>(&self, state: &mut S) {
        let channel = state
            .channel(&self.channel_id)
            .expect("recover: opened channel record exists");
        assert_eq!(
            channel.status,
            ChannelStatus::Opening,
            "recover: channel {} is not in the opening state",
            self.channel_id
        );
        recover_credit_coin(state, &channel.left_address, &channel.left_amount);
        recover_credit_coin(state, &channel.right_address, &channel.right_amount);
        let total = channel
            .total_locked()
            .expect("recover: locked totals were summed at apply time");
        let mut supply = state.total_supply();
        supply
            .do_sub(SupplyCounter::LocatedInChannel, &total)
            .expect("recover: supply arithmetic mirrors apply");
        state.update_total_supply(supply);
        if channel.reuse_version <= 1 {
            state.channel_delete(&self.channel_id);
        } else {
            // The id was reused: put the superseded closed record back.
            let prior = channel
                .reused_from
                .expect("recover: reused open retains the superseded record");
            assert_eq!(
                prior.reuse_version,
                channel.reuse_version - 1,
                "recover: superseded record carries the prior reuse version"
            );
            state.channel_update(self.channel_id, *prior);
        }
    }
}

// ============================================================
// Cooperative closes
// ============================================================

/// Close with the currently-stored split; pure time-based interest
/// collection, no new agreement needed beyond both signatures.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseChannel {
    pub channel_id: ChannelId,
}

impl CloseChannel {
    pub fn apply<S: ChainState>(&self, state: &mut S, signers: &TxSigners) -> Result<()> {
        let channel = load_channel(state, &self.channel_id)?;
        require_status(&self.channel_id, &channel, ChannelStatus::Opening)?;
        signers.require(&channel.left_address)?;
        signers.require(&channel.right_address)?;
        let left = channel.left_amount.clone();
        let right = channel.right_amount.clone();
        settle_channel(
            state,
            &self.channel_id,
            channel,
            &left,
            &right,
            None,
            None,
            ChannelStatus::AgreementClosed,
        )
    }

    pub fn recover<S: ChainState>(&self, state: &mut S) {
        recover_settle_channel(
            state,
            &self.channel_id,
            ChannelStatus::AgreementClosed,
            ChannelStatus::Opening,
        );
    }
}

/// Close with an explicitly agreed final split; both parties must sign.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseChannelBySetupAmount {
    pub channel_id: ChannelId,
    pub left_amount: Amount,
    pub right_amount: Amount,
}

impl CloseChannelBySetupAmount {
    pub fn apply<S: ChainState>(&self, state: &mut S, signers: &TxSigners) -> Result<()> {
        let channel = load_channel(state, &self.channel_id)?;
        require_status(&self.channel_id, &channel, ChannelStatus::Opening)?;
        signers.require(&channel.left_address)?;
        signers.require(&channel.right_address)?;
        settle_channel(
            state,
            &self.channel_id,
            channel,
            &self.left_amount,
            &self.right_amount,
            None,
            None,
            ChannelStatus::AgreementClosed,
        )
    }

    pub fn recover<S: ChainState>(&self, state: &mut S) {
        recover_settle_channel(
            state,
            &self.channel_id,
            ChannelStatus::AgreementClosed,
            ChannelStatus::Opening,
        );
    }
}

/// Close giving only the left final amount; the right side is the locked
/// total minus it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseChannelBySetupOnlyLeft {
    pub channel_id: ChannelId,
    pub left_amount: Amount,
}

impl CloseChannelBySetupOnlyLeft {
    pub fn apply<S: ChainState>(&self, state: &mut S, signers: &TxSigners) -> Result<()> {
        let channel = load_channel(state, &self.channel_id)?;
        require_status(&self.channel_id, &channel, ChannelStatus::Opening)?;
        signers.require(&channel.left_address)?;
        signers.require(&channel.right_address)?;
        let right_amount = channel.total_locked()?.checked_sub(&self.left_amount)?;
        settle_channel(
            state,
            &self.channel_id,
            channel,
            &self.left_amount,
            &right_amount,
            None,
            None,
            ChannelStatus::AgreementClosed,
        )
    }

    pub fn recover<S: ChainState>(&self, state: &mut S) {
        recover_settle_channel(
            state,
            &self.channel_id,
            ChannelStatus::AgreementClosed,
            ChannelStatus::Opening,
        );
    }
}

// ============================================================
// Unilateral close / challenge / arbitration
// ============================================================

/// One party asserts the currently-stored split and starts the challenge
/// window; no bill required.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnilateralCloseByNothing {
    pub channel_id: ChannelId,
    pub assert_address: Address,
}

impl UnilateralCloseByNothing {
    pub fn apply<S: ChainState>(&self, state: &mut S, signers: &TxSigners) -> Result<()> {
        let mut channel = load_channel(state, &self.channel_id)?;
        require_status(&self.channel_id, &channel, ChannelStatus::Opening)?;
        require_party(&self.channel_id, &channel, &self.assert_address)?;
        signers.require(&self.assert_address)?;
        channel.arbitration = Some(ChannelArbitration {
            launch_height: state.pending_block_height(),
            assert_bill_number: 0,
            assert_address: self.assert_address,
            assert_left: channel.left_amount.clone(),
            assert_right: channel.right_amount.clone(),
        });
        channel.status = ChannelStatus::Challenging;
        state.channel_update(self.channel_id, channel);
        debug!(channel_id = %self.channel_id, "unilateral close launched without bill");
        Ok(())
    }

    pub fn recover<S: ChainState>(&self, state: &mut S) {
        recover_challenge_launch(state, &self.channel_id);
    }
}

/// One party submits a both-signed off-chain bill as the asserted split and
/// starts the challenge window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnilateralCloseByBill {
    pub bill: OffChainBill,
    pub assert_address: Address,
}

impl UnilateralCloseByBill {
    pub fn apply<S: ChainState>(&self, state: &mut S, signers: &TxSigners) -> Result<()> {
        let channel_id = self.bill.channel_id();
        let mut channel = load_channel(state, &channel_id)?;
        require_status(&channel_id, &channel, ChannelStatus::Opening)?;
        require_party(&channel_id, &channel, &self.assert_address)?;
        signers.require(&self.assert_address)?;
        self.bill.verify(&channel_id, &channel)?;
        check_bill_split(&self.bill, &channel)?;
        channel.arbitration = Some(ChannelArbitration {
            launch_height: state.pending_block_height(),
            assert_bill_number: self.bill.bill_auto_number(),
            assert_address: self.assert_address,
            assert_left: self.bill.left_balance().clone(),
            assert_right: self.bill.right_balance().clone(),
        });
        channel.status = ChannelStatus::Challenging;
        state.channel_update(channel_id, channel);
        debug!(
            channel_id = %channel_id,
            bill_number = self.bill.bill_auto_number(),
            "unilateral close launched by reconciliation bill"
        );
        Ok(())
    }

    pub fn recover<S: ChainState>(&self, state: &mut S) {
        recover_challenge_launch(state, &self.bill.channel_id());
    }
}

/// Validate a bill's claimed split against the stored record before it may
/// become an asserted distribution.
fn check_bill_split(bill: &OffChainBill, channel: &Channel) -> Result<()> {
    let left = bill.left_balance();
    let right = bill.right_balance();
    if left.is_negative() || right.is_negative() {
        return Err(ChannelError::Consistency(
            "bill split is negative on one side".to_string(),
        ));
    }
    let split_total = left.checked_add(right)?;
    let locked_total = channel.total_locked()?;
    if split_total != locked_total {
        return Err(ChannelError::Consistency(format!(
            "bill split {} does not sum to locked total {}",
            split_total, locked_total
        )));
    }
    require_satoshi_reconciled(bill.left_satoshi(), bill.right_satoshi())
}

fn recover_challenge_launch<S: ChainState>(state: &mut S, id: &ChannelId) {
    let mut channel = state
        .channel(id)
        .expect("recover: challenging channel record exists");
    assert_eq!(
        channel.status,
        ChannelStatus::Challenging,
        "recover: channel {} is not challenging",
        id
    );
    channel.arbitration = None;
    channel.status = ChannelStatus::Opening;
    state.channel_update(*id, channel);
}

/// During the challenge window, the counterparty proves the asserted split
/// stale with a strictly newer bill. Fraud proven: the whole locked total
/// (interest-adjusted) goes to the challenger and the channel closes
/// terminally. The fraudulent assert is retained for audit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeBySubmitBill {
    pub bill: OffChainBill,
    pub challenger_address: Address,
}

impl ChallengeBySubmitBill {
    pub fn apply<S: ChainState>(&self, state: &mut S, signers: &TxSigners) -> Result<()> {
        let channel_id = self.bill.channel_id();
        let channel = load_channel(state, &channel_id)?;
        require_status(&channel_id, &channel, ChannelStatus::Challenging)?;
        let arbitration = channel.arbitration.clone().ok_or_else(|| {
            ChannelError::InvalidState(format!(
                "challenging channel {} lacks arbitration data",
                channel_id
            ))
        })?;
        if state.pending_block_height() > arbitration.launch_height + channel.lock_block as u64 {
            return Err(ChannelError::InvalidState(format!(
                "challenge window of channel {} has expired",
                channel_id
            )));
        }
        let side = require_party(&channel_id, &channel, &self.challenger_address)?;
        signers.require(&self.challenger_address)?;
        if self.challenger_address == arbitration.assert_address {
            return Err(ChannelError::Consistency(
                "asserting party cannot challenge its own close".to_string(),
            ));
        }
        self.bill.verify(&channel_id, &channel)?;
        if self.bill.bill_auto_number() <= arbitration.assert_bill_number {
            return Err(ChannelError::Consistency(format!(
                "challenge bill number {} is not newer than asserted {}",
                self.bill.bill_auto_number(),
                arbitration.assert_bill_number
            )));
        }
        check_bill_split(&self.bill, &channel)?;
        // Punishment: the entire locked total goes to the honest challenger.
        let total = channel.total_locked()?;
        let (left_final, right_final) = match side {
            ChannelSide::Left => (total, Amount::zero()),
            ChannelSide::Right => (Amount::zero(), total),
        };
        settle_channel(
            state,
            &channel_id,
            channel,
            &left_final,
            &right_final,
            None,
            None,
            ChannelStatus::ArbitrationClosed,
        )?;
        debug!(
            channel_id = %channel_id,
            challenger = %self.challenger_address,
            "challenge succeeded, channel closed by arbitration"
        );
        Ok(())
    }

    pub fn recover<S: ChainState>(&self, state: &mut S) {
        recover_settle_channel(
            state,
            &self.bill.channel_id(),
            ChannelStatus::ArbitrationClosed,
            ChannelStatus::Challenging,
        );
    }
}

/// After the challenge window expires unchallenged, anyone may finalize the
/// asserted split through the settlement core.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalArbitrationSettlement {
    pub channel_id: ChannelId,
}

impl FinalArbitrationSettlement {
    pub fn apply<S: ChainState>(&self, state: &mut S, _signers: &TxSigners) -> Result<()> {
        let channel = load_channel(state, &self.channel_id)?;
        require_status(&self.channel_id, &channel, ChannelStatus::Challenging)?;
        let arbitration = channel.arbitration.clone().ok_or_else(|| {
            ChannelError::InvalidState(format!(
                "challenging channel {} lacks arbitration data",
                self.channel_id
            ))
        })?;
        if state.pending_block_height() <= arbitration.launch_height + channel.lock_block as u64 {
            return Err(ChannelError::InvalidState(format!(
                "challenge window of channel {} is still open",
                self.channel_id
            )));
        }
        settle_channel(
            state,
            &self.channel_id,
            channel,
            &arbitration.assert_left,
            &arbitration.assert_right,
            None,
            None,
            ChannelStatus::ArbitrationClosed,
        )
    }

    pub fn recover<S: ChainState>(&self, state: &mut S) {
        recover_settle_channel(
            state,
            &self.channel_id,
            ChannelStatus::ArbitrationClosed,
            ChannelStatus::Challenging,
        );
    }
}

// ============================================================
// Atomic channel / on-chain exchange
// ============================================================

/// One-time-use binding between an off-chain channel transfer and an
/// on-chain balance transfer. The signatures of all required parties stand
/// in for proof that the off-chain leg executed; the stored chaswap record
/// is the sole replay defense.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelOnchainAtomicExchange {
    /// Half-hash checker of the off-chain leg's prove body.
    pub prove_body_checker: HalfHash,
    pub onchain_to: Address,
    pub onchain_amount: Amount,
    /// 2 or 3 ordered signers; the first is the on-chain funds source.
    pub must_signs: Vec<MustSign>,
}

impl ChannelOnchainAtomicExchange {
    fn write_unsigned(&self, buf: &mut Vec<u8>) {
        self.prove_body_checker.write(buf);
        self.onchain_to.write(buf);
        self.onchain_amount.write(buf);
        buf.push(self.must_signs.len() as u8);
        for must_sign in &self.must_signs {
            must_sign.address.write(buf);
        }
    }

    /// The digest all listed signers must sign.
    pub fn digest(&self) -> Hash256 {
        let mut buf = Vec::new();
        self.write_unsigned(&mut buf);
        hash256(&buf)
    }

    pub fn apply<S: ChainState>(&self, state: &mut S, _signers: &TxSigners) -> Result<()> {
        if !(2..=3).contains(&self.must_signs.len()) {
            return Err(ChannelError::InvalidParameter(format!(
                "exchange requires 2 or 3 signers, got {}",
                self.must_signs.len()
            )));
        }
        if self.onchain_amount.is_negative() {
            return Err(ChannelError::InvalidParameter(
                "exchange amount is negative".to_string(),
            ));
        }
        if state.chaswap(&self.prove_body_checker).is_some() {
            return Err(ChannelError::Consistency(format!(
                "exchange checker {} already consumed",
                self.prove_body_checker
            )));
        }
        let digest = self.digest();
        for (position, must_sign) in self.must_signs.iter().enumerate() {
            if must_sign.sign.address() != must_sign.address {
                return Err(ChannelError::Signature(format!(
                    "exchange sign at position {} does not hash to address {}",
                    position, must_sign.address
                )));
            }
            if !must_sign.sign.verify(&digest) {
                return Err(ChannelError::Signature(format!(
                    "exchange signature at position {} invalid",
                    position
                )));
            }
        }
        let source = self.must_signs[0].address;
        check_debit_coin(state, &source, &self.onchain_amount)?;

        debit_coin(state, &source, &self.onchain_amount)?;
        credit_coin(state, &self.onchain_to, &self.onchain_amount)?;
        state.chaswap_create(
            self.prove_body_checker,
            Chaswap {
                is_used: false,
                addresses: self.must_signs.iter().map(|m| m.address).collect(),
            },
        );
        debug!(checker = %self.prove_body_checker, "atomic exchange settled");
        Ok(())
    }

    pub fn recover<S: ChainState>(&self, state: &mut S) {
        state
            .chaswap(&self.prove_body_checker)
            .expect("recover: chaswap record created at apply time exists");
        state.chaswap_delete(&self.prove_body_checker);
        recover_debit_coin(state, &self.onchain_to, &self.onchain_amount);
        recover_credit_coin(state, &self.must_signs[0].address, &self.onchain_amount);
    }
}

impl WireFormat for ChannelOnchainAtomicExchange {
    fn write(&self, buf: &mut Vec<u8>) {
        self.prove_body_checker.write(buf);
        self.onchain_to.write(buf);
        self.onchain_amount.write(buf);
        buf.push(self.must_signs.len() as u8);
        for must_sign in &self.must_signs {
            must_sign.write(buf);
        }
    }

    fn read(reader: &mut Reader<'_>) -> std::result::Result<Self, CodecError> {
        let prove_body_checker = HalfHash::read(reader)?;
        let onchain_to = Address::read(reader)?;
        let onchain_amount = Amount::read(reader)?;
        let count = reader.read_u8()? as usize;
        let mut must_signs = Vec::with_capacity(count);
        for _ in 0..count {
            must_signs.push(MustSign::read(reader)?);
        }
        Ok(ChannelOnchainAtomicExchange {
            prove_body_checker,
            onchain_to,
            onchain_amount,
            must_signs,
        })
    }
}

// ============================================================
// Action dispatch
// ============================================================

/// Closed union of all channel actions; the block driver applies these in
/// transaction order and recovers them in strict reverse order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelAction {
    Open(OpenChannel),
    Close(CloseChannel),
    CloseBySetupAmount(CloseChannelBySetupAmount),
    CloseBySetupOnlyLeft(CloseChannelBySetupOnlyLeft),
    UnilateralCloseByNothing(UnilateralCloseByNothing),
    UnilateralCloseByBill(UnilateralCloseByBill),
    ChallengeBySubmitBill(ChallengeBySubmitBill),
    FinalArbitrationSettlement(FinalArbitrationSettlement),
    AtomicExchange(ChannelOnchainAtomicExchange),
}

impl ChannelAction {
    pub fn apply<S: ChainState>(&self, state: &mut S, signers: &TxSigners) -> Result<()> {
        match self {
            ChannelAction::Open(action) => action.apply(state, signers),
            ChannelAction::Close(action) => action.apply(state, signers),
            ChannelAction::CloseBySetupAmount(action) => action.apply(state, signers),
            ChannelAction::CloseBySetupOnlyLeft(action) => action.apply(state, signers),
            ChannelAction::UnilateralCloseByNothing(action) => action.apply(state, signers),
            ChannelAction::UnilateralCloseByBill(action) => action.apply(state, signers),
            ChannelAction::ChallengeBySubmitBill(action) => action.apply(state, signers),
            ChannelAction::FinalArbitrationSettlement(action) => action.apply(state, signers),
            ChannelAction::AtomicExchange(action) => action.apply(state, signers),
        }
    }

    pub fn recover<S: ChainState>(&self, state: &mut S) {
        match self {
            ChannelAction::Open(action) => action.recover(state),
            ChannelAction::Close(action) => action.recover(state),
            ChannelAction::CloseBySetupAmount(action) => action.recover(state),
            ChannelAction::CloseBySetupOnlyLeft(action) => action.recover(state),
            ChannelAction::UnilateralCloseByNothing(action) => action.recover(state),
            ChannelAction::UnilateralCloseByBill(action) => action.recover(state),
            ChannelAction::ChallengeBySubmitBill(action) => action.recover(state),
            ChannelAction::FinalArbitrationSettlement(action) => action.recover(state),
            ChannelAction::AtomicExchange(action) => action.recover(state),
        }
    }
}
