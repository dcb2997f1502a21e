//! Compound interest on locked channel funds, applied at settlement time.
//!
//! Two eras, selected by the channel's open height. The early era pays
//! 1/10000 per 2500-block step; after height 200000 a step is 10000 blocks
//! at 10/10000.

use canal_types::amount::ten_pow;
use canal_types::{Amount, AmountError};
use num_bigint::BigInt;
use num_traits::Pow;

/// Open heights at or below this use the early (low-rate, short-epoch)
/// formula.
pub const INTEREST_ERA_HEIGHT: u64 = 200_000;

const EARLY_EPOCH_BLOCKS: u64 = 2_500;
const EARLY_RATE_OF_10000: u32 = 1;
const LATE_EPOCH_BLOCKS: u64 = 10_000;
const LATE_RATE_OF_10000: u32 = 10;

/// Exponent room a principal must have for one 10^-8-granular compounding;
/// amounts with a smaller unit are defined to grow by nothing.
const COMPOUND_BASE_UNITS: u8 = 8;

/// Interest-adjusted settlement amounts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterestOutcome {
    pub left: Amount,
    pub right: Amount,
    /// False iff zero compounding steps elapsed.
    pub applied: bool,
}

/// Accrue compound interest over `open_height..close_height` on the two
/// settlement amounts. Pure; numeric range errors must fail the settlement.
pub fn accrue_interest(
    open_height: u64,
    close_height: u64,
    left: &Amount,
    right: &Amount,
) -> Result<InterestOutcome, AmountError> {
    let elapsed = close_height.saturating_sub(open_height);
    let (epoch, rate) = if open_height <= INTEREST_ERA_HEIGHT {
        (EARLY_EPOCH_BLOCKS, EARLY_RATE_OF_10000)
    } else {
        (LATE_EPOCH_BLOCKS, LATE_RATE_OF_10000)
    };
    let steps = elapsed / epoch;
    if steps == 0 {
        return Ok(InterestOutcome {
            left: left.clone(),
            right: right.clone(),
            applied: false,
        });
    }
    let steps = u32::try_from(steps).map_err(|_| AmountError::UnitOverflow)?;
    Ok(InterestOutcome {
        left: compound_side(left, steps, rate)?,
        right: compound_side(right, steps, rate)?,
        applied: true,
    })
}

/// One side's payout: `floor(mantissa x 10^8 x (10000+rate)^steps /
/// 10000^steps)` at exponent `unit - 8`, trailing decimal zeros trimmed
/// back into the exponent.
fn compound_side(amount: &Amount, steps: u32, rate: u32) -> Result<Amount, AmountError> {
    if amount.is_zero() || amount.unit() < COMPOUND_BASE_UNITS {
        return Ok(amount.clone());
    }
    let growth = BigInt::from(10_000 + rate).pow(steps);
    let divisor = BigInt::from(10_000u32).pow(steps);
    let scaled = amount.mantissa() * ten_pow(COMPOUND_BASE_UNITS as u32) * growth;
    Amount::from_bigint_trimmed(
        scaled / divisor,
        amount.unit() as i64 - COMPOUND_BASE_UNITS as i64,
    )
}
