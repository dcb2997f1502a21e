//! Arbitrary-precision decimal amounts.
//!
//! An amount is `sign x mantissa x 10^unit` with a u8 exponent and a
//! big-integer mantissa of at most 127 bytes. The wire form is
//! `unit(1) + dist(signed 1) + mantissa(|dist| bytes, big-endian)`:
//! `dist`'s sign carries the amount's sign and `|dist|` the mantissa length.

use crate::codec::{CodecError, Reader, WireFormat};
use num_bigint::{BigInt, Sign};
use num_traits::{Pow, Signed, Zero};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::str::FromStr;
use thiserror::Error;

/// Upper bound of the mantissa byte length (`|dist|` is an i8).
pub const AMOUNT_MAX_MANTISSA_BYTES: usize = 127;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount mantissa length {0} exceeds {AMOUNT_MAX_MANTISSA_BYTES} bytes")]
    MantissaTooLong(usize),
    #[error("amount unit out of the representable range")]
    UnitOverflow,
    #[error("amount does not fit width {width}: needs {need} bytes")]
    WidthExceeded { need: usize, width: usize },
    #[error("malformed amount: {0}")]
    Malformed(String),
}

/// `10^exp` as a big integer.
pub fn ten_pow(exp: u32) -> BigInt {
    BigInt::from(10u32).pow(exp)
}

/// An arbitrary-precision decimal amount.
#[derive(Clone)]
pub struct Amount {
    unit: u8,
    mantissa: BigInt,
}

impl Amount {
    pub fn zero() -> Self {
        Amount {
            unit: 0,
            mantissa: BigInt::zero(),
        }
    }

    /// Construct from an integral mantissa and a power-of-ten exponent.
    pub fn new(mantissa: i128, unit: u8) -> Result<Self, AmountError> {
        Self::from_bigint(BigInt::from(mantissa), unit)
    }

    pub fn from_bigint(mantissa: BigInt, unit: u8) -> Result<Self, AmountError> {
        if mantissa.is_zero() {
            return Ok(Self::zero());
        }
        let len = mantissa.magnitude().to_bytes_be().len();
        if len > AMOUNT_MAX_MANTISSA_BYTES {
            return Err(AmountError::MantissaTooLong(len));
        }
        Ok(Amount { unit, mantissa })
    }

    /// Construct with trailing decimal zeros of the mantissa trimmed into
    /// the exponent. `unit` is taken as a wide integer so callers can detect
    /// exponent overflow instead of wrapping.
    pub fn from_bigint_trimmed(mut mantissa: BigInt, mut unit: i64) -> Result<Self, AmountError> {
        if mantissa.is_zero() {
            return Ok(Self::zero());
        }
        let ten = BigInt::from(10u32);
        while unit < u8::MAX as i64 && (&mantissa % &ten).is_zero() {
            mantissa /= &ten;
            unit += 1;
        }
        if unit < 0 || unit > u8::MAX as i64 {
            return Err(AmountError::UnitOverflow);
        }
        Self::from_bigint(mantissa, unit as u8)
    }

    pub fn unit(&self) -> u8 {
        self.unit
    }

    pub fn mantissa(&self) -> &BigInt {
        &self.mantissa
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.mantissa.is_positive()
    }

    pub fn is_negative(&self) -> bool {
        self.mantissa.is_negative()
    }

    /// The full integral value `mantissa x 10^unit`.
    pub fn value(&self) -> BigInt {
        &self.mantissa * ten_pow(self.unit as u32)
    }

    pub fn checked_add(&self, other: &Amount) -> Result<Amount, AmountError> {
        if self.is_zero() {
            return Ok(other.clone());
        }
        if other.is_zero() {
            return Ok(self.clone());
        }
        let unit = self.unit.min(other.unit);
        let left = &self.mantissa * ten_pow((self.unit - unit) as u32);
        let right = &other.mantissa * ten_pow((other.unit - unit) as u32);
        Self::from_bigint_trimmed(left + right, unit as i64)
    }

    pub fn checked_sub(&self, other: &Amount) -> Result<Amount, AmountError> {
        self.checked_add(&other.neg())
    }

    pub fn neg(&self) -> Amount {
        Amount {
            unit: self.unit,
            mantissa: -&self.mantissa,
        }
    }

    /// Wire length: `unit + dist + mantissa`.
    pub fn serialized_len(&self) -> usize {
        if self.is_zero() {
            return 2;
        }
        2 + self.mantissa.magnitude().to_bytes_be().len()
    }

    /// Whether the wire form fits in `width` bytes; used for the 6-byte
    /// channel columns, which bound worst-case interest-compounded growth.
    pub fn fits_width(&self, width: usize) -> bool {
        self.serialized_len() <= width
    }

    /// Write the wire form zero-padded to exactly `width` bytes.
    pub fn write_padded(&self, buf: &mut Vec<u8>, width: usize) -> Result<(), AmountError> {
        let need = self.serialized_len();
        if need > width {
            return Err(AmountError::WidthExceeded { need, width });
        }
        self.write(buf);
        buf.resize(buf.len() + (width - need), 0);
        Ok(())
    }

    /// Read a zero-padded fixed-width amount written by [`write_padded`].
    ///
    /// [`write_padded`]: Amount::write_padded
    pub fn read_padded(reader: &mut Reader<'_>, width: usize) -> Result<Self, CodecError> {
        let mut sub = Reader::new(reader.take(width)?);
        let amount = Amount::read(&mut sub)?;
        while !sub.is_empty() {
            if sub.read_u8()? != 0 {
                return Err(CodecError::Malformed(
                    "non-zero padding after amount".to_string(),
                ));
            }
        }
        Ok(amount)
    }

    /// Lossy compaction to a capped wire width: divide the mantissa by ten
    /// and bump the exponent until the amount fits, optionally rounding the
    /// dropped remainder upward.
    pub fn to_storage(&self, max_serialized_len: usize, round_up: bool) -> Result<Amount, AmountError> {
        if self.fits_width(max_serialized_len) {
            return Ok(self.clone());
        }
        let max_mantissa = max_serialized_len.saturating_sub(2);
        if max_mantissa == 0 {
            return Err(AmountError::WidthExceeded {
                need: self.serialized_len(),
                width: max_serialized_len,
            });
        }
        let negative = self.is_negative();
        let mut magnitude = BigInt::from_biguint(Sign::Plus, self.mantissa.magnitude().clone());
        let mut unit = self.unit as i64;
        let ten = BigInt::from(10u32);
        let mut dropped = false;
        while magnitude.magnitude().to_bytes_be().len() > max_mantissa {
            if !(&magnitude % &ten).is_zero() {
                dropped = true;
            }
            magnitude /= &ten;
            unit += 1;
            if unit > u8::MAX as i64 {
                return Err(AmountError::UnitOverflow);
            }
        }
        if round_up && dropped {
            magnitude += 1u32;
            // The increment may re-lengthen the mantissa (e.g. 0xff.. + 1).
            while magnitude.magnitude().to_bytes_be().len() > max_mantissa {
                magnitude /= &ten;
                unit += 1;
                if unit > u8::MAX as i64 {
                    return Err(AmountError::UnitOverflow);
                }
            }
        }
        if negative {
            magnitude = -magnitude;
        }
        Self::from_bigint_trimmed(magnitude, unit)
    }
}

impl Default for Amount {
    fn default() -> Self {
        Self::zero()
    }
}

impl PartialEq for Amount {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Amount {}

impl PartialOrd for Amount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Amount {
    fn cmp(&self, other: &Self) -> Ordering {
        // Compare at the smaller exponent to avoid materializing 10^unit
        // for both sides.
        let unit = self.unit.min(other.unit);
        let left = &self.mantissa * ten_pow((self.unit - unit) as u32);
        let right = &other.mantissa * ten_pow((other.unit - unit) as u32);
        left.cmp(&right)
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_zero() {
            return write!(f, "0:0");
        }
        write!(f, "{}:{}", self.mantissa, self.unit)
    }
}

impl std::fmt::Debug for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Amount({})", self)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (mantissa, unit) = s
            .split_once(':')
            .ok_or_else(|| AmountError::Malformed(format!("missing ':' in {:?}", s)))?;
        let mantissa = BigInt::from_str(mantissa)
            .map_err(|err| AmountError::Malformed(format!("bad mantissa: {}", err)))?;
        let unit = u8::from_str(unit)
            .map_err(|err| AmountError::Malformed(format!("bad unit: {}", err)))?;
        Self::from_bigint(mantissa, unit)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Amount::from_str(&s).map_err(D::Error::custom)
    }
}

impl WireFormat for Amount {
    fn write(&self, buf: &mut Vec<u8>) {
        if self.is_zero() {
            buf.extend_from_slice(&[0, 0]);
            return;
        }
        let bytes = self.mantissa.magnitude().to_bytes_be();
        debug_assert!(bytes.len() <= AMOUNT_MAX_MANTISSA_BYTES);
        let dist = if self.is_negative() {
            -(bytes.len() as i8)
        } else {
            bytes.len() as i8
        };
        buf.push(self.unit);
        buf.push(dist as u8);
        buf.extend_from_slice(&bytes);
    }

    fn read(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        let unit = reader.read_u8()?;
        let dist = reader.read_u8()? as i8;
        if dist == 0 {
            if unit != 0 {
                return Err(CodecError::Malformed(
                    "zero amount with non-zero unit".to_string(),
                ));
            }
            return Ok(Amount::zero());
        }
        let len = dist.unsigned_abs() as usize;
        let bytes = reader.take(len)?;
        if bytes[0] == 0 {
            return Err(CodecError::Malformed(
                "amount mantissa has leading zero byte".to_string(),
            ));
        }
        let sign = if dist < 0 { Sign::Minus } else { Sign::Plus };
        let mantissa = BigInt::from_bytes_be(sign, bytes);
        Amount::from_bigint(mantissa, unit)
            .map_err(|err| CodecError::Malformed(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amount(mantissa: i128, unit: u8) -> Amount {
        Amount::new(mantissa, unit).unwrap()
    }

    #[test]
    fn test_value_equality_across_representations() {
        assert_eq!(amount(1000, 0), amount(1, 3));
        assert_eq!(amount(10, 247), amount(1, 248));
        assert!(amount(2, 3) > amount(19, 2));
        assert!(amount(-1, 5) < Amount::zero());
    }

    #[test]
    fn test_add_aligns_exponents_and_trims() {
        let sum = amount(1, 3).checked_add(&amount(5, 1)).unwrap();
        // 1000 + 50 = 1050 = 105 * 10^1
        assert_eq!(sum.mantissa(), &BigInt::from(105));
        assert_eq!(sum.unit(), 1);

        let sum = amount(5, 2).checked_add(&amount(5, 2)).unwrap();
        // 500 + 500 = 1000 = 1 * 10^3
        assert_eq!(sum.mantissa(), &BigInt::from(1));
        assert_eq!(sum.unit(), 3);
    }

    #[test]
    fn test_sub_can_go_negative() {
        let diff = amount(1, 0).checked_sub(&amount(3, 0)).unwrap();
        assert!(diff.is_negative());
        assert_eq!(diff, amount(-2, 0));
    }

    #[test]
    fn test_wire_round_trip() {
        for amt in [
            Amount::zero(),
            amount(1, 248),
            amount(1000, 3),
            amount(-77, 12),
        ] {
            let bytes = amt.to_vec();
            let back = Amount::from_slice(&bytes).unwrap();
            assert_eq!(amt, back);
        }
    }

    #[test]
    fn test_wire_sign_in_dist() {
        let bytes = amount(-1, 7).to_vec();
        assert_eq!(bytes, vec![7, 0xff, 1]); // dist = -1
    }

    #[test]
    fn test_padded_width() {
        let amt = amount(1000, 248); // 2-byte mantissa
        assert!(amt.fits_width(6));
        let mut buf = Vec::new();
        amt.write_padded(&mut buf, 6).unwrap();
        assert_eq!(buf.len(), 6);
        let mut reader = Reader::new(&buf);
        assert_eq!(Amount::read_padded(&mut reader, 6).unwrap(), amt);

        let wide = Amount::new(1 << 40, 0).unwrap(); // 6-byte mantissa
        assert!(!wide.fits_width(6));
        assert_eq!(
            wide.write_padded(&mut Vec::new(), 6),
            Err(AmountError::WidthExceeded { need: 8, width: 6 })
        );
    }

    #[test]
    fn test_storage_compaction() {
        // 0x0101 = 257: cannot be shortened losslessly.
        let amt = amount(257, 0);
        let down = amt.to_storage(3, false).unwrap();
        assert_eq!(down, amount(25, 1));
        let up = amt.to_storage(3, true).unwrap();
        assert_eq!(up, amount(26, 1));
        // Already-fitting values pass through untouched.
        assert_eq!(amount(9, 9).to_storage(3, true).unwrap(), amount(9, 9));
    }

    #[test]
    fn test_serde_string_form() {
        let amt = amount(1234, 56);
        let json = serde_json::to_string(&amt).unwrap();
        assert_eq!(json, "\"1234:56\"");
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(amt, back);
    }
}
