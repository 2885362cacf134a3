//! Shared decimal payload backing [`Amount`](crate::Amount) handles.
//!
//! A [`Quantity`] stores an arbitrary precision signed mantissa together
//! with the number of decimal digits after the implied point, so the value
//! it represents is `mantissa * 10^(-prec)`. Payloads are shared between
//! amount handles through `Rc`; mutation always happens on an exclusively
//! owned payload (see the copy-on-write helpers in the `amount` module).

use std::cell::Cell;

use bitflags::bitflags;
use num_bigint::{BigInt, Sign};
use num_traits::{One, Signed, Zero};
use once_cell::sync::Lazy;

use crate::amount::AmountError;

/// Precision type for tracking decimal places.
pub type Precision = u16;

/// Exclusive upper bound on payload precision.
pub const MAX_PRECISION: Precision = 256;

/// Number of extra digits of precision to extend calculations by, so that
/// chained multiplications and divisions do not lose information before the
/// final display rounding.
pub const EXTEND_BY_DIGITS: Precision = 6;

bitflags! {
    /// Storage flags carried by a payload.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct QuantityFlags: u16 {
        /// The payload was allocated inside a deserialization arena and its
        /// storage is released with the arena, not individually.
        const BULK_ALLOC = 0x0001;
    }
}

static POWERS_OF_TEN: Lazy<Vec<BigInt>> = Lazy::new(|| {
    let mut table = Vec::with_capacity(33);
    let mut value = BigInt::one();
    for _ in 0..=32 {
        table.push(value.clone());
        value = &value * 10u32;
    }
    table
});

/// `10^exp` with a fast path for the small exponents arithmetic hits
/// constantly.
pub(crate) fn pow10(exp: u32) -> BigInt {
    match POWERS_OF_TEN.get(exp as usize) {
        Some(value) => value.clone(),
        None => BigInt::from(10).pow(exp),
    }
}

/// The reference-counted mantissa + precision record underlying one or more
/// amount handles.
#[derive(Debug)]
pub struct Quantity {
    pub(crate) mantissa: BigInt,
    pub(crate) prec: Precision,
    pub(crate) flags: QuantityFlags,
    pub(crate) index: Cell<u32>,
}

impl Quantity {
    /// Create a payload from a raw mantissa and decimal precision.
    pub fn new(mantissa: BigInt, prec: Precision) -> Self {
        debug_assert!(prec < MAX_PRECISION);
        Self { mantissa, prec, flags: QuantityFlags::empty(), index: Cell::new(0) }
    }

    pub(crate) fn with_flags(mantissa: BigInt, prec: Precision, flags: QuantityFlags) -> Self {
        Self { mantissa, prec, flags, index: Cell::new(0) }
    }

    /// The payload for the integer one.
    pub fn one() -> Self {
        Self::new(BigInt::one(), 0)
    }

    /// The signed mantissa.
    pub fn mantissa(&self) -> &BigInt {
        &self.mantissa
    }

    /// Number of decimal digits after the implied point.
    pub fn precision(&self) -> Precision {
        self.prec
    }

    /// Whether the payload lives inside a deserialization arena.
    pub fn is_bulk_alloc(&self) -> bool {
        self.flags.contains(QuantityFlags::BULK_ALLOC)
    }

    /// True when the mantissa is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.mantissa.is_zero()
    }

    /// Sign of the mantissa: -1, 0 or 1.
    pub fn sign(&self) -> i32 {
        match self.mantissa.sign() {
            Sign::Minus => -1,
            Sign::NoSign => 0,
            Sign::Plus => 1,
        }
    }

    pub(crate) fn serial_index(&self) -> u32 {
        self.index.get()
    }

    pub(crate) fn set_serial_index(&self, index: u32) {
        self.index.set(index);
    }

    /// Change the encoding precision without changing the represented value
    /// when growing; shrinking truncates (chops) low digits.
    pub(crate) fn rescale(&mut self, prec: Precision) -> Result<(), AmountError> {
        if prec >= MAX_PRECISION {
            return Err(AmountError::PrecisionOverflow(prec));
        }
        if prec == self.prec {
            return Ok(());
        }
        if prec > self.prec {
            self.mantissa *= pow10(u32::from(prec - self.prec));
        } else {
            self.mantissa = &self.mantissa / pow10(u32::from(self.prec - prec));
        }
        self.prec = prec;
        Ok(())
    }

    /// Round half-away-from-zero down to `prec` digits. Only meaningful when
    /// `prec` is strictly below the current precision.
    pub(crate) fn round(&mut self, prec: Precision) {
        debug_assert!(prec < self.prec);

        let divisor = pow10(u32::from(self.prec - prec));
        let mut quotient = &self.mantissa / &divisor;
        let remainder = &self.mantissa % &divisor;
        let half = &divisor / 2u32;

        // The tie |remainder| == half rounds away from zero.
        if !remainder.is_zero() && remainder.abs() >= half {
            if remainder.is_negative() {
                quotient -= BigInt::one();
            } else {
                quotient += BigInt::one();
            }
        }

        self.mantissa = quotient;
        self.prec = prec;
    }

    pub(crate) fn negate(&mut self) {
        self.mantissa = -&self.mantissa;
    }
}

impl Clone for Quantity {
    /// Cloning upgrades a shared payload to exclusive ownership: the copy
    /// starts with cleared storage flags and no serialization ordinal.
    fn clone(&self) -> Self {
        Self {
            mantissa: self.mantissa.clone(),
            prec: self.prec,
            flags: QuantityFlags::empty(),
            index: Cell::new(0),
        }
    }
}
