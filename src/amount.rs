//! Amount: a commodity-tagged exact decimal value.
//!
//! An [`Amount`] pairs a shared [`Quantity`] payload with a reference to the
//! commodity it is denominated in. The distinguished *empty* amount (no
//! payload, no commodity) is the additive identity. All arithmetic is exact:
//! precision is tracked through every operation and only reduced by explicit
//! rounding or the guard-digit cap applied after multiplication and
//! division.
//!
//! Payloads are shared between handles; every mutating operation first
//! upgrades its payload to exclusive ownership, so no handle ever observes
//! a change made through another.

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::commodity::{null_commodity, CommodityFlags, CommodityPool, CommodityRef, PriceTime};
use crate::formatting;
use crate::quantity::{pow10, Precision, Quantity, EXTEND_BY_DIGITS, MAX_PRECISION};

/// Errors that can occur during amount operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    /// Additive operation between two non-empty amounts with distinct,
    /// non-null commodities.
    #[error("cannot combine amounts with different commodities")]
    CommodityMismatch,
    /// The divisor is empty or has a zero mantissa.
    #[error("divide by zero")]
    DivideByZero,
    /// An opening `"` in a parsed symbol without a closing `"`.
    #[error("quoted commodity symbol lacks closing quote")]
    UnterminatedSymbol,
    /// A precision at or beyond the supported maximum of 256.
    #[error("precision {0} exceeds the supported maximum")]
    PrecisionOverflow(Precision),
    /// The input is not a recognizable amount literal.
    #[error("cannot parse amount from string: {0}")]
    ParseError(String),
    /// A numeric conversion lost information or received a non-finite
    /// value.
    #[error("invalid numeric conversion: {0}")]
    InvalidConversion(String),
}

/// Result type for amount operations.
pub type AmountResult<T> = Result<T, AmountError>;

/// A commodity-tagged exact decimal value.
///
/// Cloning an amount is cheap: the payload is shared and only copied when
/// one of the handles mutates.
#[derive(Clone)]
pub struct Amount {
    pub(crate) quantity: Option<Rc<Quantity>>,
    pub(crate) commodity: Option<CommodityRef>,
}

/// The process-shared payload for the integer one, backing every boolean
/// `true` amount.
fn true_quantity() -> Rc<Quantity> {
    thread_local! {
        static TRUE_QUANTITY: Rc<Quantity> = Rc::new(Quantity::one());
    }
    TRUE_QUANTITY.with(Rc::clone)
}

impl Amount {
    /// The empty amount: no payload, no commodity. Behaves as zero in
    /// additive positions.
    pub fn null() -> Self {
        Self { quantity: None, commodity: None }
    }

    /// Wrap a raw payload, attaching the unit-less commodity.
    pub fn from_quantity(quantity: Quantity) -> Self {
        Self { quantity: Some(Rc::new(quantity)), commodity: Some(null_commodity()) }
    }

    /// An integer amount with the unit-less commodity. Zero yields the
    /// empty amount.
    pub fn from_i64(value: i64) -> Self {
        if value == 0 {
            return Self::null();
        }
        Self::from_quantity(Quantity::new(BigInt::from(value), 0))
    }

    /// An unsigned integer amount with the unit-less commodity. Zero yields
    /// the empty amount.
    pub fn from_u64(value: u64) -> Self {
        if value == 0 {
            return Self::null();
        }
        Self::from_quantity(Quantity::new(BigInt::from(value), 0))
    }

    /// `true` becomes the shared unit payload with the unit-less commodity;
    /// `false` becomes the empty amount.
    pub fn from_bool(value: bool) -> Self {
        if value {
            Self { quantity: Some(true_quantity()), commodity: Some(null_commodity()) }
        } else {
            Self::null()
        }
    }

    /// An exact decimal amount with the unit-less commodity. Zero yields
    /// the empty amount.
    pub fn from_decimal(value: Decimal) -> Self {
        if value.is_zero() {
            return Self::null();
        }
        let mantissa = BigInt::from(value.mantissa());
        Self::from_quantity(Quantity::new(mantissa, value.scale() as Precision))
    }

    /// Build an amount from a double, keeping the decimal digits the double
    /// round-trips to. Non-finite input is rejected.
    pub fn from_f64(value: f64) -> AmountResult<Self> {
        if !value.is_finite() {
            return Err(AmountError::InvalidConversion(format!(
                "cannot build an amount from non-finite value {value}"
            )));
        }
        let decimal = Decimal::try_from(value)
            .map_err(|err| AmountError::InvalidConversion(err.to_string()))?;
        Ok(Self::from_decimal(decimal))
    }

    /// Whether this is the empty amount.
    pub fn is_null(&self) -> bool {
        self.quantity.is_none()
    }

    /// The commodity this amount is denominated in, if any.
    pub fn commodity(&self) -> Option<&CommodityRef> {
        self.commodity.as_ref()
    }

    /// Replace the commodity. Has no effect on the empty amount, which by
    /// definition carries none.
    pub fn set_commodity(&mut self, commodity: CommodityRef) {
        if self.quantity.is_some() {
            self.commodity = Some(commodity);
        }
    }

    /// The underlying payload, if any.
    pub fn quantity(&self) -> Option<&Quantity> {
        self.quantity.as_deref()
    }

    /// The payload's signed mantissa, if any.
    pub fn mantissa(&self) -> Option<&BigInt> {
        self.quantity.as_deref().map(Quantity::mantissa)
    }

    /// The payload's decimal precision; zero for the empty amount.
    pub fn precision(&self) -> Precision {
        self.quantity.as_deref().map_or(0, Quantity::precision)
    }

    /// The commodity's display precision; zero for the empty amount.
    pub fn display_precision(&self) -> Precision {
        self.commodity.as_deref().map_or(0, |c| c.precision())
    }

    /// Sign of the value: -1, 0 or 1. The empty amount has sign 0.
    pub fn sign(&self) -> i32 {
        self.quantity.as_deref().map_or(0, Quantity::sign)
    }

    /// True when the value is exactly zero (the empty amount included).
    pub fn is_realzero(&self) -> bool {
        self.quantity.as_deref().map_or(true, Quantity::is_zero)
    }

    /// True when the value is zero once truncated (not rounded) to the
    /// commodity's display precision. `0.0001` of a two-place commodity is
    /// zero by this test.
    pub fn is_zero(&self) -> bool {
        let Some(q) = self.quantity.as_deref() else {
            return true;
        };
        let display = self.display_precision();
        if q.precision() <= display {
            q.is_zero()
        } else {
            let truncated = q.mantissa() / pow10(u32::from(q.precision() - display));
            truncated == BigInt::from(0)
        }
    }

    /// The truth test: non-zero at display precision.
    pub fn is_nonzero(&self) -> bool {
        !self.is_zero()
    }

    /// Whether two handles share one payload.
    pub fn shares_quantity_with(&self, other: &Amount) -> bool {
        match (&self.quantity, &other.quantity) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Debugging contract: payload presence and commodity presence agree,
    /// and any payload is still referenced.
    pub fn valid(&self) -> bool {
        match (&self.quantity, &self.commodity) {
            (Some(q), Some(_)) => Rc::strong_count(q) >= 1,
            (None, None) => true,
            _ => false,
        }
    }

    /// The value as an `i64`, when it is integral and in range. The empty
    /// amount converts to zero.
    pub fn to_i64(&self) -> AmountResult<i64> {
        let Some(q) = self.quantity.as_deref() else {
            return Ok(0);
        };
        let integral = if q.precision() > 0 {
            let divisor = pow10(u32::from(q.precision()));
            if q.mantissa() % &divisor != BigInt::from(0) {
                return Err(AmountError::InvalidConversion(
                    "amount is not an integer".to_string(),
                ));
            }
            q.mantissa() / &divisor
        } else {
            q.mantissa().clone()
        };
        integral.to_i64().ok_or_else(|| {
            AmountError::InvalidConversion("amount does not fit in an i64".to_string())
        })
    }

    /// The value as an `f64`; fine or very large values lose precision.
    pub fn to_f64(&self) -> f64 {
        let Some(q) = self.quantity.as_deref() else {
            return 0.0;
        };
        q.mantissa().to_f64().unwrap_or(f64::NAN) / 10f64.powi(i32::from(q.precision()))
    }

    /// The exact decimal value as a plain string, ignoring commodity and
    /// display styles. The empty amount renders as `0`.
    pub fn quantity_string(&self) -> String {
        match self.quantity.as_deref() {
            None => "0".to_string(),
            Some(q) => formatting::decimal_string(q.mantissa(), q.precision()),
        }
    }

    /// Add `other` in place. The empty amount adopts the right operand,
    /// sharing its payload; otherwise commodities must agree (the unit-less
    /// commodity matches only itself) and the coarser side is rescaled up.
    pub fn add_amount(&mut self, other: &Amount) -> AmountResult<()> {
        let Some(other_q) = other.quantity.as_ref() else {
            return Ok(());
        };
        if self.quantity.is_none() {
            self.quantity = Some(Rc::clone(other_q));
            self.commodity = other.commodity.clone();
            return Ok(());
        }
        if !self.commodity_matches(other) {
            return Err(AmountError::CommodityMismatch);
        }
        if let Some(rc) = self.quantity.as_mut() {
            let q = Rc::make_mut(rc);
            if q.prec < other_q.prec {
                q.rescale(other_q.prec)?;
                q.mantissa += &other_q.mantissa;
            } else if q.prec == other_q.prec {
                q.mantissa += &other_q.mantissa;
            } else {
                q.mantissa += &other_q.mantissa * pow10(u32::from(q.prec - other_q.prec));
            }
        }
        Ok(())
    }

    /// Subtract `other` in place. Subtracting from the empty amount yields
    /// the negation of the right operand on a fresh payload.
    pub fn sub_amount(&mut self, other: &Amount) -> AmountResult<()> {
        let Some(other_q) = other.quantity.as_ref() else {
            return Ok(());
        };
        if self.quantity.is_none() {
            let mut negated = Quantity::clone(other_q);
            negated.negate();
            self.quantity = Some(Rc::new(negated));
            self.commodity = other.commodity.clone();
            return Ok(());
        }
        if !self.commodity_matches(other) {
            return Err(AmountError::CommodityMismatch);
        }
        if let Some(rc) = self.quantity.as_mut() {
            let q = Rc::make_mut(rc);
            if q.prec < other_q.prec {
                q.rescale(other_q.prec)?;
                q.mantissa -= &other_q.mantissa;
            } else if q.prec == other_q.prec {
                q.mantissa -= &other_q.mantissa;
            } else {
                q.mantissa -= &other_q.mantissa * pow10(u32::from(q.prec - other_q.prec));
            }
        }
        Ok(())
    }

    /// Multiply by `other` in place. No commodity agreement is required
    /// (price conversion multiplies unlike commodities); the left operand's
    /// commodity is kept. Result precision is the sum of the operand
    /// precisions, capped at the display precision plus six guard digits.
    pub fn mul_amount(&mut self, other: &Amount) -> AmountResult<()> {
        if self.quantity.is_none() {
            return Ok(());
        }
        let Some(other_q) = other.quantity.as_ref() else {
            // The empty amount is zero in multiplicative position.
            self.quantity = None;
            self.commodity = None;
            return Ok(());
        };
        let cap = self.display_precision().saturating_add(EXTEND_BY_DIGITS);
        if let Some(rc) = self.quantity.as_ref() {
            let result_prec = rc.prec.saturating_add(other_q.prec).min(cap);
            if result_prec >= MAX_PRECISION {
                return Err(AmountError::PrecisionOverflow(result_prec));
            }
        }
        if let Some(rc) = self.quantity.as_mut() {
            let q = Rc::make_mut(rc);
            q.mantissa = &q.mantissa * &other_q.mantissa;
            q.prec += other_q.prec;
            if q.prec > cap {
                q.round(cap);
            }
        }
        Ok(())
    }

    /// Divide by `other` in place. The dividend is pre-scaled by six guard
    /// digits beyond the divisor's precision, so the truncating integer
    /// divide keeps a six-digit fractional tail; the same display cap as
    /// multiplication applies afterwards.
    pub fn div_amount(&mut self, other: &Amount) -> AmountResult<()> {
        let Some(other_q) = other.quantity.as_ref() else {
            return Err(AmountError::DivideByZero);
        };
        if other_q.is_zero() {
            return Err(AmountError::DivideByZero);
        }
        if self.quantity.is_none() {
            return Ok(());
        }
        let cap = self.display_precision().saturating_add(EXTEND_BY_DIGITS);
        if let Some(rc) = self.quantity.as_ref() {
            let result_prec = rc.prec.saturating_add(EXTEND_BY_DIGITS).min(cap);
            if result_prec >= MAX_PRECISION {
                return Err(AmountError::PrecisionOverflow(result_prec));
            }
        }
        if let Some(rc) = self.quantity.as_mut() {
            let q = Rc::make_mut(rc);
            let scaled = &q.mantissa * pow10(u32::from(other_q.prec) + u32::from(EXTEND_BY_DIGITS));
            q.mantissa = scaled / &other_q.mantissa;
            q.prec += EXTEND_BY_DIGITS;
            if q.prec > cap {
                q.round(cap);
            }
        }
        Ok(())
    }

    /// Negate in place.
    pub fn in_place_negate(&mut self) {
        if let Some(rc) = self.quantity.as_mut() {
            Rc::make_mut(rc).negate();
        }
    }

    /// The negated value.
    pub fn negated(&self) -> Self {
        let mut result = self.clone();
        result.in_place_negate();
        result
    }

    /// The absolute value.
    pub fn abs(&self) -> Self {
        if self.sign() < 0 {
            self.negated()
        } else {
            self.clone()
        }
    }

    /// Round half-away-from-zero to `prec` decimal digits. Unchanged when
    /// the payload is already at or below that precision.
    pub fn round(&self, prec: Precision) -> Self {
        match self.quantity.as_ref() {
            Some(rc) if rc.prec > prec => {
                let mut rounded = Quantity::clone(rc);
                rounded.round(prec);
                Self { quantity: Some(Rc::new(rounded)), commodity: self.commodity.clone() }
            }
            _ => self.clone(),
        }
    }

    /// Market valuation at `moment` (`None` for the latest price). Amounts
    /// in a `NOMARKET` commodity, and amounts with no usable price, come
    /// back unchanged; otherwise the price times this amount, rounded to
    /// the commodity's display precision.
    pub fn value_at(
        &self,
        moment: Option<PriceTime>,
        pool: &mut CommodityPool,
    ) -> AmountResult<Amount> {
        let Some(commodity) = self.commodity.clone() else {
            return Ok(self.clone());
        };
        if self.quantity.is_none() || commodity.has_flags(CommodityFlags::NOMARKET) {
            return Ok(self.clone());
        }
        let mut price = pool.price_at(&commodity, moment);
        if price.is_zero() {
            return Ok(self.clone());
        }
        price.mul_amount(self)?;
        Ok(price.round(commodity.precision()))
    }

    /// Whether an additive operation with `other` is allowed: equal
    /// commodity references only. Both sides are non-empty when called.
    fn commodity_matches(&self, other: &Amount) -> bool {
        match (&self.commodity, &other.commodity) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Whether `self` and `other` live in comparable commodities: the same
    /// commodity, or either side unit-less or empty.
    fn comparable_with(&self, other: &Amount) -> bool {
        match (&self.commodity, &other.commodity) {
            (Some(a), Some(b)) => {
                let null = null_commodity();
                Rc::ptr_eq(a, b) || Rc::ptr_eq(a, &null) || Rc::ptr_eq(b, &null)
            }
            _ => true,
        }
    }

    /// Numeric ordering at the common higher precision; the empty amount
    /// counts as zero.
    fn cmp_values(&self, other: &Amount) -> Ordering {
        match (self.quantity.as_deref(), other.quantity.as_deref()) {
            (None, None) => Ordering::Equal,
            (None, Some(q)) => 0.cmp(&q.sign()),
            (Some(q), None) => q.sign().cmp(&0),
            (Some(a), Some(b)) => {
                if a.prec == b.prec {
                    a.mantissa().cmp(b.mantissa())
                } else if a.prec < b.prec {
                    let scaled = a.mantissa() * pow10(u32::from(b.prec - a.prec));
                    scaled.cmp(b.mantissa())
                } else {
                    let scaled = b.mantissa() * pow10(u32::from(a.prec - b.prec));
                    a.mantissa().cmp(&scaled)
                }
            }
        }
    }

    /// Re-home the payload onto an independent allocation if it currently
    /// lives inside `arena`.
    pub(crate) fn promote_from(&mut self, arena: &crate::binary::QuantityArena) {
        if let Some(rc) = self.quantity.as_mut() {
            if rc.is_bulk_alloc() && arena.owns(rc) {
                *rc = Rc::new(Quantity::clone(rc));
            }
        }
    }
}

impl Default for Amount {
    fn default() -> Self {
        Self::null()
    }
}

impl From<i32> for Amount {
    fn from(value: i32) -> Self {
        Self::from_i64(i64::from(value))
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Self::from_i64(value)
    }
}

impl From<u32> for Amount {
    fn from(value: u32) -> Self {
        Self::from_i64(i64::from(value))
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Self::from_decimal(value)
    }
}

impl PartialEq for Amount {
    /// Amounts in distinct non-null commodities are incomparable: every
    /// ordering predicate, equality included, is false.
    fn eq(&self, other: &Self) -> bool {
        self.comparable_with(other) && self.cmp_values(other) == Ordering::Equal
    }
}

impl PartialOrd for Amount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.comparable_with(other) {
            Some(self.cmp_values(other))
        } else {
            None
        }
    }
}

impl PartialEq<i64> for Amount {
    fn eq(&self, other: &i64) -> bool {
        if *other == 0 {
            self.sign() == 0
        } else {
            *self == Amount::from_i64(*other)
        }
    }
}

impl PartialOrd<i64> for Amount {
    fn partial_cmp(&self, other: &i64) -> Option<Ordering> {
        if *other == 0 {
            Some(self.sign().cmp(&0))
        } else {
            self.partial_cmp(&Amount::from_i64(*other))
        }
    }
}

impl fmt::Display for Amount {
    /// Render per the commodity's display style. The whole amount is handed
    /// to the formatter as one unit, so caller width and fill apply to the
    /// full string rather than its first fragment. The empty amount renders
    /// as nothing.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.quantity.as_deref(), self.commodity.as_deref()) {
            (Some(quantity), Some(commodity)) => {
                f.pad(&formatting::render_amount(quantity, commodity))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return write!(f, "AMOUNT(<null>)");
        }
        write!(f, "AMOUNT({self})")?;
        if f.alternate() {
            write!(f, " [prec:{}", self.precision())?;
            if let Some(commodity) = self.commodity.as_deref() {
                write!(f, ", comm:{}", commodity.symbol())?;
            }
            if let Some(mantissa) = self.mantissa() {
                write!(f, ", raw:{mantissa}")?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

// Fallible operators in the same shape as the in-place methods. The
// assigning operator traits are deliberately not implemented: they cannot
// report a commodity mismatch.

impl std::ops::Add for Amount {
    type Output = AmountResult<Amount>;

    fn add(self, other: Amount) -> Self::Output {
        let mut result = self;
        result.add_amount(&other)?;
        Ok(result)
    }
}

impl std::ops::Add<&Amount> for Amount {
    type Output = AmountResult<Amount>;

    fn add(self, other: &Amount) -> Self::Output {
        let mut result = self;
        result.add_amount(other)?;
        Ok(result)
    }
}

impl std::ops::Add<Amount> for &Amount {
    type Output = AmountResult<Amount>;

    fn add(self, other: Amount) -> Self::Output {
        let mut result = self.clone();
        result.add_amount(&other)?;
        Ok(result)
    }
}

impl std::ops::Add<&Amount> for &Amount {
    type Output = AmountResult<Amount>;

    fn add(self, other: &Amount) -> Self::Output {
        let mut result = self.clone();
        result.add_amount(other)?;
        Ok(result)
    }
}

impl std::ops::Sub for Amount {
    type Output = AmountResult<Amount>;

    fn sub(self, other: Amount) -> Self::Output {
        let mut result = self;
        result.sub_amount(&other)?;
        Ok(result)
    }
}

impl std::ops::Sub<&Amount> for Amount {
    type Output = AmountResult<Amount>;

    fn sub(self, other: &Amount) -> Self::Output {
        let mut result = self;
        result.sub_amount(other)?;
        Ok(result)
    }
}

impl std::ops::Sub<Amount> for &Amount {
    type Output = AmountResult<Amount>;

    fn sub(self, other: Amount) -> Self::Output {
        let mut result = self.clone();
        result.sub_amount(&other)?;
        Ok(result)
    }
}

impl std::ops::Sub<&Amount> for &Amount {
    type Output = AmountResult<Amount>;

    fn sub(self, other: &Amount) -> Self::Output {
        let mut result = self.clone();
        result.sub_amount(other)?;
        Ok(result)
    }
}

impl std::ops::Mul for Amount {
    type Output = AmountResult<Amount>;

    fn mul(self, other: Amount) -> Self::Output {
        let mut result = self;
        result.mul_amount(&other)?;
        Ok(result)
    }
}

impl std::ops::Mul<&Amount> for Amount {
    type Output = AmountResult<Amount>;

    fn mul(self, other: &Amount) -> Self::Output {
        let mut result = self;
        result.mul_amount(other)?;
        Ok(result)
    }
}

impl std::ops::Mul<Amount> for &Amount {
    type Output = AmountResult<Amount>;

    fn mul(self, other: Amount) -> Self::Output {
        let mut result = self.clone();
        result.mul_amount(&other)?;
        Ok(result)
    }
}

impl std::ops::Mul<&Amount> for &Amount {
    type Output = AmountResult<Amount>;

    fn mul(self, other: &Amount) -> Self::Output {
        let mut result = self.clone();
        result.mul_amount(other)?;
        Ok(result)
    }
}

impl std::ops::Div for Amount {
    type Output = AmountResult<Amount>;

    fn div(self, other: Amount) -> Self::Output {
        let mut result = self;
        result.div_amount(&other)?;
        Ok(result)
    }
}

impl std::ops::Div<&Amount> for Amount {
    type Output = AmountResult<Amount>;

    fn div(self, other: &Amount) -> Self::Output {
        let mut result = self;
        result.div_amount(other)?;
        Ok(result)
    }
}

impl std::ops::Div<Amount> for &Amount {
    type Output = AmountResult<Amount>;

    fn div(self, other: Amount) -> Self::Output {
        let mut result = self.clone();
        result.div_amount(&other)?;
        Ok(result)
    }
}

impl std::ops::Div<&Amount> for &Amount {
    type Output = AmountResult<Amount>;

    fn div(self, other: &Amount) -> Self::Output {
        let mut result = self.clone();
        result.div_amount(other)?;
        Ok(result)
    }
}

impl std::ops::Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Self::Output {
        self.negated()
    }
}

impl std::ops::Neg for &Amount {
    type Output = Amount;

    fn neg(self) -> Self::Output {
        self.negated()
    }
}

// ---------------------------------------------------------------------------
// Parsing

impl Amount {
    /// Parse an amount literal, registering its commodity in `pool`.
    ///
    /// The accepted shapes are `NUM[ ]SYM` and `SYM[ ]NUM`, where the
    /// number may carry a leading sign and `.`/`,` separators, and the
    /// symbol is either a bare run (no whitespace, digits, `-` or `.`) or a
    /// double-quoted string. Style flags observed here are merged into the
    /// commodity, and its display precision is raised to the parsed
    /// precision when finer.
    pub fn parse(input: &str, pool: &mut CommodityPool) -> AmountResult<Amount> {
        let trimmed = input.trim();
        let Some(first) = trimmed.chars().next() else {
            return Err(AmountError::ParseError("empty amount literal".to_string()));
        };

        let mut flags = CommodityFlags::DEFAULTS;
        let quant;
        let mut symbol = "";
        let mut quoted = false;

        if first.is_ascii_digit() || first == '-' || first == '.' {
            let (num, rest) = split_quantity(trimmed);
            quant = num;
            let mut rest = rest;
            if rest.starts_with(char::is_whitespace) {
                flags |= CommodityFlags::SEPARATED;
                rest = rest.trim_start();
            }
            if !rest.is_empty() {
                let (sym, was_quoted, _rest) = split_symbol(rest)?;
                symbol = sym;
                quoted = was_quoted;
                flags |= CommodityFlags::SUFFIXED;
            }
        } else {
            let (sym, was_quoted, rest) = split_symbol(trimmed)?;
            symbol = sym;
            quoted = was_quoted;
            let mut rest = rest;
            if rest.starts_with(char::is_whitespace) {
                flags |= CommodityFlags::SEPARATED;
                rest = rest.trim_start();
            }
            let (num, _rest) = split_quantity(rest);
            quant = num;
        }

        let last_comma = quant.rfind(',');
        let last_period = quant.rfind('.');
        let prec = match (last_comma, last_period) {
            (Some(comma), Some(period)) => {
                flags |= CommodityFlags::THOUSANDS;
                if comma > period {
                    flags |= CommodityFlags::EUROPEAN;
                    quant.len() - comma - 1
                } else {
                    quant.len() - period - 1
                }
            }
            (Some(comma), None) => {
                flags |= CommodityFlags::EUROPEAN;
                quant.len() - comma - 1
            }
            (None, Some(period)) => quant.len() - period - 1,
            (None, None) => 0,
        };
        if prec >= usize::from(MAX_PRECISION) {
            return Err(AmountError::PrecisionOverflow(Precision::MAX));
        }
        let prec = prec as Precision;

        let digits: String = quant.chars().filter(|c| *c != ',' && *c != '.').collect();
        if digits.is_empty() || digits == "-" {
            return Err(AmountError::ParseError(format!("no quantity in {input:?}")));
        }
        let mantissa: BigInt = digits
            .parse()
            .map_err(|_| AmountError::ParseError(format!("malformed quantity in {input:?}")))?;

        let commodity = pool.find_or_create(symbol);
        if quoted {
            commodity.set_quoted(true);
        }
        commodity.add_flags(flags);
        commodity.raise_precision(prec);

        Ok(Self {
            quantity: Some(Rc::new(Quantity::new(mantissa, prec))),
            commodity: Some(commodity),
        })
    }
}

/// Split a leading `[-.,0-9]+` run off `input`.
fn split_quantity(input: &str) -> (&str, &str) {
    let end = input
        .find(|c: char| !c.is_ascii_digit() && c != '-' && c != '.' && c != ',')
        .unwrap_or(input.len());
    input.split_at(end)
}

/// Split a leading commodity symbol off `input`: either a double-quoted
/// string (the closing quote is required) or a run of characters excluding
/// whitespace, digits, `-` and `.`.
fn split_symbol(input: &str) -> AmountResult<(&str, bool, &str)> {
    if let Some(rest) = input.strip_prefix('"') {
        let Some(close) = rest.find('"') else {
            return Err(AmountError::UnterminatedSymbol);
        };
        Ok((&rest[..close], true, &rest[close + 1..]))
    } else {
        let end = input
            .find(|c: char| c.is_whitespace() || c.is_ascii_digit() || c == '-' || c == '.')
            .unwrap_or(input.len());
        let (symbol, rest) = input.split_at(end);
        Ok((symbol, false, rest))
    }
}

/// Parse a plain `[-]digits[.digits]` literal into mantissa and precision.
fn parse_decimal_literal(input: &str) -> AmountResult<(BigInt, Precision)> {
    let (int_part, frac_part) = match input.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (input, ""),
    };
    if frac_part.len() >= usize::from(MAX_PRECISION) {
        return Err(AmountError::PrecisionOverflow(Precision::MAX));
    }
    let digits = format!("{int_part}{frac_part}");
    let mantissa: BigInt = digits
        .parse()
        .map_err(|_| AmountError::ParseError(format!("malformed decimal literal {input:?}")))?;
    Ok((mantissa, frac_part.len() as Precision))
}

// ---------------------------------------------------------------------------
// Serde
//
// The quantity travels as its exact decimal string; the commodity travels
// by symbol only. Symbol resolution against a registry is the journal
// layer's job, so deserialized amounts come back attached to the unit-less
// commodity.

#[derive(Serialize, Deserialize)]
struct RawAmount {
    quantity: Option<String>,
    commodity: Option<String>,
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let raw = RawAmount {
            quantity: self
                .quantity
                .as_deref()
                .map(|q| formatting::decimal_string(q.mantissa(), q.precision())),
            commodity: self.commodity.as_deref().map(|c| c.symbol().to_string()),
        };
        raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawAmount::deserialize(deserializer)?;
        match raw.quantity {
            None => Ok(Amount::null()),
            Some(literal) => {
                let (mantissa, prec) =
                    parse_decimal_literal(&literal).map_err(serde::de::Error::custom)?;
                Ok(Amount::from_quantity(Quantity::new(mantissa, prec)))
            }
        }
    }
}
