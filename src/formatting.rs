//! Rendering of amounts into their commodity's display style.
//!
//! The printed form is designed to re-parse to an equal amount: symbol
//! placement, separator spaces, thousands grouping, and the European
//! swap of `.` and `,` all come from the commodity's style flags, and the
//! value is first rounded to the commodity's display precision.

use num_bigint::BigInt;

use crate::commodity::{Commodity, CommodityFlags};
use crate::quantity::{pow10, Precision, Quantity};

/// Exact decimal rendering of a raw mantissa and precision, with no
/// commodity styling: `[-]digits[.digits]`.
pub(crate) fn decimal_string(mantissa: &BigInt, prec: Precision) -> String {
    let mut digits = mantissa.magnitude().to_string();
    if prec == 0 {
        if mantissa.sign() == num_bigint::Sign::Minus {
            digits.insert(0, '-');
        }
        return digits;
    }
    while digits.len() <= usize::from(prec) {
        digits.insert(0, '0');
    }
    let point = digits.len() - usize::from(prec);
    digits.insert(point, '.');
    if mantissa.sign() == num_bigint::Sign::Minus {
        digits.insert(0, '-');
    }
    digits
}

/// Group a digit run in threes from the right.
pub(crate) fn group_thousands(digits: &str, separator: char) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    let chars: Vec<char> = digits.chars().collect();
    for (i, c) in chars.iter().enumerate() {
        out.push(*c);
        let remaining = chars.len() - i - 1;
        if remaining > 0 && remaining % 3 == 0 {
            out.push(separator);
        }
    }
    out
}

/// Render one amount payload in its commodity's display style. The result
/// re-parses to an equal amount.
pub(crate) fn render_amount(quantity: &Quantity, commodity: &Commodity) -> String {
    let flags = commodity.flags();
    let display = commodity.precision();

    // Round (not truncate) to the display precision; a coarser payload is
    // zero-extended instead.
    let mantissa = if display < quantity.prec {
        let mut rounded = quantity.clone();
        rounded.round(display);
        rounded.mantissa
    } else if display > quantity.prec {
        &quantity.mantissa * pow10(u32::from(display - quantity.prec))
    } else {
        quantity.mantissa.clone()
    };

    let zero = BigInt::from(0);
    let (mut quotient, mut remainder) = if display > 0 {
        let divisor = pow10(u32::from(display));
        (&mantissa / &divisor, &mantissa % &divisor)
    } else {
        (mantissa, zero.clone())
    };

    // Truncated division gives quotient and remainder the mantissa's sign;
    // either one may be the sole carrier when the other is zero.
    let negative = quotient < zero || remainder < zero;
    if negative {
        quotient = -quotient;
        remainder = -remainder;
    }

    let symbol = if commodity.is_quoted() {
        format!("\"{}\"", commodity.symbol())
    } else {
        commodity.symbol().to_string()
    };

    let mut out = String::new();

    if !flags.contains(CommodityFlags::SUFFIXED) && !symbol.is_empty() {
        out.push_str(&symbol);
        if flags.contains(CommodityFlags::SEPARATED) {
            out.push(' ');
        }
    }

    if negative {
        out.push('-');
    }

    let integer_digits = quotient.to_string();
    if flags.contains(CommodityFlags::THOUSANDS) {
        let separator = if flags.contains(CommodityFlags::EUROPEAN) { '.' } else { ',' };
        out.push_str(&group_thousands(&integer_digits, separator));
    } else {
        out.push_str(&integer_digits);
    }

    if display > 0 {
        out.push(if flags.contains(CommodityFlags::EUROPEAN) { ',' } else { '.' });
        let fraction = remainder.to_string();
        for _ in fraction.len()..usize::from(display) {
            out.push('0');
        }
        out.push_str(&fraction);
    }

    if flags.contains(CommodityFlags::SUFFIXED) && !symbol.is_empty() {
        if flags.contains(CommodityFlags::SEPARATED) {
            out.push(' ');
        }
        out.push_str(&symbol);
    }

    out
}
