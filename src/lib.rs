//! Arbitrary precision commodity amount arithmetic for double-entry
//! accounting.
//!
//! This crate is the numerical core of a ledger: exact decimal arithmetic
//! on commodity-tagged quantities with automatic precision tracking, a
//! commodity registry with display styles and time-indexed price history,
//! locale-flexible parsing and formatting that round-trip, and a compact
//! binary payload format that deduplicates shared values across a journal.
//!
//! The engine is single-threaded by contract: payload reference counts are
//! non-atomic and callers serialize all access to amounts, commodities,
//! and the registry.

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod amount;
pub mod binary;
pub mod commodity;
mod formatting;
pub mod quantity;

// Re-export main types
pub use amount::{Amount, AmountError, AmountResult};
pub use binary::{DecodeError, QuantityArena, QuantityWriter};
pub use commodity::{
    null_commodity, Commodity, CommodityFlags, CommodityPool, CommodityRef, PriceTime,
    PriceUpdater,
};
pub use quantity::{Precision, Quantity, QuantityFlags, EXTEND_BY_DIGITS, MAX_PRECISION};

// Re-export for convenience
pub use num_bigint::BigInt;
pub use rust_decimal::Decimal;
