//! Binary serialization of amount payloads.
//!
//! Journals holding millions of postings share payloads aggressively, so
//! the wire format writes each distinct payload once and refers back to it
//! by ordinal afterwards. Every record starts with a tag byte: `0` for the
//! empty amount, `1` for a first emission (limb data, sign, precision), and
//! `2` for a back-reference to an already-written payload.
//!
//! Integers are written in host byte order; portability across endianness
//! is not a goal of the format. Mantissa limbs are 16 bits wide, most
//! significant limb first, and the length field counts bytes.

use std::rc::Rc;

use num_bigint::{BigInt, BigUint, Sign};
use thiserror::Error;

use crate::amount::Amount;
use crate::commodity::null_commodity;
use crate::quantity::{Quantity, QuantityFlags, MAX_PRECISION};

/// Errors raised while decoding payload records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Input ended inside a record.
    #[error("unexpected end of input")]
    UnexpectedEof,
    /// A tag byte outside the defined set.
    #[error("unknown payload tag {0}")]
    InvalidTag(u8),
    /// A limb length that is not a whole number of 16-bit limbs.
    #[error("limb data length {0} is not a multiple of 2")]
    OddLimbLength(u16),
    /// A back-reference to an ordinal never emitted.
    #[error("back-reference to unknown payload index {0}")]
    UnknownIndex(u32),
    /// An encoded precision at or beyond the supported maximum.
    #[error("encoded precision {0} exceeds the supported maximum")]
    PrecisionOverflow(u16),
}

const TAG_EMPTY: u8 = 0;
const TAG_PAYLOAD: u8 = 1;
const TAG_BACKREF: u8 = 2;

/// State for one serialization run: the monotonic payload ordinal and the
/// count of distinct payloads emitted.
///
/// Payload ordinals persist on the payloads themselves between runs; start
/// a fresh run with a new writer and [`Amount::clear_quantity_index`] on
/// every amount about to be written.
pub struct QuantityWriter {
    next_index: u32,
    written: u32,
}

impl QuantityWriter {
    /// Begin a serialization run with both counters at zero.
    pub fn new() -> Self {
        Self { next_index: 0, written: 0 }
    }

    /// Number of distinct payloads emitted so far.
    pub fn count(&self) -> u32 {
        self.written
    }
}

impl Default for QuantityWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Reader-side arena: every tag-`1` payload is appended here so tag-`2`
/// back-references can resolve, and so the registry can later promote any
/// price still referencing arena storage (see
/// [`CommodityPool::promote_arena_prices`](crate::CommodityPool::promote_arena_prices)).
pub struct QuantityArena {
    slots: Vec<Rc<Quantity>>,
}

impl QuantityArena {
    /// An empty arena.
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Number of payloads allocated in this arena.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the arena holds no payloads.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Whether `quantity` is one of this arena's allocations.
    pub(crate) fn owns(&self, quantity: &Rc<Quantity>) -> bool {
        self.slots.iter().any(|slot| Rc::ptr_eq(slot, quantity))
    }

    fn get(&self, index: u32) -> Option<&Rc<Quantity>> {
        index.checked_sub(1).and_then(|i| self.slots.get(i as usize))
    }
}

impl Default for QuantityArena {
    fn default() -> Self {
        Self::new()
    }
}

impl Amount {
    /// Append this amount's payload record to `out`. The first emission of
    /// a payload assigns it the next ordinal and writes its full contents;
    /// later emissions write a back-reference.
    pub fn write_quantity(&self, writer: &mut QuantityWriter, out: &mut Vec<u8>) {
        let Some(quantity) = self.quantity.as_ref() else {
            out.push(TAG_EMPTY);
            return;
        };

        if quantity.serial_index() == 0 {
            writer.next_index += 1;
            writer.written += 1;
            quantity.set_serial_index(writer.next_index);

            out.push(TAG_PAYLOAD);
            let limbs = export_limbs(quantity.mantissa());
            out.extend_from_slice(&(limbs.len() as u16).to_ne_bytes());
            out.extend_from_slice(&limbs);
            out.push(u8::from(quantity.sign() < 0));
            out.extend_from_slice(&quantity.precision().to_ne_bytes());
        } else {
            debug_assert!(Rc::strong_count(quantity) > 1);
            out.push(TAG_BACKREF);
            out.extend_from_slice(&quantity.serial_index().to_ne_bytes());
        }
    }

    /// Forget the payload's serialization ordinal, making the next write a
    /// full emission. Call on every amount before starting a fresh run.
    pub fn clear_quantity_index(&self) {
        if let Some(quantity) = self.quantity.as_ref() {
            quantity.set_serial_index(0);
        }
    }

    /// Read one payload record from `data` at `*pos`, advancing the
    /// cursor. Fresh payloads are allocated in `arena` (and flagged as
    /// arena storage); back-references share the arena's payload. The
    /// returned amount carries the unit-less commodity; the journal layer
    /// reattaches the real one.
    pub fn read_quantity(
        data: &[u8],
        pos: &mut usize,
        arena: &mut QuantityArena,
    ) -> Result<Amount, DecodeError> {
        match read_u8(data, pos)? {
            TAG_EMPTY => Ok(Amount::null()),
            TAG_PAYLOAD => {
                let len = read_u16(data, pos)?;
                if len % 2 != 0 {
                    return Err(DecodeError::OddLimbLength(len));
                }
                let limbs = read_bytes(data, pos, usize::from(len))?;
                let magnitude = import_limbs(limbs);
                let negative = read_u8(data, pos)? != 0;
                let prec = read_u16(data, pos)?;
                if prec >= MAX_PRECISION {
                    return Err(DecodeError::PrecisionOverflow(prec));
                }

                let sign = if negative { Sign::Minus } else { Sign::Plus };
                let mantissa = BigInt::from_biguint(sign, magnitude);
                let quantity =
                    Rc::new(Quantity::with_flags(mantissa, prec, QuantityFlags::BULK_ALLOC));
                arena.slots.push(Rc::clone(&quantity));
                Ok(Amount { quantity: Some(quantity), commodity: Some(null_commodity()) })
            }
            TAG_BACKREF => {
                let index = read_u32(data, pos)?;
                let quantity =
                    arena.get(index).ok_or(DecodeError::UnknownIndex(index))?.clone();
                Ok(Amount { quantity: Some(quantity), commodity: Some(null_commodity()) })
            }
            other => Err(DecodeError::InvalidTag(other)),
        }
    }
}

/// Export the absolute mantissa as 16-bit limbs, most significant first,
/// host byte order within each limb. Zero exports as no limbs at all.
fn export_limbs(mantissa: &BigInt) -> Vec<u8> {
    if mantissa.sign() == Sign::NoSign {
        return Vec::new();
    }
    let mut bytes = mantissa.magnitude().to_bytes_be();
    if bytes.len() % 2 == 1 {
        bytes.insert(0, 0);
    }
    let mut out = Vec::with_capacity(bytes.len());
    for pair in bytes.chunks(2) {
        let limb = u16::from_be_bytes([pair[0], pair[1]]);
        out.extend_from_slice(&limb.to_ne_bytes());
    }
    out
}

fn import_limbs(data: &[u8]) -> BigUint {
    let mut bytes = Vec::with_capacity(data.len());
    for pair in data.chunks(2) {
        let limb = u16::from_ne_bytes([pair[0], pair[1]]);
        bytes.extend_from_slice(&limb.to_be_bytes());
    }
    BigUint::from_bytes_be(&bytes)
}

fn read_bytes<'a>(
    data: &'a [u8],
    pos: &mut usize,
    len: usize,
) -> Result<&'a [u8], DecodeError> {
    let end = pos.checked_add(len).ok_or(DecodeError::UnexpectedEof)?;
    let slice = data.get(*pos..end).ok_or(DecodeError::UnexpectedEof)?;
    *pos = end;
    Ok(slice)
}

fn read_u8(data: &[u8], pos: &mut usize) -> Result<u8, DecodeError> {
    Ok(read_bytes(data, pos, 1)?[0])
}

fn read_u16(data: &[u8], pos: &mut usize) -> Result<u16, DecodeError> {
    let bytes = read_bytes(data, pos, 2)?;
    Ok(u16::from_ne_bytes([bytes[0], bytes[1]]))
}

fn read_u32(data: &[u8], pos: &mut usize) -> Result<u32, DecodeError> {
    let bytes = read_bytes(data, pos, 4)?;
    Ok(u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}
