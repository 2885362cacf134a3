//! Commodity records, display style flags, and the commodity registry.
//!
//! A commodity names the unit an amount is denominated in: a currency, a
//! share class, or any other unit of measure. The registry hands out
//! reference-counted records keyed by symbol; parsing merges display style
//! flags into them and ratchets their display precision upward. Each record
//! also carries a time-ordered price history used for market valuation.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use bitflags::bitflags;
use chrono::{DateTime, Utc};

use crate::amount::Amount;
use crate::binary::QuantityArena;
use crate::quantity::Precision;

/// Reference-counted commodity handle. Refcounts are non-atomic; the engine
/// is single-threaded by contract.
pub type CommodityRef = Rc<Commodity>;

/// Timestamp type for price history entries.
pub type PriceTime = DateTime<Utc>;

bitflags! {
    /// Commodity display style and behavior flags.
    ///
    /// The bit values are stable: they are OR-merged across parses and
    /// written into the binary journal format by higher layers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CommodityFlags: u32 {
        /// Seed value for freshly created commodities.
        const DEFAULTS  = 0x00;
        /// The symbol follows the number (`100 USD`) rather than
        /// preceding it (`$100`).
        const SUFFIXED  = 0x01;
        /// A space separates number and symbol.
        const SEPARATED = 0x02;
        /// Emit thousands separators in the integer part.
        const THOUSANDS = 0x04;
        /// Swap the roles of `.` and `,` (decimal vs thousands).
        const EUROPEAN  = 0x08;
        /// Never apply market-price conversion in valuation.
        const NOMARKET  = 0x10;
    }
}

/// A named unit with display style, display precision, and price history.
#[derive(Debug)]
pub struct Commodity {
    symbol: String,
    quoted: Cell<bool>,
    name: RefCell<Option<String>>,
    note: RefCell<Option<String>>,
    precision: Cell<Precision>,
    flags: Cell<CommodityFlags>,
    history: RefCell<BTreeMap<PriceTime, Amount>>,
    conversion: RefCell<Option<Amount>>,
}

impl Commodity {
    /// Create a commodity with default style and zero display precision.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            quoted: Cell::new(false),
            name: RefCell::new(None),
            note: RefCell::new(None),
            precision: Cell::new(0),
            flags: Cell::new(CommodityFlags::DEFAULTS),
            history: RefCell::new(BTreeMap::new()),
            conversion: RefCell::new(None),
        }
    }

    /// The symbol this commodity is registered under.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Whether the symbol must be emitted surrounded by double quotes.
    pub fn is_quoted(&self) -> bool {
        self.quoted.get()
    }

    /// Mark the symbol as requiring quotes when rendered.
    pub fn set_quoted(&self, quoted: bool) {
        self.quoted.set(quoted);
    }

    /// Optional long name.
    pub fn name(&self) -> Option<String> {
        self.name.borrow().clone()
    }

    /// Set the long name.
    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.borrow_mut() = Some(name.into());
    }

    /// Optional free-form note.
    pub fn note(&self) -> Option<String> {
        self.note.borrow().clone()
    }

    /// Set the free-form note.
    pub fn set_note(&self, note: impl Into<String>) {
        *self.note.borrow_mut() = Some(note.into());
    }

    /// The display precision: the finest decimal precision ever observed in
    /// an amount parsed with this commodity.
    pub fn precision(&self) -> Precision {
        self.precision.get()
    }

    /// Set the display precision directly.
    pub fn set_precision(&self, precision: Precision) {
        self.precision.set(precision);
    }

    /// Raise the display precision if `precision` exceeds it; never lowers.
    pub fn raise_precision(&self, precision: Precision) {
        if precision > self.precision.get() {
            self.precision.set(precision);
        }
    }

    /// Current style flags.
    pub fn flags(&self) -> CommodityFlags {
        self.flags.get()
    }

    /// Whether all of `flags` are set.
    pub fn has_flags(&self, flags: CommodityFlags) -> bool {
        self.flags.get().contains(flags)
    }

    /// OR `flags` into the style.
    pub fn add_flags(&self, flags: CommodityFlags) {
        self.flags.set(self.flags.get() | flags);
    }

    /// Clear `flags` from the style.
    pub fn drop_flags(&self, flags: CommodityFlags) {
        self.flags.set(self.flags.get() - flags);
    }

    /// Insert or overwrite the price entry at `when`. The price is an
    /// amount denominated in some other commodity.
    pub fn add_price(&self, when: PriceTime, price: Amount) {
        self.history.borrow_mut().insert(when, price);
    }

    /// Remove the price entry at `when`, returning it if present.
    pub fn remove_price(&self, when: PriceTime) -> Option<Amount> {
        self.history.borrow_mut().remove(&when)
    }

    /// Number of recorded price entries.
    pub fn price_count(&self) -> usize {
        self.history.borrow().len()
    }

    /// The fixed conversion amount used when no historical price applies.
    pub fn conversion(&self) -> Option<Amount> {
        self.conversion.borrow().clone()
    }

    /// Set the fixed conversion amount.
    pub fn set_conversion(&self, conversion: Amount) {
        *self.conversion.borrow_mut() = Some(conversion);
    }

    /// Newest history entry at or before `moment`; the latest entry when
    /// `moment` is unspecified. Returns the matched timestamp, the newest
    /// timestamp overall, and the price (empty when nothing matched).
    pub(crate) fn lookup_price(
        &self,
        moment: Option<PriceTime>,
    ) -> (Option<PriceTime>, Option<PriceTime>, Amount) {
        let history = self.history.borrow();
        let latest = history.keys().next_back().copied();
        for (when, price) in history.iter().rev() {
            if moment.map_or(true, |m| *when <= m) {
                return (Some(*when), latest, price.clone());
            }
        }
        (None, latest, Amount::null())
    }

    /// Re-home every price whose payload lives in `arena` onto its own
    /// allocation, so the arena's storage can be released.
    pub(crate) fn promote_prices(&self, arena: &QuantityArena) {
        let mut history = self.history.borrow_mut();
        for price in history.values_mut() {
            price.promote_from(arena);
        }
        if let Some(conversion) = self.conversion.borrow_mut().as_mut() {
            conversion.promote_from(arena);
        }
    }
}

impl PartialEq for Commodity {
    fn eq(&self, other: &Self) -> bool {
        self.symbol == other.symbol
    }
}

impl Eq for Commodity {}

impl Hash for Commodity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.symbol.hash(state);
    }
}

impl fmt::Display for Commodity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_quoted() {
            write!(f, "\"{}\"", self.symbol)
        } else {
            f.write_str(&self.symbol)
        }
    }
}

/// The distinguished unit-less commodity attached to amounts built from
/// bare numbers. One instance exists per thread for the life of the
/// process; every registry registers the same instance.
pub fn null_commodity() -> CommodityRef {
    thread_local! {
        static NULL_COMMODITY: CommodityRef = Rc::new(Commodity::new(""));
    }
    NULL_COMMODITY.with(Rc::clone)
}

/// Hook invoked by [`CommodityPool::price_at`]; implementations may refresh
/// or replace the price found in the history (live quote fetching).
pub trait PriceUpdater {
    /// Called with the commodity, the requested moment, the timestamp of
    /// the matched entry, the newest timestamp overall, and the price found
    /// so far. Mutate `price` to override the result.
    fn update(
        &mut self,
        commodity: &Commodity,
        moment: Option<PriceTime>,
        found: Option<PriceTime>,
        latest: Option<PriceTime>,
        price: &mut Amount,
    );
}

/// Registry mapping symbols to commodity records. Owns its commodities;
/// amounts hold non-owning (reference-counted) handles.
pub struct CommodityPool {
    commodities: HashMap<String, CommodityRef>,
    updater: Option<Box<dyn PriceUpdater>>,
}

impl CommodityPool {
    /// Create a registry with the null commodity pre-registered.
    pub fn new() -> Self {
        let mut commodities = HashMap::new();
        commodities.insert(String::new(), null_commodity());
        Self { commodities, updater: None }
    }

    /// Look up a commodity by exact symbol.
    pub fn find(&self, symbol: &str) -> Option<CommodityRef> {
        self.commodities.get(symbol).cloned()
    }

    /// Look up a commodity by symbol, creating and registering it with
    /// default flags and zero precision if absent.
    pub fn find_or_create(&mut self, symbol: &str) -> CommodityRef {
        if let Some(commodity) = self.commodities.get(symbol) {
            return commodity.clone();
        }
        log::trace!("registering commodity {symbol:?}");
        let commodity: CommodityRef = Rc::new(Commodity::new(symbol));
        self.commodities.insert(symbol.to_string(), commodity.clone());
        commodity
    }

    /// The unit-less commodity.
    pub fn null_commodity(&self) -> CommodityRef {
        null_commodity()
    }

    /// Number of registered commodities (the null commodity included).
    pub fn commodity_count(&self) -> usize {
        self.commodities.len()
    }

    /// Iterate over every registered commodity.
    pub fn commodities(&self) -> impl Iterator<Item = &CommodityRef> {
        self.commodities.values()
    }

    /// Install the price updater hook.
    pub fn set_updater(&mut self, updater: Box<dyn PriceUpdater>) {
        self.updater = Some(updater);
    }

    /// Remove the price updater hook.
    pub fn clear_updater(&mut self) {
        self.updater = None;
    }

    /// The price of `commodity` at `moment` (`None` means "now": take the
    /// latest entry). The updater hook, when installed, sees the result and
    /// may replace it; the final price is returned and may be empty.
    pub fn price_at(&mut self, commodity: &CommodityRef, moment: Option<PriceTime>) -> Amount {
        let (found, latest, mut price) = commodity.lookup_price(moment);
        if let Some(updater) = self.updater.as_mut() {
            updater.update(commodity, moment, found, latest, &mut price);
        }
        price
    }

    /// Promote every price history entry whose payload lives in `arena`
    /// onto an independent allocation. Called while tearing down the
    /// journal that owns the arena, before the arena itself is dropped.
    pub fn promote_arena_prices(&self, arena: &QuantityArena) {
        log::trace!("promoting bulk-allocated prices out of arena");
        for commodity in self.commodities.values() {
            commodity.promote_prices(arena);
        }
    }
}

impl Default for CommodityPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> PriceTime {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn flag_bits_are_stable() {
        assert_eq!(CommodityFlags::SUFFIXED.bits(), 0x01);
        assert_eq!(CommodityFlags::SEPARATED.bits(), 0x02);
        assert_eq!(CommodityFlags::THOUSANDS.bits(), 0x04);
        assert_eq!(CommodityFlags::EUROPEAN.bits(), 0x08);
        assert_eq!(CommodityFlags::NOMARKET.bits(), 0x10);
        assert_eq!(CommodityFlags::DEFAULTS.bits(), 0x00);
    }

    #[test]
    fn pool_registers_null_commodity() {
        let pool = CommodityPool::new();
        assert_eq!(pool.commodity_count(), 1);
        let null = pool.find("").unwrap();
        assert_eq!(null.symbol(), "");
        assert!(Rc::ptr_eq(&null, &null_commodity()));
    }

    #[test]
    fn find_or_create_is_idempotent() {
        let mut pool = CommodityPool::new();
        let usd1 = pool.find_or_create("USD");
        let usd2 = pool.find_or_create("USD");
        assert!(Rc::ptr_eq(&usd1, &usd2));
        assert_eq!(pool.commodity_count(), 2);
    }

    #[test]
    fn precision_only_ratchets_up() {
        let commodity = Commodity::new("$");
        commodity.raise_precision(2);
        assert_eq!(commodity.precision(), 2);
        commodity.raise_precision(1);
        assert_eq!(commodity.precision(), 2);
        commodity.raise_precision(4);
        assert_eq!(commodity.precision(), 4);
    }

    #[test]
    fn price_at_picks_newest_not_after_moment() {
        let mut pool = CommodityPool::new();
        let aapl = pool.find_or_create("AAPL");
        aapl.add_price(at(100), Amount::from_i64(10));
        aapl.add_price(at(200), Amount::from_i64(20));
        aapl.add_price(at(300), Amount::from_i64(30));

        assert_eq!(pool.price_at(&aapl, Some(at(250))), Amount::from_i64(20));
        assert_eq!(pool.price_at(&aapl, Some(at(300))), Amount::from_i64(30));
        assert_eq!(pool.price_at(&aapl, None), Amount::from_i64(30));
        assert!(pool.price_at(&aapl, Some(at(50))).is_null());
    }

    #[test]
    fn add_price_overwrites_same_timestamp() {
        let commodity = Commodity::new("GAS");
        commodity.add_price(at(100), Amount::from_i64(3));
        commodity.add_price(at(100), Amount::from_i64(4));
        assert_eq!(commodity.price_count(), 1);
        let (found, _, price) = commodity.lookup_price(None);
        assert_eq!(found, Some(at(100)));
        assert_eq!(price, Amount::from_i64(4));
    }

    struct FixedUpdater(i64);

    impl PriceUpdater for FixedUpdater {
        fn update(
            &mut self,
            _commodity: &Commodity,
            _moment: Option<PriceTime>,
            _found: Option<PriceTime>,
            _latest: Option<PriceTime>,
            price: &mut Amount,
        ) {
            *price = Amount::from_i64(self.0);
        }
    }

    #[test]
    fn updater_can_replace_price() {
        let mut pool = CommodityPool::new();
        let oil = pool.find_or_create("OIL");
        oil.add_price(at(100), Amount::from_i64(70));
        pool.set_updater(Box::new(FixedUpdater(75)));
        assert_eq!(pool.price_at(&oil, None), Amount::from_i64(75));
        pool.clear_updater();
        assert_eq!(pool.price_at(&oil, None), Amount::from_i64(70));
    }
}
