//! Display formatting tests: commodity styles, padding, and edge signs.

use ledger_amounts::{Amount, CommodityFlags, CommodityPool};

#[test]
fn empty_amount_renders_as_nothing() {
    assert_eq!(Amount::null().to_string(), "");
    assert_eq!(format!("{:>8}", Amount::null()), "        ");
}

#[test]
fn zero_pads_to_display_precision() {
    let mut pool = CommodityPool::new();
    let zero = Amount::parse("$0.00", &mut pool).unwrap();
    assert_eq!(zero.to_string(), "$0.00");
}

#[test]
fn coarse_payload_is_zero_extended() {
    let mut pool = CommodityPool::new();
    Amount::parse("$1.99", &mut pool).unwrap();
    let whole = Amount::parse("$5", &mut pool).unwrap();
    assert_eq!(whole.to_string(), "$5.00");
}

#[test]
fn fine_payload_is_rounded_not_truncated() {
    let mut pool = CommodityPool::new();
    let cents = Amount::parse("$1.00", &mut pool).unwrap();
    let fine = (Amount::parse("$1.99", &mut pool).unwrap() / Amount::from_i64(1000)).unwrap();
    assert_eq!(fine.quantity_string(), "0.00199000");
    assert_eq!(fine.to_string(), "$0.00");
    let nearly = (Amount::parse("$0.99", &mut pool).unwrap() / Amount::from_i64(100)).unwrap();
    // 0.0099 rounds up to a cent at two places.
    assert_eq!(nearly.to_string(), "$0.01");
    assert_eq!(cents.to_string(), "$1.00");
}

#[test]
fn sign_carried_by_the_fraction_alone() {
    let mut pool = CommodityPool::new();
    let a = Amount::parse("$-0.50", &mut pool).unwrap();
    assert_eq!(a.to_string(), "$-0.50");
}

#[test]
fn separated_prefix_style() {
    let mut pool = CommodityPool::new();
    let a = Amount::parse("USD 100.00", &mut pool).unwrap();
    assert!(a.commodity().unwrap().has_flags(CommodityFlags::SEPARATED));
    assert!(!a.commodity().unwrap().has_flags(CommodityFlags::SUFFIXED));
    assert_eq!(a.to_string(), "USD 100.00");
}

#[test]
fn thousands_grouping_follows_european_flag() {
    let mut pool = CommodityPool::new();
    let plain = Amount::parse("12,345,678.90 USD", &mut pool).unwrap();
    assert_eq!(plain.to_string(), "12,345,678.90 USD");

    let european = Amount::parse("1.234.567,00 €", &mut pool).unwrap();
    assert_eq!(european.to_string(), "1.234.567,00 €");
}

#[test]
fn a_lone_comma_marks_a_european_decimal() {
    let mut pool = CommodityPool::new();
    let a = Amount::parse("1,5 kg", &mut pool).unwrap();
    assert!(a.commodity().unwrap().has_flags(CommodityFlags::EUROPEAN));
    assert_eq!(a.precision(), 1);
    assert_eq!(a.quantity_string(), "1.5");
    assert_eq!(a.to_string(), "1,5 kg");
}

#[test]
fn width_and_alignment_apply_to_the_whole_amount() {
    let mut pool = CommodityPool::new();
    let a = Amount::parse("$42.00", &mut pool).unwrap();
    assert_eq!(format!("{:>10}", a), "    $42.00");
    assert_eq!(format!("{:<10}|", a), "$42.00    |");
}

#[test]
fn debug_formatting_shows_internals_when_asked() {
    let mut pool = CommodityPool::new();
    let a = Amount::parse("$1.50", &mut pool).unwrap();
    assert_eq!(format!("{:?}", a), "AMOUNT($1.50)");
    let detailed = format!("{:#?}", a);
    assert!(detailed.contains("prec:2"));
    assert!(detailed.contains("comm:$"));
    assert!(detailed.contains("raw:150"));
    assert_eq!(format!("{:?}", Amount::null()), "AMOUNT(<null>)");
}

#[test]
fn quoted_symbols_round_trip_in_both_positions() {
    let mut pool = CommodityPool::new();
    let prefix = Amount::parse("\"DM\" 100", &mut pool).unwrap();
    assert_eq!(prefix.to_string(), "\"DM\" 100");

    let suffix = Amount::parse("100 \"E F\"", &mut pool).unwrap();
    assert_eq!(suffix.to_string(), "100 \"E F\"");
}
