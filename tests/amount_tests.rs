//! Arithmetic, parsing, and invariant tests for the amount engine.

use ledger_amounts::{Amount, AmountError, CommodityFlags, CommodityPool};

mod identities {
    use super::*;

    #[test]
    fn empty_is_the_additive_identity_on_both_sides() {
        let mut pool = CommodityPool::new();
        let a = Amount::parse("$12.34", &mut pool).unwrap();

        let left = (Amount::null() + &a).unwrap();
        let right = (a.clone() + Amount::null()).unwrap();
        assert_eq!(left, a);
        assert_eq!(right, a);
        assert!(left.valid() && right.valid());
    }

    #[test]
    fn self_subtraction_is_zero() {
        let mut pool = CommodityPool::new();
        let a = Amount::parse("$12.34", &mut pool).unwrap();
        let diff = (&a - &a).unwrap();
        assert!(diff == 0);
        assert!(diff.is_realzero());
        assert!(diff.valid());
    }

    #[test]
    fn multiplying_by_one_is_identity() {
        let mut pool = CommodityPool::new();
        let a = Amount::parse("$12.34", &mut pool).unwrap();
        let product = (&a * &Amount::from_i64(1)).unwrap();
        assert_eq!(product, a);
    }

    #[test]
    fn self_division_is_one() {
        let mut pool = CommodityPool::new();
        let a = Amount::parse("$3.00", &mut pool).unwrap();
        let quotient = (&a / &a).unwrap();
        assert!(quotient == 1);
    }

    #[test]
    fn addition_and_multiplication_commute() {
        let mut pool = CommodityPool::new();
        let a = Amount::parse("$1.25", &mut pool).unwrap();
        let b = Amount::parse("$2.50", &mut pool).unwrap();
        assert_eq!((&a + &b).unwrap(), (&b + &a).unwrap());

        let k = Amount::parse("3", &mut pool).unwrap();
        assert_eq!((&a * &k).unwrap(), (&k * &a).unwrap());
    }
}

mod round_trips {
    use super::*;

    // Parsing then formatting with the commodity's own precision must
    // reproduce a string that parses back to an equal amount.
    fn assert_round_trip(literal: &str) {
        let mut pool = CommodityPool::new();
        let parsed = Amount::parse(literal, &mut pool).unwrap();
        let formatted = parsed.to_string();
        assert_eq!(formatted, literal);
        let reparsed = Amount::parse(&formatted, &mut pool).unwrap();
        assert_eq!(reparsed, parsed);
        assert!(parsed.valid() && reparsed.valid());
    }

    #[test]
    fn plain_dollar() {
        assert_round_trip("$100.00");
    }

    #[test]
    fn european_suffixed() {
        assert_round_trip("-1.234,56 €");
    }

    #[test]
    fn suffixed_with_space() {
        assert_round_trip("100 USD");
    }

    #[test]
    fn thousands_grouping() {
        assert_round_trip("1,234,567.89 USD");
    }

    #[test]
    fn quoted_symbol() {
        assert_round_trip("\"MSFT\" 12.5");
    }

    #[test]
    fn bare_number() {
        assert_round_trip("42.50");
    }
}

mod scenarios {
    use super::*;

    #[test]
    fn dollar_parse_and_format() {
        let mut pool = CommodityPool::new();
        let a = Amount::parse("$100.00", &mut pool).unwrap();
        assert_eq!(a.to_string(), "$100.00");
        let dollar = a.commodity().unwrap();
        assert_eq!(dollar.symbol(), "$");
        assert_eq!(dollar.precision(), 2);
        assert_eq!(dollar.flags(), CommodityFlags::DEFAULTS);
    }

    #[test]
    fn european_parse_and_format() {
        let mut pool = CommodityPool::new();
        let a = Amount::parse("-1.234,56 €", &mut pool).unwrap();
        assert_eq!(a.to_string(), "-1.234,56 €");
        assert!(a.commodity().unwrap().has_flags(
            CommodityFlags::SUFFIXED
                | CommodityFlags::SEPARATED
                | CommodityFlags::THOUSANDS
                | CommodityFlags::EUROPEAN
        ));
    }

    #[test]
    fn sum_rounds_half_away_from_zero_at_display_precision() {
        let mut pool = CommodityPool::new();
        let a = Amount::parse("$10.00", &mut pool).unwrap();
        // Half a cent, built by division so the dollar keeps its two-place
        // display precision.
        let half_cent = (Amount::parse("$0.01", &mut pool).unwrap() / Amount::from_i64(2)).unwrap();
        assert_eq!(half_cent.quantity_string(), "0.00500000");

        let sum = (&a + &half_cent).unwrap();
        assert_eq!(sum.to_string(), "$10.01");
    }

    #[test]
    fn parsing_a_finer_literal_raises_display_precision() {
        let mut pool = CommodityPool::new();
        let a = Amount::parse("$10.00", &mut pool).unwrap();
        let b = Amount::parse("$0.005", &mut pool).unwrap();
        // The parse itself widened the dollar's display precision to 3.
        assert_eq!(a.commodity().unwrap().precision(), 3);
        let sum = (&a + &b).unwrap();
        assert_eq!(sum.to_string(), "$10.005");
    }

    #[test]
    fn mixing_commodities_is_an_error() {
        let mut pool = CommodityPool::new();
        let a = Amount::parse("$10", &mut pool).unwrap();
        let b = Amount::parse("10 USD", &mut pool).unwrap();
        assert_eq!(a + b, Err(AmountError::CommodityMismatch));
    }

    #[test]
    fn division_carries_guard_digits_into_display_rounding() {
        let mut pool = CommodityPool::new();
        let a = Amount::parse("$3.00", &mut pool).unwrap();
        let b = Amount::parse("$7", &mut pool).unwrap();
        let quotient = (a / b).unwrap();
        assert_eq!(quotient.to_string(), "$0.43");
    }

    #[test]
    fn sub_cent_amounts_are_falsy_at_display_precision() {
        let mut pool = CommodityPool::new();
        let dollar = Amount::parse("$1.00", &mut pool).unwrap();
        let tiny = (&dollar / &Amount::from_i64(10000)).unwrap(); // $0.0001
        assert_eq!(dollar.commodity().unwrap().precision(), 2);
        assert!(tiny.is_zero());
        assert!(!tiny.is_nonzero());
        assert!(!tiny.is_realzero());
    }
}

mod sharing {
    use super::*;

    #[test]
    fn mutation_never_leaks_through_shared_payloads() {
        let mut pool = CommodityPool::new();
        let original = Amount::parse("$7.77", &mut pool).unwrap();
        let mut copies: Vec<Amount> = (0..4).map(|_| original.clone()).collect();
        for copy in &copies {
            assert!(original.shares_quantity_with(copy));
        }

        copies[0].in_place_negate();
        copies[1].add_amount(&original).unwrap();
        copies[2].div_amount(&Amount::from_i64(7)).unwrap();

        assert_eq!(original.to_string(), "$7.77");
        assert_eq!(copies[0].to_string(), "$-7.77");
        assert_eq!(copies[1].to_string(), "$15.54");
        assert_eq!(copies[2].to_string(), "$1.11");
        assert_eq!(copies[3].to_string(), "$7.77");
        assert!(original.shares_quantity_with(&copies[3]));
        for copy in &copies {
            assert!(copy.valid());
        }
    }

    #[test]
    fn failed_operations_leave_the_target_untouched() {
        let mut pool = CommodityPool::new();
        let a = Amount::parse("$5.00", &mut pool).unwrap();
        let other = Amount::parse("5 CAD", &mut pool).unwrap();

        let mut target = a.clone();
        assert!(target.add_amount(&other).is_err());
        assert_eq!(target, a);
        assert!(target.shares_quantity_with(&a));

        assert!(target.div_amount(&Amount::null()).is_err());
        assert_eq!(target, a);
    }
}

mod precision_tracking {
    use super::*;

    #[test]
    fn commodity_precision_never_decreases() {
        let mut pool = CommodityPool::new();
        let literals = ["$1", "$1.5", "$1.25", "$2", "$0.125", "$9"];
        let mut highest = 0;
        for literal in literals {
            Amount::parse(literal, &mut pool).unwrap();
            let precision = pool.find("$").unwrap().precision();
            assert!(precision >= highest);
            highest = precision;
        }
        assert_eq!(highest, 3);
    }

    #[test]
    fn addition_takes_the_finer_precision() {
        let mut pool = CommodityPool::new();
        let a = Amount::parse("$1.2", &mut pool).unwrap();
        let b = Amount::parse("$1.234", &mut pool).unwrap();
        let sum = (&a + &b).unwrap();
        assert_eq!(sum.precision(), 3);
        assert_eq!(sum.quantity_string(), "2.434");
        let sum_rev = (&b + &a).unwrap();
        assert_eq!(sum_rev, sum);
    }
}
