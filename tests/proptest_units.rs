//! Property-Based Tests — Unit Conversion and Session Invariants
//!
//! Uses `proptest` to verify that the base-unit converter and the
//! session record hold their invariants across random inputs.

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use wallet_injection::domain::session::Session;
use wallet_injection::domain::units::{ETHER_DECIMALS, to_display_units};

// ── Converter Properties ────────────────────────────────────

proptest! {
    /// Whole-ether amounts convert exactly.
    #[test]
    fn whole_ether_converts_exactly(n in 0u64..1_000_000_000_000) {
        let raw = format!("{n}000000000000000000");
        let value = to_display_units(&raw, ETHER_DECIMALS).unwrap();
        prop_assert_eq!(value, Decimal::from(n));
    }

    /// Hex and decimal encodings of the same quantity agree.
    #[test]
    fn hex_and_decimal_agree(amount in any::<u128>()) {
        let decimal = to_display_units(&amount.to_string(), ETHER_DECIMALS).unwrap();
        let hex = to_display_units(&format!("{amount:#x}"), ETHER_DECIMALS).unwrap();
        prop_assert_eq!(decimal, hex);
    }

    /// The displayed value is within half a cent of the exact value and
    /// always carries two fractional digits.
    #[test]
    fn rounding_error_is_bounded(amount in 0u128..(1u128 << 95)) {
        let value = to_display_units(&amount.to_string(), ETHER_DECIMALS).unwrap();
        let exact = Decimal::try_from_i128_with_scale(amount as i128, ETHER_DECIMALS).unwrap();
        prop_assert_eq!(value.scale(), 2);
        prop_assert!(
            (value - exact).abs() <= dec!(0.005),
            "{amount} displayed as {value}, exact {exact}"
        );
    }

    /// Larger amounts never display smaller.
    #[test]
    fn conversion_is_monotonic(a in any::<u64>(), delta in any::<u64>()) {
        let b = u128::from(a) + u128::from(delta);
        let low = to_display_units(&a.to_string(), ETHER_DECIMALS).unwrap();
        let high = to_display_units(&b.to_string(), ETHER_DECIMALS).unwrap();
        prop_assert!(low <= high, "{a} -> {low} > {b} -> {high}");
    }

    /// Non-numeric input is rejected, never converted.
    #[test]
    fn garbage_is_rejected(s in "[g-z]{1,12}") {
        prop_assert!(to_display_units(&s, ETHER_DECIMALS).is_err());
    }
}

// ── Session Properties ──────────────────────────────────────

#[derive(Debug, Clone)]
enum Step {
    Accounts(Vec<u8>),
    Balance(u32),
    Disconnect,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        prop::collection::vec(0u8..3, 0..3).prop_map(Step::Accounts),
        any::<u32>().prop_map(Step::Balance),
        Just(Step::Disconnect),
    ]
}

proptest! {
    /// Connection follows the account, and a balance only exists while
    /// an account is connected.
    #[test]
    fn session_invariants_hold(steps in prop::collection::vec(step(), 1..40)) {
        let mut session = Session::new();
        for step in steps {
            match step {
                Step::Accounts(accounts) => match accounts.first() {
                    Some(first) => {
                        session.apply_account(&format!("0x{first:040x}"));
                    }
                    None => {
                        session.clear_account();
                        prop_assert!(!session.is_connected());
                    }
                },
                Step::Balance(cents) => {
                    let stored = session.set_balance(Decimal::new(i64::from(cents), 2));
                    prop_assert_eq!(stored, session.is_connected());
                }
                Step::Disconnect => {
                    session.disconnect();
                    prop_assert!(session.chain_id().is_none());
                }
            }

            prop_assert_eq!(session.is_connected(), session.account().is_some());
            prop_assert!(session.balance().is_none() || session.is_connected());
        }
    }

    /// Re-applying the active account changes nothing.
    #[test]
    fn same_account_is_idempotent(index in 0u8..8, cents in any::<u32>()) {
        let account = format!("0x{index:040x}");
        let mut session = Session::new();
        prop_assert!(session.apply_account(&account));
        session.set_balance(Decimal::new(i64::from(cents), 2));
        let epoch = session.account_epoch();

        prop_assert!(!session.apply_account(&account));
        prop_assert_eq!(session.account_epoch(), epoch);
        prop_assert_eq!(session.balance(), Some(Decimal::new(i64::from(cents), 2)));
    }
}
