//! Property-based tests for line arithmetic, number formatting and page
//! geometry.
//!
//! Run with: `cargo test --test proptest_tests`

use invoice_forge::amounts::{InvoiceTotals, LineAmounts};
use invoice_forge::fit::{scan_item_count, HeightPolicy, PageGeometry};
use invoice_forge::format::{format_number, MONEY_DECIMALS};
use invoice_forge::LineItem;
use proptest::prelude::*;

fn item(qty: f64, price: f64, discount: f64, vat: f64, rate: f64) -> LineItem {
    LineItem {
        description: "Item".into(),
        quantity: qty,
        uom: "Pcs".into(),
        price_aed: price,
        discount_pct: discount,
        vat_pct: vat,
        rate_usd: rate,
    }
}

// ── Proptest Strategies ─────────────────────────────────────────────────────

/// A price between 0.01 and 99,999.99 AED.
fn arb_price() -> impl Strategy<Value = f64> {
    (1u64..10_000_000u64).prop_map(|fils| fils as f64 / 100.0)
}

/// A quantity with up to three decimals, below 1,000.
fn arb_quantity() -> impl Strategy<Value = f64> {
    (0u64..1_000_000u64).prop_map(|m| m as f64 / 1000.0)
}

fn arb_item() -> impl Strategy<Value = LineItem> {
    (
        arb_quantity(),
        arb_price(),
        0.0f64..=100.0,
        prop_oneof![Just(0.0), Just(5.0), 0.0f64..30.0],
        prop_oneof![Just(0.0), 0.5f64..10.0],
    )
        .prop_map(|(q, p, d, v, r)| item(q, p, d, v, r))
}

fn strip_grouping(s: &str) -> String {
    s.replace(',', "")
}

proptest! {
    #[test]
    fn zero_rate_gives_zero_usd(q in arb_quantity(), p in arb_price(), d in 0.0f64..=100.0) {
        let a = LineAmounts::compute(&item(q, p, d, 5.0, 0.0));
        prop_assert_eq!(a.amount_usd, 0.0);
    }

    #[test]
    fn incl_minus_excl_is_vat(it in arb_item()) {
        let a = LineAmounts::compute(&it);
        let tolerance = 1e-9 * a.amount_incl_vat.abs().max(1.0);
        prop_assert!((a.amount_incl_vat - a.amount_excl_vat - a.vat).abs() <= tolerance);
    }

    #[test]
    fn total_aed_is_sum_of_lines(items in prop::collection::vec(arb_item(), 1..20)) {
        let totals = InvoiceTotals::of(&items);
        let sum = items
            .iter()
            .map(|i| LineAmounts::compute(i).amount_incl_vat)
            .fold(0.0, |acc, v| acc + v);
        prop_assert_eq!(
            format_number(sum, MONEY_DECIMALS),
            format_number(totals.total_aed, MONEY_DECIMALS)
        );
    }

    #[test]
    fn discount_never_exceeds_gross(it in arb_item()) {
        let a = LineAmounts::compute(&it);
        prop_assert!(a.discount <= a.gross + 1e-9);
        prop_assert!(a.amount_excl_vat >= -1e-9);
    }

    #[test]
    fn formatting_matches_plain_fixed_point(v in -1e9f64..1e9, decimals in 0usize..7) {
        let formatted = format_number(v, decimals);
        prop_assert_eq!(strip_grouping(&formatted), format!("{v:.decimals$}"));
    }

    #[test]
    fn grouping_is_every_three_digits(v in 0f64..1e12) {
        let formatted = format_number(v, 2);
        let int_part = formatted.split('.').next().unwrap_or_default();
        let groups: Vec<&str> = int_part.split(',').collect();
        prop_assert!(!groups[0].is_empty() && groups[0].len() <= 3);
        for g in &groups[1..] {
            prop_assert_eq!(g.len(), 3);
        }
    }

    #[test]
    fn rows_plus_one_give_item_count(n in 1usize..40) {
        let rows: String = (0..=n).map(|i| format!("<tr><td>{i}</td></tr>")).collect();
        let markup = format!("<table><tbody>{rows}</tbody></table>");
        prop_assert_eq!(scan_item_count(&markup), n);
    }

    #[test]
    fn page_height_is_linear_in_items(n in 1usize..200, base in 100.0f32..500.0, per in 1.0f32..60.0) {
        let policy = HeightPolicy { base_height_mm: base, item_height_mm: per };
        let g = PageGeometry::new(n, policy);
        prop_assert_eq!(g.page_height_mm, base + n as f32 * per);
        prop_assert_eq!(g.page_width_mm, 400.0);
    }
}

// ── Edge cases ──────────────────────────────────────────────────────────────

#[test]
fn formatting_examples() {
    assert_eq!(format_number(2.0, 3), "2.000");
    assert_eq!(format_number(5.0, 0), "5");
    assert_eq!(format_number(3.6725, 6), "3.672500");
    assert_eq!(format_number(12_600.0, 2), "12,600.00");
    assert_eq!(format_number(1_234_567.891, 2), "1,234,567.89");
}

#[test]
fn empty_table_counts_one_item() {
    assert_eq!(scan_item_count("<table><tbody></tbody></table>"), 1);
}
