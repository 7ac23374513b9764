//! Fixed-decimal, thousands-separated number formatting.
//!
//! The decimal places per invoice column are part of the document format:
//! existing invoices and any visual diffing depend on them, so they live
//! here as named constants rather than at the call sites.

/// Decimal places for the quantity column.
pub const QUANTITY_DECIMALS: usize = 3;
/// Decimal places for prices, discount %, amounts and totals.
pub const MONEY_DECIMALS: usize = 2;
/// Decimal places for the VAT % column.
pub const VAT_PCT_DECIMALS: usize = 0;
/// Decimal places for the AED → USD rate column.
pub const RATE_DECIMALS: usize = 6;

/// Format `value` with `decimals` fixed places and `,` grouping of the
/// integer part, e.g. `12600.0` with 2 places → `"12,600.00"`.
///
/// Rounding is the correctly rounded decimal expansion of the binary value
/// (ties to even), and negative zero keeps its sign.
pub fn format_number(value: f64, decimals: usize) -> String {
    let raw = format!("{value:.decimals$}");
    let (sign, unsigned) = match raw.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", raw.as_str()),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };
    // inf / NaN have no digits to group
    if !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return raw;
    }

    let mut out = String::with_capacity(raw.len() + int_part.len() / 3);
    out.push_str(sign);
    out.push_str(&group_thousands(int_part));
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut grouped = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_precisions() {
        assert_eq!(format_number(2.0, QUANTITY_DECIMALS), "2.000");
        assert_eq!(format_number(5.0, VAT_PCT_DECIMALS), "5");
        assert_eq!(format_number(3.6725, RATE_DECIMALS), "3.672500");
        assert_eq!(format_number(10.0, MONEY_DECIMALS), "10.00");
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(format_number(12600.0, 2), "12,600.00");
        assert_eq!(format_number(999.999, 2), "1,000.00");
        assert_eq!(format_number(1234567.891, 3), "1,234,567.891");
        assert_eq!(format_number(100.0, 0), "100");
        assert_eq!(format_number(0.0, 2), "0.00");
    }

    #[test]
    fn negative_values_keep_sign_outside_grouping() {
        assert_eq!(format_number(-1234.5, 2), "-1,234.50");
        assert_eq!(format_number(-0.0, 2), "-0.00");
    }

    #[test]
    fn non_finite_values_pass_through() {
        assert_eq!(format_number(f64::INFINITY, 2), "inf");
        assert_eq!(format_number(f64::NAN, 2), "NaN");
    }
}
