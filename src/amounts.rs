//! Per-line financial calculation and invoice totals.
//!
//! All arithmetic is plain `f64` in a fixed evaluation order; totals are
//! accumulated in item order so the rounded output is reproducible bit for
//! bit across runs.

use serde::Serialize;

use crate::model::LineItem;

/// Values derived from a single [`LineItem`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LineAmounts {
    pub gross: f64,
    pub discount: f64,
    pub amount_excl_vat: f64,
    pub vat: f64,
    pub amount_incl_vat: f64,
    pub amount_usd: f64,
}

impl LineAmounts {
    pub fn compute(item: &LineItem) -> Self {
        let gross = item.price_aed * item.quantity;
        let discount = gross * (item.discount_pct / 100.0);
        let amount_excl_vat = gross - discount;
        let vat = amount_excl_vat * (item.vat_pct / 100.0);
        let amount_incl_vat = amount_excl_vat + vat;
        // A zero (unset) rate yields no USD amount rather than infinity.
        let amount_usd = if item.rate_usd > 0.0 {
            amount_incl_vat / item.rate_usd
        } else {
            0.0
        };
        Self {
            gross,
            discount,
            amount_excl_vat,
            vat,
            amount_incl_vat,
            amount_usd,
        }
    }
}

/// Running sums over all lines of an invoice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct InvoiceTotals {
    pub discount: f64,
    pub sub_total: f64,
    pub vat: f64,
    pub total_aed: f64,
    pub total_usd: f64,
}

impl InvoiceTotals {
    pub fn add(&mut self, line: &LineAmounts) {
        self.discount += line.discount;
        self.sub_total += line.amount_excl_vat;
        self.vat += line.vat;
        self.total_aed += line.amount_incl_vat;
        self.total_usd += line.amount_usd;
    }

    /// Totals for `items`, accumulated in order.
    pub fn of(items: &[LineItem]) -> Self {
        let mut totals = Self::default();
        for item in items {
            totals.add(&LineAmounts::compute(item));
        }
        totals
    }
}
