//! Invoice compositor – turns an [`InvoiceRecord`] and an
//! [`OrganizationProfile`] into a self-contained HTML document.
//!
//! The document inlines its stylesheet and logo, so it can be written to
//! disk, opened in a browser, or handed straight to
//! [`crate::fit::render_document`]. Layout, column order and row order are
//! fixed: existing invoices are compared against this exact structure.

use crate::amounts::{InvoiceTotals, LineAmounts};
use crate::error::Result;
use crate::format::{
    format_number, MONEY_DECIMALS, QUANTITY_DECIMALS, RATE_DECIMALS, VAT_PCT_DECIMALS,
};
use crate::model::{InvoiceRecord, LineItem};
use crate::profile::OrganizationProfile;

/// Attribute on `<tbody>` carrying the number of billable rows.
pub const ITEM_COUNT_ATTR: &str = "data-item-count";

/// A finished invoice document. Created once by [`compose`] and never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDocument {
    markup: String,
    item_count: usize,
    totals: InvoiceTotals,
    invoice_number: String,
}

impl RenderedDocument {
    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn into_markup(self) -> String {
        self.markup
    }

    /// Number of line items written into the items table.
    pub fn item_count(&self) -> usize {
        self.item_count
    }

    /// Unformatted totals accumulated while the rows were written.
    pub fn totals(&self) -> &InvoiceTotals {
        &self.totals
    }

    pub fn invoice_number(&self) -> &str {
        &self.invoice_number
    }
}

/// Composes documents for one organization.
#[derive(Debug, Clone, Copy)]
pub struct Compositor<'a> {
    profile: &'a OrganizationProfile,
}

impl<'a> Compositor<'a> {
    pub fn new(profile: &'a OrganizationProfile) -> Self {
        Self { profile }
    }

    /// Validate `record` and assemble its document.
    ///
    /// Nothing is produced when validation fails.
    pub fn compose(&self, record: &InvoiceRecord) -> Result<RenderedDocument> {
        record.validate()?;

        let (rows, totals) = item_rows(&record.items);
        let markup = self.assemble(record, &rows, &totals);

        log::debug!(
            "Composed invoice {} ({} items, {} bytes)",
            record.invoice.number,
            record.items.len(),
            markup.len()
        );

        Ok(RenderedDocument {
            markup,
            item_count: record.items.len(),
            totals,
            invoice_number: record.invoice.number.clone(),
        })
    }

    fn assemble(&self, record: &InvoiceRecord, rows: &str, totals: &InvoiceTotals) -> String {
        let company = &self.profile.company;
        let bank = &self.profile.bank;
        let logo = &self.profile.logo;
        let meta = &record.invoice;
        let to = &record.issued_to;
        let terms = &record.terms;
        let item_count = record.items.len();
        let money = |v: f64| format_number(v, MONEY_DECIMALS);

        format!(
            r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>TAX INVOICE</title>
  <style>
{STYLESHEET}  </style>
</head>
<body>
  <div class="page">
    <!-- Header -->
    <div class="header">
      <div>
        <div class="title">TAX INVOICE</div>
        <div class="meta">
          <div><strong># {number}</strong></div>
          <div><strong>Date of Issuing:</strong> {issued}</div>
          <div><strong>Date of Supply:</strong> {supplied}</div>
        </div>
      </div>
      <img class="logo" src="{logo_src}" alt="{logo_text}" />
    </div>

    <!-- Issued By / Issued To -->
    <div class="grid-2">
      <div class="box">
        <div class="box-title">Issued By:</div>
        <div class="box-body">
          <div><strong>{company_name}</strong></div>
          <div><span class="label">Address:</span> {company_address}</div>
          <div><span class="label">TRN:</span> {company_trn}</div>
          <div><span class="label">Tel.:</span> {company_tel}</div>
          <div><span class="label">E-mail:</span> {company_email}</div>
        </div>
      </div>
      <div class="box">
        <div class="box-title">Issued To:</div>
        <div class="box-body">
          <div><strong>{to_name}</strong></div>
          <div><span class="label">Address:</span> {to_address}</div>
          <div><span class="label">TRN:</span> {to_trn}</div>
          <div><span class="label">Tel.:</span> {to_tel}</div>
          <div><span class="label">E-mail:</span> {to_email}</div>
        </div>
      </div>
    </div>

    <!-- Bank details / Payment terms -->
    <div class="box-slim">
      <div class="box">
        <div class="box-title">Bank Details:</div>
        <div class="box-body">
          <div><strong>{bank_name}</strong></div>
          <div><span class="label">IBAN:</span> {iban}</div>
          <div><span class="label">SWIFT:</span> {swift}</div>
          <div><span class="label">Beneficiary:</span> {beneficiary}</div>
        </div>
      </div>
      <div class="box">
        <div class="box-title">Payment and Delivery Terms:</div>
        <div class="box-body">
          <div><strong>Payment Terms:</strong> {payment_terms}</div>
          <div style="margin-top:4px;"><strong>Delivery Terms:</strong> {delivery_terms}</div>
        </div>
      </div>
    </div>

    <!-- Items table -->
    <table class="items">
      <thead>
        <tr>
          <th class="w-20">#</th>
          <th>Description</th>
          <th>Quantity</th>
          <th>UOM</th>
          <th>Price<br/>(Excl. VAT),<br/>AED</th>
          <th>Discount,<br/>%</th>
          <th>Amount<br/>(Excl. VAT),<br/>AED</th>
          <th>VAT,<br/>%</th>
          <th>VAT<br/>Amount,<br/>AED</th>
          <th>Amount<br/>(Incl. VAT),<br/>AED</th>
          <th>Rate,<br/>USD</th>
          <th>Amount<br/>(Incl. VAT),<br/>USD</th>
        </tr>
      </thead>
      <tbody {ITEM_COUNT_ATTR}="{item_count}">
{rows}
      </tbody>
    </table>

    <div class="supply-total"><span class="label-wide">TOTAL OF SUPPLY:</span> {supply_total}</div>

    <!-- Totals -->
    <div class="totals-row">
      <div></div>
      <table class="totals">
        <tr><td>Total Discount, AED:</td><td>{total_discount}</td></tr>
        <tr><td>Sub Total, AED:</td><td>{sub_total}</td></tr>
        <tr><td>Total VAT, AED:</td><td>{total_vat}</td></tr>
        <tr><td>Total, AED:</td><td>{total_aed}</td></tr>
        <tr><td>Total, USD:</td><td>{total_usd}</td></tr>
      </table>
    </div>

    <!-- Footer signatures -->
    <div class="footer">
      <div class="sign-block">
        <div class="sign-title">Released By</div>
        <div class="stamp" aria-hidden="true"></div>
      </div>
      <div class="sign-block">
        <div class="sign-title">Received By</div>
      </div>
    </div>
  </div>
</body>
</html>
"##,
            number = meta.number,
            issued = meta.date_of_issuing,
            supplied = meta.date_of_supply,
            logo_src = logo.src,
            logo_text = logo.text,
            company_name = company.company_name,
            company_address = company.address,
            company_trn = company.trn,
            company_tel = company.tel,
            company_email = company.email,
            to_name = to.name,
            to_address = to.address,
            to_trn = to.trn,
            to_tel = to.tel,
            to_email = to.email,
            bank_name = bank.bank_name,
            iban = bank.iban,
            swift = bank.swift,
            beneficiary = bank.beneficiary,
            payment_terms = terms.payment_terms,
            delivery_terms = terms.delivery_terms,
            supply_total = record.supply_total_text,
            total_discount = money(totals.discount),
            sub_total = money(totals.sub_total),
            total_vat = money(totals.vat),
            total_aed = money(totals.total_aed),
            total_usd = money(totals.total_usd),
        )
    }
}

/// Compose `record` for the organization described by `profile`.
pub fn compose(record: &InvoiceRecord, profile: &OrganizationProfile) -> Result<RenderedDocument> {
    Compositor::new(profile).compose(record)
}

/// One `<tr>` per item plus the running totals, in a single pass.
fn item_rows(items: &[LineItem]) -> (String, InvoiceTotals) {
    let mut totals = InvoiceTotals::default();
    let mut rows = Vec::with_capacity(items.len());

    for (idx, item) in items.iter().enumerate() {
        let a = LineAmounts::compute(item);
        totals.add(&a);
        rows.push(item_row(idx + 1, item, &a));
    }
    (rows.join("\n"), totals)
}

fn item_row(position: usize, item: &LineItem, a: &LineAmounts) -> String {
    let money = |v: f64| format_number(v, MONEY_DECIMALS);
    format!(
        r#"        <tr>
          <td class="center">{position}</td>
          <td>{description}</td>
          <td class="center">{quantity}</td>
          <td class="center">{uom}</td>
          <td class="right">{price}</td>
          <td class="right">{discount_pct}</td>
          <td class="right">{amount_excl}</td>
          <td class="center">{vat_pct}</td>
          <td class="right">{vat}</td>
          <td class="right">{amount_incl}</td>
          <td class="right">{rate}</td>
          <td class="right">{amount_usd}</td>
        </tr>"#,
        description = item.description,
        quantity = format_number(item.quantity, QUANTITY_DECIMALS),
        uom = item.uom,
        price = money(item.price_aed),
        discount_pct = money(item.discount_pct),
        amount_excl = money(a.amount_excl_vat),
        vat_pct = format_number(item.vat_pct, VAT_PCT_DECIMALS),
        vat = money(a.vat),
        amount_incl = money(a.amount_incl_vat),
        rate = format_number(item.rate_usd, RATE_DECIMALS),
        amount_usd = money(a.amount_usd),
    )
}

/// Inlined stylesheet. Sizes are print units; the `@page` rule is the
/// document's own default and is overridden by the page-fitting renderer.
const STYLESHEET: &str = r#"    * { box-sizing: border-box; }
    html, body { height: 100%; }
    body {
      margin: 0;
      font-family: Arial, Helvetica, sans-serif;
      color: #000;
      background: #fff;
    }

    @page { size: 370mm 290mm; margin: 10mm; }
    @media print {
      body { -webkit-print-color-adjust: exact; print-color-adjust: exact; }
      .page { box-shadow: none; margin: 0; }
    }

    .page {
      width: 350mm;
      min-height: 185mm;
      margin: 10mm auto;
      padding: 6mm 8mm;
      background: #fff;
      box-shadow: 0 0 0.5mm rgba(0,0,0,.15);
      border: 1px solid #dcdcdc;
    }

    .header { display: grid; grid-template-columns: 1fr auto; align-items: start; }
    .title { font-size: 20pt; font-weight: 700; letter-spacing: 0.3pt; }
    .logo { height: 42px; opacity: 0.9; }

    .meta { margin-top: 4px; font-size: 10.5pt; line-height: 1.4; }
    .meta strong { font-weight: 700; }

    .grid-2 { display: grid; grid-template-columns: 1fr 1fr; gap: 6px; margin-top: 10px; }
    .box { border: 1px solid #9ea3a8; }
    .box .box-title { background: #e9edf2; border-bottom: 1px solid #9ea3a8; padding: 6px 8px; font-weight: 700; font-size: 10pt; }
    .box .box-body { padding: 8px; font-size: 10pt; line-height: 1.45; }
    .label { width: 82px; display: inline-block; font-weight: 700; }

    .box-slim { display: grid; grid-template-columns: 1fr 1fr; gap: 6px; margin-top: 6px; }

    .items { margin-top: 10px; border: 1px solid #9ea3a8; border-collapse: separate; border-spacing: 0; width: 100%; font-size: 10pt; }
    .items th, .items td { border-right: 1px solid #9ea3a8; border-bottom: 1px solid #9ea3a8; padding: 6px; vertical-align: top; }
    .items th:last-child, .items td:last-child { border-right: 0; }
    .items thead th { background: #e9edf2; font-weight: 700; text-align: center; }
    .items tbody td { background: #fff; }
    .items .center { text-align: center; }
    .items .right { text-align: right; white-space: nowrap; }

    .supply-total { border: 1px solid #9ea3a8; border-top: 0; padding: 6px; font-size: 10pt; }
    .supply-total .label-wide { font-weight: 700; }

    .totals-row { display: grid; grid-template-columns: 1.4fr 1fr; gap: 8px; margin-top: 6px; }
    .totals { margin-left: auto; width: 100%; border: 1px solid #9ea3a8; border-collapse: separate; border-spacing: 0; font-size: 10pt; }
    .totals td { padding: 6px; border-bottom: 1px solid #9ea3a8; }
    .totals tr:last-child td { border-bottom: 0; }
    .totals td:first-child { background: #e9edf2; font-weight: 700; width: 55%; }
    .totals td:last-child { text-align: right; white-space: nowrap; }

    .footer { margin-top: 18mm; display: grid; grid-template-columns: 1fr 1fr; gap: 8px; align-items: end; }
    .sign-block { min-height: 28mm; border-top: 1px solid #9ea3a8; padding-top: 4mm; position: relative; }
    .sign-title { position: absolute; top: -11mm; font-weight: 700; font-size: 10pt; }
    .stamp {
      position: absolute; left: 28mm; top: -10mm; width: 38mm; height: 38mm; border-radius: 50%; border: 2px solid #1a6fb4; opacity: .25;
    }

    .muted { color: #444; }
    .nowrap { white-space: nowrap; }
    .w-20 { width: 20mm; }
"#;
