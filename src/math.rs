//! Invoice arithmetic: line totals, invoice totals and invoice numbering.

use chrono::{Datelike, Local};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::model::{Invoice, InvoiceItem};

const CURRENCY_DP: u32 = 2;

/// Subtotal, tax and total of an invoice, each rounded to cents on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceTotals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
}

/// Rounds to cents, half away from zero.
pub fn round_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(CURRENCY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Unrounded line total. Rounding only happens at invoice level.
///
/// Saturates at `Decimal::MAX`/`Decimal::MIN` instead of overflowing.
pub fn item_total(quantity: u32, unit_price: Decimal) -> Decimal {
    Decimal::from(quantity).saturating_mul(unit_price)
}

/// Sum that saturates at the `Decimal` bounds.
pub fn saturating_sum<I>(values: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    values.into_iter().fold(Decimal::ZERO, Decimal::saturating_add)
}

/// Computes invoice totals from the stored item totals.
///
/// The three outputs are rounded independently from the unrounded sums, so
/// `total` can differ by 0.01 from `subtotal + tax_amount`. Inputs are not
/// validated here; a negative rate simply yields a negative tax, and sums
/// past the `Decimal` range clamp to its bounds.
pub fn compute_totals(items: &[InvoiceItem], tax_rate: Decimal) -> InvoiceTotals {
    let subtotal = saturating_sum(items.iter().map(InvoiceItem::total));
    let tax_amount = subtotal.saturating_mul(tax_rate);
    let total = subtotal.saturating_add(tax_amount);

    InvoiceTotals {
        subtotal: round_currency(subtotal),
        tax_amount: round_currency(tax_amount),
        total: round_currency(total),
    }
}

/// Next invoice number for the current local year.
///
/// Not safe for concurrent writers on its own: two callers reading the same
/// collection get the same number. `Database::insert_invoice_numbered` runs
/// this under the connection lock.
pub fn generate_invoice_number(existing: &[Invoice]) -> String {
    let year = Local::now().year();
    invoice_number_for_year(existing.iter().map(|inv| inv.invoice_number.as_str()), year)
}

/// Formats `INV-<year>-<seq>` where `seq` is one past the highest sequence
/// already used for `year`, starting at 1.
pub fn invoice_number_for_year<'a, I>(existing_numbers: I, year: i32) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let prefix = format!("INV-{}", year);
    // Sequences stay decimal strings so no stored value can overflow the count.
    let highest = existing_numbers
        .into_iter()
        .filter(|num| num.starts_with(&prefix))
        .map(sequence_of)
        .max_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
        .unwrap_or("");

    format!("INV-{}-{:0>4}", year, increment(highest))
}

/// Leading digits of the third dash-separated segment without leading
/// zeros. Empty means 0, which covers segments with no digits at all.
fn sequence_of(number: &str) -> &str {
    let segment = number.split('-').nth(2).unwrap_or("");
    let digits_end = segment
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(segment.len());
    segment[..digits_end].trim_start_matches('0')
}

/// Adds one to a string of ASCII digits ("" reads as 0).
fn increment(digits: &str) -> String {
    let mut out: Vec<u8> = digits.bytes().collect();
    for d in out.iter_mut().rev() {
        if *d == b'9' {
            *d = b'0';
        } else {
            *d += 1;
            return String::from_utf8_lossy(&out).into_owned();
        }
    }
    out.insert(0, b'1');
    String::from_utf8_lossy(&out).into_owned()
}
