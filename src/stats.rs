//! Dashboard statistics derived from the full invoice collection.

use chrono::{Datelike, Local, Months, NaiveDate};
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::math::{round_currency, saturating_sum};
use crate::model::{DashboardStats, Invoice, InvoiceStatus, MonthlyRevenue, TopProduct};

pub const TOP_PRODUCT_LIMIT: usize = 5;
pub const TREND_MONTHS: u32 = 6;

/// Recomputes the dashboard snapshot with the trend ending at today's month.
pub fn compute_dashboard_stats(invoices: &[Invoice]) -> DashboardStats {
    compute_dashboard_stats_as_of(invoices, Local::now().date_naive())
}

/// Pure core of [`compute_dashboard_stats`]; `today` picks the last trend month.
///
/// Drafts count nowhere. Paid invoices feed revenue, top products and the
/// trend; sent and overdue invoices feed the pending figures.
pub fn compute_dashboard_stats_as_of(invoices: &[Invoice], today: NaiveDate) -> DashboardStats {
    let paid: Vec<&Invoice> = invoices
        .iter()
        .filter(|inv| inv.status == InvoiceStatus::Paid)
        .collect();
    let pending: Vec<&Invoice> = invoices.iter().filter(|inv| inv.status.is_pending()).collect();

    let total_revenue = saturating_sum(paid.iter().map(|inv| inv.total));
    let pending_amount = saturating_sum(pending.iter().map(|inv| inv.total));

    DashboardStats {
        total_revenue: round_currency(total_revenue),
        pending_amount: round_currency(pending_amount),
        paid_invoices: paid.len(),
        pending_invoices: pending.len(),
        top_products: top_products(&paid),
        monthly_revenue: monthly_revenue(&paid, today),
    }
}

/// Groups paid line items by product name. Custom lines with the same text
/// pool together with each other and with catalog lines of that name.
fn top_products(paid: &[&Invoice]) -> Vec<TopProduct> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<TopProduct> = Vec::new();

    for item in paid.iter().flat_map(|inv| inv.items.iter()) {
        let slot = *index.entry(item.product_name.as_str()).or_insert_with(|| {
            groups.push(TopProduct {
                name: item.product_name.clone(),
                revenue: Decimal::ZERO,
                quantity: 0,
            });
            groups.len() - 1
        });
        let group = &mut groups[slot];
        group.revenue = group.revenue.saturating_add(item.total());
        group.quantity = group.quantity.saturating_add(u64::from(item.quantity()));
    }

    // stable: equal revenue keeps first-seen order
    groups.sort_by(|a, b| b.revenue.cmp(&a.revenue));
    groups.truncate(TOP_PRODUCT_LIMIT);
    groups
}

/// One bucket per calendar month, oldest first, ending with `today`'s month.
fn monthly_revenue(paid: &[&Invoice], today: NaiveDate) -> Vec<MonthlyRevenue> {
    let current = today.with_day(1).unwrap_or(today);

    (0..TREND_MONTHS)
        .rev()
        .filter_map(|offset| current.checked_sub_months(Months::new(offset)))
        .map(|month| {
            let revenue = saturating_sum(
                paid.iter()
                    .filter(|inv| {
                        inv.issue_date.year() == month.year() && inv.issue_date.month() == month.month()
                    })
                    .map(|inv| inv.total),
            );
            MonthlyRevenue {
                month: month.format("%b %Y").to_string(),
                revenue,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::compute_totals;
    use crate::model::InvoiceItem;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn invoice(status: InvoiceStatus, issued: NaiveDate, items: Vec<InvoiceItem>) -> Invoice {
        let totals = compute_totals(&items, Decimal::ZERO);
        Invoice {
            id: Uuid::new_v4(),
            invoice_number: "INV-2025-0001".into(),
            client_id: Uuid::new_v4(),
            client_name: "Acme".into(),
            client_email: "billing@acme.test".into(),
            issue_date: issued,
            due_date: issued,
            items,
            subtotal: totals.subtotal,
            tax_rate: Decimal::ZERO,
            tax_amount: totals.tax_amount,
            total: totals.total,
            status,
            notes: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_collection_yields_zeroes_and_six_empty_months() {
        let stats = compute_dashboard_stats_as_of(&[], date(2025, 3, 15));

        assert_eq!(stats.total_revenue, Decimal::ZERO);
        assert_eq!(stats.pending_amount, Decimal::ZERO);
        assert_eq!(stats.paid_invoices, 0);
        assert_eq!(stats.pending_invoices, 0);
        assert!(stats.top_products.is_empty());
        assert_eq!(stats.monthly_revenue.len(), 6);
        assert!(stats.monthly_revenue.iter().all(|m| m.revenue.is_zero()));
    }

    #[test]
    fn trend_labels_cross_the_year_boundary() {
        let stats = compute_dashboard_stats_as_of(&[], date(2025, 2, 28));
        let labels: Vec<&str> = stats.monthly_revenue.iter().map(|m| m.month.as_str()).collect();
        assert_eq!(labels, ["Sep 2024", "Oct 2024", "Nov 2024", "Dec 2024", "Jan 2025", "Feb 2025"]);
    }

    #[test]
    fn statuses_partition_revenue_and_counts() {
        let today = date(2025, 6, 10);
        let invoices = vec![
            invoice(InvoiceStatus::Paid, today, vec![InvoiceItem::custom("A", 1, dec!(100.10))]),
            invoice(InvoiceStatus::Paid, today, vec![InvoiceItem::custom("B", 2, dec!(50))]),
            invoice(InvoiceStatus::Sent, today, vec![InvoiceItem::custom("C", 1, dec!(40))]),
            invoice(InvoiceStatus::Overdue, today, vec![InvoiceItem::custom("D", 1, dec!(2.5))]),
            invoice(InvoiceStatus::Draft, today, vec![InvoiceItem::custom("E", 1, dec!(999))]),
        ];
        let stats = compute_dashboard_stats_as_of(&invoices, today);

        assert_eq!(stats.total_revenue, dec!(200.10));
        assert_eq!(stats.pending_amount, dec!(42.50));
        assert_eq!(stats.paid_invoices, 2);
        assert_eq!(stats.pending_invoices, 2);
        assert!(stats.top_products.iter().all(|p| p.name != "E" && p.name != "C"));
    }

    #[test]
    fn products_with_the_same_name_pool_together() {
        let today = date(2025, 6, 10);
        let invoices = vec![
            invoice(InvoiceStatus::Paid, today, vec![InvoiceItem::custom("Consulting", 1, dec!(100))]),
            invoice(InvoiceStatus::Paid, today, vec![InvoiceItem::custom("Consulting", 3, dec!(50))]),
        ];
        let stats = compute_dashboard_stats_as_of(&invoices, today);

        assert_eq!(
            stats.top_products,
            vec![TopProduct { name: "Consulting".into(), revenue: dec!(250), quantity: 4 }]
        );
    }

    #[test]
    fn top_products_are_ranked_and_capped() {
        let today = date(2025, 6, 10);
        let items = vec![
            InvoiceItem::custom("p1", 1, dec!(10)),
            InvoiceItem::custom("p2", 1, dec!(60)),
            InvoiceItem::custom("p3", 1, dec!(30)),
            InvoiceItem::custom("p4", 1, dec!(30)),
            InvoiceItem::custom("p5", 1, dec!(5)),
            InvoiceItem::custom("p6", 1, dec!(70)),
            InvoiceItem::custom("p7", 1, dec!(1)),
        ];
        let stats = compute_dashboard_stats_as_of(&[invoice(InvoiceStatus::Paid, today, items)], today);

        let names: Vec<&str> = stats.top_products.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["p6", "p2", "p3", "p4", "p1"]);
        assert!(stats.top_products.windows(2).all(|w| w[0].revenue >= w[1].revenue));
    }

    #[test]
    fn trend_buckets_paid_invoices_by_issue_month() {
        let today = date(2025, 6, 10);
        let invoices = vec![
            invoice(InvoiceStatus::Paid, date(2025, 6, 1), vec![InvoiceItem::custom("x", 1, dec!(10))]),
            invoice(InvoiceStatus::Paid, date(2025, 6, 30), vec![InvoiceItem::custom("x", 1, dec!(5))]),
            invoice(InvoiceStatus::Paid, date(2025, 1, 15), vec![InvoiceItem::custom("x", 1, dec!(7))]),
            invoice(InvoiceStatus::Paid, date(2024, 6, 15), vec![InvoiceItem::custom("x", 1, dec!(99))]),
            invoice(InvoiceStatus::Paid, date(2024, 12, 31), vec![InvoiceItem::custom("x", 1, dec!(99))]),
            invoice(InvoiceStatus::Sent, date(2025, 3, 3), vec![InvoiceItem::custom("x", 1, dec!(99))]),
        ];
        let stats = compute_dashboard_stats_as_of(&invoices, today);

        let trend: Vec<(&str, Decimal)> = stats
            .monthly_revenue
            .iter()
            .map(|m| (m.month.as_str(), m.revenue))
            .collect();
        assert_eq!(
            trend,
            vec![
                ("Jan 2025", dec!(7)),
                ("Feb 2025", dec!(0)),
                ("Mar 2025", dec!(0)),
                ("Apr 2025", dec!(0)),
                ("May 2025", dec!(0)),
                ("Jun 2025", dec!(15)),
            ]
        );
    }

    #[test]
    fn huge_paid_totals_clamp_instead_of_overflowing() {
        let today = date(2025, 6, 10);
        let invoices = vec![
            invoice(InvoiceStatus::Paid, today, vec![InvoiceItem::custom("big", 1, Decimal::MAX)]),
            invoice(InvoiceStatus::Paid, today, vec![InvoiceItem::custom("big", 1, Decimal::MAX)]),
        ];
        let stats = compute_dashboard_stats_as_of(&invoices, today);

        assert_eq!(stats.total_revenue, Decimal::MAX);
        assert_eq!(stats.top_products[0].revenue, Decimal::MAX);
        assert_eq!(stats.monthly_revenue[5].revenue, Decimal::MAX);
    }

    #[test]
    fn recomputing_is_idempotent() {
        let today = date(2025, 6, 10);
        let invoices = vec![
            invoice(InvoiceStatus::Paid, today, vec![InvoiceItem::custom("a", 2, dec!(3.333))]),
            invoice(InvoiceStatus::Overdue, today, vec![InvoiceItem::custom("b", 1, dec!(8))]),
        ];
        let before = invoices.clone();

        let first = compute_dashboard_stats_as_of(&invoices, today);
        let second = compute_dashboard_stats_as_of(&invoices, today);
        assert_eq!(first, second);
        assert_eq!(invoices, before);
    }

    #[test]
    fn current_date_wrapper_always_has_six_months() {
        assert_eq!(compute_dashboard_stats(&[]).monthly_revenue.len(), 6);
    }
}
