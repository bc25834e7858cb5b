use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::LedgerError;
use crate::math;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Client {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Client {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            phone: None,
            address: None,
            created_at: Utc::now(),
        }
    }
}

/// A catalog entry. Its price is copied onto a line item when the product is
/// picked, so later price changes never rewrite saved invoices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Product {
    pub fn new(name: impl Into<String>, price: Decimal) -> Self {
        Product {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            price,
            category: None,
            created_at: Utc::now(),
        }
    }
}

/// One line of an invoice.
///
/// `total` is stored rather than derived on read, so quantity, unit price and
/// total are private and every setter recomputes the total in the same call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_name: String,
    quantity: u32,
    unit_price: Decimal,
    total: Decimal,
}

impl InvoiceItem {
    /// Free-text line with no catalog reference.
    pub fn custom(name: impl Into<String>, quantity: u32, unit_price: Decimal) -> Self {
        InvoiceItem {
            id: Uuid::new_v4(),
            product_id: None,
            product_name: name.into(),
            quantity,
            unit_price,
            total: math::item_total(quantity, unit_price),
        }
    }

    pub fn from_product(product: &Product, quantity: u32) -> Self {
        let mut item = InvoiceItem::custom(String::new(), quantity, Decimal::ZERO);
        item.apply_product(product);
        item
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    pub fn total(&self) -> Decimal {
        self.total
    }

    pub fn set_quantity(&mut self, quantity: u32) {
        self.quantity = quantity;
        self.touch();
    }

    pub fn set_unit_price(&mut self, unit_price: Decimal) {
        self.unit_price = unit_price;
        self.touch();
    }

    /// Points the line at a catalog product, taking over its name and price.
    pub fn apply_product(&mut self, product: &Product) {
        self.product_id = Some(product.id);
        self.product_name = product.name.clone();
        self.unit_price = product.price;
        self.touch();
    }

    fn touch(&mut self) {
        self.total = math::item_total(self.quantity, self.unit_price);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
        }
    }

    /// Sent and overdue invoices are money still owed.
    pub fn is_pending(&self) -> bool {
        matches!(self, InvoiceStatus::Sent | InvoiceStatus::Overdue)
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(InvoiceStatus::Draft),
            "sent" => Ok(InvoiceStatus::Sent),
            "paid" => Ok(InvoiceStatus::Paid),
            "overdue" => Ok(InvoiceStatus::Overdue),
            other => Err(LedgerError::validation(format!("unknown invoice status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub invoice_number: String,
    pub client_id: Uuid,
    pub client_name: String,
    pub client_email: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub items: Vec<InvoiceItem>,
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub status: InvoiceStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopProduct {
    pub name: String,
    pub revenue: Decimal,
    pub quantity: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyRevenue {
    /// Short month name and year, e.g. "Jan 2025".
    pub month: String,
    pub revenue: Decimal,
}

/// Snapshot rendered by the dashboard. Always rebuilt from the full invoice
/// collection, never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_revenue: Decimal,
    pub pending_amount: Decimal,
    pub paid_invoices: usize,
    pub pending_invoices: usize,
    pub top_products: Vec<TopProduct>,
    pub monthly_revenue: Vec<MonthlyRevenue>,
}
