use chrono::{Days, Local, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{LedgerError, Result};
use crate::math::{self, InvoiceTotals};
use crate::model::{Client, Invoice, InvoiceItem, InvoiceStatus, Product};
use crate::voice::VoiceCommand;

pub const DEFAULT_PAYMENT_TERM_DAYS: u64 = 30;

/// An invoice being put together. Line edits go through the draft so item
/// totals never go stale, and `totals` gives the live figures for display.
#[derive(Debug, Clone)]
pub struct InvoiceDraft {
    client: Option<Client>,
    items: Vec<InvoiceItem>,
    pub notes: Option<String>,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
}

impl Default for InvoiceDraft {
    fn default() -> Self {
        InvoiceDraft::issued_on(Local::now().date_naive())
    }
}

impl InvoiceDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issued_on(issue_date: NaiveDate) -> Self {
        InvoiceDraft {
            client: None,
            items: Vec::new(),
            notes: None,
            issue_date,
            due_date: issue_date + Days::new(DEFAULT_PAYMENT_TERM_DAYS),
        }
    }

    pub fn select_client(&mut self, client: Client) {
        self.client = Some(client);
    }

    pub fn client(&self) -> Option<&Client> {
        self.client.as_ref()
    }

    pub fn items(&self) -> &[InvoiceItem] {
        &self.items
    }

    /// Appends an empty line (quantity 1, price 0) to be filled in.
    pub fn add_blank_item(&mut self) -> usize {
        self.add_item(InvoiceItem::custom(String::new(), 1, Decimal::ZERO))
    }

    pub fn add_item(&mut self, item: InvoiceItem) -> usize {
        self.items.push(item);
        self.items.len() - 1
    }

    pub fn set_item_product(&mut self, index: usize, product: &Product) -> Result<()> {
        self.item_mut(index)?.apply_product(product);
        Ok(())
    }

    pub fn set_item_name(&mut self, index: usize, name: impl Into<String>) -> Result<()> {
        self.item_mut(index)?.product_name = name.into();
        Ok(())
    }

    pub fn set_item_quantity(&mut self, index: usize, quantity: u32) -> Result<()> {
        self.item_mut(index)?.set_quantity(quantity);
        Ok(())
    }

    pub fn set_item_price(&mut self, index: usize, unit_price: Decimal) -> Result<()> {
        self.item_mut(index)?.set_unit_price(unit_price);
        Ok(())
    }

    pub fn remove_item(&mut self, index: usize) -> Result<InvoiceItem> {
        if index >= self.items.len() {
            return Err(LedgerError::not_found("line item", index));
        }
        Ok(self.items.remove(index))
    }

    pub fn totals(&self, tax_rate: Decimal) -> InvoiceTotals {
        math::compute_totals(&self.items, tax_rate)
    }

    /// Applies a parsed voice command. The client name is matched
    /// case-insensitively as a substring of `clients`; when nothing matches a
    /// new client is returned so the caller can store it. A non-zero amount
    /// together with a description becomes a custom line.
    pub fn apply_voice_command(&mut self, cmd: &VoiceCommand, clients: &[Client]) -> Option<Client> {
        let mut created = None;

        if let Some(spoken) = &cmd.client {
            let needle = spoken.to_lowercase();
            let client = match clients.iter().find(|c| c.name.to_lowercase().contains(&needle)) {
                Some(existing) => existing.clone(),
                None => {
                    let client = Client::new(spoken.clone(), String::new());
                    created = Some(client.clone());
                    client
                }
            };
            self.select_client(client);
        }

        let amount = cmd.amount.filter(|a| !a.is_zero());
        if let (Some(amount), Some(description)) = (amount, &cmd.description) {
            self.add_item(InvoiceItem::custom(description.clone(), 1, amount));
        }

        created
    }

    /// Turns the draft into a draft-status invoice. Fails unless a client is
    /// selected, there is at least one line and no price is negative.
    pub fn finalize(&self, invoice_number: String, tax_rate: Decimal) -> Result<Invoice> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| LedgerError::validation("select a client before saving"))?;
        if self.items.is_empty() {
            return Err(LedgerError::validation("add at least one item before saving"));
        }
        if let Some(item) = self.items.iter().find(|i| i.unit_price() < Decimal::ZERO) {
            return Err(LedgerError::validation(format!(
                "unit price of '{}' is negative",
                item.product_name
            )));
        }

        let totals = self.totals(tax_rate);
        Ok(Invoice {
            id: Uuid::new_v4(),
            invoice_number,
            client_id: client.id,
            client_name: client.name.clone(),
            client_email: client.email.clone(),
            issue_date: self.issue_date,
            due_date: self.due_date,
            items: self.items.clone(),
            subtotal: totals.subtotal,
            tax_rate,
            tax_amount: totals.tax_amount,
            total: totals.total,
            status: InvoiceStatus::Draft,
            notes: self.notes.clone().filter(|n| !n.trim().is_empty()),
            created_at: Utc::now(),
        })
    }

    fn item_mut(&mut self, index: usize) -> Result<&mut InvoiceItem> {
        self.items
            .get_mut(index)
            .ok_or_else(|| LedgerError::not_found("line item", index))
    }
}
