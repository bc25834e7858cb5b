use log::{debug, info, warn};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::composer::InvoiceDraft;
use crate::db::{Database, MergeOutcome};
use crate::error::{LedgerError, Result};
use crate::math;
use crate::model::{Client, DashboardStats, Invoice, InvoiceStatus, Product};
use crate::settings::Settings;
use crate::stats;
use crate::sync::{RemoteStore, SyncHandle};
use crate::voice::{self, VoiceCommand};

/// The application state: local storage, current settings and, when
/// configured, the remote mirror. Every mutation is written locally first and
/// then pushed to the mirror.
pub struct Ledger {
    db: Database,
    settings: Settings,
    remote: Option<SyncHandle>,
}

impl Ledger {
    pub fn new(db: Database) -> Result<Self> {
        let settings = db.load_settings()?;
        Ok(Ledger { db, settings, remote: None })
    }

    /// Attaches a remote store when the settings carry a remote section.
    /// Returns whether sync is now active.
    pub fn with_remote(&mut self, store: Box<dyn RemoteStore>) -> Result<bool> {
        match &self.settings.remote {
            Some(remote) => {
                self.remote = Some(SyncHandle::initialize(remote, store)?);
                Ok(true)
            }
            None => {
                debug!("no remote configured, staying local");
                Ok(false)
            }
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn update_settings(&mut self, settings: Settings) -> Result<()> {
        settings.validate()?;
        self.db.save_settings(&settings)?;
        // a handle is bound to the endpoint it was built for
        if settings.remote != self.settings.remote && self.remote.take().is_some() {
            match &settings.remote {
                Some(remote) => info!("remote changed to {}, reattach to resume sync", remote.url),
                None => info!("remote sync disabled"),
            }
        }
        self.settings = settings;
        Ok(())
    }

    // --- Clients ---

    pub fn clients(&self) -> Result<Vec<Client>> {
        self.db.all_clients()
    }

    pub fn add_client(&self, client: Client) -> Result<Client> {
        validate_client(&client)?;
        self.db.upsert_client(&client)?;
        info!("added client {}", client.name);
        self.push_clients()?;
        Ok(client)
    }

    pub fn update_client(&self, client: Client) -> Result<Client> {
        validate_client(&client)?;
        if self.db.client(client.id)?.is_none() {
            return Err(LedgerError::not_found("client", client.id));
        }
        self.db.upsert_client(&client)?;
        self.push_clients()?;
        Ok(client)
    }

    pub fn delete_client(&self, id: Uuid) -> Result<()> {
        if !self.db.delete_client(id)? {
            return Err(LedgerError::not_found("client", id));
        }
        info!("deleted client {}", id);
        Ok(())
    }

    // --- Products ---

    pub fn products(&self) -> Result<Vec<Product>> {
        self.db.all_products()
    }

    pub fn add_product(&self, product: Product) -> Result<Product> {
        validate_product(&product)?;
        self.db.upsert_product(&product)?;
        info!("added product {} at {}", product.name, product.price);
        self.push_products()?;
        Ok(product)
    }

    pub fn update_product(&self, product: Product) -> Result<Product> {
        validate_product(&product)?;
        if self.db.product(product.id)?.is_none() {
            return Err(LedgerError::not_found("product", product.id));
        }
        self.db.upsert_product(&product)?;
        self.push_products()?;
        Ok(product)
    }

    pub fn delete_product(&self, id: Uuid) -> Result<()> {
        if !self.db.delete_product(id)? {
            return Err(LedgerError::not_found("product", id));
        }
        info!("deleted product {}", id);
        Ok(())
    }

    // --- Invoices ---

    pub fn invoices(&self) -> Result<Vec<Invoice>> {
        self.db.all_invoices()
    }

    pub fn new_draft(&self) -> InvoiceDraft {
        InvoiceDraft::new()
    }

    /// Number the next saved invoice would get. Informational only: the
    /// number is assigned again when the invoice is stored.
    pub fn next_invoice_number(&self) -> Result<String> {
        Ok(math::generate_invoice_number(&self.db.all_invoices()?))
    }

    /// Live totals for a draft at the configured tax rate.
    pub fn draft_totals(&self, draft: &InvoiceDraft) -> math::InvoiceTotals {
        draft.totals(self.settings.tax_rate)
    }

    /// Parses dictated text into the draft, storing any client it had to create.
    pub fn apply_voice_command(&self, draft: &mut InvoiceDraft, text: &str) -> Result<VoiceCommand> {
        let cmd = voice::parse_voice_command(text);
        if let Some(client) = draft.apply_voice_command(&cmd, &self.db.all_clients()?) {
            // dictated clients have no email yet, so they skip form validation
            self.db.upsert_client(&client)?;
            info!("created client {} from voice command", client.name);
            self.push_clients()?;
        }
        Ok(cmd)
    }

    /// Validates and stores the draft with the next free invoice number.
    pub fn save_invoice(&self, draft: &InvoiceDraft) -> Result<Invoice> {
        let invoice = draft.finalize(String::new(), self.settings.tax_rate)?;
        let invoice = self.db.insert_invoice_numbered(invoice)?;
        info!(
            "saved invoice {} for {} totalling {}",
            invoice.invoice_number, invoice.client_name, invoice.total
        );
        self.push_invoices()?;
        Ok(invoice)
    }

    pub fn set_invoice_status(&self, id: Uuid, status: InvoiceStatus) -> Result<()> {
        if !self.db.update_invoice_status(id, status)? {
            return Err(LedgerError::not_found("invoice", id));
        }
        info!("invoice {} marked {}", id, status);
        self.push_invoices()
    }

    pub fn delete_invoice(&self, id: Uuid) -> Result<()> {
        if !self.db.delete_invoice(id)? {
            return Err(LedgerError::not_found("invoice", id));
        }
        info!("deleted invoice {}", id);
        Ok(())
    }

    /// Rebuilds the dashboard from every stored invoice.
    pub fn dashboard(&self) -> Result<DashboardStats> {
        let invoices = self.db.all_invoices()?;
        let stats = stats::compute_dashboard_stats(&invoices);
        debug!(
            "dashboard over {} invoices: revenue {}, pending {}",
            invoices.len(),
            stats.total_revenue,
            stats.pending_amount
        );
        Ok(stats)
    }

    /// Copies every remote record into local storage in one transaction,
    /// replacing local records with the same id. Remote invoices whose
    /// number is already taken by another local invoice are skipped.
    pub fn pull_remote(&self) -> Result<MergeOutcome> {
        let Some(remote) = &self.remote else {
            return Ok(MergeOutcome::default());
        };
        let snapshot = remote.pull()?;
        let outcome = self.db.merge_snapshot(&snapshot)?;
        info!(
            "pulled {} records from {} ({} skipped)",
            outcome.merged,
            remote.endpoint(),
            outcome.skipped.len()
        );
        Ok(outcome)
    }

    fn push_clients(&self) -> Result<()> {
        if let Some(remote) = &self.remote {
            remote.push_clients(&self.db.all_clients()?);
        }
        Ok(())
    }

    fn push_products(&self) -> Result<()> {
        if let Some(remote) = &self.remote {
            remote.push_products(&self.db.all_products()?);
        }
        Ok(())
    }

    fn push_invoices(&self) -> Result<()> {
        if let Some(remote) = &self.remote {
            remote.push_invoices(&self.db.all_invoices()?);
        }
        Ok(())
    }
}

fn validate_client(client: &Client) -> Result<()> {
    if client.name.trim().is_empty() || client.email.trim().is_empty() {
        warn!("rejected client without name or email");
        return Err(LedgerError::validation("client name and email are required"));
    }
    Ok(())
}

fn validate_product(product: &Product) -> Result<()> {
    if product.name.trim().is_empty() || product.price <= Decimal::ZERO {
        warn!("rejected product '{}' priced {}", product.name, product.price);
        return Err(LedgerError::validation("product name and a positive price are required"));
    }
    Ok(())
}
