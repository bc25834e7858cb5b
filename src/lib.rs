//! Local-first invoicing: clients, products, invoice composition and the
//! dashboard figures derived from the invoice collection.

pub mod composer;
pub mod db;
pub mod error;
pub mod ledger;
pub mod math;
pub mod model;
pub mod settings;
pub mod stats;
pub mod sync;
pub mod voice;

pub use composer::InvoiceDraft;
pub use db::{Database, MergeOutcome};
pub use error::{LedgerError, Result};
pub use ledger::Ledger;
pub use math::{compute_totals, generate_invoice_number, InvoiceTotals};
pub use model::{Client, DashboardStats, Invoice, InvoiceItem, InvoiceStatus, Product};
pub use stats::compute_dashboard_stats;
