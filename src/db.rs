use chrono::{Datelike, Local};
use log::{debug, warn};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use crate::error::Result;
use crate::math;
use crate::model::{Client, Invoice, InvoiceItem, InvoiceStatus, Product};
use crate::settings::Settings;
use crate::sync::RemoteSnapshot;

const SETTINGS_KEY: &str = "app";

const INVOICE_COLUMNS: &str = "id, invoice_number, client_id, client_name, client_email, issue_date, due_date,
     items_json, subtotal, tax_rate, tax_amount, total, status, notes, created_at";

/// What a remote merge did. Invoices whose number already belongs to a
/// different local invoice are left out and listed in `skipped`.
#[derive(Debug, Default, PartialEq)]
pub struct MergeOutcome {
    pub merged: usize,
    pub skipped: Vec<String>,
}

/// Local storage for clients, products, invoices and settings.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute("PRAGMA foreign_keys = ON;", [])?;

        // 1. Clients
        conn.execute(
            "CREATE TABLE IF NOT EXISTS clients (
                id BLOB PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                phone TEXT,
                address TEXT,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        // 2. Products
        conn.execute(
            "CREATE TABLE IF NOT EXISTS products (
                id BLOB PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                price TEXT NOT NULL,
                category TEXT,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        // 3. Invoices. Client name/email are snapshots, so no foreign key.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS invoices (
                id BLOB PRIMARY KEY,
                invoice_number TEXT NOT NULL UNIQUE,
                client_id BLOB NOT NULL,
                client_name TEXT NOT NULL,
                client_email TEXT NOT NULL,
                issue_date TEXT NOT NULL,
                due_date TEXT NOT NULL,
                items_json TEXT NOT NULL,
                subtotal TEXT NOT NULL,
                tax_rate TEXT NOT NULL,
                tax_amount TEXT NOT NULL,
                total TEXT NOT NULL,
                status TEXT NOT NULL,
                notes TEXT,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        // 4. Settings
        conn.execute(
            "CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value_json TEXT NOT NULL
            )",
            [],
        )?;

        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // --- Clients ---

    pub fn upsert_client(&self, c: &Client) -> Result<()> {
        write_client(&self.conn(), c)
    }

    pub fn client(&self, id: Uuid) -> Result<Option<Client>> {
        let conn = self.conn();
        let client = conn
            .query_row(
                "SELECT id, name, email, phone, address, created_at FROM clients WHERE id = ?1",
                params![id],
                client_from_row,
            )
            .optional()?;
        Ok(client)
    }

    pub fn all_clients(&self) -> Result<Vec<Client>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, email, phone, address, created_at FROM clients ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt.query_map([], client_from_row)?;
        let mut result = Vec::new();
        for r in rows { result.push(r?); }
        Ok(result)
    }

    /// Returns whether a row was removed.
    pub fn delete_client(&self, id: Uuid) -> Result<bool> {
        let removed = self.conn().execute("DELETE FROM clients WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    // --- Products ---

    pub fn upsert_product(&self, p: &Product) -> Result<()> {
        write_product(&self.conn(), p)
    }

    pub fn product(&self, id: Uuid) -> Result<Option<Product>> {
        let conn = self.conn();
        let product = conn
            .query_row(
                "SELECT id, name, description, price, category, created_at FROM products WHERE id = ?1",
                params![id],
                product_from_row,
            )
            .optional()?;
        Ok(product)
    }

    pub fn all_products(&self) -> Result<Vec<Product>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, description, price, category, created_at FROM products ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt.query_map([], product_from_row)?;
        let mut result = Vec::new();
        for r in rows { result.push(r?); }
        Ok(result)
    }

    pub fn delete_product(&self, id: Uuid) -> Result<bool> {
        let removed = self.conn().execute("DELETE FROM products WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    // --- Invoices ---

    /// Inserts or replaces an invoice keeping the number it already carries.
    pub fn upsert_invoice(&self, inv: &Invoice) -> Result<()> {
        let conn = self.conn();
        write_invoice(&conn, inv)
    }

    /// Assigns the next `INV-<year>-<seq>` number and stores the invoice.
    ///
    /// Reading the existing numbers and inserting happen under one lock and
    /// one transaction, so handles sharing this database never hand out the
    /// same number twice.
    pub fn insert_invoice_numbered(&self, mut inv: Invoice) -> Result<Invoice> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let year = Local::now().year();
        let numbers: Vec<String> = {
            let mut stmt = tx.prepare("SELECT invoice_number FROM invoices WHERE invoice_number LIKE ?1")?;
            let rows = stmt.query_map(params![format!("INV-{}%", year)], |row| row.get(0))?;
            let mut result = Vec::new();
            for r in rows { result.push(r?); }
            result
        };
        inv.invoice_number = math::invoice_number_for_year(numbers.iter().map(String::as_str), year);

        write_invoice(&tx, &inv)?;
        tx.commit()?;
        debug!("stored invoice {} ({})", inv.invoice_number, inv.id);
        Ok(inv)
    }

    pub fn invoice(&self, id: Uuid) -> Result<Option<Invoice>> {
        let conn = self.conn();
        let invoice = conn
            .query_row(
                &format!("SELECT {} FROM invoices WHERE id = ?1", INVOICE_COLUMNS),
                params![id],
                invoice_from_row,
            )
            .optional()?;
        Ok(invoice)
    }

    pub fn all_invoices(&self) -> Result<Vec<Invoice>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM invoices ORDER BY created_at ASC, rowid ASC",
            INVOICE_COLUMNS
        ))?;
        let rows = stmt.query_map([], invoice_from_row)?;
        let mut result = Vec::new();
        for r in rows { result.push(r?); }
        Ok(result)
    }

    pub fn update_invoice_status(&self, id: Uuid, status: InvoiceStatus) -> Result<bool> {
        let updated = self.conn().execute(
            "UPDATE invoices SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?;
        Ok(updated > 0)
    }

    pub fn delete_invoice(&self, id: Uuid) -> Result<bool> {
        let removed = self.conn().execute("DELETE FROM invoices WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    /// Upserts a remote snapshot in one transaction: either every accepted
    /// record lands or none does. A remote invoice whose number is held by a
    /// different local invoice is skipped, since both numbers may already
    /// have been sent to customers.
    pub fn merge_snapshot(&self, snapshot: &RemoteSnapshot) -> Result<MergeOutcome> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut outcome = MergeOutcome::default();

        for c in &snapshot.clients {
            write_client(&tx, c)?;
            outcome.merged += 1;
        }
        for p in &snapshot.products {
            write_product(&tx, p)?;
            outcome.merged += 1;
        }
        for inv in &snapshot.invoices {
            let owner: Option<Uuid> = tx
                .query_row(
                    "SELECT id FROM invoices WHERE invoice_number = ?1",
                    params![inv.invoice_number],
                    |row| row.get(0),
                )
                .optional()?;
            if matches!(owner, Some(id) if id != inv.id) {
                warn!(
                    "skipping remote invoice {} ({}): number already used locally",
                    inv.invoice_number, inv.id
                );
                outcome.skipped.push(inv.invoice_number.clone());
                continue;
            }
            write_invoice(&tx, inv)?;
            outcome.merged += 1;
        }

        tx.commit()?;
        Ok(outcome)
    }

    // --- Settings ---

    /// Stored settings, or the defaults when none were saved yet.
    pub fn load_settings(&self) -> Result<Settings> {
        let conn = self.conn();
        let json: Option<String> = conn
            .query_row(
                "SELECT value_json FROM settings WHERE key = ?1",
                params![SETTINGS_KEY],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Settings::default()),
        }
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        let json = serde_json::to_string(settings)?;
        self.conn().execute(
            "INSERT INTO settings (key, value_json) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
            params![SETTINGS_KEY, json],
        )?;
        Ok(())
    }
}

fn write_client(conn: &Connection, c: &Client) -> Result<()> {
    conn.execute(
        "INSERT INTO clients (id, name, email, phone, address, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name, email = excluded.email,
            phone = excluded.phone, address = excluded.address",
        params![c.id, c.name, c.email, c.phone, c.address, c.created_at],
    )?;
    Ok(())
}

fn write_product(conn: &Connection, p: &Product) -> Result<()> {
    conn.execute(
        "INSERT INTO products (id, name, description, price, category, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name, description = excluded.description,
            price = excluded.price, category = excluded.category",
        params![p.id, p.name, p.description, p.price.to_string(), p.category, p.created_at],
    )?;
    Ok(())
}

fn write_invoice(conn: &Connection, inv: &Invoice) -> Result<()> {
    let items_json = serde_json::to_string(&inv.items)?;
    conn.execute(
        "INSERT INTO invoices (id, invoice_number, client_id, client_name, client_email, issue_date, due_date,
                               items_json, subtotal, tax_rate, tax_amount, total, status, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
         ON CONFLICT(id) DO UPDATE SET
            invoice_number = excluded.invoice_number, client_id = excluded.client_id,
            client_name = excluded.client_name, client_email = excluded.client_email,
            issue_date = excluded.issue_date, due_date = excluded.due_date,
            items_json = excluded.items_json, subtotal = excluded.subtotal,
            tax_rate = excluded.tax_rate, tax_amount = excluded.tax_amount,
            total = excluded.total, status = excluded.status, notes = excluded.notes",
        params![
            inv.id,
            inv.invoice_number,
            inv.client_id,
            inv.client_name,
            inv.client_email,
            inv.issue_date,
            inv.due_date,
            items_json,
            inv.subtotal.to_string(),
            inv.tax_rate.to_string(),
            inv.tax_amount.to_string(),
            inv.total.to_string(),
            inv.status.as_str(),
            inv.notes,
            inv.created_at,
        ],
    )?;
    Ok(())
}

fn conversion_failure<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

/// Decimals live in TEXT columns so they come back exactly as written.
fn decimal_at(row: &Row, idx: usize) -> rusqlite::Result<Decimal> {
    let text: String = row.get(idx)?;
    Decimal::from_str(&text).map_err(|e| conversion_failure(idx, e))
}

fn client_from_row(row: &Row) -> rusqlite::Result<Client> {
    Ok(Client {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        address: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn product_from_row(row: &Row) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        price: decimal_at(row, 3)?,
        category: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn invoice_from_row(row: &Row) -> rusqlite::Result<Invoice> {
    let items_json: String = row.get(7)?;
    let items: Vec<InvoiceItem> = serde_json::from_str(&items_json).map_err(|e| conversion_failure(7, e))?;
    let status: String = row.get(12)?;
    let status = InvoiceStatus::from_str(&status).map_err(|e| conversion_failure(12, e))?;

    Ok(Invoice {
        id: row.get(0)?,
        invoice_number: row.get(1)?,
        client_id: row.get(2)?,
        client_name: row.get(3)?,
        client_email: row.get(4)?,
        issue_date: row.get(5)?,
        due_date: row.get(6)?,
        items,
        subtotal: decimal_at(row, 8)?,
        tax_rate: decimal_at(row, 9)?,
        tax_amount: decimal_at(row, 10)?,
        total: decimal_at(row, 11)?,
        status,
        notes: row.get(13)?,
        created_at: row.get(14)?,
    })
}
