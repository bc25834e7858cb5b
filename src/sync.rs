//! Optional mirror of the local collections in a remote store.
//!
//! There is no process-wide client: the caller initializes a [`SyncHandle`]
//! from the remote settings and passes it to whoever needs it.

use log::{info, warn};

use crate::error::{LedgerError, Result};
use crate::model::{Client, Invoice, Product};
use crate::settings::RemoteSettings;

/// Backend the local collections are mirrored to. Upserts are keyed by id.
pub trait RemoteStore: Send {
    fn upsert_clients(&self, clients: &[Client]) -> Result<()>;
    fn upsert_products(&self, products: &[Product]) -> Result<()>;
    fn upsert_invoices(&self, invoices: &[Invoice]) -> Result<()>;

    fn load_clients(&self) -> Result<Vec<Client>>;
    fn load_products(&self) -> Result<Vec<Product>>;
    fn load_invoices(&self) -> Result<Vec<Invoice>>;
}

/// Everything the remote currently holds.
#[derive(Debug, Default)]
pub struct RemoteSnapshot {
    pub clients: Vec<Client>,
    pub products: Vec<Product>,
    pub invoices: Vec<Invoice>,
}

pub struct SyncHandle {
    endpoint: String,
    store: Box<dyn RemoteStore>,
}

impl SyncHandle {
    pub fn initialize(remote: &RemoteSettings, store: Box<dyn RemoteStore>) -> Result<Self> {
        if remote.url.trim().is_empty() {
            return Err(LedgerError::Sync("remote url is empty".into()));
        }
        info!("remote sync enabled for {}", remote.url);
        Ok(SyncHandle {
            endpoint: remote.url.clone(),
            store,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    // Push failures are logged and dropped: the local write already succeeded.

    pub fn push_clients(&self, clients: &[Client]) {
        if let Err(e) = self.store.upsert_clients(clients) {
            warn!("error syncing clients to {}: {}", self.endpoint, e);
        }
    }

    pub fn push_products(&self, products: &[Product]) {
        if let Err(e) = self.store.upsert_products(products) {
            warn!("error syncing products to {}: {}", self.endpoint, e);
        }
    }

    pub fn push_invoices(&self, invoices: &[Invoice]) {
        if let Err(e) = self.store.upsert_invoices(invoices) {
            warn!("error syncing invoices to {}: {}", self.endpoint, e);
        }
    }

    pub fn pull(&self) -> Result<RemoteSnapshot> {
        Ok(RemoteSnapshot {
            clients: self.store.load_clients()?,
            products: self.store.load_products()?,
            invoices: self.store.load_invoices()?,
        })
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    /// In-process store shared between a test and the handle it feeds.
    #[derive(Clone, Default)]
    pub(crate) struct MemoryStore {
        pub clients: Arc<Mutex<Vec<Client>>>,
        pub products: Arc<Mutex<Vec<Product>>>,
        pub invoices: Arc<Mutex<Vec<Invoice>>>,
        pub offline: Arc<AtomicBool>,
    }

    fn upsert<T: Clone>(dest: &Mutex<Vec<T>>, src: &[T], id: impl Fn(&T) -> uuid::Uuid) {
        let mut dest = dest.lock().unwrap();
        for record in src {
            match dest.iter_mut().find(|r| id(&**r) == id(record)) {
                Some(slot) => *slot = record.clone(),
                None => dest.push(record.clone()),
            }
        }
    }

    impl MemoryStore {
        fn check(&self) -> Result<()> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(LedgerError::Sync("offline".into()));
            }
            Ok(())
        }
    }

    impl RemoteStore for MemoryStore {
        fn upsert_clients(&self, clients: &[Client]) -> Result<()> {
            self.check()?;
            upsert(&self.clients, clients, |c| c.id);
            Ok(())
        }

        fn upsert_products(&self, products: &[Product]) -> Result<()> {
            self.check()?;
            upsert(&self.products, products, |p| p.id);
            Ok(())
        }

        fn upsert_invoices(&self, invoices: &[Invoice]) -> Result<()> {
            self.check()?;
            upsert(&self.invoices, invoices, |i| i.id);
            Ok(())
        }

        fn load_clients(&self) -> Result<Vec<Client>> {
            self.check()?;
            Ok(self.clients.lock().unwrap().clone())
        }

        fn load_products(&self) -> Result<Vec<Product>> {
            self.check()?;
            Ok(self.products.lock().unwrap().clone())
        }

        fn load_invoices(&self) -> Result<Vec<Invoice>> {
            self.check()?;
            Ok(self.invoices.lock().unwrap().clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryStore;
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::atomic::Ordering;

    fn remote() -> RemoteSettings {
        RemoteSettings { url: "https://mirror.example".into(), api_key: "key".into() }
    }

    #[test]
    fn empty_url_is_rejected() {
        let settings = RemoteSettings { url: "".into(), api_key: "key".into() };
        assert!(SyncHandle::initialize(&settings, Box::new(MemoryStore::default())).is_err());
    }

    #[test]
    fn pushes_are_upserts_by_id() {
        let store = MemoryStore::default();
        let handle = SyncHandle::initialize(&remote(), Box::new(store.clone())).unwrap();

        let mut product = Product::new("Hosting", dec!(10));
        handle.push_products(&[product.clone()]);
        product.price = dec!(12);
        handle.push_products(&[product.clone()]);

        assert_eq!(*store.products.lock().unwrap(), vec![product]);
        assert_eq!(handle.endpoint(), "https://mirror.example");
    }

    #[test]
    fn offline_push_is_swallowed_but_pull_fails() {
        let store = MemoryStore::default();
        store.offline.store(true, Ordering::SeqCst);
        let handle = SyncHandle::initialize(&remote(), Box::new(store.clone())).unwrap();

        handle.push_clients(&[Client::new("Acme", "a@acme.test")]);
        assert!(store.clients.lock().unwrap().is_empty());
        assert!(matches!(handle.pull(), Err(LedgerError::Sync(_))));
    }
}
