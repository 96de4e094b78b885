//! In-memory entity store for tests/dev.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use invoicer_core::{
    CustomerId, DomainError, DomainResult, Entity, EntityKind, InvoiceId, ItemId,
};
use invoicer_invoicing::{
    Customer, CustomerPatch, Invoice, InvoicePatch, InvoiceRecords, Item, ItemPatch, NewCustomer,
    NewInvoice, NewItem,
};

use super::{EntityStore, check_invoice_total};

#[derive(Debug, Default)]
struct Tables {
    customers: BTreeMap<CustomerId, Customer>,
    invoices: BTreeMap<InvoiceId, Invoice>,
    items: BTreeMap<ItemId, Item>,
    last_customer_id: i64,
    last_invoice_id: i64,
    last_item_id: i64,
}

impl Tables {
    fn next_customer_id(&mut self) -> CustomerId {
        self.last_customer_id += 1;
        CustomerId::new(self.last_customer_id)
    }

    fn next_invoice_id(&mut self) -> InvoiceId {
        self.last_invoice_id += 1;
        InvoiceId::new(self.last_invoice_id)
    }

    fn next_item_id(&mut self) -> ItemId {
        self.last_item_id += 1;
        ItemId::new(self.last_item_id)
    }

    fn email_taken(&self, email: &str, except: Option<CustomerId>) -> bool {
        self.customers
            .values()
            .any(|c| c.email == email && Some(c.id) != except)
    }

    fn invoice_ids_of(&self, customer_id: CustomerId) -> Vec<InvoiceId> {
        self.invoices
            .values()
            .filter(|i| i.customer_id == customer_id)
            .map(|i| i.id)
            .collect()
    }

    fn items_of(&self, invoice_id: InvoiceId) -> Vec<Item> {
        self.items
            .values()
            .filter(|i| i.invoice_id == invoice_id)
            .cloned()
            .collect()
    }

    fn remove_invoice_cascade(&mut self, invoice_id: InvoiceId) {
        self.items.retain(|_, item| item.invoice_id != invoice_id);
        self.invoices.remove(&invoice_id);
    }
}

fn fetch<E: Entity + Clone>(table: &BTreeMap<E::Id, E>, id: E::Id) -> DomainResult<E> {
    table
        .get(&id)
        .cloned()
        .ok_or_else(|| DomainError::not_found(E::KIND, id))
}

fn fetch_mut<E: Entity>(table: &mut BTreeMap<E::Id, E>, id: E::Id) -> DomainResult<&mut E> {
    table
        .get_mut(&id)
        .ok_or_else(|| DomainError::not_found(E::KIND, id))
}

fn duplicate_email(email: &str) -> DomainError {
    DomainError::validation(format!("email '{email}' is already in use"))
}

/// In-memory store.
///
/// A single lock guards all three tables and is held for the whole
/// operation, so cascades and multi-row inserts are atomic to readers.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> DomainResult<RwLockReadGuard<'_, Tables>> {
        self.inner
            .read()
            .map_err(|_| DomainError::storage("in-memory store lock poisoned"))
    }

    fn write(&self) -> DomainResult<RwLockWriteGuard<'_, Tables>> {
        self.inner
            .write()
            .map_err(|_| DomainError::storage("in-memory store lock poisoned"))
    }
}

#[async_trait]
impl EntityStore for InMemoryStore {
    async fn create_customer(&self, input: NewCustomer) -> DomainResult<Customer> {
        let input = input.validated()?;
        let mut t = self.write()?;
        if t.email_taken(&input.email, None) {
            return Err(duplicate_email(&input.email));
        }
        let id = t.next_customer_id();
        let customer = input.into_customer(id);
        t.customers.insert(id, customer.clone());
        Ok(customer)
    }

    async fn get_customer(&self, id: CustomerId) -> DomainResult<Customer> {
        fetch(&self.read()?.customers, id)
    }

    async fn list_customers(&self) -> DomainResult<Vec<Customer>> {
        Ok(self.read()?.customers.values().cloned().collect())
    }

    async fn update_customer(
        &self,
        id: CustomerId,
        patch: CustomerPatch,
    ) -> DomainResult<Customer> {
        let patch = patch.validated()?;
        let mut t = self.write()?;
        fetch(&t.customers, id)?;
        if let Some(email) = &patch.email {
            if t.email_taken(email, Some(id)) {
                return Err(duplicate_email(email));
            }
        }
        let customer = fetch_mut(&mut t.customers, id)?;
        patch.apply_to(customer);
        Ok(customer.clone())
    }

    async fn delete_customer(&self, id: CustomerId, cascade: bool) -> DomainResult<()> {
        let mut t = self.write()?;
        fetch(&t.customers, id)?;
        let invoice_ids = t.invoice_ids_of(id);
        if !cascade && !invoice_ids.is_empty() {
            return Err(DomainError::validation(format!(
                "customer {id} still has {} invoice(s)",
                invoice_ids.len()
            )));
        }
        for invoice_id in invoice_ids {
            t.remove_invoice_cascade(invoice_id);
        }
        t.customers.remove(&id);
        Ok(())
    }

    async fn create_invoice(&self, input: NewInvoice) -> DomainResult<Invoice> {
        let input = input.validated()?;
        let mut t = self.write()?;
        if !t.customers.contains_key(&input.customer_id) {
            return Err(DomainError::validation(format!(
                "customer {} does not exist",
                input.customer_id
            )));
        }

        let id = t.next_invoice_id();
        let invoice = Invoice {
            id,
            customer_id: input.customer_id,
            date: input.date_or_today(),
        };
        t.invoices.insert(id, invoice.clone());
        for line in input.items {
            let item_id = t.next_item_id();
            t.items.insert(item_id, line.into_item(item_id, id));
        }
        Ok(invoice)
    }

    async fn get_invoice(&self, id: InvoiceId) -> DomainResult<Invoice> {
        fetch(&self.read()?.invoices, id)
    }

    async fn list_invoices(&self) -> DomainResult<Vec<Invoice>> {
        Ok(self.read()?.invoices.values().cloned().collect())
    }

    async fn update_invoice(&self, id: InvoiceId, patch: InvoicePatch) -> DomainResult<Invoice> {
        let mut t = self.write()?;
        fetch(&t.invoices, id)?;
        if let Some(customer_id) = patch.customer_id {
            if !t.customers.contains_key(&customer_id) {
                return Err(DomainError::validation(format!(
                    "customer {customer_id} does not exist"
                )));
            }
        }
        let invoice = fetch_mut(&mut t.invoices, id)?;
        patch.apply_to(invoice);
        Ok(invoice.clone())
    }

    async fn delete_invoice(&self, id: InvoiceId, cascade: bool) -> DomainResult<()> {
        let mut t = self.write()?;
        fetch(&t.invoices, id)?;
        if !cascade && t.items.values().any(|i| i.invoice_id == id) {
            return Err(DomainError::validation(format!("invoice {id} still has items")));
        }
        t.remove_invoice_cascade(id);
        Ok(())
    }

    async fn create_item(&self, input: NewItem) -> DomainResult<Item> {
        let input = input.validated()?;
        let mut t = self.write()?;
        if !t.invoices.contains_key(&input.invoice_id) {
            return Err(DomainError::validation(format!(
                "invoice {} does not exist",
                input.invoice_id
            )));
        }
        check_invoice_total(&t.items_of(input.invoice_id), input.line.amount())?;
        let id = t.next_item_id();
        let item = input.line.into_item(id, input.invoice_id);
        t.items.insert(id, item.clone());
        Ok(item)
    }

    async fn get_item(&self, id: ItemId) -> DomainResult<Item> {
        fetch(&self.read()?.items, id)
    }

    async fn list_items(&self) -> DomainResult<Vec<Item>> {
        Ok(self.read()?.items.values().cloned().collect())
    }

    async fn update_item(&self, id: ItemId, patch: ItemPatch) -> DomainResult<Item> {
        let patch = patch.validated()?;
        let mut t = self.write()?;
        let mut item = fetch(&t.items, id)?;
        patch.apply_to(&mut item);
        let others = t.items_of(item.invoice_id);
        check_invoice_total(others.iter().filter(|i| i.id != id), item.amount())?;
        t.items.insert(id, item.clone());
        Ok(item)
    }

    async fn delete_item(&self, id: ItemId) -> DomainResult<()> {
        let mut t = self.write()?;
        t.items
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DomainError::not_found(EntityKind::Item, id))
    }

    async fn list_items_for_invoice(&self, invoice_id: InvoiceId) -> DomainResult<Vec<Item>> {
        let t = self.read()?;
        fetch(&t.invoices, invoice_id)?;
        Ok(t.items_of(invoice_id))
    }

    async fn load_invoice_records(&self, id: InvoiceId) -> DomainResult<Option<InvoiceRecords>> {
        let t = self.read()?;
        let Some(invoice) = t.invoices.get(&id).cloned() else {
            return Ok(None);
        };
        Ok(Some(InvoiceRecords {
            customer: t.customers.get(&invoice.customer_id).cloned(),
            items: t.items_of(id),
            invoice,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    store_contract_tests!(async { InMemoryStore::new() });

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_all_succeed() {
        crate::store::contract::concurrent_writers_all_succeed(std::sync::Arc::new(
            InMemoryStore::new(),
        ))
        .await;
    }

    #[tokio::test]
    async fn poisoned_lock_surfaces_as_storage_error() {
        let store = std::sync::Arc::new(InMemoryStore::new());
        let s = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = s.inner.write().unwrap();
            panic!("poison");
        })
        .join();

        let err = store.list_customers().await.unwrap_err();
        assert!(matches!(err, DomainError::Storage(_)));
    }
}
