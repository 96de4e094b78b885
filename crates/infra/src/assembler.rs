//! Builds invoice aggregates from store snapshots.

use std::sync::Arc;

use tracing::{instrument, warn};

use invoicer_core::{DomainError, DomainResult, EntityKind, InvoiceId};
use invoicer_invoicing::InvoiceAggregate;

use crate::store::EntityStore;

/// Read-side composer over an [`EntityStore`].
///
/// Each aggregate comes from one `load_invoice_records` snapshot, so a
/// concurrent delete either shows up whole or not at all.
#[derive(Clone)]
pub struct Assembler {
    store: Arc<dyn EntityStore>,
}

impl Assembler {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Invoice `id` with its customer and items.
    ///
    /// A missing invoice, or one whose customer row is gone, is `NotFound`.
    #[instrument(skip(self), err)]
    pub async fn assemble(&self, id: InvoiceId) -> DomainResult<InvoiceAggregate> {
        let records = self
            .store
            .load_invoice_records(id)
            .await?
            .ok_or_else(|| DomainError::not_found(EntityKind::Invoice, id))?;

        InvoiceAggregate::from_records(records).inspect_err(|err| {
            if err.is_not_found() {
                warn!(invoice_id = %id, "invoice references a missing customer");
            }
        })
    }

    /// Every invoice in id order.
    ///
    /// Invoices removed between listing and loading, or orphaned from their
    /// customer, are skipped.
    #[instrument(skip(self), err)]
    pub async fn assemble_all(&self) -> DomainResult<Vec<InvoiceAggregate>> {
        let invoices = self.store.list_invoices().await?;
        let mut out = Vec::with_capacity(invoices.len());

        for invoice in invoices {
            let Some(records) = self.store.load_invoice_records(invoice.id).await? else {
                continue;
            };
            match InvoiceAggregate::from_records(records) {
                Ok(aggregate) => out.push(aggregate),
                Err(err) if err.is_not_found() => {
                    warn!(invoice_id = %invoice.id, "skipping invoice with missing customer");
                }
                Err(err) => return Err(err),
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use invoicer_invoicing::{Decimal, LineItemInput, NewCustomer, NewInvoice};

    async fn seeded() -> (Arc<InMemoryStore>, Assembler) {
        let store = Arc::new(InMemoryStore::new());
        let assembler = Assembler::new(store.clone());
        (store, assembler)
    }

    #[tokio::test]
    async fn assembles_customer_items_and_total() {
        let (store, assembler) = seeded().await;
        let c = store
            .create_customer(NewCustomer::new("Acme", "billing@acme.test"))
            .await
            .unwrap();
        let inv = store
            .create_invoice(
                NewInvoice::new(c.id)
                    .with_item(LineItemInput::new("Widget", 1, Decimal::new(999, 2)))
                    .with_item(LineItemInput::new("Gadget", 2, Decimal::new(150, 2))),
            )
            .await
            .unwrap();

        let agg = assembler.assemble(inv.id).await.unwrap();
        assert_eq!(agg.customer, c);
        assert_eq!(agg.items.len(), 2);
        assert_eq!(agg.items[0].description, "Widget");
        assert_eq!(agg.total().unwrap(), Decimal::new(1299, 2));
    }

    #[tokio::test]
    async fn unknown_invoice_is_not_found() {
        let (_store, assembler) = seeded().await;
        let err = assembler.assemble(InvoiceId::new(42)).await.unwrap_err();
        assert_eq!(err, DomainError::not_found(EntityKind::Invoice, InvoiceId::new(42)));
    }

    #[tokio::test]
    async fn deleted_invoice_disappears_from_listing() {
        let (store, assembler) = seeded().await;
        let c = store
            .create_customer(NewCustomer::new("Acme", "billing@acme.test"))
            .await
            .unwrap();
        let keep = store.create_invoice(NewInvoice::new(c.id)).await.unwrap();
        let drop = store.create_invoice(NewInvoice::new(c.id)).await.unwrap();
        store.delete_invoice(drop.id, true).await.unwrap();

        let all = assembler.assemble_all().await.unwrap();
        let ids: Vec<InvoiceId> = all.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![keep.id]);
    }

    #[tokio::test]
    async fn listing_is_in_id_order() {
        let (store, assembler) = seeded().await;
        let a = store
            .create_customer(NewCustomer::new("A", "a@x.com"))
            .await
            .unwrap();
        let b = store
            .create_customer(NewCustomer::new("B", "b@x.com"))
            .await
            .unwrap();
        for customer in [b.id, a.id, b.id] {
            store.create_invoice(NewInvoice::new(customer)).await.unwrap();
        }

        let all = assembler.assemble_all().await.unwrap();
        let ids: Vec<i64> = all.iter().map(|a| a.id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(all[1].customer.name, "A");
    }
}
