//! Entity storage: customers, invoices and items with cascading deletes.
//!
//! ## Contract
//!
//! - `create_*` validates its input and returns the stored record with a
//!   generated id. Missing/blank fields, a duplicate email, or a reference to a
//!   parent that does not exist fail with `DomainError::Validation`.
//! - `get_*`, `update_*`, `delete_*` fail with `DomainError::NotFound` when the
//!   addressed record does not exist.
//! - `delete_*(id, cascade)` removes dependents in the same transaction when
//!   `cascade` is set, and refuses with `Validation` when it is not and
//!   dependents exist.
//! - An item write that would push its invoice total outside the decimal
//!   range fails with `Validation` and changes nothing.
//! - Generated ids increase monotonically per entity kind, so ascending id
//!   order is creation order.
//!
//! Backends must be safe to share across concurrent requests; multi-row
//! writes (cascades, invoice + initial items) are atomic with respect to
//! readers.

use async_trait::async_trait;
use rust_decimal::Decimal;

use invoicer_core::{CustomerId, DomainResult, InvoiceId, ItemId};
use invoicer_invoicing::{
    Customer, CustomerPatch, Invoice, InvoicePatch, InvoiceRecords, Item, ItemPatch, NewCustomer,
    NewInvoice, NewItem, checked_total,
};

/// Run every contract check, each against a fresh store from `make`.
#[cfg(test)]
macro_rules! store_contract_tests {
    ($make:expr) => {
        store_contract_tests!(@case $make,
            customer_round_trip,
            duplicate_email_is_validation_error,
            customer_patch_is_partial,
            invoice_requires_existing_customer,
            invoice_with_items_is_written_together,
            invalid_initial_item_writes_nothing,
            date_only_update_keeps_customer,
            reassigning_to_missing_customer_fails,
            customer_delete_cascades,
            delete_without_cascade_refuses_dependents,
            missing_records_are_not_found,
            item_lifecycle,
            ids_are_not_reused,
            records_snapshot_orders_items,
            item_writes_keep_total_in_range
        );
    };
    (@case $make:expr, $($name:ident),+) => {
        $(
            #[tokio::test]
            async fn $name() {
                let store = $make.await;
                $crate::store::contract::$name(&store).await;
            }
        )+
    };
}

pub mod in_memory;
pub mod sqlite;

/// Refuses `line` when it and the invoice's `other` items no longer sum
/// within the decimal range.
pub(crate) fn check_invoice_total<'a>(
    other: impl IntoIterator<Item = &'a Item>,
    line: DomainResult<Decimal>,
) -> DomainResult<()> {
    checked_total(other.into_iter().map(Item::amount).chain(std::iter::once(line))).map(|_| ())
}

pub use in_memory::InMemoryStore;
pub use sqlite::SqliteStore;

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn create_customer(&self, input: NewCustomer) -> DomainResult<Customer>;
    async fn get_customer(&self, id: CustomerId) -> DomainResult<Customer>;
    async fn list_customers(&self) -> DomainResult<Vec<Customer>>;
    async fn update_customer(&self, id: CustomerId, patch: CustomerPatch)
        -> DomainResult<Customer>;
    /// With `cascade`, also deletes the customer's invoices and their items.
    async fn delete_customer(&self, id: CustomerId, cascade: bool) -> DomainResult<()>;

    /// Writes the invoice and its initial items in one transaction.
    async fn create_invoice(&self, input: NewInvoice) -> DomainResult<Invoice>;
    async fn get_invoice(&self, id: InvoiceId) -> DomainResult<Invoice>;
    async fn list_invoices(&self) -> DomainResult<Vec<Invoice>>;
    async fn update_invoice(&self, id: InvoiceId, patch: InvoicePatch) -> DomainResult<Invoice>;
    /// With `cascade`, also deletes the invoice's items.
    async fn delete_invoice(&self, id: InvoiceId, cascade: bool) -> DomainResult<()>;

    async fn create_item(&self, input: NewItem) -> DomainResult<Item>;
    async fn get_item(&self, id: ItemId) -> DomainResult<Item>;
    async fn list_items(&self) -> DomainResult<Vec<Item>>;
    async fn update_item(&self, id: ItemId, patch: ItemPatch) -> DomainResult<Item>;
    async fn delete_item(&self, id: ItemId) -> DomainResult<()>;

    /// Items of one invoice in creation order.
    async fn list_items_for_invoice(&self, invoice_id: InvoiceId) -> DomainResult<Vec<Item>>;

    /// Invoice row, its customer row and its items, read as one snapshot.
    ///
    /// `Ok(None)` when the invoice does not exist.
    async fn load_invoice_records(&self, id: InvoiceId) -> DomainResult<Option<InvoiceRecords>>;
}
