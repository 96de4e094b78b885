//! Invoicing domain module.
//!
//! Records, create/patch inputs with their validation rules, and the invoice
//! aggregate read view. Pure logic: no IO, no HTTP, no storage.

pub mod aggregate;
pub mod customer;
pub mod invoice;
pub mod item;

pub use aggregate::{InvoiceAggregate, InvoiceRecords};
pub use customer::{Customer, CustomerPatch, NewCustomer};
pub use invoice::{Invoice, InvoicePatch, NewInvoice};
pub use item::{checked_total, line_amount, Item, ItemPatch, LineItemInput, NewItem};
pub use rust_decimal::Decimal;
