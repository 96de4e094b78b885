use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use invoicer_core::{CustomerId, DomainError, InvoiceId};
use invoicer_invoicing::{
    Customer, CustomerPatch, InvoiceAggregate, InvoicePatch, Item, ItemPatch, LineItemInput,
    NewCustomer, NewInvoice, NewItem,
};

// -------------------------
// Request DTOs
// -------------------------

fn default_quantity() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
pub struct CreateCustomerRequest {
    pub name: String,
    pub email: String,
}

impl From<CreateCustomerRequest> for NewCustomer {
    fn from(body: CreateCustomerRequest) -> Self {
        NewCustomer::new(body.name, body.email)
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateCustomerRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl From<UpdateCustomerRequest> for CustomerPatch {
    fn from(body: UpdateCustomerRequest) -> Self {
        CustomerPatch {
            name: body.name,
            email: body.email,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LineItemRequest {
    pub description: String,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

impl From<LineItemRequest> for LineItemInput {
    fn from(body: LineItemRequest) -> Self {
        LineItemInput::new(body.description, body.quantity, body.price)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    pub customer_id: i64,
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub items: Vec<LineItemRequest>,
}

impl From<CreateInvoiceRequest> for NewInvoice {
    fn from(body: CreateInvoiceRequest) -> Self {
        NewInvoice {
            customer_id: CustomerId::new(body.customer_id),
            date: body.date,
            items: body.items.into_iter().map(LineItemInput::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateInvoiceRequest {
    pub customer_id: Option<i64>,
    pub date: Option<NaiveDate>,
}

impl From<UpdateInvoiceRequest> for InvoicePatch {
    fn from(body: UpdateInvoiceRequest) -> Self {
        InvoicePatch {
            customer_id: body.customer_id.map(CustomerId::new),
            date: body.date,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub invoice_id: i64,
    pub description: String,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

impl From<CreateItemRequest> for NewItem {
    fn from(body: CreateItemRequest) -> Self {
        NewItem::new(
            InvoiceId::new(body.invoice_id),
            LineItemInput::new(body.description, body.quantity, body.price),
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub description: Option<String>,
    pub quantity: Option<i64>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub price: Option<Decimal>,
}

impl From<UpdateItemRequest> for ItemPatch {
    fn from(body: UpdateItemRequest) -> Self {
        ItemPatch {
            description: body.description,
            quantity: body.quantity,
            price: body.price,
        }
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct CustomerResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
}

impl From<Customer> for CustomerResponse {
    fn from(c: Customer) -> Self {
        Self {
            id: c.id.get(),
            name: c.name,
            email: c.email,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub id: i64,
    pub invoice_id: i64,
    pub description: String,
    pub quantity: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

impl From<Item> for ItemResponse {
    fn from(i: Item) -> Self {
        Self {
            id: i.id.get(),
            invoice_id: i.invoice_id.get(),
            description: i.description,
            quantity: i.quantity,
            price: i.price,
        }
    }
}

/// Invoice with embedded customer and items; `total` is computed.
#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    pub id: i64,
    pub date: NaiveDate,
    pub customer: CustomerResponse,
    pub items: Vec<ItemResponse>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
}

/// Fails when the total does not fit in a decimal.
impl TryFrom<InvoiceAggregate> for InvoiceResponse {
    type Error = DomainError;

    fn try_from(agg: InvoiceAggregate) -> Result<Self, Self::Error> {
        let total = agg.total()?;
        Ok(Self {
            id: agg.id.get(),
            date: agg.date,
            customer: agg.customer.into(),
            items: agg.items.into_iter().map(ItemResponse::from).collect(),
            total,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
