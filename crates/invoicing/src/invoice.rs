use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use invoicer_core::{CustomerId, DomainResult, Entity, EntityKind, InvoiceId};

use crate::item::{checked_total, LineItemInput};

/// A stored invoice header. Items live in their own table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub customer_id: CustomerId,
    pub date: NaiveDate,
}

impl Entity for Invoice {
    type Id = InvoiceId;
    const KIND: EntityKind = EntityKind::Invoice;

    fn id(&self) -> InvoiceId {
        self.id
    }
}

/// Input for creating an invoice, optionally with its initial items.
///
/// The invoice and its items are written in one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInvoice {
    pub customer_id: CustomerId,
    /// Defaults to the UTC date at creation time.
    pub date: Option<NaiveDate>,
    pub items: Vec<LineItemInput>,
}

impl NewInvoice {
    pub fn new(customer_id: CustomerId) -> Self {
        Self {
            customer_id,
            date: None,
            items: Vec::new(),
        }
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_item(mut self, item: LineItemInput) -> Self {
        self.items.push(item);
        self
    }

    pub fn validated(self) -> DomainResult<Self> {
        let items = self
            .items
            .into_iter()
            .map(LineItemInput::validated)
            .collect::<DomainResult<Vec<_>>>()?;
        checked_total(items.iter().map(LineItemInput::amount))?;
        Ok(Self { items, ..self })
    }

    pub fn date_or_today(&self) -> NaiveDate {
        self.date.unwrap_or_else(|| Utc::now().date_naive())
    }
}

/// Partial update for an invoice header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicePatch {
    pub customer_id: Option<CustomerId>,
    pub date: Option<NaiveDate>,
}

impl InvoicePatch {
    pub fn apply_to(&self, invoice: &mut Invoice) {
        if let Some(customer_id) = self.customer_id {
            invoice.customer_id = customer_id;
        }
        if let Some(date) = self.date {
            invoice.date = date;
        }
    }
}
