use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use invoicer_core::{DomainError, DomainResult, Entity, EntityKind, InvoiceId, ItemId};

/// A stored invoice line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub invoice_id: InvoiceId,
    pub description: String,
    pub quantity: i64,
    /// Unit price. Negative prices are accepted as-is.
    pub price: Decimal,
}

impl Item {
    /// Line amount: unit price × quantity.
    pub fn amount(&self) -> DomainResult<Decimal> {
        line_amount(self.price, self.quantity)
    }
}

impl Entity for Item {
    type Id = ItemId;
    const KIND: EntityKind = EntityKind::Item;

    fn id(&self) -> ItemId {
        self.id
    }
}

/// Line data shared by standalone item creation and invoice creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemInput {
    pub description: String,
    pub quantity: i64,
    pub price: Decimal,
}

impl LineItemInput {
    pub fn new(description: impl Into<String>, quantity: i64, price: Decimal) -> Self {
        Self {
            description: description.into(),
            quantity,
            price,
        }
    }

    pub fn validated(self) -> DomainResult<Self> {
        let line = Self {
            description: clean_description(&self.description)?,
            quantity: check_quantity(self.quantity)?,
            price: self.price,
        };
        line.amount()?;
        Ok(line)
    }

    pub fn amount(&self) -> DomainResult<Decimal> {
        line_amount(self.price, self.quantity)
    }

    pub fn into_item(self, id: ItemId, invoice_id: InvoiceId) -> Item {
        Item {
            id,
            invoice_id,
            description: self.description,
            quantity: self.quantity,
            price: self.price,
        }
    }
}

/// Input for creating a single item on an existing invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub invoice_id: InvoiceId,
    pub line: LineItemInput,
}

impl NewItem {
    pub fn new(invoice_id: InvoiceId, line: LineItemInput) -> Self {
        Self { invoice_id, line }
    }

    pub fn validated(self) -> DomainResult<Self> {
        Ok(Self {
            invoice_id: self.invoice_id,
            line: self.line.validated()?,
        })
    }
}

/// Partial update for an item. The owning invoice cannot change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPatch {
    pub description: Option<String>,
    pub quantity: Option<i64>,
    pub price: Option<Decimal>,
}

impl ItemPatch {
    /// Field rules. The combined amount is only checked when both
    /// quantity and price are supplied; otherwise the store checks it
    /// against the current row.
    pub fn validated(self) -> DomainResult<Self> {
        let patch = Self {
            description: self
                .description
                .as_deref()
                .map(clean_description)
                .transpose()?,
            quantity: self.quantity.map(check_quantity).transpose()?,
            price: self.price,
        };
        if let (Some(quantity), Some(price)) = (patch.quantity, patch.price) {
            line_amount(price, quantity)?;
        }
        Ok(patch)
    }

    pub fn apply_to(&self, item: &mut Item) {
        if let Some(description) = &self.description {
            item.description = description.clone();
        }
        if let Some(quantity) = self.quantity {
            item.quantity = quantity;
        }
        if let Some(price) = self.price {
            item.price = price;
        }
    }
}

/// `price × quantity`, refusing results outside the decimal range.
pub fn line_amount(price: Decimal, quantity: i64) -> DomainResult<Decimal> {
    price
        .checked_mul(Decimal::from(quantity))
        .ok_or_else(|| DomainError::validation("item amount is out of range"))
}

/// Sum of line amounts, refusing totals outside the decimal range.
pub fn checked_total<I>(amounts: I) -> DomainResult<Decimal>
where
    I: IntoIterator<Item = DomainResult<Decimal>>,
{
    amounts.into_iter().try_fold(Decimal::ZERO, |acc, amount| {
        acc.checked_add(amount?)
            .ok_or_else(|| DomainError::validation("invoice total is out of range"))
    })
}

fn clean_description(description: &str) -> DomainResult<String> {
    let description = description.trim();
    if description.is_empty() {
        return Err(DomainError::validation("item description must not be empty"));
    }
    Ok(description.to_string())
}

fn check_quantity(quantity: i64) -> DomainResult<i64> {
    if quantity < 1 {
        return Err(DomainError::validation(format!(
            "item quantity must be at least 1 (got {quantity})"
        )));
    }
    Ok(quantity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_multiplies_by_quantity() {
        let item = LineItemInput::new("Widget", 3, Decimal::new(999, 2))
            .into_item(ItemId::new(1), InvoiceId::new(1));
        assert_eq!(item.amount().unwrap(), Decimal::new(2997, 2));
    }

    #[test]
    fn oversized_line_amount_is_rejected() {
        let price = Decimal::from_i128_with_scale(100_000_000_000_000_000_000, 0);
        let err = LineItemInput::new("Bulk", 1_000_000_000, price)
            .validated()
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("out of range")));
    }

    #[test]
    fn oversized_patch_amount_is_rejected() {
        let patch = ItemPatch {
            quantity: Some(1_000_000_000),
            price: Some(Decimal::MAX),
            ..ItemPatch::default()
        };
        assert!(matches!(patch.validated(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn total_overflow_is_an_error() {
        let amounts = vec![Ok(Decimal::MAX), Ok(Decimal::ONE)];
        assert!(matches!(checked_total(amounts), Err(DomainError::Validation(_))));
        assert_eq!(
            checked_total(vec![Ok(Decimal::new(150, 2)), Ok(Decimal::new(250, 2))]).unwrap(),
            Decimal::new(400, 2)
        );
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let err = LineItemInput::new("Widget", 0, Decimal::ONE)
            .validated()
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("quantity")));
    }

    #[test]
    fn negative_price_is_not_validated() {
        let line = LineItemInput::new("Refund", 1, Decimal::new(-500, 2))
            .validated()
            .unwrap();
        assert_eq!(line.price, Decimal::new(-500, 2));
    }

    #[test]
    fn patch_keeps_unsupplied_fields() {
        let mut item = LineItemInput::new("Widget", 2, Decimal::new(100, 2))
            .into_item(ItemId::new(4), InvoiceId::new(9));
        ItemPatch {
            price: Some(Decimal::new(250, 2)),
            ..ItemPatch::default()
        }
        .validated()
        .unwrap()
        .apply_to(&mut item);

        assert_eq!(item.description, "Widget");
        assert_eq!(item.quantity, 2);
        assert_eq!(item.price, Decimal::new(250, 2));
        assert_eq!(item.invoice_id, InvoiceId::new(9));
    }
}
