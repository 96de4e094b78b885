//! Invoice aggregate: the composite read view (invoice + customer + items).

use chrono::NaiveDate;
use rust_decimal::Decimal;

use invoicer_core::{DomainError, DomainResult, EntityKind, InvoiceId};

use crate::item::checked_total;
use crate::{Customer, Invoice, Item};

/// Raw rows for one invoice, read by the store in a single transaction.
///
/// `customer` is `None` when the referenced customer row is missing, which
/// is an invalid state that [`InvoiceAggregate::from_records`] refuses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceRecords {
    pub invoice: Invoice,
    pub customer: Option<Customer>,
    pub items: Vec<Item>,
}

/// Invoice with its customer embedded and its items in creation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceAggregate {
    pub id: InvoiceId,
    pub date: NaiveDate,
    pub customer: Customer,
    pub items: Vec<Item>,
}

impl InvoiceAggregate {
    /// Build the view from raw rows.
    ///
    /// Fails with `NotFound` for the invoice when its customer is missing, and
    /// with `Storage` when the rows do not belong together.
    pub fn from_records(records: InvoiceRecords) -> DomainResult<Self> {
        let InvoiceRecords {
            invoice,
            customer,
            mut items,
        } = records;

        let customer = customer.ok_or(DomainError::not_found(EntityKind::Invoice, invoice.id))?;
        if customer.id != invoice.customer_id {
            return Err(DomainError::storage(format!(
                "invoice {} references customer {}, loaded customer {}",
                invoice.id, invoice.customer_id, customer.id
            )));
        }
        if let Some(stray) = items.iter().find(|i| i.invoice_id != invoice.id) {
            return Err(DomainError::storage(format!(
                "item {} belongs to invoice {}, not {}",
                stray.id, stray.invoice_id, invoice.id
            )));
        }

        // Ids are assigned in creation order.
        items.sort_by_key(|i| i.id);

        Ok(Self {
            id: invoice.id,
            date: invoice.date,
            customer,
            items,
        })
    }

    /// Sum of line amounts. Always derived from the items.
    pub fn total(&self) -> DomainResult<Decimal> {
        checked_total(self.items.iter().map(Item::amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LineItemInput, NewCustomer};
    use invoicer_core::{CustomerId, ItemId};
    use proptest::prelude::*;

    fn records(items: Vec<Item>) -> InvoiceRecords {
        InvoiceRecords {
            invoice: Invoice {
                id: InvoiceId::new(10),
                customer_id: CustomerId::new(1),
                date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            },
            customer: Some(NewCustomer::new("A", "a@x.com").into_customer(CustomerId::new(1))),
            items,
        }
    }

    fn item(id: i64, cents: i64, quantity: i64) -> Item {
        LineItemInput::new(format!("line {id}"), quantity, Decimal::new(cents, 2))
            .into_item(ItemId::new(id), InvoiceId::new(10))
    }

    #[test]
    fn items_are_ordered_by_creation() {
        let agg = InvoiceAggregate::from_records(records(vec![
            item(3, 100, 1),
            item(1, 100, 1),
            item(2, 100, 1),
        ]))
        .unwrap();

        let ids: Vec<i64> = agg.items.iter().map(|i| i.id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn missing_customer_is_not_found_not_partial() {
        let mut r = records(vec![item(1, 999, 1)]);
        r.customer = None;

        let err = InvoiceAggregate::from_records(r).unwrap_err();
        assert_eq!(err, DomainError::not_found(EntityKind::Invoice, InvoiceId::new(10)));
    }

    #[test]
    fn foreign_item_is_rejected() {
        let mut stray = item(2, 100, 1);
        stray.invoice_id = InvoiceId::new(11);

        let err = InvoiceAggregate::from_records(records(vec![item(1, 100, 1), stray])).unwrap_err();
        assert!(matches!(err, DomainError::Storage(_)));
    }

    #[test]
    fn single_widget_totals_its_price() {
        let agg = InvoiceAggregate::from_records(records(vec![item(1, 999, 1)])).unwrap();
        assert_eq!(agg.total().unwrap(), Decimal::new(999, 2));
    }

    #[test]
    fn empty_invoice_totals_zero() {
        let agg = InvoiceAggregate::from_records(records(vec![])).unwrap();
        assert_eq!(agg.total().unwrap(), Decimal::ZERO);
    }

    #[test]
    fn stored_lines_beyond_decimal_range_fail_the_total() {
        let mut big = item(1, 100, 1);
        big.price = Decimal::MAX;
        let agg = InvoiceAggregate::from_records(records(vec![big, item(2, 100, 1)])).unwrap();
        assert!(matches!(agg.total(), Err(DomainError::Validation(_))));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: the total is exactly the sum of unit prices when every
        /// quantity is one.
        #[test]
        fn total_is_sum_of_prices(prices in prop::collection::vec(0i64..10_000_000i64, 0..20)) {
            let items = prices
                .iter()
                .enumerate()
                .map(|(idx, cents)| item(idx as i64 + 1, *cents, 1))
                .collect();
            let agg = InvoiceAggregate::from_records(records(items)).unwrap();

            let expected: i64 = prices.iter().sum();
            prop_assert_eq!(agg.total().unwrap(), Decimal::new(expected, 2));
        }

        /// Property: quantities scale each line independently.
        #[test]
        fn total_weights_by_quantity(lines in prop::collection::vec((0i64..1_000_000i64, 1i64..100i64), 1..10)) {
            let items = lines
                .iter()
                .enumerate()
                .map(|(idx, (cents, qty))| item(idx as i64 + 1, *cents, *qty))
                .collect();
            let agg = InvoiceAggregate::from_records(records(items)).unwrap();

            let expected: i64 = lines.iter().map(|(c, q)| c * q).sum();
            prop_assert_eq!(agg.total().unwrap(), Decimal::new(expected, 2));
        }
    }
}
