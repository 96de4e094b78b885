use chrono::NaiveDate;
use invoicer_core::{CustomerId, InvoiceId, ItemId};
use invoicer_invoicing::{Decimal, InvoiceAggregate, LineItemInput, NewCustomer};

/// Invoice 7 for customer 1 with one item per `(description, quantity, price)`.
pub(crate) fn aggregate(name: &str, lines: &[(&str, i64, Decimal)]) -> InvoiceAggregate {
    InvoiceAggregate {
        id: InvoiceId::new(7),
        date: NaiveDate::from_ymd_opt(2024, 5, 17).unwrap(),
        customer: NewCustomer::new(name, "a@x.com").into_customer(CustomerId::new(1)),
        items: lines
            .iter()
            .enumerate()
            .map(|(idx, (desc, qty, price))| {
                LineItemInput::new(*desc, *qty, *price)
                    .into_item(ItemId::new(idx as i64 + 1), InvoiceId::new(7))
            })
            .collect(),
    }
}
