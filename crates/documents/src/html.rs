//! Invoice HTML via handlebars.

use handlebars::Handlebars;
use serde::Serialize;

use invoicer_invoicing::InvoiceAggregate;

use crate::error::RenderError;
use crate::money::format_money;

const INVOICE_TEMPLATE_NAME: &str = "invoice";

const INVOICE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Invoice #{{id}}</title>
<style>
  body { font-family: Helvetica, Arial, sans-serif; margin: 40px; }
  table { border-collapse: collapse; width: 100%; }
  th, td { border-bottom: 1px solid #ccc; padding: 6px; text-align: left; }
  .num { text-align: right; }
  .total { font-weight: bold; margin-top: 16px; }
</style>
</head>
<body>
<h1>Invoice #{{id}}</h1>
<p>Date: {{date}}</p>
<h2>Bill to</h2>
<p>{{customer.name}}</p>
<p>{{customer.email}}</p>
<table>
<thead>
<tr><th>Description</th><th class="num">Qty</th><th class="num">Unit price</th><th class="num">Amount</th></tr>
</thead>
<tbody>
{{#each items}}
<tr><td>{{description}}</td><td class="num">{{quantity}}</td><td class="num">{{unit_price}}</td><td class="num">{{amount}}</td></tr>
{{/each}}
</tbody>
</table>
<p class="total">Total: {{total}}</p>
</body>
</html>
"#;

#[derive(Serialize)]
struct InvoiceView<'a> {
    id: i64,
    date: String,
    customer: CustomerView<'a>,
    items: Vec<LineView<'a>>,
    total: String,
}

#[derive(Serialize)]
struct CustomerView<'a> {
    name: &'a str,
    email: &'a str,
}

#[derive(Serialize)]
struct LineView<'a> {
    description: &'a str,
    quantity: i64,
    unit_price: String,
    amount: String,
}

impl<'a> InvoiceView<'a> {
    fn from_aggregate(aggregate: &'a InvoiceAggregate) -> Result<Self, RenderError> {
        Ok(Self {
            id: aggregate.id.get(),
            date: aggregate.date.format("%Y-%m-%d").to_string(),
            customer: CustomerView {
                name: &aggregate.customer.name,
                email: &aggregate.customer.email,
            },
            items: aggregate
                .items
                .iter()
                .map(|item| -> Result<LineView<'a>, RenderError> {
                    Ok(LineView {
                        description: &item.description,
                        quantity: item.quantity,
                        unit_price: format_money(item.price),
                        amount: format_money(item.amount()?),
                    })
                })
                .collect::<Result<_, RenderError>>()?,
            total: format_money(aggregate.total()?),
        })
    }
}

/// Renders the invoice HTML document.
///
/// Strict mode: a template variable missing from the view is an error, not
/// an empty string. All values are HTML-escaped.
pub struct HtmlRenderer {
    handlebars: Handlebars<'static>,
}

impl HtmlRenderer {
    pub fn new() -> Result<Self, RenderError> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars.register_template_string(INVOICE_TEMPLATE_NAME, INVOICE_TEMPLATE)?;
        Ok(Self { handlebars })
    }

    pub fn render(&self, aggregate: &InvoiceAggregate) -> Result<String, RenderError> {
        let view = InvoiceView::from_aggregate(aggregate)?;
        Ok(self.handlebars.render(INVOICE_TEMPLATE_NAME, &view)?)
    }
}
