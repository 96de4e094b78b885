use std::sync::Arc;

use tracing::{error, instrument};

use invoicer_invoicing::InvoiceAggregate;

use crate::error::RenderError;
use crate::html::HtmlRenderer;
use crate::pdf::PdfConverter;

/// Aggregate to HTML to PDF.
pub struct InvoiceRenderer {
    html: HtmlRenderer,
    converter: Arc<dyn PdfConverter>,
}

impl InvoiceRenderer {
    pub fn new(converter: Arc<dyn PdfConverter>) -> Result<Self, RenderError> {
        Ok(Self {
            html: HtmlRenderer::new()?,
            converter,
        })
    }

    pub fn converter_name(&self) -> &str {
        self.converter.name()
    }

    pub fn render_html(&self, aggregate: &InvoiceAggregate) -> Result<String, RenderError> {
        self.html.render(aggregate)
    }

    #[instrument(skip_all, fields(invoice_id = %aggregate.id, converter = self.converter.name()))]
    pub async fn render_pdf(&self, aggregate: &InvoiceAggregate) -> Result<Vec<u8>, RenderError> {
        let html = self.render_html(aggregate)?;
        self.converter.convert(&html).await.inspect_err(|err| {
            error!(error = %err, "pdf conversion failed");
        })
    }
}
