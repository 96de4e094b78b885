//! Invoice documents: HTML rendering and HTML-to-PDF conversion.

pub mod error;
pub mod html;
pub mod money;
pub mod pdf;
pub mod renderer;

#[cfg(test)]
mod test_support;

pub use error::RenderError;
pub use html::HtmlRenderer;
pub use money::format_money;
pub use pdf::{CommandPdfConverter, PdfConverter, TextPdfConverter, converter_from_setting};
pub use renderer::InvoiceRenderer;
