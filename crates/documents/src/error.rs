use thiserror::Error;

/// Failures while turning an invoice into a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The HTML template failed to compile or render.
    #[error("template error: {0}")]
    Template(String),

    /// The converter could not make sense of the HTML.
    #[error("markup error: {0}")]
    Markup(String),

    /// A line amount or the total is outside the decimal range.
    #[error("amount error: {0}")]
    Amount(String),

    /// The converter itself failed (process spawn, exit status, bad output).
    #[error("pdf converter error: {0}")]
    Converter(String),
}

impl From<handlebars::TemplateError> for RenderError {
    fn from(err: handlebars::TemplateError) -> Self {
        Self::Template(err.to_string())
    }
}

impl From<handlebars::RenderError> for RenderError {
    fn from(err: handlebars::RenderError) -> Self {
        Self::Template(err.to_string())
    }
}

impl From<invoicer_core::DomainError> for RenderError {
    fn from(err: invoicer_core::DomainError) -> Self {
        Self::Amount(err.to_string())
    }
}
