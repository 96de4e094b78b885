//! HTML to PDF conversion.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RenderError;

pub mod command;
pub mod text;

pub use command::CommandPdfConverter;
pub use text::TextPdfConverter;

/// Converts a rendered HTML document into PDF bytes.
#[async_trait]
pub trait PdfConverter: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    async fn convert(&self, html: &str) -> Result<Vec<u8>, RenderError>;
}

/// Build a converter from its configuration value.
///
/// `builtin` (or an empty value) selects [`TextPdfConverter`]; anything else is
/// treated as a command line for [`CommandPdfConverter`].
pub fn converter_from_setting(setting: &str) -> Result<Arc<dyn PdfConverter>, RenderError> {
    let setting = setting.trim();
    if setting.is_empty() || setting.eq_ignore_ascii_case("builtin") {
        return Ok(Arc::new(TextPdfConverter::default()));
    }
    Ok(Arc::new(CommandPdfConverter::from_command_line(setting)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_and_blank_select_text_converter() {
        assert_eq!(converter_from_setting("builtin").unwrap().name(), "builtin");
        assert_eq!(converter_from_setting("  ").unwrap().name(), "builtin");
    }

    #[test]
    fn other_values_are_commands() {
        let converter = converter_from_setting("wkhtmltopdf --quiet - -").unwrap();
        assert_eq!(converter.name(), "wkhtmltopdf");
    }
}
