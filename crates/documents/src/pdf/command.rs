//! External HTML-to-PDF program (wkhtmltopdf and friends).

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::PdfConverter;
use crate::error::RenderError;

/// Runs `program args...`, feeding HTML on stdin and reading PDF from stdout.
#[derive(Debug, Clone)]
pub struct CommandPdfConverter {
    program: String,
    args: Vec<String>,
}

impl CommandPdfConverter {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a whitespace-separated command line. No shell quoting.
    pub fn from_command_line(line: &str) -> Result<Self, RenderError> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| RenderError::Converter("empty converter command".to_string()))?;
        Ok(Self::new(program, parts.collect()))
    }
}

#[async_trait]
impl PdfConverter for CommandPdfConverter {
    fn name(&self) -> &str {
        &self.program
    }

    #[instrument(skip(self, html), fields(program = %self.program, html_len = html.len()), err)]
    async fn convert(&self, html: &str) -> Result<Vec<u8>, RenderError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RenderError::Converter(format!("failed to spawn {}: {e}", self.program)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| RenderError::Converter("child stdin unavailable".to_string()))?;

        // Stdin is written while stdout drains so large documents cannot deadlock.
        let write = async move {
            let result = stdin.write_all(html.as_bytes()).await;
            drop(stdin);
            result
        };
        let (written, output) = tokio::join!(write, child.wait_with_output());

        let output = output
            .map_err(|e| RenderError::Converter(format!("{} did not complete: {e}", self.program)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RenderError::Converter(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        written.map_err(|e| {
            RenderError::Converter(format!("failed to write html to {}: {e}", self.program))
        })?;

        if !output.stdout.starts_with(b"%PDF") {
            return Err(RenderError::Converter(format!(
                "{} did not produce a PDF document",
                self.program
            )));
        }

        debug!(bytes = output.stdout.len(), "pdf produced");
        Ok(output.stdout)
    }
}
