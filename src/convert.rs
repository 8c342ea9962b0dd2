//! Document format conversion
//!
//! Conversion itself is delegated to an external program; this module only
//! defines the seam and one subprocess adapter.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

/// Inline `pdf2docx` driver; paths arrive through `sys.argv`
const PDF2DOCX_SCRIPT: &str = "import sys\nfrom pdf2docx import Converter\ncv = Converter(sys.argv[1])\ncv.convert(sys.argv[2], start=0, end=None)\ncv.close()\n";

/// MIME type of documents the bot converts
pub const PDF_MIME: &str = "application/pdf";

/// Whether a declared MIME type marks a convertible PDF
#[must_use]
pub fn is_pdf(mime_type: Option<&str>) -> bool {
    mime_type.is_some_and(|m| m.eq_ignore_ascii_case(PDF_MIME))
}

/// Errors that can occur during conversion
#[derive(Error, Debug)]
pub enum ConversionError {
    /// Converter program could not be started
    #[error("failed to launch converter: {0}")]
    Launch(#[source] std::io::Error),
    /// Converter ran but produced no output file
    #[error("PDF conversion failed: {0}")]
    Failed(String),
}

/// Target formats a document can be converted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// Office Open XML word processing document
    Docx,
}

impl DocumentFormat {
    /// File extension without dot
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Docx => "docx",
        }
    }

    /// MIME type of the produced file
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }
}

/// Output path for converting `input` to `format`: same directory and stem
#[must_use]
pub fn output_path(input: &Path, format: DocumentFormat) -> PathBuf {
    input.with_extension(format.extension())
}

/// Converts a file at one path into another format at a new path
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    /// Convert `input`, returning the path of the produced file
    async fn convert(&self, input: &Path, format: DocumentFormat)
        -> Result<PathBuf, ConversionError>;
}

/// PDF → DOCX through Python's `pdf2docx`
#[derive(Debug, Clone)]
pub struct Pdf2DocxConverter {
    python: String,
}

impl Pdf2DocxConverter {
    /// Use the given Python interpreter
    #[must_use]
    pub fn new(python: impl Into<String>) -> Self {
        Self {
            python: python.into(),
        }
    }
}

#[async_trait]
impl DocumentConverter for Pdf2DocxConverter {
    async fn convert(
        &self,
        input: &Path,
        format: DocumentFormat,
    ) -> Result<PathBuf, ConversionError> {
        let output = output_path(input, format);
        info!(input = %input.display(), output = %output.display(), "Converting document");

        let result = Command::new(&self.python)
            .arg("-c")
            .arg(PDF2DOCX_SCRIPT)
            .arg(input)
            .arg(&output)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(ConversionError::Launch)?;

        if result.status.success() && tokio::fs::metadata(&output).await.is_ok() {
            return Ok(output);
        }

        let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
        warn!(status = ?result.status.code(), stderr = %stderr, "Document conversion failed");
        Err(ConversionError::Failed(stderr))
    }
}
