//! Conversion abstraction: raw EML bytes in, rendered PDF out.

pub mod eml2pdf;
pub mod staging;

use async_trait::async_trait;

use crate::error::ConvertError;

pub use eml2pdf::Eml2PdfConverter;
pub use staging::StagingArea;

/// Page size used when the caller does not specify one.
pub const DEFAULT_PAGE: &str = "a4";

/// Options forwarded to the converter for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Page size specifier, passed through verbatim (e.g. "a4 landscape").
    pub page: String,
    /// Keep intermediate HTML next to the PDF.
    pub debug_html: bool,
    /// Skip HTML sanitization.
    pub unsafe_html: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE.to_string(),
            debug_html: false,
            unsafe_html: false,
        }
    }
}

impl ConvertOptions {
    /// Set the page size, trimmed but otherwise forwarded as given.
    pub fn with_page(mut self, page: &str) -> Self {
        self.page = page.trim().to_string();
        self
    }

    pub fn with_debug_html(mut self, debug_html: bool) -> Self {
        self.debug_html = debug_html;
        self
    }

    pub fn with_unsafe_html(mut self, unsafe_html: bool) -> Self {
        self.unsafe_html = unsafe_html;
        self
    }
}

/// A rendered PDF held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfDocument {
    /// File name the converter gave the output.
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Turns one raw email message into a PDF.
#[async_trait]
pub trait Converter: Send + Sync {
    async fn convert(
        &self,
        eml: &[u8],
        options: &ConvertOptions,
    ) -> Result<PdfDocument, ConvertError>;
}

/// Interpret a bool-like query value: `1`, `true` or `yes` in any case.
pub fn parse_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_lowercase()).as_deref(),
        Some("1" | "true" | "yes")
    )
}
