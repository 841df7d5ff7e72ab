//! Export backends for rendered [`Document`](crate::documents::Document) trees.

pub mod pdf;
pub mod word;

use thiserror::Error;

pub use pdf::{PageSlice, export_pdf, paginate};
pub use word::{WORD_MIME_TYPE, export_word, render_word_html};

pub const PDF_MIME_TYPE: &str = "application/pdf";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no generated report is available for this session")]
    NotReady,

    #[error("document has no content to export")]
    EmptyDocument,

    #[error("PDF generation failed: {0}")]
    Pdf(String),

    #[error("export task failed: {0}")]
    Task(String),

    #[error("download filename is not a valid header value: {0}")]
    InvalidFilename(String),
}

/// `<prefix>_<name>.<extension>` with every whitespace character of the name
/// replaced by an underscore. Other control characters and quotes are dropped
/// so the result always fits in a `Content-Disposition` header.
pub fn export_filename(prefix: &str, patient_name: &str, extension: &str) -> String {
    let name: String = patient_name
        .chars()
        .filter_map(|c| match c {
            c if c.is_whitespace() => Some('_'),
            c if c.is_control() || c == '"' => None,
            c => Some(c),
        })
        .collect();
    format!("{prefix}_{name}.{extension}")
}
