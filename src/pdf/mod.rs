//! PDF processing layer
//!
//! Page structure goes through qpdf, page content through PDFium, and
//! compression through Ghostscript.

mod compress;
mod engine;
mod qpdf;
mod range;
mod reader;

pub use compress::CompressionTier;
pub(crate) use engine::blocking;
pub use engine::PdfEngine;
pub use qpdf::QpdfWrapper;
pub use range::PageRange;
pub use reader::{extract_page_texts, image_to_pdf, pdfium_available};
