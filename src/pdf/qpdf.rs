//! qpdf FFI wrapper for PDF page structure
//!
//! Page counting, concatenation and per-range extraction using the qpdf
//! crate (vendored FFI). Everything here is synchronous and byte-oriented;
//! callers run it on a blocking thread.

use super::range::PageRange;
use crate::error::{Error, Result};
use qpdf::QPdf;

/// Wrapper for qpdf operations via FFI
pub struct QpdfWrapper;

fn qpdf_error(detail: impl std::fmt::Display) -> Error {
    Error::execution("qpdf", detail)
}

/// Reject data that does not even start like a PDF before handing it to qpdf,
/// which would otherwise try to reconstruct arbitrary bytes.
fn check_header(data: &[u8], label: &str) -> Result<()> {
    if data.len() < 5 || &data[0..5] != b"%PDF-" {
        return Err(qpdf_error(format!("{} is not a readable PDF", label)));
    }
    Ok(())
}

fn open_qpdf(data: &[u8], label: &str) -> Result<QPdf> {
    check_header(data, label)?;
    QPdf::read_from_memory(data).map_err(|e| qpdf_error(format!("failed to read {}: {}", label, e)))
}

impl QpdfWrapper {
    /// Get the page count of a PDF
    pub fn page_count(data: &[u8]) -> Result<u32> {
        let qpdf = open_qpdf(data, "input PDF")?;
        qpdf.get_num_pages().map_err(qpdf_error)
    }

    /// Concatenate PDFs in order. Every input is parsed before any output is
    /// produced, so one corrupt input fails the whole merge.
    ///
    /// # Returns
    /// The merged PDF as bytes
    pub fn merge(inputs: &[&[u8]]) -> Result<Vec<u8>> {
        if inputs.is_empty() {
            return Err(Error::invalid_input("no input PDFs provided"));
        }

        let sources = inputs
            .iter()
            .enumerate()
            .map(|(i, data)| open_qpdf(data, &format!("input PDF {}", i + 1)))
            .collect::<Result<Vec<_>>>()?;

        let dest = QPdf::empty();

        for (i, source) in sources.iter().enumerate() {
            let pages = source.get_pages().map_err(|e| {
                qpdf_error(format!("failed to get pages from input PDF {}: {}", i + 1, e))
            })?;

            for page in &pages {
                let copied = dest.copy_from_foreign(page);
                dest.add_page(&copied, false).map_err(qpdf_error)?;
            }
        }

        dest.writer().write_to_memory().map_err(qpdf_error)
    }

    /// Extract each range into its own document, in the order given.
    ///
    /// # Returns
    /// One PDF per range, as bytes
    pub fn extract_ranges(input_data: &[u8], ranges: &[PageRange]) -> Result<Vec<Vec<u8>>> {
        let source = open_qpdf(input_data, "input PDF")?;
        let num_pages = source.get_num_pages().map_err(qpdf_error)?;

        let mut outputs = Vec::with_capacity(ranges.len());
        for range in ranges {
            if range.end > num_pages {
                return Err(Error::InvalidPageRange {
                    range: format!("{} out of range (1-{})", range, num_pages),
                });
            }

            let dest = QPdf::empty();
            for idx in range.indices() {
                let page = source.get_page(idx).ok_or_else(|| {
                    qpdf_error(format!("page {} missing from page tree", idx + 1))
                })?;
                let copied = dest.copy_from_foreign(&page);
                dest.add_page(&copied, false).map_err(qpdf_error)?;
            }

            let mut writer = dest.writer();
            writer.preserve_encryption(false);
            outputs.push(writer.write_to_memory().map_err(qpdf_error)?);
        }

        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_merge_rejects_empty_input() {
        let err = QpdfWrapper::merge(&[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_merge_rejects_non_pdf_bytes() {
        let err = QpdfWrapper::merge(&[b"not a pdf".as_slice(), b"%PDF-1.4 junk".as_slice()]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExecutionFailed);
        assert!(err.to_string().contains("input PDF 1"));
    }

    #[test]
    fn test_page_count_rejects_garbage() {
        let err = QpdfWrapper::page_count(b"GIF89a").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExecutionFailed);
    }
}
