//! PDFium access: per-page text and single-image documents

use crate::error::{Error, Result};
use image::DynamicImage;
use pdfium_render::prelude::*;

/// Get PDFium instance (creates new instance each time - PDFium is not thread-safe)
fn create_pdfium() -> Result<Pdfium> {
    // Try to bind to system library or use static linking
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "/opt/pdfium/lib",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| pdfium_error(format!("failed to initialize PDFium: {}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// Whether a PDFium library can be bound in this process.
pub fn pdfium_available() -> bool {
    create_pdfium().is_ok()
}

fn pdfium_error(detail: impl std::fmt::Display) -> Error {
    Error::execution("pdfium", detail)
}

/// Map PDFium errors to our error type
fn map_pdfium_error(err: PdfiumError) -> Error {
    match err {
        PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
            pdfium_error("PDF is password protected")
        }
        _ => pdfium_error(err),
    }
}

/// Extract the text of every page, in page order, as `(page_number, text)`.
/// Text comes out in PDFium's character order; no layout reconstruction.
pub fn extract_page_texts(data: &[u8]) -> Result<Vec<(u32, String)>> {
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(pdfium_error("not a valid PDF file"));
    }

    let pdfium = create_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(data, None)
        .map_err(map_pdfium_error)?;

    let mut texts = Vec::new();
    for (index, page) in document.pages().iter().enumerate() {
        let page_num = index as u32 + 1;
        let text = page
            .text()
            .map_err(|e| pdfium_error(format!("failed to read text of page {}: {}", page_num, e)))?
            .all();
        texts.push((page_num, text));
    }

    Ok(texts)
}

/// Build a one-page PDF showing `image` at `dpi`. The page is exactly the
/// size of the image at that resolution.
pub fn image_to_pdf(image: &DynamicImage, dpi: f32) -> Result<Vec<u8>> {
    if image.width() == 0 || image.height() == 0 {
        return Err(Error::invalid_input("image has no pixels"));
    }

    let width = PdfPoints::new(image.width() as f32 * 72.0 / dpi);
    let height = PdfPoints::new(image.height() as f32 * 72.0 / dpi);

    let pdfium = create_pdfium()?;
    let mut document = pdfium.create_new_pdf().map_err(map_pdfium_error)?;

    {
        let mut page = document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::Custom(width, height))
            .map_err(map_pdfium_error)?;
        page.objects_mut()
            .create_image_object(
                PdfPoints::new(0.0),
                PdfPoints::new(0.0),
                image,
                Some(width),
                Some(height),
            )
            .map_err(map_pdfium_error)?;
    }

    document.save_to_bytes().map_err(map_pdfium_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_pdf_detection() {
        let result = extract_page_texts(b"not a pdf");
        assert!(matches!(result, Err(Error::ExecutionFailed { .. })));
    }

    #[test]
    fn test_empty_image_rejected() {
        let image = DynamicImage::new_rgb8(0, 0);
        assert!(matches!(
            image_to_pdf(&image, 100.0),
            Err(Error::InvalidInput { .. })
        ));
    }
}
