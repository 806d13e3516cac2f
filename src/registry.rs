//! Format pair registry
//!
//! Every supported `(source, target)` pair is a literal row in
//! [`CONVERSION_TABLE`]. Anything not listed is unsupported; nothing is
//! inferred from format families at lookup time.

use crate::artifact::ConversionKey;
use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;

/// Algorithm or tool used to realize one conversion hop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversionStrategy {
    /// Byte-for-byte copy under the target extension
    Copy,
    /// Headless LibreOffice batch conversion
    OfficeEngine,
    /// First page of a paginated document to a bitmap
    RasterizePage,
    /// Re-encode between raster formats
    ImageConvert,
    /// Single image as the only page of a new PDF
    ImageEmbedPdf,
    /// Per-page text dump of a PDF into spreadsheet rows
    ExtractToSpreadsheet,
}

impl ConversionStrategy {
    pub fn name(self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::OfficeEngine => "office-engine",
            Self::RasterizePage => "rasterize-page",
            Self::ImageConvert => "image-convert",
            Self::ImageEmbedPdf => "image-embed-pdf",
            Self::ExtractToSpreadsheet => "extract-to-spreadsheet",
        }
    }
}

impl fmt::Display for ConversionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a registered pair is realized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// One executor run
    Direct(ConversionStrategy),
    /// Convert to the intermediate extension first, then on to the target.
    /// Both legs must be `Direct` entries.
    Via(&'static str),
}

pub use table::CONVERSION_TABLE;

mod table {
    use super::ConversionStrategy::*;
    use super::Route::{self, Direct, Via};

    /// Canonical conversion table.
    #[rustfmt::skip]
    pub const CONVERSION_TABLE: &[(&str, &str, Route)] = &[
        // PDF
        ("pdf",  "pdf",  Direct(Copy)),
        ("pdf",  "png",  Direct(RasterizePage)),
        ("pdf",  "jpg",  Direct(RasterizePage)),
        ("pdf",  "jpeg", Direct(RasterizePage)),
        ("pdf",  "xlsx", Direct(ExtractToSpreadsheet)),
        ("pdf",  "xls",  Via("xlsx")),

        // Word processing
        ("doc",  "doc",  Direct(Copy)),
        ("doc",  "docx", Direct(OfficeEngine)),
        ("doc",  "odt",  Direct(OfficeEngine)),
        ("doc",  "rtf",  Direct(OfficeEngine)),
        ("doc",  "pdf",  Direct(OfficeEngine)),
        ("docx", "docx", Direct(Copy)),
        ("docx", "doc",  Direct(OfficeEngine)),
        ("docx", "odt",  Direct(OfficeEngine)),
        ("docx", "rtf",  Direct(OfficeEngine)),
        ("docx", "pdf",  Direct(OfficeEngine)),
        ("odt",  "odt",  Direct(Copy)),
        ("odt",  "doc",  Direct(OfficeEngine)),
        ("odt",  "docx", Direct(OfficeEngine)),
        ("odt",  "rtf",  Direct(OfficeEngine)),
        ("odt",  "pdf",  Direct(OfficeEngine)),
        ("rtf",  "rtf",  Direct(Copy)),
        ("rtf",  "doc",  Direct(OfficeEngine)),
        ("rtf",  "docx", Direct(OfficeEngine)),
        ("rtf",  "odt",  Direct(OfficeEngine)),
        ("rtf",  "pdf",  Direct(OfficeEngine)),

        // Spreadsheets
        ("xls",  "xls",  Direct(Copy)),
        ("xls",  "xlsx", Direct(OfficeEngine)),
        ("xls",  "ods",  Direct(OfficeEngine)),
        ("xls",  "pdf",  Direct(OfficeEngine)),
        ("xlsx", "xlsx", Direct(Copy)),
        ("xlsx", "xls",  Direct(OfficeEngine)),
        ("xlsx", "ods",  Direct(OfficeEngine)),
        ("xlsx", "pdf",  Direct(OfficeEngine)),
        ("ods",  "ods",  Direct(Copy)),
        ("ods",  "xls",  Direct(OfficeEngine)),
        ("ods",  "xlsx", Direct(OfficeEngine)),
        ("ods",  "pdf",  Direct(OfficeEngine)),

        // Presentations
        ("ppt",  "ppt",  Direct(Copy)),
        ("ppt",  "pptx", Direct(OfficeEngine)),
        ("ppt",  "odp",  Direct(OfficeEngine)),
        ("ppt",  "pdf",  Direct(OfficeEngine)),
        ("pptx", "pptx", Direct(Copy)),
        ("pptx", "ppt",  Direct(OfficeEngine)),
        ("pptx", "odp",  Direct(OfficeEngine)),
        ("pptx", "pdf",  Direct(OfficeEngine)),
        ("odp",  "odp",  Direct(Copy)),
        ("odp",  "ppt",  Direct(OfficeEngine)),
        ("odp",  "pptx", Direct(OfficeEngine)),
        ("odp",  "pdf",  Direct(OfficeEngine)),

        // Raster images
        ("png",  "png",  Direct(Copy)),
        ("png",  "jpg",  Direct(ImageConvert)),
        ("png",  "jpeg", Direct(ImageConvert)),
        ("png",  "webp", Direct(ImageConvert)),
        ("png",  "bmp",  Direct(ImageConvert)),
        ("png",  "pdf",  Direct(ImageEmbedPdf)),
        ("jpg",  "jpg",  Direct(Copy)),
        ("jpg",  "jpeg", Direct(Copy)),
        ("jpg",  "png",  Direct(ImageConvert)),
        ("jpg",  "webp", Direct(ImageConvert)),
        ("jpg",  "bmp",  Direct(ImageConvert)),
        ("jpg",  "pdf",  Direct(ImageEmbedPdf)),
        ("jpeg", "jpeg", Direct(Copy)),
        ("jpeg", "jpg",  Direct(Copy)),
        ("jpeg", "png",  Direct(ImageConvert)),
        ("jpeg", "webp", Direct(ImageConvert)),
        ("jpeg", "bmp",  Direct(ImageConvert)),
        ("jpeg", "pdf",  Direct(ImageEmbedPdf)),
        ("webp", "webp", Direct(Copy)),
        ("webp", "png",  Direct(ImageConvert)),
        ("webp", "jpg",  Direct(ImageConvert)),
        ("webp", "jpeg", Direct(ImageConvert)),
        ("webp", "bmp",  Direct(ImageConvert)),
        ("webp", "pdf",  Direct(ImageEmbedPdf)),
        ("bmp",  "bmp",  Direct(Copy)),
        ("bmp",  "png",  Direct(ImageConvert)),
        ("bmp",  "jpg",  Direct(ImageConvert)),
        ("bmp",  "jpeg", Direct(ImageConvert)),
        ("bmp",  "webp", Direct(ImageConvert)),
        ("bmp",  "pdf",  Direct(ImageEmbedPdf)),
    ];
}

/// Format families whose members convert into each other in both directions.
pub(crate) const OFFICE_FAMILIES: &[&[&str]] = &[
    &["doc", "docx", "odt", "rtf"],
    &["xls", "xlsx", "ods"],
    &["ppt", "pptx", "odp"],
];

static BUILTIN: Lazy<Registry> = Lazy::new(|| Registry::from_table(CONVERSION_TABLE));

/// Read-only lookup over a conversion table
#[derive(Debug)]
pub struct Registry {
    routes: HashMap<&'static str, HashMap<&'static str, Route>>,
}

impl Registry {
    /// The process-wide registry built from [`CONVERSION_TABLE`].
    pub fn builtin() -> &'static Registry {
        &BUILTIN
    }

    pub fn from_table(table: &'static [(&'static str, &'static str, Route)]) -> Self {
        let mut routes: HashMap<&'static str, HashMap<&'static str, Route>> = HashMap::new();
        for &(source, target, route) in table {
            routes.entry(source).or_default().insert(target, route);
        }
        Self { routes }
    }

    fn lookup(&self, source: &str, target: &str) -> Option<Route> {
        self.routes.get(source)?.get(target).copied()
    }

    /// Look up the route for a normalized key.
    pub fn resolve(&self, key: &ConversionKey) -> Result<Route> {
        self.lookup(&key.source, &key.target)
            .ok_or_else(|| Error::UnsupportedConversion {
                source_ext: key.source.clone(),
                target_ext: key.target.clone(),
            })
    }

    pub fn supports(&self, key: &ConversionKey) -> bool {
        self.lookup(&key.source, &key.target).is_some()
    }

    /// Sorted list of targets reachable from `source`.
    pub fn targets_for(&self, source: &str) -> Vec<&'static str> {
        let mut targets: Vec<&'static str> = self
            .routes
            .get(source)
            .map(|targets| targets.keys().copied().collect())
            .unwrap_or_default();
        targets.sort_unstable();
        targets
    }

    /// All entries, sorted by source then target, for audit listings.
    pub fn entries(&self) -> Vec<(&'static str, &'static str, Route)> {
        let mut entries: Vec<_> = self
            .routes
            .iter()
            .flat_map(|(&source, targets)| {
                targets
                    .iter()
                    .map(move |(&target, &route)| (source, target, route))
            })
            .collect();
        entries.sort_unstable_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        entries
    }

    /// Check table consistency: chained legs resolve directly and office
    /// families are fully symmetric. Returns every problem found.
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut problems = Vec::new();

        for (source, target, route) in self.entries() {
            if let Route::Via(via) = route {
                for (a, b) in [(source, via), (via, target)] {
                    match self.lookup(a, b) {
                        Some(Route::Direct(_)) => {}
                        Some(Route::Via(_)) => problems.push(format!(
                            "{}->{}: leg {}->{} is itself chained",
                            source, target, a, b
                        )),
                        None => problems.push(format!(
                            "{}->{}: leg {}->{} missing",
                            source, target, a, b
                        )),
                    }
                }
            }
        }

        for family in OFFICE_FAMILIES {
            for &a in family.iter() {
                if self.lookup(a, "pdf").is_none() {
                    problems.push(format!("{}->pdf missing", a));
                }
                for &b in family.iter() {
                    if self.lookup(a, b).is_none() {
                        problems.push(format!("{}->{} missing", a, b));
                    }
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            problems.sort();
            Err(problems)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str, t: &str) -> ConversionKey {
        ConversionKey::new(s, t).unwrap()
    }

    #[test]
    fn test_builtin_table_is_consistent() {
        assert_eq!(Registry::builtin().validate(), Ok(()));
    }

    #[test]
    fn test_table_has_no_duplicate_rows() {
        let registry = Registry::builtin();
        assert_eq!(registry.entries().len(), CONVERSION_TABLE.len());
    }

    #[test]
    fn test_every_row_resolves() {
        let registry = Registry::builtin();
        for &(source, target, route) in CONVERSION_TABLE {
            assert_eq!(registry.resolve(&key(source, target)).unwrap(), route);
        }
    }

    #[test]
    fn test_identity_pairs_are_copy() {
        let registry = Registry::builtin();
        for (source, _, _) in registry.entries() {
            assert_eq!(
                registry.resolve(&key(source, source)).unwrap(),
                Route::Direct(ConversionStrategy::Copy),
                "{} -> {}",
                source,
                source
            );
        }
    }

    #[test]
    fn test_absent_pair_is_unsupported() {
        let err = Registry::builtin().resolve(&key("xlsx", "docx")).unwrap_err();
        match err {
            Error::UnsupportedConversion {
                source_ext,
                target_ext,
            } => {
                assert_eq!(source_ext, "xlsx");
                assert_eq!(target_ext, "docx");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!Registry::builtin().supports(&key("pdf", "docx")));
        assert!(!Registry::builtin().supports(&key("mp4", "pdf")));
    }

    #[test]
    fn test_validate_reports_broken_chain() {
        static BROKEN: &[(&str, &str, Route)] = &[("pdf", "xls", Route::Via("xlsx"))];
        let problems = Registry::from_table(BROKEN).validate().unwrap_err();
        assert!(problems.iter().any(|p| p.contains("pdf->xlsx missing")));
    }

    #[test]
    fn test_targets_for_pdf() {
        assert_eq!(
            Registry::builtin().targets_for("pdf"),
            vec!["jpeg", "jpg", "pdf", "png", "xls", "xlsx"]
        );
        assert!(Registry::builtin().targets_for("exe").is_empty());
    }
}
