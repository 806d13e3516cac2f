//! Strategy executors
//!
//! One executor per [`ConversionStrategy`]. Each turns a stored source into
//! `converted/{source id}.{target}` or fails with a classified error.
//! Executors never call each other; multi-hop conversions are sequenced by
//! the planner.

mod imaging;
mod office;
mod raster;
mod spreadsheet;

pub use imaging::{flatten_onto_white, supports_alpha, EMBED_DPI, JPEG_QUALITY};
pub use spreadsheet::{build_rows, SheetRow, SHEET_NAME};

use crate::artifact::{normalize_extension, Artifact};
use crate::error::Result;
use crate::pdf::blocking;
use crate::registry::ConversionStrategy;
use crate::storage::{write_atomic, Area, ArtifactStore};
use crate::tools::Toolchain;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Runs a single conversion hop
#[derive(Debug, Clone)]
pub struct Executor {
    store: Arc<dyn ArtifactStore>,
    tools: Toolchain,
}

impl Executor {
    pub fn new(store: Arc<dyn ArtifactStore>, tools: Toolchain) -> Self {
        Self { store, tools }
    }

    /// Where the output of converting `source` to `target` is written
    pub fn output_location(&self, source: &Artifact, target: &str) -> PathBuf {
        self.store.location(Area::Converted, &source.id, target)
    }

    /// Run `strategy` on `source`, producing an artifact with `target_ext`.
    ///
    /// A missing source is `NotFound` and nothing is spawned for it.
    pub async fn execute(
        &self,
        strategy: ConversionStrategy,
        source: &Artifact,
        target_ext: &str,
    ) -> Result<Artifact> {
        source.ensure_exists()?;
        let target = normalize_extension(target_ext);
        let output = self.output_location(source, &target);

        tracing::debug!(
            strategy = %strategy,
            source = %source.path.display(),
            output = %output.display(),
            "Executing conversion"
        );

        let produced = match strategy {
            ConversionStrategy::Copy => copy(&source.path, &output).await,
            ConversionStrategy::OfficeEngine => {
                let outdir = self.store.area_dir(Area::Converted);
                office::convert(&self.tools, &source.path, &target, outdir).await
            }
            ConversionStrategy::RasterizePage => {
                raster::first_page(&self.tools, &source.path, &output).await
            }
            ConversionStrategy::ImageConvert => {
                imaging::convert(&source.path, &output, &target).await
            }
            ConversionStrategy::ImageEmbedPdf => imaging::embed_pdf(&source.path, &output).await,
            ConversionStrategy::ExtractToSpreadsheet => {
                spreadsheet::extract(&source.path, &output).await
            }
        };

        // Tool runs write into staging directories, so a failure here never
        // touches an output an earlier run already produced
        produced.and_then(Artifact::open)
    }
}

/// Byte-for-byte copy into the output location
async fn copy(input: &Path, output: &Path) -> Result<PathBuf> {
    let input = input.to_path_buf();
    let output = output.to_path_buf();
    blocking(move || {
        let data = std::fs::read(&input)?;
        write_atomic(&output, &data)?;
        Ok(output)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::storage::FsArtifactStore;
    use tempfile::TempDir;

    fn executor(dir: &TempDir) -> (Executor, Arc<FsArtifactStore>) {
        let store = Arc::new(FsArtifactStore::new(dir.path()).unwrap());
        (Executor::new(store.clone(), Toolchain::default()), store)
    }

    #[tokio::test]
    async fn test_copy_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let (executor, store) = executor(&dir);
        let source = store.put(Area::Uploads, "pdf", b"%PDF-1.4 bytes").unwrap();

        let first = executor
            .execute(ConversionStrategy::Copy, &source, "pdf")
            .await
            .unwrap();
        let second = executor
            .execute(ConversionStrategy::Copy, &source, ".PDF")
            .await
            .unwrap();

        assert_eq!(first.path, second.path);
        assert_eq!(first.id, source.id);
        assert_eq!(std::fs::read(&second.path).unwrap(), b"%PDF-1.4 bytes");
    }

    #[tokio::test]
    async fn test_missing_source_is_not_found() {
        let dir = TempDir::new().unwrap();
        let (executor, store) = executor(&dir);
        let source = store.put(Area::Uploads, "png", b"x").unwrap();
        store.delete(&source).unwrap();

        let err = executor
            .execute(ConversionStrategy::ImageConvert, &source, "jpg")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_missing_office_binary_leaves_no_output() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FsArtifactStore::new(dir.path()).unwrap());
        let tools = Toolchain {
            office: "/nonexistent/soffice".to_string(),
            ..Toolchain::default()
        };
        let executor = Executor::new(store.clone(), tools);
        let source = store.put(Area::Uploads, "docx", b"PK").unwrap();

        let err = executor
            .execute(ConversionStrategy::OfficeEngine, &source, "pdf")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExecutionFailed);
        assert!(!executor.output_location(&source, "pdf").exists());
    }
}
