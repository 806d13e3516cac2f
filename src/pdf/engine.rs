//! Merge, split and compress over stored PDF artifacts
//!
//! These operations work on page structure directly and never go through the
//! format registry. Every output is a new artifact in the converted area
//! under a fresh identifier.

use super::compress::CompressionTier;
use super::qpdf::QpdfWrapper;
use super::range::PageRange;
use crate::artifact::{Artifact, ArtifactId};
use crate::error::{Error, Result};
use crate::storage::{discard, write_atomic, Area, ArtifactStore};
use crate::tools::{CompressCommand, Toolchain};
use std::sync::Arc;

/// Run blocking PDF work off the async executor.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::execution("worker", format!("task join error: {}", e)))?
}

fn require_pdf(artifact: &Artifact) -> Result<()> {
    if !artifact.is_pdf() {
        return Err(Error::invalid_input(format!(
            "expected a PDF, got .{}",
            artifact.extension
        )));
    }
    Ok(())
}

fn read_artifact(artifact: &Artifact) -> Result<Vec<u8>> {
    std::fs::read(&artifact.path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound {
            path: artifact.path.display().to_string(),
        },
        _ => Error::Io(e),
    })
}

/// PDF manipulation engine
#[derive(Debug, Clone)]
pub struct PdfEngine {
    store: Arc<dyn ArtifactStore>,
    tools: Toolchain,
}

impl PdfEngine {
    pub fn new(store: Arc<dyn ArtifactStore>, tools: Toolchain) -> Self {
        Self { store, tools }
    }

    /// Number of pages in a stored PDF
    pub async fn page_count(&self, artifact: &Artifact) -> Result<u32> {
        require_pdf(artifact)?;
        let data = read_artifact(artifact)?;
        blocking(move || QpdfWrapper::page_count(&data)).await
    }

    /// Concatenate at least two PDFs in the given order.
    ///
    /// The output only becomes visible once it is completely written.
    pub async fn merge(&self, inputs: &[Artifact]) -> Result<Artifact> {
        if inputs.len() < 2 {
            return Err(Error::invalid_input(format!(
                "merge needs at least 2 PDFs, got {}",
                inputs.len()
            )));
        }
        for input in inputs {
            require_pdf(input)?;
        }

        let sources = inputs
            .iter()
            .map(read_artifact)
            .collect::<Result<Vec<_>>>()?;

        let output = self
            .store
            .location(Area::Converted, &ArtifactId::generate(), "pdf");
        let target = output.clone();
        blocking(move || {
            let refs: Vec<&[u8]> = sources.iter().map(|v| v.as_slice()).collect();
            let merged = QpdfWrapper::merge(&refs)?;
            write_atomic(&target, &merged)
        })
        .await?;

        let artifact = Artifact::open(&output)?;
        tracing::info!(inputs = inputs.len(), output = %artifact.id, "Merged PDFs");
        Ok(artifact)
    }

    /// Split by a page-range spec such as `"1-3,5,7-9"`.
    ///
    /// One artifact per token, in the order the tokens appear.
    pub async fn split(&self, input: &Artifact, spec: &str) -> Result<Vec<Artifact>> {
        require_pdf(input)?;
        let data = read_artifact(input)?;

        let spec_owned = spec.to_string();
        let parts = blocking(move || {
            let total = QpdfWrapper::page_count(&data)?;
            let ranges = PageRange::parse_spec(&spec_owned, total)?;
            QpdfWrapper::extract_ranges(&data, &ranges)
        })
        .await?;

        let mut artifacts = Vec::with_capacity(parts.len());
        for part in parts {
            let path = self
                .store
                .location(Area::Converted, &ArtifactId::generate(), "pdf");
            if let Err(e) = write_atomic(&path, &part) {
                // Don't leave earlier parts of a failed split behind
                for written in &artifacts {
                    let _ = self.store.delete(written);
                }
                return Err(e);
            }
            artifacts.push(Artifact::open(&path)?);
        }

        tracing::info!(source = %input.id, spec, parts = artifacts.len(), "Split PDF");
        Ok(artifacts)
    }

    /// Re-encode through Ghostscript with the tier's quality preset.
    pub async fn compress(&self, input: &Artifact, tier: CompressionTier) -> Result<Artifact> {
        require_pdf(input)?;
        input.ensure_exists()?;

        let output = self
            .store
            .location(Area::Converted, &ArtifactId::generate(), "pdf");
        let invocation =
            CompressCommand::new(&input.path, &output, tier.preset()).build(&self.tools.compressor)?;

        match invocation.run(self.tools.timeout).await {
            Ok(path) => {
                let artifact = Artifact::open(path)?;
                tracing::info!(
                    source = %input.id,
                    tier = %tier,
                    original_size = input.size,
                    compressed_size = artifact.size,
                    "Compressed PDF"
                );
                Ok(artifact)
            }
            Err(e) => {
                discard(&output);
                Err(e)
            }
        }
    }
}
