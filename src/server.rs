//! MCP Server implementation using rmcp

use crate::artifact::{Artifact, ArtifactId};
use crate::config::EngineConfig;
use crate::pdf::{CompressionTier, PdfEngine};
use crate::planner::Planner;
use crate::registry::Registry;
use crate::storage::{Area, ArtifactStore, FsArtifactStore};
use crate::tools::Toolchain;
use anyhow::Result;
use rmcp::{
    handler::server::tool::ToolRouter, handler::server::wrapper::Parameters, model::*,
    schemars::JsonSchema, tool, tool_handler, tool_router, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Document source specification
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum DocSource {
    /// File path (absolute or relative)
    Path {
        /// Path to the input file
        path: String,
    },
    /// Output of a previous operation
    Stored {
        /// Identifier returned by a previous tool call
        file_id: String,
        /// Format extension of that output (e.g. "pdf")
        format: String,
    },
}

impl<'de> serde::Deserialize<'de> for DocSource {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;

        if let Some(obj) = value.as_object() {
            if let Some(v) = obj.get("path") {
                if let Some(s) = v.as_str() {
                    return Ok(DocSource::Path {
                        path: s.to_string(),
                    });
                }
                return Err(serde::de::Error::custom("\"path\" must be a string"));
            }
            if let Some(v) = obj.get("file_id") {
                let file_id = v
                    .as_str()
                    .ok_or_else(|| serde::de::Error::custom("\"file_id\" must be a string"))?;
                let format = match obj.get("format") {
                    Some(f) => f
                        .as_str()
                        .ok_or_else(|| serde::de::Error::custom("\"format\" must be a string"))?,
                    None => {
                        return Err(serde::de::Error::custom(
                            "\"file_id\" sources also need a \"format\"",
                        ))
                    }
                };
                return Ok(DocSource::Stored {
                    file_id: file_id.to_string(),
                    format: format.to_string(),
                });
            }
            let keys: Vec<&String> = obj.keys().collect();
            Err(serde::de::Error::custom(format!(
                "Invalid source: expected an object with \"path\" or \"file_id\" and \"format\", but got keys: {:?}",
                keys
            )))
        } else {
            Err(serde::de::Error::custom(format!(
                "Invalid source: expected an object with \"path\" or \"file_id\" and \"format\", but got {}",
                match &value {
                    serde_json::Value::Array(_) => "an array",
                    serde_json::Value::String(_) => "a string",
                    serde_json::Value::Number(_) => "a number",
                    serde_json::Value::Bool(_) => "a boolean",
                    serde_json::Value::Null => "null",
                    _ => "unknown type",
                }
            )))
        }
    }
}

/// Document conversion MCP server
#[derive(Clone)]
pub struct DocServer {
    store: Arc<FsArtifactStore>,
    planner: Planner,
    pdf: PdfEngine,
    tool_router: ToolRouter<Self>,
    /// Server configuration
    config: Arc<EngineConfig>,
}

// ============================================================================
// Request/Response types for convert_file
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ConvertFileParams {
    /// File to convert
    pub source: DocSource,
    /// Target format extension, e.g. "pdf", "docx", "png". A leading dot and
    /// upper case are accepted.
    pub target_format: String,
    /// Output file path (optional). If provided, also saves the result to this path.
    #[serde(default)]
    pub output_path: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ConvertFileResult {
    /// Source identifier
    pub source: String,
    /// Identifier of the converted file (use with format as a `file_id` source)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    /// Format of the converted file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Suggested download name: the source name with the new extension
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_name: Option<String>,
    /// Size of the converted file in bytes
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Path where the file was saved (if output_path was specified)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for merge_pdfs
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MergePdfsParams {
    /// PDF sources to merge (in order). At least two are required.
    pub sources: Vec<DocSource>,
    /// Output file path (optional). If provided, also saves the merged PDF to this path.
    #[serde(default)]
    pub output_path: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct MergePdfsResult {
    /// Number of source PDFs merged
    pub source_count: u32,
    /// Identifier of the merged PDF
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    /// Total pages in output PDF
    pub output_page_count: u32,
    /// Path where PDF was saved (if output_path was specified)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for split_pdf
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SplitPdfParams {
    /// Source PDF to split
    pub source: DocSource,
    /// Comma-separated page ranges, 1-indexed and inclusive.
    ///
    /// - "1-3" : pages 1 through 3
    /// - "1-3,5,7-9" : three output files with pages 1-3, 5 and 7-9
    ///
    /// Each range produces its own PDF, in the order given.
    pub pages: String,
    /// Output directory (optional). If provided, each part is also saved there
    /// as `part_<n>.pdf`.
    #[serde(default)]
    pub output_dir: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct SplitPart {
    /// Identifier of this part
    pub file_id: String,
    /// Pages in this part
    pub page_count: u32,
    /// Path where this part was saved (if output_dir was specified)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct SplitPdfResult {
    /// Source identifier
    pub source: String,
    /// One entry per requested range
    pub parts: Vec<SplitPart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for compress_pdf
// ============================================================================

fn default_tier() -> String {
    "medium".to_string()
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CompressPdfParams {
    /// Source PDF to compress
    pub source: DocSource,
    /// Quality tier: "low" (smallest), "medium" (default) or "high".
    /// Unrecognized values are treated as "medium".
    #[serde(default = "default_tier")]
    pub tier: String,
    /// Output file path (optional). If provided, also saves the PDF to this path.
    #[serde(default)]
    pub output_path: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct CompressPdfResult {
    /// Source identifier
    pub source: String,
    /// Identifier of the compressed PDF
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    /// Tier actually applied
    pub tier: String,
    /// Original file size in bytes
    pub original_size: u64,
    /// Compressed file size in bytes
    pub compressed_size: u64,
    /// Compressed size divided by original size
    pub compression_ratio: f32,
    /// Bytes saved (negative if the output grew)
    pub bytes_saved: i64,
    /// Path where PDF was saved (if output_path was specified)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for list_conversions
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListConversionsParams {
    /// Only list targets for this source format (optional)
    #[serde(default)]
    pub source_format: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ConversionTargets {
    /// Source format
    pub source: String,
    /// Formats it can be converted to
    pub targets: Vec<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ListConversionsResult {
    pub conversions: Vec<ConversionTargets>,
}

// ============================================================================
// Tool implementations
// ============================================================================

#[tool_router]
impl DocServer {
    /// Create a server over the configured storage root
    pub fn with_config(config: EngineConfig) -> crate::error::Result<Self> {
        let store = Arc::new(FsArtifactStore::from_config(&config)?);
        let tools = Toolchain::from_config(&config);
        let shared: Arc<dyn ArtifactStore> = store.clone();
        Ok(Self {
            planner: Planner::new(shared.clone(), tools.clone()),
            pdf: PdfEngine::new(shared, tools),
            store,
            tool_router: Self::tool_router(),
            config: Arc::new(config),
        })
    }

    /// Convert a file to another format
    #[tool(
        description = "Convert a document or image to another format. Supports office documents (doc, docx, odt, rtf, xls, xlsx, ods, ppt, pptx, odp), images (png, jpg, jpeg, webp, bmp) and PDF. Use list_conversions to see which targets each format supports.

PDF to xlsx is a plain per-page text dump, not table recognition. PDF to png/jpg renders only the first page.

Source format: must be {\"path\": \"/absolute/path.docx\"} or {\"file_id\": \"...\", \"format\": \"pdf\"}"
    )]
    async fn convert_file(&self, Parameters(params): Parameters<ConvertFileParams>) -> String {
        let result = self
            .process_convert_file(&params)
            .await
            .unwrap_or_else(|e| {
                log_failure("convert_file", &e);
                ConvertFileResult {
                    source: Self::source_name(&params.source),
                    file_id: None,
                    format: None,
                    download_name: None,
                    size: 0,
                    message: None,
                    output_path: None,
                    error: Some(e.client_message()),
                }
            });

        let response = serde_json::json!({ "results": [result] });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    /// Merge multiple PDFs into one
    #[tool(
        description = "Merge two or more PDF files into a single PDF. Pages keep the order of the sources. The result is referenced by file_id for chaining with other tools.

Source format: each element must be {\"path\": \"/absolute/path.pdf\"} or {\"file_id\": \"...\", \"format\": \"pdf\"}"
    )]
    async fn merge_pdfs(&self, Parameters(params): Parameters<MergePdfsParams>) -> String {
        let result = self
            .process_merge_pdfs(&params)
            .await
            .unwrap_or_else(|e| {
                log_failure("merge_pdfs", &e);
                MergePdfsResult {
                    source_count: params.sources.len() as u32,
                    file_id: None,
                    output_page_count: 0,
                    output_path: None,
                    error: Some(e.client_message()),
                }
            });

        let response = serde_json::json!({ "results": [result] });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    /// Split a PDF by page ranges
    #[tool(
        description = "Split a PDF into several PDFs by page ranges. Each comma-separated range becomes its own file, in the order given.

Examples:
- \"1-3\" : one file with pages 1-3
- \"1-3,5,7-9\" : three files (pages 1-3, page 5, pages 7-9)

Source format: must be {\"path\": \"/absolute/path.pdf\"} or {\"file_id\": \"...\", \"format\": \"pdf\"}"
    )]
    async fn split_pdf(&self, Parameters(params): Parameters<SplitPdfParams>) -> String {
        let result = self
            .process_split_pdf(&params)
            .await
            .unwrap_or_else(|e| {
                log_failure("split_pdf", &e);
                SplitPdfResult {
                    source: Self::source_name(&params.source),
                    parts: Vec::new(),
                    error: Some(e.client_message()),
                }
            });

        let response = serde_json::json!({ "results": [result] });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    /// Compress a PDF
    #[tool(
        description = "Reduce PDF file size by re-encoding it with Ghostscript.

Tiers:
- low: screen quality (~72 dpi images), smallest output
- medium: ebook quality (~150 dpi images), the default
- high: print quality (~300 dpi images)

Source format: must be {\"path\": \"/absolute/path.pdf\"} or {\"file_id\": \"...\", \"format\": \"pdf\"}"
    )]
    async fn compress_pdf(&self, Parameters(params): Parameters<CompressPdfParams>) -> String {
        let result = self
            .process_compress_pdf(&params)
            .await
            .unwrap_or_else(|e| {
                log_failure("compress_pdf", &e);
                CompressPdfResult {
                    source: Self::source_name(&params.source),
                    file_id: None,
                    tier: CompressionTier::parse_lenient(&params.tier).to_string(),
                    original_size: 0,
                    compressed_size: 0,
                    compression_ratio: 1.0,
                    bytes_saved: 0,
                    output_path: None,
                    error: Some(e.client_message()),
                }
            });

        let response = serde_json::json!({ "results": [result] });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    /// List supported conversions
    #[tool(
        description = "List supported format conversions. Optionally restrict the listing to one source format."
    )]
    async fn list_conversions(
        &self,
        Parameters(params): Parameters<ListConversionsParams>,
    ) -> String {
        let result = self.process_list_conversions(&params);
        serde_json::to_string_pretty(&result).unwrap_or_default()
    }
}

impl DocServer {
    fn source_name(source: &DocSource) -> String {
        match source {
            DocSource::Path { path } => path.clone(),
            DocSource::Stored { file_id, format } => format!("<file:{}.{}>", file_id, format),
        }
    }

    /// Name a source is known by to the caller, used for messages and
    /// download names.
    fn display_name(source: &DocSource) -> String {
        match source {
            DocSource::Path { path } => Path::new(path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.clone()),
            DocSource::Stored { file_id, format } => format!("{}.{}", file_id, format),
        }
    }

    /// Resolve a source to an existing artifact, enforcing the sandbox and
    /// the input size limit.
    fn resolve_source(&self, source: &DocSource) -> crate::error::Result<Artifact> {
        let artifact = match source {
            DocSource::Path { path } => {
                let path = self.validate_path_access(path)?;
                Artifact::open(path)?
            }
            DocSource::Stored { file_id, format } => {
                let id = ArtifactId::parse(file_id)?;
                self.store.get(Area::Converted, &id, format)?
            }
        };

        if artifact.size > self.config.max_input_bytes {
            return Err(crate::error::Error::InputTooLarge {
                size: artifact.size,
                max_size: self.config.max_input_bytes,
            });
        }
        Ok(artifact)
    }

    fn access_denied(path: &str) -> crate::error::Error {
        crate::error::Error::PathAccessDenied {
            path: path.to_string(),
        }
    }

    /// Whether a canonical path lies under one of the configured resource
    /// directories.
    fn in_resource_dirs(&self, canonical: &Path) -> bool {
        self.config
            .resource_dirs
            .iter()
            .filter_map(|dir| std::fs::canonicalize(dir).ok())
            .any(|dir| canonical.starts_with(dir))
    }

    /// Check an input path against the resource directories and return its
    /// canonical form. Without resource directories every path is allowed.
    fn validate_path_access(&self, path: &str) -> crate::error::Result<PathBuf> {
        if self.config.resource_dirs.is_empty() {
            return Ok(PathBuf::from(path));
        }

        let canonical = std::fs::canonicalize(path).map_err(|_| Self::access_denied(path))?;
        if self.in_resource_dirs(&canonical) {
            Ok(canonical)
        } else {
            Err(Self::access_denied(path))
        }
    }

    /// Check an output path, which may not exist yet, against the resource
    /// directories. The nearest existing ancestor is canonicalized and the
    /// missing tail re-attached; a `..` in that tail is denied. Returns the
    /// path to write to.
    fn validate_output_path_access(&self, path: &str) -> crate::error::Result<PathBuf> {
        if self.config.resource_dirs.is_empty() {
            return Ok(PathBuf::from(path));
        }

        let mut existing = Path::new(path);
        let mut missing = Vec::new();
        let mut resolved = loop {
            let probe = if existing.as_os_str().is_empty() {
                Path::new(".")
            } else {
                existing
            };
            if let Ok(canonical) = std::fs::canonicalize(probe) {
                break canonical;
            }
            missing.push(existing.file_name().ok_or_else(|| Self::access_denied(path))?);
            existing = existing.parent().ok_or_else(|| Self::access_denied(path))?;
        };
        for name in missing.iter().rev() {
            resolved.push(name);
        }

        if self.in_resource_dirs(&resolved) {
            Ok(resolved)
        } else {
            Err(Self::access_denied(path))
        }
    }

    /// Copy an artifact to a caller-chosen path inside the sandbox, creating
    /// missing directories.
    fn write_output(
        &self,
        output_path: &Option<String>,
        artifact: &Artifact,
    ) -> crate::error::Result<Option<String>> {
        let Some(requested) = output_path else {
            return Ok(None);
        };

        let target = self.validate_output_path_access(requested)?;
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let data = std::fs::read(&artifact.path)?;
        crate::storage::write_atomic(&target, &data)?;
        Ok(Some(target.to_string_lossy().into_owned()))
    }

    /// Remove a staged upload once the caller has its answer.
    fn discard_staged(&self, staged: Artifact) {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = store.delete(&staged) {
                tracing::warn!(path = %staged.path.display(), error = %e, "Failed to remove staged upload");
            }
        });
    }

    pub async fn process_convert_file(
        &self,
        params: &ConvertFileParams,
    ) -> crate::error::Result<ConvertFileResult> {
        let source = self.resolve_source(&params.source)?;
        let staged = self.store.import(&source.path, self.config.max_input_bytes)?;

        let converted = self.planner.convert(&staged, &params.target_format).await;
        self.discard_staged(staged);
        let converted = converted?;

        let name = Self::display_name(&params.source);
        let output_path = self.write_output(&params.output_path, &converted.artifact)?;

        Ok(ConvertFileResult {
            source: Self::source_name(&params.source),
            file_id: Some(converted.artifact.id.to_string()),
            format: Some(converted.extension.clone()),
            download_name: Some(converted.download_name(&name)),
            size: converted.artifact.size,
            message: Some(format!(
                "Converted {} to .{} successfully.",
                name, converted.extension
            )),
            output_path,
            error: None,
        })
    }

    pub async fn process_merge_pdfs(
        &self,
        params: &MergePdfsParams,
    ) -> crate::error::Result<MergePdfsResult> {
        let inputs = params
            .sources
            .iter()
            .map(|source| self.resolve_source(source))
            .collect::<crate::error::Result<Vec<_>>>()?;

        let merged = self.pdf.merge(&inputs).await?;
        let output_page_count = self.pdf.page_count(&merged).await?;
        let output_path = self.write_output(&params.output_path, &merged)?;

        Ok(MergePdfsResult {
            source_count: params.sources.len() as u32,
            file_id: Some(merged.id.to_string()),
            output_page_count,
            output_path,
            error: None,
        })
    }

    pub async fn process_split_pdf(
        &self,
        params: &SplitPdfParams,
    ) -> crate::error::Result<SplitPdfResult> {
        let source = self.resolve_source(&params.source)?;
        let outputs = self.pdf.split(&source, &params.pages).await?;

        let mut parts = Vec::with_capacity(outputs.len());
        for (index, output) in outputs.iter().enumerate() {
            let page_count = self.pdf.page_count(output).await?;
            let output_path = match &params.output_dir {
                Some(dir) => {
                    let path = Path::new(dir).join(format!("part_{}.pdf", index + 1));
                    self.write_output(&Some(path.to_string_lossy().into_owned()), output)?
                }
                None => None,
            };
            parts.push(SplitPart {
                file_id: output.id.to_string(),
                page_count,
                output_path,
            });
        }

        Ok(SplitPdfResult {
            source: Self::source_name(&params.source),
            parts,
            error: None,
        })
    }

    pub async fn process_compress_pdf(
        &self,
        params: &CompressPdfParams,
    ) -> crate::error::Result<CompressPdfResult> {
        let source = self.resolve_source(&params.source)?;
        let tier = CompressionTier::parse_lenient(&params.tier);
        let compressed = self.pdf.compress(&source, tier).await?;

        let original_size = source.size;
        let compressed_size = compressed.size;
        let compression_ratio = if original_size > 0 {
            compressed_size as f32 / original_size as f32
        } else {
            1.0
        };
        let bytes_saved = original_size as i64 - compressed_size as i64;

        let output_path = self.write_output(&params.output_path, &compressed)?;

        Ok(CompressPdfResult {
            source: Self::source_name(&params.source),
            file_id: Some(compressed.id.to_string()),
            tier: tier.to_string(),
            original_size,
            compressed_size,
            compression_ratio,
            bytes_saved,
            output_path,
            error: None,
        })
    }

    pub fn process_list_conversions(&self, params: &ListConversionsParams) -> ListConversionsResult {
        let registry: &Registry = self.planner.registry();

        let sources: Vec<String> = match &params.source_format {
            Some(format) => vec![crate::artifact::normalize_extension(format)],
            None => {
                let mut sources: Vec<String> = registry
                    .entries()
                    .into_iter()
                    .map(|(source, _, _)| source.to_string())
                    .collect();
                sources.dedup();
                sources
            }
        };

        let conversions = sources
            .into_iter()
            .map(|source| ConversionTargets {
                targets: registry
                    .targets_for(&source)
                    .into_iter()
                    .map(String::from)
                    .collect(),
                source,
            })
            .collect();

        ListConversionsResult { conversions }
    }
}

#[tool_handler]
impl ServerHandler for DocServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "docshift converts office documents, images and PDFs between formats, and merges, \
                 splits and compresses PDFs. Results are referenced by file_id and format."
                    .into(),
            ),
        }
    }
}

/// Caller mistakes are routine and logged at info; everything else at warn.
fn failure_level(e: &crate::error::Error) -> tracing::Level {
    if e.kind().is_client_error() {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    }
}

fn log_failure(tool: &'static str, e: &crate::error::Error) {
    if failure_level(e) == tracing::Level::INFO {
        tracing::info!(tool, error = %e, "Request rejected");
    } else {
        tracing::warn!(tool, error = %e, kind = %e.kind(), "Request failed");
    }
}

/// Run the MCP server with configuration from the environment
pub async fn run_server() -> Result<()> {
    run_server_with_config(EngineConfig::from_env()?).await
}

/// Run the MCP server with full configuration
pub async fn run_server_with_config(config: EngineConfig) -> Result<()> {
    if let Err(problems) = Registry::builtin().validate() {
        anyhow::bail!("conversion table is inconsistent: {}", problems.join("; "));
    }

    tracing::info!(
        storage = %config.storage_dir.display(),
        timeout_secs = config.tool_timeout.as_secs(),
        "Opening artifact store"
    );
    let server = DocServer::with_config(config)?;

    tracing::info!("docshift MCP server ready, waiting for connections...");

    let service = server.serve(rmcp::transport::io::stdio()).await?;
    service.waiting().await?;

    Ok(())
}
