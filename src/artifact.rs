//! Artifacts and conversion keys

use crate::error::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};

/// Identifier an artifact's file name is derived from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactId(String);

impl ArtifactId {
    /// Generate a fresh 128-bit random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Accept a caller-supplied identifier. Only `[A-Za-z0-9_-]` is allowed so
    /// the id can never escape its storage area.
    pub fn parse(id: &str) -> Result<Self> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(Error::invalid_input(format!("invalid file id {:?}", id)));
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical form of a format extension: trimmed, no leading dot, lower-case.
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// A file-backed unit of content with a known format extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub id: ArtifactId,
    pub extension: String,
    pub size: u64,
    pub path: PathBuf,
}

impl Artifact {
    /// Open an existing file as an artifact. The id is the file stem and the
    /// extension is the normalized file extension.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound {
                path: path.display().to_string(),
            },
            _ => Error::Io(e),
        })?;
        if !metadata.is_file() {
            return Err(Error::NotFound {
                path: path.display().to_string(),
            });
        }

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::invalid_input(format!("{} has no file name", path.display())))?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(normalize_extension)
            .unwrap_or_default();

        Ok(Self {
            id: ArtifactId(stem.to_string()),
            extension,
            size: metadata.len(),
            path: path.to_path_buf(),
        })
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.{}", self.id, self.extension))
    }

    pub fn is_pdf(&self) -> bool {
        self.extension == "pdf"
    }

    /// Fail with `NotFound` if the backing file disappeared.
    pub fn ensure_exists(&self) -> Result<()> {
        if self.path.is_file() {
            Ok(())
        } else {
            Err(Error::NotFound {
                path: self.path.display().to_string(),
            })
        }
    }
}

/// Ordered `(source, target)` extension pair used as a registry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversionKey {
    pub source: String,
    pub target: String,
}

impl ConversionKey {
    /// Normalize both extensions. Empty extensions are rejected.
    pub fn new(source: &str, target: &str) -> Result<Self> {
        let source = normalize_extension(source);
        let target = normalize_extension(target);
        if source.is_empty() {
            return Err(Error::invalid_input("source file must have an extension"));
        }
        if target.is_empty() {
            return Err(Error::invalid_input("target format must not be empty"));
        }
        Ok(Self { source, target })
    }
}

impl fmt::Display for ConversionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.source, self.target)
    }
}

/// Output of a successful conversion
#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub artifact: Artifact,
    /// Extension of the produced artifact
    pub extension: String,
    /// `{baseName}.{targetExt}` inside the converted area
    pub file_name: String,
}

impl ConversionResult {
    pub fn new(artifact: Artifact) -> Self {
        Self {
            extension: artifact.extension.clone(),
            file_name: artifact.file_name(),
            artifact,
        }
    }

    /// User-facing download name: the original upload's stem with the new extension.
    pub fn download_name(&self, original_name: &str) -> String {
        let stem = Path::new(original_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("converted");
        format!("{}.{}", stem, self.extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension("PDF"), "pdf");
        assert_eq!(normalize_extension(".pdf"), "pdf");
        assert_eq!(normalize_extension(" .Docx "), "docx");
        assert_eq!(normalize_extension(""), "");
    }

    #[test]
    fn test_conversion_key_normalizes() {
        let a = ConversionKey::new("PDF", ".PNG").unwrap();
        let b = ConversionKey::new(".pdf", "png").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "pdf->png");
    }

    #[test]
    fn test_conversion_key_rejects_empty() {
        assert!(ConversionKey::new("", "pdf").is_err());
        assert!(ConversionKey::new("docx", ".").is_err());
    }

    #[test]
    fn test_generated_ids_are_unique_hex() {
        let a = ArtifactId::generate();
        let b = ArtifactId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_artifact_id_parse_rejects_traversal() {
        assert!(ArtifactId::parse("abc123").is_ok());
        assert!(ArtifactId::parse("../etc/passwd").is_err());
        assert!(ArtifactId::parse("a.b").is_err());
        assert!(ArtifactId::parse("").is_err());
    }

    #[test]
    fn test_open_missing_artifact_is_not_found() {
        let err = Artifact::open("/definitely/not/here.pdf").unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_download_name() {
        let artifact = Artifact {
            id: ArtifactId::generate(),
            extension: "pdf".to_string(),
            size: 0,
            path: PathBuf::from("/tmp/x.pdf"),
        };
        let result = ConversionResult::new(artifact);
        assert_eq!(result.download_name("Quarterly Report.docx"), "Quarterly Report.pdf");
        assert_eq!(result.download_name(""), "converted.pdf");
        assert_eq!(result.file_name, "x.pdf");
    }
}
