//! Artifact storage
//!
//! The conversion core only reaches the filesystem through [`ArtifactStore`].
//! External tools need real paths, so the store hands out locations as well as
//! bytes; the layout behind those locations is up to the implementation.

use crate::artifact::{normalize_extension, Artifact, ArtifactId};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Storage area an artifact lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Area {
    /// Caller-provided inputs
    Uploads,
    /// Executor and PDF engine outputs
    Converted,
}

/// Put/get/delete by identifier, plus the location tools should write to.
pub trait ArtifactStore: Send + Sync + std::fmt::Debug {
    /// Directory backing an area
    fn area_dir(&self, area: Area) -> &Path;

    /// Where the artifact `{id}.{ext}` lives (or will live) in `area`
    fn location(&self, area: Area, id: &ArtifactId, ext: &str) -> PathBuf {
        self.area_dir(area)
            .join(format!("{}.{}", id, normalize_extension(ext)))
    }

    /// Store new content under a fresh identifier
    fn put(&self, area: Area, ext: &str, data: &[u8]) -> Result<Artifact>;

    /// Look up an existing artifact, `NotFound` if it expired or was deleted
    fn get(&self, area: Area, id: &ArtifactId, ext: &str) -> Result<Artifact>;

    /// Remove an artifact; already-deleted artifacts are not an error
    fn delete(&self, artifact: &Artifact) -> Result<()>;
}

/// Filesystem store with `uploads/` and `converted/` under one root
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    uploads: PathBuf,
    converted: PathBuf,
}

impl FsArtifactStore {
    /// Create the store, creating both area directories if needed.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        Self::with_areas(root.join("uploads"), root.join("converted"))
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Self::with_areas(config.uploads_dir(), config.converted_dir())
    }

    fn with_areas(uploads: PathBuf, converted: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&uploads)?;
        std::fs::create_dir_all(&converted)?;
        Ok(Self { uploads, converted })
    }

    /// Copy a file from outside the store into the uploads area, enforcing a
    /// size limit. The stored copy gets a fresh identifier.
    pub fn import<P: AsRef<Path>>(&self, source: P, max_bytes: u64) -> Result<Artifact> {
        let source = Artifact::open(source)?;
        if source.size > max_bytes {
            return Err(Error::InputTooLarge {
                size: source.size,
                max_size: max_bytes,
            });
        }
        let data = std::fs::read(&source.path)?;
        self.put(Area::Uploads, &source.extension, &data)
    }
}

impl ArtifactStore for FsArtifactStore {
    fn area_dir(&self, area: Area) -> &Path {
        match area {
            Area::Uploads => &self.uploads,
            Area::Converted => &self.converted,
        }
    }

    fn put(&self, area: Area, ext: &str, data: &[u8]) -> Result<Artifact> {
        let id = ArtifactId::generate();
        let path = self.location(area, &id, ext);
        write_atomic(&path, data)?;
        tracing::debug!(path = %path.display(), bytes = data.len(), "Stored artifact");
        Artifact::open(&path)
    }

    fn get(&self, area: Area, id: &ArtifactId, ext: &str) -> Result<Artifact> {
        Artifact::open(self.location(area, id, ext))
    }

    fn delete(&self, artifact: &Artifact) -> Result<()> {
        match std::fs::remove_file(&artifact.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

/// Write `data` to `path` through a temp file in the same directory, so
/// readers see either nothing or the complete file.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(".partial-")
        .tempfile_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

/// Private scratch directory inside `dir` for an external tool to write into.
/// Dropping it removes whatever the tool left behind.
pub(crate) fn staging_dir(dir: &Path) -> Result<TempDir> {
    std::fs::create_dir_all(dir)?;
    Ok(tempfile::Builder::new().prefix(".staging-").tempdir_in(dir)?)
}

/// Move a finished tool output from its staging directory to `dest`,
/// replacing any earlier file there in one rename.
pub(crate) fn promote(staged: &Path, dest: &Path) -> Result<PathBuf> {
    std::fs::rename(staged, dest)?;
    Ok(dest.to_path_buf())
}

/// Remove a possibly half-written tool output, ignoring absence.
pub(crate) fn discard(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial output");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_put_get_delete() {
        let root = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(root.path()).unwrap();

        let artifact = store.put(Area::Uploads, ".PDF", b"%PDF-1.4").unwrap();
        assert_eq!(artifact.extension, "pdf");
        assert_eq!(artifact.size, 8);
        assert!(artifact.path.starts_with(root.path().join("uploads")));

        let fetched = store.get(Area::Uploads, &artifact.id, "pdf").unwrap();
        assert_eq!(fetched, artifact);

        store.delete(&artifact).unwrap();
        assert!(store.get(Area::Uploads, &artifact.id, "pdf").is_err());
        // Second delete is a no-op
        store.delete(&artifact).unwrap();
    }

    #[test]
    fn test_location_uses_id_and_extension() {
        let root = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(root.path()).unwrap();
        let id = ArtifactId::parse("abc").unwrap();
        assert_eq!(
            store.location(Area::Converted, &id, "PNG"),
            root.path().join("converted").join("abc.png")
        );
    }

    #[test]
    fn test_import_enforces_size_limit() {
        let root = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(root.path().join("store")).unwrap();
        let outside = root.path().join("big.docx");
        std::fs::write(&outside, vec![0u8; 64]).unwrap();

        let err = store.import(&outside, 10).unwrap_err();
        assert!(matches!(err, Error::InputTooLarge { size: 64, max_size: 10 }));

        let imported = store.import(&outside, 64).unwrap();
        assert_eq!(imported.extension, "docx");
        assert_ne!(imported.id.as_str(), "big");
    }

    #[test]
    fn test_write_atomic_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.bin");
        write_atomic(&target, b"one").unwrap();
        write_atomic(&target, b"two").unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"two");
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_promote_replaces_destination_and_staging_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.pdf");
        std::fs::write(&dest, b"old").unwrap();

        let staging = staging_dir(dir.path()).unwrap();
        let staged = staging.path().join("out.pdf");
        std::fs::write(&staged, b"new").unwrap();

        assert_eq!(promote(&staged, &dest).unwrap(), dest);
        drop(staging);

        assert_eq!(std::fs::read(&dest).unwrap(), b"new");
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
