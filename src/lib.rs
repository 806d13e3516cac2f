//! docshift: document conversion engine
//!
//! - `registry`: which `(source, target)` format pairs are supported and how
//! - `executor`: one executor per conversion strategy
//! - `pdf`: merge, split and compress for PDFs
//! - `planner`: sequences executors for a requested conversion
//! - `server`: MCP tools over all of the above

pub mod artifact;
pub mod config;
pub mod error;
pub mod executor;
pub mod pdf;
pub mod planner;
pub mod registry;
pub mod server;
pub mod storage;
pub mod tools;

pub use artifact::{normalize_extension, Artifact, ArtifactId, ConversionKey, ConversionResult};
pub use config::EngineConfig;
pub use error::{Error, ErrorKind, Result};
pub use executor::Executor;
pub use pdf::{CompressionTier, PageRange, PdfEngine};
pub use planner::{Hop, Planner};
pub use registry::{ConversionStrategy, Registry, Route};
pub use server::{run_server, run_server_with_config, DocServer, DocSource};
pub use storage::{Area, ArtifactStore, FsArtifactStore};
pub use tools::Toolchain;
