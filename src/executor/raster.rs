//! First-page rasterization (ImageMagick)

use crate::error::{Error, Result};
use crate::storage::{promote, staging_dir};
use crate::tools::{RasterizeCommand, Toolchain};
use std::path::{Path, PathBuf};

/// Render page one of `input` to `output`. An existing `output` is only
/// replaced by a successful run.
pub(super) async fn first_page(tools: &Toolchain, input: &Path, output: &Path) -> Result<PathBuf> {
    let (dir, name) = match (output.parent(), output.file_name()) {
        (Some(dir), Some(name)) => (dir, name),
        _ => return Err(Error::invalid_input("output has no file name")),
    };
    let staging = staging_dir(dir)?;

    let staged = RasterizeCommand::first_page(input, staging.path().join(name))
        .build(&tools.rasterizer)?
        .run(tools.timeout)
        .await?;
    promote(&staged, output)
}
