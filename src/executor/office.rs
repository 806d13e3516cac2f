//! Office engine (headless LibreOffice)

use crate::error::{Error, Result};
use crate::storage::{promote, staging_dir};
use crate::tools::{OfficeCommand, Toolchain};
use std::path::{Path, PathBuf};

/// Convert `input` to `format` inside `outdir`.
///
/// Every call runs with its own throwaway user profile; LibreOffice refuses
/// to run two instances on one profile. The tool writes into a staging
/// directory and the result only replaces `<outdir>/<stem>.<format>` once
/// the run succeeded.
pub(super) async fn convert(
    tools: &Toolchain,
    input: &Path,
    format: &str,
    outdir: &Path,
) -> Result<PathBuf> {
    let profile = tempfile::Builder::new()
        .prefix("docshift-lo-")
        .tempdir()?;

    let staging = staging_dir(outdir)?;

    let invocation = OfficeCommand::new(input, format, staging.path())
        .profile_dir(profile.path())
        .build(&tools.office)?;

    let staged = invocation.run(tools.timeout).await?;
    let name = staged
        .file_name()
        .ok_or_else(|| Error::execution("soffice", "output has no file name"))?;
    promote(&staged, &outdir.join(name))
}
