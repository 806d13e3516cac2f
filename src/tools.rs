//! External tool invocation
//!
//! Each external program gets a typed builder that validates its inputs and
//! produces a [`ToolInvocation`]. Invocations run with a wall-clock limit and
//! the child is killed if the awaiting future is dropped.

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

/// Longest stderr excerpt kept in error details
const STDERR_EXCERPT: usize = 2000;

/// Binaries and limits shared by every tool invocation
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub office: String,
    pub rasterizer: String,
    pub compressor: String,
    pub timeout: Duration,
}

impl Toolchain {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            office: config.office_binary.clone(),
            rasterizer: config.rasterizer_binary.clone(),
            compressor: config.compressor_binary.clone(),
            timeout: config.tool_timeout,
        }
    }
}

impl Default for Toolchain {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// A fully validated external command plus where its output must appear
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// Short tool name used in logs and errors
    pub tool: &'static str,
    pub program: String,
    pub args: Vec<OsString>,
    pub expected_output: PathBuf,
}

impl ToolInvocation {
    /// Run the command, then verify the expected output exists.
    ///
    /// Non-zero exit, spawn failure and timeout are `ExecutionFailed`;
    /// a zero exit without output is `OutputMissing`.
    pub async fn run(&self, timeout: Duration) -> Result<PathBuf> {
        let start = Instant::now();
        tracing::debug!(
            tool = self.tool,
            program = %self.program,
            args = ?self.args,
            "Running external tool"
        );

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                tracing::warn!(tool = self.tool, program = %self.program, error = %e, "Failed to start tool");
                return Err(Error::execution(
                    self.tool,
                    format!("could not start {}: {}", self.program, e),
                ));
            }
            Err(_) => {
                tracing::warn!(tool = self.tool, timeout_secs = timeout.as_secs_f32(), "Tool timed out");
                return Err(Error::execution(
                    self.tool,
                    format!("timed out after {:.1}s", timeout.as_secs_f32()),
                ));
            }
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            tracing::warn!(
                tool = self.tool,
                status = %output.status,
                elapsed_ms,
                stderr = %excerpt(stderr, 500),
                "Tool exited with failure"
            );
            return Err(Error::execution(
                self.tool,
                format!("{}: {}", output.status, excerpt(stderr, STDERR_EXCERPT)),
            ));
        }

        if !self.expected_output.is_file() {
            tracing::warn!(
                tool = self.tool,
                expected = %self.expected_output.display(),
                "Tool succeeded but output file not found"
            );
            return Err(Error::OutputMissing {
                path: self.expected_output.display().to_string(),
            });
        }

        tracing::info!(tool = self.tool, elapsed_ms, output = %self.expected_output.display(), "Tool completed");
        Ok(self.expected_output.clone())
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Extensions become tool arguments, so only plain alphanumerics are allowed.
fn validate_format(ext: &str) -> Result<()> {
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(Error::invalid_input(format!("invalid format name {:?}", ext)));
    }
    Ok(())
}

fn validate_input(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(Error::NotFound {
            path: path.display().to_string(),
        });
    }
    Ok(())
}

/// Keep a relative path from being parsed as a flag.
fn path_arg(path: &Path) -> OsString {
    if path.is_relative() && path.to_string_lossy().starts_with('-') {
        Path::new(".").join(path).into_os_string()
    } else {
        path.as_os_str().to_os_string()
    }
}

/// Headless LibreOffice batch conversion.
///
/// LibreOffice names its output `<input stem>.<format>` inside `--outdir`;
/// that exact path is the expected output.
#[derive(Debug, Clone)]
pub struct OfficeCommand {
    input: PathBuf,
    format: String,
    outdir: PathBuf,
    profile_dir: Option<PathBuf>,
}

impl OfficeCommand {
    pub fn new(input: impl Into<PathBuf>, format: &str, outdir: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            format: format.to_string(),
            outdir: outdir.into(),
            profile_dir: None,
        }
    }

    /// Use a private user profile so concurrent conversions don't share a lock.
    pub fn profile_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.profile_dir = Some(dir.into());
        self
    }

    pub fn build(self, program: &str) -> Result<ToolInvocation> {
        validate_format(&self.format)?;
        validate_input(&self.input)?;
        if !self.outdir.is_dir() {
            return Err(Error::execution(
                "soffice",
                format!("output directory {} does not exist", self.outdir.display()),
            ));
        }
        let stem = self
            .input
            .file_stem()
            .ok_or_else(|| Error::invalid_input("input has no file name"))?;

        let mut expected_name = stem.to_os_string();
        expected_name.push(".");
        expected_name.push(&self.format);
        let expected_output = self.outdir.join(expected_name);

        let mut args: Vec<OsString> = vec!["--headless".into(), "--norestore".into()];
        if let Some(profile) = &self.profile_dir {
            let mut env_arg = OsString::from("-env:UserInstallation=file://");
            env_arg.push(profile.as_os_str());
            args.push(env_arg);
        }
        args.push("--convert-to".into());
        args.push(self.format.clone().into());
        args.push("--outdir".into());
        args.push(path_arg(&self.outdir));
        args.push(path_arg(&self.input));

        Ok(ToolInvocation {
            tool: "soffice",
            program: program.to_string(),
            args,
            expected_output,
        })
    }
}

/// Image formats the page rasterizer may emit
const RASTER_FORMATS: &[&str] = &["png", "jpg", "jpeg"];

/// ImageMagick render of the first page of a paginated document.
#[derive(Debug, Clone)]
pub struct RasterizeCommand {
    input: PathBuf,
    output: PathBuf,
    density: u32,
    quality: u8,
}

impl RasterizeCommand {
    /// Preview-grade defaults: 300 dpi, quality 95.
    pub fn first_page(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            density: 300,
            quality: 95,
        }
    }

    pub fn build(self, program: &str) -> Result<ToolInvocation> {
        validate_input(&self.input)?;
        let format = self
            .output
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !RASTER_FORMATS.contains(&format.as_str()) {
            return Err(Error::invalid_input(format!(
                "cannot rasterize to {:?}",
                format
            )));
        }

        // `[0]` selects the first page
        let mut page_arg = path_arg(&self.input);
        page_arg.push("[0]");

        let mut args: Vec<OsString> = vec![
            "-density".into(),
            self.density.to_string().into(),
            page_arg,
        ];
        if format != "png" {
            args.extend(["-background", "white", "-alpha", "remove"].map(OsString::from));
        }
        args.push("-quality".into());
        args.push(self.quality.to_string().into());
        args.push(path_arg(&self.output));

        Ok(ToolInvocation {
            tool: "convert",
            program: program.to_string(),
            args,
            expected_output: self.output,
        })
    }
}

/// Ghostscript pdfwrite re-encode with a quality preset.
#[derive(Debug, Clone)]
pub struct CompressCommand {
    input: PathBuf,
    output: PathBuf,
    preset: &'static str,
}

impl CompressCommand {
    /// `preset` is a Ghostscript `-dPDFSETTINGS` value such as `/ebook`.
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, preset: &'static str) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            preset,
        }
    }

    pub fn build(self, program: &str) -> Result<ToolInvocation> {
        validate_input(&self.input)?;
        if !matches!(self.preset, "/screen" | "/ebook" | "/printer" | "/prepress" | "/default") {
            return Err(Error::invalid_input(format!(
                "unknown compression preset {:?}",
                self.preset
            )));
        }

        let mut output_arg = OsString::from("-sOutputFile=");
        output_arg.push(self.output.as_os_str());

        let args: Vec<OsString> = vec![
            "-sDEVICE=pdfwrite".into(),
            "-dCompatibilityLevel=1.4".into(),
            format!("-dPDFSETTINGS={}", self.preset).into(),
            "-dNOPAUSE".into(),
            "-dQUIET".into(),
            "-dBATCH".into(),
            output_arg,
            path_arg(&self.input),
        ];

        Ok(ToolInvocation {
            tool: "gs",
            program: program.to_string(),
            args,
            expected_output: self.output,
        })
    }
}
