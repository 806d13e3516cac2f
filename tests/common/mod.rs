//! Shared helpers for integration tests and benches

#![allow(dead_code)]

use std::path::{Path, PathBuf};

/// Build an uncompressed PDF with `pages` pages. Page N shows the text
/// "Page N".
pub fn make_pdf(pages: u32) -> Vec<u8> {
    let mut objects: Vec<String> = Vec::new();

    let kids: Vec<String> = (0..pages).map(|i| format!("{} 0 R", 4 + 2 * i)).collect();
    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids.join(" "),
        pages
    ));
    objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string());

    for i in 0..pages {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            5 + 2 * i
        ));
        let content = format!("BT /F1 24 Tf 72 700 Td (Page {}) Tj ET", i + 1);
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ));
    }

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_offset = out.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        xref.push_str(&format!("{:010} 00000 n \n", offset));
    }
    out.extend_from_slice(xref.as_bytes());
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        )
        .as_bytes(),
    );
    out
}

/// Write an executable shell script standing in for an external tool.
#[cfg(unix)]
pub fn fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// LibreOffice stand-in: copies the input to `<outdir>/<stem>.<format>` and
/// appends its arguments to `calls.log` next to the script.
pub const FAKE_SOFFICE: &str = r#"echo "$@" >> "$(dirname "$0")/calls.log"
fmt=""; outdir=""; input=""
while [ $# -gt 0 ]; do
  case "$1" in
    --convert-to) fmt="$2"; shift 2 ;;
    --outdir) outdir="$2"; shift 2 ;;
    -*) shift ;;
    *) input="$1"; shift ;;
  esac
done
name=$(basename "$input")
cp "$input" "$outdir/${name%.*}.$fmt""#;

/// ImageMagick stand-in: writes a placeholder to the last argument.
pub const FAKE_CONVERT: &str = r#"echo "$@" >> "$(dirname "$0")/calls.log"
for last; do :; done
printf 'raster' > "$last""#;

/// Ghostscript stand-in: copies the input (last argument) to -sOutputFile.
pub const FAKE_GS: &str = r#"echo "$@" >> "$(dirname "$0")/calls.log"
out=""
for arg; do
  case "$arg" in
    -sOutputFile=*) out="${arg#-sOutputFile=}" ;;
  esac
  last="$arg"
done
cp "$last" "$out""#;

/// Exits non-zero with a diagnostic on stderr.
pub const FAILING_TOOL: &str = "echo 'fatal: /srv/private/path exploded' >&2\nexit 3";

/// Reports success without producing anything.
pub const SILENT_TOOL: &str = "exit 0";

/// Never finishes within a short timeout.
pub const SLOW_TOOL: &str = "sleep 5";

/// Number of entries in a directory, 0 if it doesn't exist.
pub fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}
