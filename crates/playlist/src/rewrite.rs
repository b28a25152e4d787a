//! Turning relative segment references into absolute URLs.
//!
//! The rewrite prefixes every segment reference unconditionally. It must be
//! applied once, to a manifest as it was captured: already absolute
//! references would be prefixed again.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::SEGMENT_EXTENSION;
use crate::error::Result;

/// Whether a manifest line refers to a transport-stream segment.
pub fn is_segment_reference(line: &str) -> bool {
    if line.starts_with('#') {
        return false;
    }
    line.ends_with(SEGMENT_EXTENSION) || line.contains(".ts?")
}

/// Prefixes every segment line of `content` with `prefix`.
///
/// Other lines, line order and line terminators are kept byte for byte.
pub fn rewrite(content: &str, prefix: &str) -> String {
    let mut out = String::with_capacity(content.len() + prefix.len() * 16);
    for line in content.split_inclusive('\n') {
        let (body, terminator) = split_terminator(line);
        if is_segment_reference(body) {
            out.push_str(prefix);
        }
        out.push_str(body);
        out.push_str(terminator);
    }
    out
}

fn split_terminator(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}

/// Absolute segment URLs listed in `content`, in manifest order.
pub fn segment_urls(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("http://") || line.starts_with("https://"))
        .filter(|line| is_segment_reference(line))
        .map(str::to_owned)
        .collect()
}

/// Rewritten copy of a saved manifest.
#[derive(Debug, Clone)]
pub struct RewrittenManifest {
    pub path: PathBuf,
    pub content: String,
}

/// Rewrites the manifest at `input` into `output_dir` under the same name.
pub async fn rewrite_file(
    input: &Path,
    output_dir: &Path,
    prefix: &str,
) -> Result<RewrittenManifest> {
    let content = tokio::fs::read_to_string(input).await?;
    let rewritten = rewrite(&content, prefix);

    tokio::fs::create_dir_all(output_dir).await?;
    let name = input.file_name().unwrap_or(input.as_os_str());
    let path = output_dir.join(name);
    tokio::fs::write(&path, &rewritten).await?;
    info!(path = %path.display(), "rewritten manifest saved");

    Ok(RewrittenManifest {
        path,
        content: rewritten,
    })
}
