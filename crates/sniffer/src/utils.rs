//! Naming helpers for saved manifests.

use url::Url;

use crate::extractor::MANIFEST_EXTENSION;

/// Characters no supported filesystem accepts in a file name.
const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Device names Windows refuses as file stems.
const RESERVED_STEMS: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Makes a URL path component safe to use as a file name.
///
/// Forbidden and control characters collapse into a single `_`, leading and
/// trailing spaces and dots are dropped, and reserved device stems get a `_`
/// prefix. Returns `None` when nothing usable is left.
pub fn sanitize_component(input: &str) -> Option<String> {
    let mut cleaned = String::with_capacity(input.len());
    let mut replaced = false;
    for c in input.chars() {
        if c.is_control() || FORBIDDEN_CHARS.contains(&c) {
            if !replaced {
                cleaned.push('_');
                replaced = true;
            }
        } else {
            cleaned.push(c);
            replaced = false;
        }
    }

    let trimmed = cleaned.trim_matches(|c| c == ' ' || c == '.');
    if trimmed.is_empty() {
        return None;
    }

    let stem = trimmed.split('.').next().unwrap_or(trimmed).to_uppercase();
    if RESERVED_STEMS.contains(&stem.as_str()) {
        return Some(format!("_{trimmed}"));
    }
    Some(trimmed.to_owned())
}

/// Synthesized name used when a URL carries no extension-bearing file name.
pub fn synthesized_name(ordinal: usize) -> String {
    format!("stream_{ordinal}{MANIFEST_EXTENSION}")
}

/// Derives the on-disk name of a manifest from the last segment of its URL path.
///
/// Falls back to [`synthesized_name`] when the path has no segment containing
/// a `.`; an existing non-manifest extension is kept as is.
pub fn manifest_filename(url: &str, ordinal: usize) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_owned))
        })
        .filter(|name| name.contains('.'))
        .and_then(|name| sanitize_component(&name))
        .filter(|name| name.contains('.'))
        .unwrap_or_else(|| synthesized_name(ordinal))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uses_last_path_segment() {
        assert_eq!(
            manifest_filename("https://cdn.example.com/live/abc123.m3u8?token=xyz", 1),
            "abc123.m3u8"
        );
    }

    #[test]
    fn keeps_other_extensions() {
        assert_eq!(
            manifest_filename("https://cdn.example.com/live/playlist.php?id=3", 2),
            "playlist.php"
        );
    }

    #[test]
    fn synthesizes_without_extension() {
        assert_eq!(
            manifest_filename("https://cdn.example.com/live/playlist?fmt=m3u8", 4),
            "stream_4.m3u8"
        );
        assert_eq!(manifest_filename("https://cdn.example.com/", 5), "stream_5.m3u8");
        assert_eq!(manifest_filename("not a url .m3u8", 6), "stream_6.m3u8");
    }

    #[test]
    fn sanitizes_components() {
        assert_eq!(sanitize_component("a:b.m3u8").as_deref(), Some("a_b.m3u8"));
        assert_eq!(sanitize_component("...").as_deref(), None);
        assert_eq!(sanitize_component("con.m3u8").as_deref(), Some("_con.m3u8"));
        assert_eq!(sanitize_component("直播.m3u8").as_deref(), Some("直播.m3u8"));
    }
}
