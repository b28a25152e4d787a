//! Work on manifests already saved to disk: list them, rewrite their segment
//! references into absolute URLs, and fetch the referenced segments.

pub mod download;
pub mod error;
pub mod listing;
pub mod rewrite;

pub use download::{
    DEFAULT_TIMEOUT, DEFAULT_WORKERS, DownloadSummary, Progress, SegmentDownloader,
    install_rustls_provider, segment_filename, segments_dir,
};
pub use error::{PlaylistError, Result};
pub use listing::{ManifestEntry, list_manifests};
pub use rewrite::{RewrittenManifest, is_segment_reference, rewrite, rewrite_file, segment_urls};

/// Extension of transport-stream segments.
pub const SEGMENT_EXTENSION: &str = ".ts";
