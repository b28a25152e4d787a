use std::path::PathBuf;

use clap::Parser;

pub const DEFAULT_PREFIX: &str = "https://dtliving-sz.dingtalk.com/live/";

#[derive(Parser, Debug)]
#[command(
    name = "segdl",
    author,
    version,
    about = "Rewrite a captured HLS manifest and download its segments",
    long_about = None
)]
pub struct Args {
    /// Directory holding captured manifests
    #[arg(long, default_value = "downloaded_m3u8")]
    pub manifest_dir: PathBuf,

    /// Directory receiving the rewritten manifest and its segments
    #[arg(short, long, default_value = "temp")]
    pub output_dir: PathBuf,

    /// Prepended to every relative segment reference
    #[arg(short, long, default_value = DEFAULT_PREFIX)]
    pub prefix: String,

    /// Per-segment request timeout in seconds
    #[arg(short, long, default_value_t = 30)]
    pub timeout: u64,

    /// Enable verbose logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,
}
