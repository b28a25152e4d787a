use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "sniffer",
    author,
    version,
    about = "Open a live room in a browser and save every HLS manifest it is handed",
    long_about = None
)]
pub struct Args {
    /// Live-room page to open
    pub room_url: Option<String>,

    /// Config file (defaults to <config dir>/m3u8-sniffer/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory receiving captured manifests
    #[arg(short = 'o', long)]
    pub manifest_dir: Option<PathBuf>,

    /// DevTools endpoint of an already running browser
    #[arg(long)]
    pub cdp_endpoint: Option<String>,

    /// Browser executable to launch when nothing is listening on the endpoint
    #[arg(long = "browser-path")]
    pub browser_paths: Vec<PathBuf>,

    /// Launch the browser without a window
    #[arg(long)]
    pub headless: bool,

    /// Browser profile directory
    #[arg(long)]
    pub user_data_dir: Option<PathBuf>,

    /// Manifest request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Also write a daily log file into this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,
}
