use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "onionscan", version, about = "Read-only exposure scanner for onion services")]
pub struct Cli {
    /// Onion address or URL, or a .txt file with one target per line
    pub target: String,

    /// Where to write the JSON report
    #[arg(short = 'o', long = "output", default_value = "scan_report.json")]
    pub output: PathBuf,

    /// Per-operation timeout in seconds [default: 10]
    #[arg(long = "timeout")]
    pub timeout: Option<u64>,

    /// SOCKS5 proxy host (falls back to TOR_PROXY_HOST, then 127.0.0.1)
    #[arg(long = "proxy-host")]
    pub proxy_host: Option<String>,

    /// SOCKS5 proxy port (falls back to TOR_PROXY_PORT, then 9050)
    #[arg(long = "proxy-port")]
    pub proxy_port: Option<String>,

    /// Settings file (TOML)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Number of targets scanned at once
    #[arg(long = "max-targets")]
    pub max_targets: Option<usize>,

    /// Verbose human output
    #[arg(short = 'v', long = "verbose", action = ArgAction::SetTrue)]
    pub verbose: bool,

    /// Debug logs (implies verbose)
    #[arg(short = 'd', long = "debug", action = ArgAction::SetTrue)]
    pub debug: bool,
}
