//! Command-line arguments.

use clap::Parser;
use std::path::PathBuf;

/// Check which services have accounts for the numbers matching a pattern.
#[derive(Debug, Parser)]
#[command(name = "tessera", version, about)]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Phone number pattern with `x` wildcards, e.g. "+420 731x4x748"
    #[arg(required_unless_present = "show_services")]
    pub pattern: Option<String>,

    /// Services to check, comma separated (default: every loaded descriptor)
    #[arg(short, long, value_delimiter = ',')]
    pub services: Option<Vec<String>>,

    /// File with one proxy per line
    #[arg(short, long, value_name = "FILE")]
    pub proxies: Option<PathBuf>,

    /// Worker threads; 0 checks sequentially
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Seconds to wait between checks (default: slowest recommended delay)
    #[arg(short, long, value_name = "SECS")]
    pub delay: Option<u64>,

    /// Skip this many variations
    #[arg(long, default_value_t = 0)]
    pub start_index: usize,

    /// Only expand the first digit into the country's mobile prefixes
    #[arg(long)]
    pub country_prefixes: bool,

    /// Maximum variations in one run
    #[arg(long)]
    pub max_variations: Option<usize>,

    /// Don't pause when an account is found
    #[arg(long)]
    pub no_pause: bool,

    /// Pause prompts start disabled
    #[arg(long)]
    pub auto_continue: bool,

    /// Additional descriptor directory (repeatable)
    #[arg(long = "descriptors", value_name = "DIR")]
    pub descriptor_dirs: Vec<PathBuf>,

    /// List loaded services and exit
    #[arg(long)]
    pub show_services: bool,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
