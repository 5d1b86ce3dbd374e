use clap::Parser;
use models::{AppConfig, SharedRoot};
use std::path::PathBuf;
use std::str::FromStr;
use utilities::MemoryHasher;

#[derive(Debug, Parser)]
#[command(name = "sharebox", about = "Share index node")]
pub struct CliConfig {
    /// Compare file names case-sensitively
    #[arg(long, default_value_t = false)]
    pub case_sensitive_filelist: bool,

    /// Allow sharing hidden directories and files
    #[arg(long, default_value_t = false)]
    pub share_hidden: bool,

    /// Skip hidden entries while scanning even inside visible shares
    #[arg(long, default_value_t = false)]
    pub hide_hidden: bool,

    /// Skip zero-byte files while scanning
    #[arg(long, default_value_t = false)]
    pub skip_zero_byte: bool,

    /// Hasher throughput hint in MiB/s (0 = unthrottled)
    #[arg(long, default_value_t = 0)]
    pub max_hash_speed: u64,

    /// Floor between outbound searches, in seconds
    #[arg(long, default_value_t = 10)]
    pub min_search_interval: u64,

    /// Cap on entries in a partial listing (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    pub list_line_limit: u64,

    /// Minutes between automatic full rescans
    #[arg(long, default_value_t = 60)]
    pub rescan_interval_mins: u64,

    /// Minutes the cached listing is served before regeneration
    #[arg(long, default_value_t = 15)]
    pub listing_refresh_mins: u64,

    /// Directory the listing files are written to
    #[arg(long, default_value = "listing")]
    pub listing_dir: PathBuf,

    /// Path of the persisted share map
    #[arg(long, default_value = "shares.xml")]
    pub settings_path: PathBuf,

    /// Path to the log file
    #[arg(long, default_value = "sharebox.log")]
    pub log_path: PathBuf,

    /// Directories to share, in the form VIRTUAL=PATH
    #[arg(
        long = "share",
        value_name = "VIRTUAL=PATH",
        value_parser = parse_share_arg
    )]
    pub shares: Vec<ShareCli>,

    /// Client id advertised in listings; derived from the host name if absent
    #[arg(long)]
    pub cid: Option<String>,
}

impl CliConfig {
    pub fn into_app_config(self) -> AppConfig {
        // Node name is derived at runtime so the CLI stays minimal
        let node_name = hostname::get()
            .unwrap_or_else(|_| "unknown-node".into())
            .to_string_lossy()
            .into_owned();
        // Deterministic across restarts of the same host
        let cid = self
            .cid
            .unwrap_or_else(|| MemoryHasher::digest(node_name.as_bytes()).encoded());

        AppConfig {
            node_name,
            cid,
            case_sensitive_filelist: self.case_sensitive_filelist,
            share_hidden: self.share_hidden,
            hide_hidden: self.hide_hidden,
            skip_zero_byte: self.skip_zero_byte,
            max_hash_speed: self.max_hash_speed,
            min_search_interval: self.min_search_interval,
            list_line_limit: self.list_line_limit,
            rescan_interval_mins: self.rescan_interval_mins,
            listing_refresh_mins: self.listing_refresh_mins,
            listing_dir: self.listing_dir,
            settings_path: self.settings_path,
            log_path: self.log_path,
            shares: self
                .shares
                .into_iter()
                .map(ShareCli::into_shared_root)
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShareCli {
    pub virtual_name: String,
    pub real_path: PathBuf,
}

impl ShareCli {
    fn into_shared_root(self) -> SharedRoot {
        SharedRoot {
            virtual_name: self.virtual_name,
            real_path: self.real_path,
        }
    }
}

impl FromStr for ShareCli {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_share_arg(s)
    }
}

fn parse_share_arg(raw: &str) -> Result<ShareCli, String> {
    let (name, path) = raw
        .split_once('=')
        .ok_or_else(|| "share must be VIRTUAL=PATH".to_string())?;

    if name.trim().is_empty() {
        return Err("virtual name cannot be empty".to_string());
    }
    if path.is_empty() {
        return Err("share path cannot be empty".to_string());
    }

    Ok(ShareCli {
        virtual_name: name.to_string(),
        real_path: PathBuf::from(path),
    })
}
