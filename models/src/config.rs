use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub node_name: String,
    /// Client id advertised in the file listing root element.
    pub cid: String,
    pub case_sensitive_filelist: bool,
    pub share_hidden: bool,
    pub hide_hidden: bool,
    pub skip_zero_byte: bool,
    /// Hint forwarded to the external hasher, in MiB/s. Zero means unthrottled.
    pub max_hash_speed: u64,
    /// Floor between outbound searches, in seconds. Enforced by the peer layer.
    pub min_search_interval: u64,
    /// Cap on entries emitted into a partial listing. Zero means unlimited.
    pub list_line_limit: u64,
    pub rescan_interval_mins: u64,
    pub listing_refresh_mins: u64,
    pub listing_dir: PathBuf,
    pub settings_path: PathBuf,
    pub log_path: PathBuf,
    pub shares: Vec<SharedRoot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedRoot {
    pub virtual_name: String,
    pub real_path: PathBuf,
}
