#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use models::{AppConfig, TthValue};
use share::{IndexConfig, ShareIndex};
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use utilities::{init_logging, FileSystem, Hasher, MemoryHasher, RealFileSystem};

const APP_BANNER: &str = r#"
      _                    _
  ___| |_  __ _ _ _ ___| |__  _____ __
 (_-< ' \/ _` | '_/ -_) '_ \/ _ \ \ /
 /__/_||_\__,_|_| \___|_.__/\___/_\_\"#;

const SEPARATOR: &str =
    "------------------------------------------------------------------------";

/// Events the external hasher and queue manager deliver to the index.
#[derive(Debug, Clone)]
pub enum IndexEvent {
    HashDone { real_path: PathBuf, tth: TthValue },
    FileMoved { real_path: PathBuf },
}

pub struct Engine {
    cfg: AppConfig,
    fs: Arc<dyn FileSystem>,
    index: Arc<ShareIndex>,
    event_tx: mpsc::Sender<IndexEvent>,
    event_rx: Option<mpsc::Receiver<IndexEvent>>,
}

impl Engine {
    pub fn new(cfg: AppConfig) -> Result<Self> {
        let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem::new());
        let hasher: Arc<dyn Hasher> = Arc::new(MemoryHasher::new());
        Self::with_fs_hasher(cfg, fs, hasher)
    }

    pub fn with_fs_hasher(
        cfg: AppConfig,
        fs: Arc<dyn FileSystem>,
        hasher: Arc<dyn Hasher>,
    ) -> Result<Self> {
        init_logging(&cfg.log_path, fs.as_ref())?;
        log_banner();
        let mut index_cfg = IndexConfig::from_app(&cfg);
        index_cfg.generator = format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        let index = ShareIndex::new(index_cfg, Arc::clone(&fs), hasher);
        let (event_tx, event_rx) = mpsc::channel::<IndexEvent>(1024);
        Ok(Self {
            cfg,
            fs,
            index,
            event_tx,
            event_rx: Some(event_rx),
        })
    }

    /// Handle collaborators use to reach the index directly.
    pub fn index(&self) -> Arc<ShareIndex> {
        Arc::clone(&self.index)
    }

    /// Sender the hasher and queue listeners publish their events to.
    pub fn events(&self) -> mpsc::Sender<IndexEvent> {
        self.event_tx.clone()
    }

    pub async fn run(self) -> Result<()> {
        let token = CancellationToken::new();
        self.run_with_token(token).await
    }

    pub async fn run_with_token(mut self, token: CancellationToken) -> Result<()> {
        info!("engine running");
        self.load_share_map();

        // The single rescan worker; walks the filesystem off the runtime.
        let worker = {
            let index = Arc::clone(&self.index);
            let worker_token = token.clone();
            tokio::task::spawn_blocking(move || share::scan::run_refresh_worker(index, worker_token))
        };
        self.index.refresh(true, true, false);

        let mut event_rx = self.event_rx.take().expect("event_rx must be present");
        let sink_index = Arc::clone(&self.index);
        let sink_token = token.clone();
        let sink_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = sink_token.cancelled() => break,
                    maybe_event = event_rx.recv() => {
                        let Some(event) = maybe_event else { break };
                        dispatch_event(&sink_index, event);
                    }
                }
            }
        });

        let tick_index = Arc::clone(&self.index);
        let tick_token = token.clone();
        let minute_task = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(60));
            // The immediate first tick would race the initial rescan.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = tick_token.cancelled() => break,
                    _ = ticker.tick() => tick_index.on_minute_tick(now_secs()),
                }
            }
        });

        tokio::select! {
            _ = token.cancelled() => {
                info!("engine cancellation requested");
            }
            _ = async {
                let _ = tokio::join!(sink_task, minute_task);
            } => {}
        }

        self.save_share_map();
        let _ = worker.await;
        Ok(())
    }

    /// Restore the share map from the settings document, falling back to
    /// the configured shares on first start.
    fn load_share_map(&self) {
        match self.fs.read(&self.cfg.settings_path) {
            Ok(raw) => {
                let doc = String::from_utf8_lossy(&raw);
                self.index.load_settings(&doc);
            }
            Err(_) => {
                for shared in &self.cfg.shares {
                    if let Err(e) = self
                        .index
                        .add_directory(&shared.real_path, &shared.virtual_name)
                    {
                        warn!(
                            "cannot share {} as {}: {e}",
                            shared.real_path.display(),
                            shared.virtual_name
                        );
                    }
                }
            }
        }
    }

    fn save_share_map(&self) {
        let doc = self.index.save_settings();
        if let Err(e) = self.fs.write(&self.cfg.settings_path, doc.as_bytes()) {
            error!(
                "cannot persist share map to {}: {e}",
                self.cfg.settings_path.display()
            );
        }
    }
}

fn dispatch_event(index: &ShareIndex, event: IndexEvent) {
    match event {
        IndexEvent::HashDone { real_path, tth } => index.on_hash_done(&real_path, tth),
        IndexEvent::FileMoved { real_path } => index.on_file_moved(&real_path),
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn log_banner() {
    info!(
        "\n{}\n{}\n  name: {}\n  version: {}\n{}\n",
        APP_BANNER,
        SEPARATOR,
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        SEPARATOR
    );
}
