use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use utilities::DirEntry;

use crate::tree::{DirId, Tree};
use crate::ShareIndex;

const IDLE_POLL: Duration = Duration::from_millis(500);

/// Blocking loop of the single rescan worker.
///
/// Requests queued while a scan is in flight are drained in one gulp, so
/// any burst of `refresh` calls collapses into a single follow-up round.
/// Filesystem walking happens with no lock held; only the merge and the
/// listing publication take the index's critical section.
pub fn run_refresh_worker(index: Arc<ShareIndex>, token: CancellationToken) {
    let Some(rx) = index.take_refresh_rx() else {
        warn!("rescan worker is already running");
        return;
    };
    info!("rescan worker started");
    loop {
        if token.is_cancelled() {
            break;
        }
        let job = match rx.recv_timeout(IDLE_POLL) {
            Ok(job) => job,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        let mut jobs = vec![job];
        while let Ok(more) = rx.try_recv() {
            jobs.push(more);
        }

        let dirs = jobs.iter().any(|j| j.dirs);
        let update = jobs.iter().any(|j| j.update);

        index.begin_refresh();
        if dirs {
            run_full_rescan(&index, &token);
        }
        if update || !dirs {
            if let Err(e) = index.generate_listing(update) {
                warn!("listing generation failed: {e}");
            }
        }
        index.end_refresh();

        for job in jobs {
            if let Some(ack) = job.ack {
                let _ = ack.send(());
            }
        }
    }
    info!("rescan worker stopped");
}

/// Walk every configured root into a shadow tree, then merge the result
/// into the live tree under the critical section.
pub(crate) fn run_full_rescan(index: &ShareIndex, token: &CancellationToken) {
    let shares = index.shares_snapshot();

    // Real paths sharing a virtual name collapse into one shadow root.
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, (String, Vec<PathBuf>)> = HashMap::new();
    let case_sensitive = index.case_sensitive();
    for (real, vname) in shares {
        let key = utilities::text::fold_name(&vname, case_sensitive);
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key.clone());
                (vname.clone(), Vec::new())
            })
            .1
            .push(real);
    }

    let mut shadow = Tree::new(case_sensitive);
    let mut built: Vec<(String, DirId)> = Vec::new();
    for key in &order {
        let (vname, reals) = &groups[key];
        let root = shadow.add_root(vname);
        for real in reals {
            if token.is_cancelled() {
                info!("rescan cancelled at root boundary");
                return;
            }
            let staging = shadow.alloc_dir(vname, None);
            match build_tree(index, &mut shadow, staging, real) {
                Ok(()) => shadow.merge_into(root, staging),
                Err(e) => {
                    // Confined to this root; the rescan carries on.
                    warn!("skipping share root {}: {e}", real.display());
                    shadow.remove_subtree(staging);
                }
            }
        }
        shadow.recompute_stats(root);
        built.push((vname.clone(), root));
    }

    index.apply_scan(&shadow, &built);
}

/// Enumerate one real directory into the shadow tree. Files the hasher
/// does not know yet are requested and left out; they arrive later
/// through the event sink.
fn build_tree(index: &ShareIndex, tree: &mut Tree, dir: DirId, real: &Path) -> io::Result<()> {
    let entries = index.fs().read_dir(real)?;
    for entry in entries {
        if entry.metadata.is_dir {
            if index.skip_hidden(&entry) {
                continue;
            }
            let child = tree.ensure_child(dir, &entry.name);
            if let Err(e) = build_tree(index, tree, child, &entry.path) {
                warn!("cannot enumerate {}: {e}", entry.path.display());
            }
        } else if entry.metadata.is_file {
            if index.skip_file(&entry) {
                continue;
            }
            match index.hasher().get_hash(&entry.path) {
                Some(tth) => {
                    tree.insert_file(dir, &entry.name, entry.metadata.len, tth);
                }
                None => index.hasher().request_hash(&entry.path),
            }
        }
    }
    Ok(())
}

impl ShareIndex {
    pub(crate) fn skip_hidden(&self, entry: &DirEntry) -> bool {
        entry.metadata.hidden && (self.cfg.hide_hidden || !self.cfg.share_hidden)
    }

    pub(crate) fn skip_file(&self, entry: &DirEntry) -> bool {
        self.skip_hidden(entry) || (self.cfg.skip_zero_byte && entry.metadata.len == 0)
    }
}
