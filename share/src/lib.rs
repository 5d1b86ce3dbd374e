#![allow(dead_code)]

//! In-memory share index of a peer-to-peer file-sharing node.
//!
//! A virtualized directory tree with three access paths (virtual path,
//! real path, content hash), kept consistent across background rescans,
//! incrementally updated from hasher and queue events, and serialized as
//! the compressed XML listing peers download to browse the share.

pub mod bloom;
pub mod listing;
pub mod scan;
pub mod search;
pub mod tree;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use models::types::classify_name;
use models::{
    AppConfig, SearchResult, SearchType, ShareError, ShareResult, SizeMode, TthValue,
};
use protocol::VirtualPath;
use tracing::{debug, info, warn};
use utilities::{text, xml, FileSystem, Hasher};

use crate::bloom::BloomFilter;
use crate::listing::{ListingCache, ListingInfo};
use crate::tree::{DirId, FileId, Tree};

/// Virtual name used when sanitizing leaves nothing behind.
const FALLBACK_VIRTUAL: &str = "Share";

/// Index-side configuration, captured at construction; changing the case
/// policy requires rebuilding the index.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub case_sensitive: bool,
    pub share_hidden: bool,
    pub hide_hidden: bool,
    pub skip_zero_byte: bool,
    pub rescan_interval_mins: u64,
    pub listing_refresh_mins: u64,
    pub list_line_limit: u64,
    pub listing_dir: PathBuf,
    pub cid: String,
    pub generator: String,
}

impl IndexConfig {
    pub fn from_app(cfg: &AppConfig) -> Self {
        Self {
            case_sensitive: cfg.case_sensitive_filelist,
            share_hidden: cfg.share_hidden,
            hide_hidden: cfg.hide_hidden,
            skip_zero_byte: cfg.skip_zero_byte,
            rescan_interval_mins: cfg.rescan_interval_mins,
            listing_refresh_mins: cfg.listing_refresh_mins,
            list_line_limit: cfg.list_line_limit,
            listing_dir: cfg.listing_dir.clone(),
            cid: cfg.cid.clone(),
            generator: format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            share_hidden: false,
            hide_hidden: false,
            skip_zero_byte: false,
            rescan_interval_mins: 60,
            listing_refresh_mins: 15,
            list_line_limit: 0,
            listing_dir: PathBuf::from("listing"),
            cid: String::new(),
            generator: format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone)]
struct ShareEntry {
    real: PathBuf,
    virtual_name: String,
}

struct IndexInner {
    tree: Tree,
    /// Insertion-order share map: real path to virtual name.
    shares: Vec<ShareEntry>,
    tth_index: HashMap<TthValue, FileId>,
    bloom: BloomFilter,
    listing: ListingCache,
    last_full_scan: Option<u64>,
}

/// A queued rescan request. `dirs` forces a tree walk; `update` forces
/// listing regeneration past the refresh gate; `ack` unblocks a caller
/// that asked to wait.
pub(crate) struct RefreshJob {
    pub(crate) dirs: bool,
    pub(crate) update: bool,
    pub(crate) ack: Option<SyncSender<()>>,
}

/// The share index service. One instance per process, explicitly
/// constructed and passed to collaborators.
pub struct ShareIndex {
    pub(crate) cfg: IndexConfig,
    fs: Arc<dyn FileSystem>,
    hasher: Arc<dyn Hasher>,
    inner: Mutex<IndexInner>,
    refreshing: AtomicBool,
    hits: AtomicU64,
    refresh_tx: Sender<RefreshJob>,
    refresh_rx: Mutex<Option<Receiver<RefreshJob>>>,
}

impl ShareIndex {
    pub fn new(cfg: IndexConfig, fs: Arc<dyn FileSystem>, hasher: Arc<dyn Hasher>) -> Arc<Self> {
        let (refresh_tx, refresh_rx) = mpsc::channel();
        Arc::new(Self {
            inner: Mutex::new(IndexInner {
                tree: Tree::new(cfg.case_sensitive),
                shares: Vec::new(),
                tth_index: HashMap::new(),
                bloom: BloomFilter::default(),
                listing: ListingCache::default(),
                last_full_scan: None,
            }),
            cfg,
            fs,
            hasher,
            refreshing: AtomicBool::new(false),
            hits: AtomicU64::new(0),
            refresh_tx,
            refresh_rx: Mutex::new(Some(refresh_rx)),
        })
    }

    pub(crate) fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    pub(crate) fn hasher(&self) -> &dyn Hasher {
        self.hasher.as_ref()
    }

    pub fn case_sensitive(&self) -> bool {
        self.cfg.case_sensitive
    }

    fn lock(&self) -> MutexGuard<'_, IndexInner> {
        self.inner.lock().unwrap()
    }

    // ----- share map ---------------------------------------------------

    /// Strip characters that have meaning on the wire from a virtual name.
    pub fn validate_virtual(&self, name: &str) -> String {
        let cleaned: String = name
            .chars()
            .filter(|c| !matches!(c, '/' | '\\'))
            .map(|c| if matches!(c, '$' | '|') { '_' } else { c })
            .collect();
        let cleaned = cleaned.trim().to_string();
        if cleaned.is_empty() {
            FALLBACK_VIRTUAL.to_string()
        } else {
            cleaned
        }
    }

    /// Share a real directory under a virtual name.
    pub fn add_directory(&self, real: &Path, virtual_name: &str) -> ShareResult<()> {
        let vname = self.validate_virtual(virtual_name);
        let md = self
            .fs
            .metadata(real)
            .map_err(|e| ShareError::IoUnavailable {
                path: real.to_path_buf(),
                source: e,
            })?;
        if !md.is_dir {
            return Err(ShareError::IoUnavailable {
                path: real.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
            });
        }
        if md.hidden && !self.cfg.share_hidden {
            return Err(ShareError::HiddenShare(real.to_path_buf()));
        }

        {
            let mut inner = self.lock();
            let real_s = normalized_real(real);
            for entry in &inner.shares {
                let entry_s = normalized_real(&entry.real);
                if entry_s == real_s {
                    return Err(ShareError::DuplicateShare(real.to_path_buf()));
                }
                if real_s.starts_with(&entry_s) || entry_s.starts_with(&real_s) {
                    return Err(ShareError::ShareInsideShare(real.to_path_buf()));
                }
            }
            info!("sharing {} as {}", real.display(), vname);
            inner.shares.push(ShareEntry {
                real: real.to_path_buf(),
                virtual_name: vname,
            });
        }
        self.refresh(true, true, false);
        Ok(())
    }

    /// Stop sharing a real directory.
    pub fn remove_directory(&self, real: &Path) -> ShareResult<()> {
        {
            let mut inner = self.lock();
            let real_s = normalized_real(real);
            let pos = inner
                .shares
                .iter()
                .position(|e| normalized_real(&e.real) == real_s)
                .ok_or_else(|| ShareError::NotShared(real.display().to_string()))?;
            let removed = inner.shares.remove(pos);
            let orphaned = !inner.shares.iter().any(|e| {
                text::names_equal(&e.virtual_name, &removed.virtual_name, self.cfg.case_sensitive)
            });
            if orphaned {
                if let Some(root) = inner.tree.find_root(&removed.virtual_name) {
                    inner.tree.remove_subtree(root);
                    rebuild_indices(&mut inner);
                }
            }
            inner.listing.xml_dirty = true;
            info!("unshared {}", real.display());
        }
        self.refresh(true, true, false);
        Ok(())
    }

    /// Move a shared real directory to a different virtual name.
    pub fn rename_directory(&self, real: &Path, virtual_name: &str) -> ShareResult<()> {
        let vname = self.validate_virtual(virtual_name);
        {
            let mut inner = self.lock();
            let real_s = normalized_real(real);
            let entry = inner
                .shares
                .iter_mut()
                .find(|e| normalized_real(&e.real) == real_s)
                .ok_or_else(|| ShareError::NotShared(real.display().to_string()))?;
            info!("renaming share {} to {}", real.display(), vname);
            entry.virtual_name = vname;
        }
        self.refresh(true, true, false);
        Ok(())
    }

    /// Ordered `(virtual name, real path)` pairs of the share map.
    pub fn get_directories(&self) -> Vec<(String, PathBuf)> {
        self.lock()
            .shares
            .iter()
            .map(|e| (e.virtual_name.clone(), e.real.clone()))
            .collect()
    }

    pub fn has_virtual(&self, name: &str) -> bool {
        self.lock()
            .shares
            .iter()
            .any(|e| text::names_equal(&e.virtual_name, name, self.cfg.case_sensitive))
    }

    // ----- lookups -----------------------------------------------------

    pub fn get_share_size(&self) -> u64 {
        self.lock().tree.total_size()
    }

    /// Size of the merged virtual root a real path contributes to.
    pub fn get_share_size_for(&self, real: &Path) -> ShareResult<u64> {
        let inner = self.lock();
        let real_s = normalized_real(real);
        let entry = inner
            .shares
            .iter()
            .find(|e| normalized_real(&e.real) == real_s)
            .ok_or_else(|| ShareError::NotShared(real.display().to_string()))?;
        Ok(inner
            .tree
            .find_root(&entry.virtual_name)
            .map(|r| inner.tree.dir(r).size)
            .unwrap_or(0))
    }

    pub fn get_shared_files(&self) -> usize {
        self.lock().tree.file_count()
    }

    pub fn is_tth_shared(&self, tth: &TthValue) -> bool {
        self.lock().tth_index.contains_key(tth)
    }

    /// Virtual path of the file sharing a content hash.
    pub fn to_virtual(&self, tth: &TthValue) -> ShareResult<String> {
        let inner = self.lock();
        inner
            .tth_index
            .get(tth)
            .map(|fid| inner.tree.file_adc_path(*fid))
            .ok_or_else(|| ShareError::NotShared(tth.encoded()))
    }

    pub fn get_tth(&self, virtual_file: &str) -> ShareResult<TthValue> {
        let inner = self.lock();
        let fid = find_file_by_virtual(&inner, virtual_file)?;
        Ok(inner.tree.file(fid).tth)
    }

    /// Resolve a virtual file path (or `/TTH/…` address) to the real path
    /// that currently holds the bytes.
    pub fn to_real(&self, virtual_file: &str) -> ShareResult<PathBuf> {
        let inner = self.lock();
        let fid = find_file_by_virtual(&inner, virtual_file)?;
        let candidates = file_real_candidates(&inner, self.cfg.case_sensitive, fid);
        candidates
            .into_iter()
            .find(|p| matches!(self.fs.metadata(p), Ok(md) if md.is_file))
            .ok_or_else(|| ShareError::NotShared(virtual_file.to_string()))
    }

    /// Every real path a virtual file or directory resolves to.
    pub fn get_real_paths(&self, virtual_path: &str) -> ShareResult<Vec<PathBuf>> {
        let inner = self.lock();
        if virtual_path.ends_with('/') {
            let vp = protocol::parse_virtual_path(virtual_path)?;
            let dir = locate_dir(&inner, &vp)?;
            let tail = inner.tree.tail_components(dir);
            let root = inner.tree.root_of(dir);
            let root_name = inner.tree.dir(root).name.clone();
            let mut out = Vec::new();
            for real in share_reals(&inner, self.cfg.case_sensitive, &root_name) {
                let mut p = real;
                for seg in &tail {
                    p.push(seg);
                }
                if matches!(self.fs.metadata(&p), Ok(md) if md.is_dir) {
                    out.push(p);
                }
            }
            Ok(out)
        } else {
            let fid = find_file_by_virtual(&inner, virtual_path)?;
            Ok(file_real_candidates(&inner, self.cfg.case_sensitive, fid)
                .into_iter()
                .filter(|p| matches!(self.fs.metadata(p), Ok(md) if md.is_file))
                .collect())
        }
    }

    /// Serialize the bloom filter of shared content hashes for
    /// distributed-hash-table prefix advertising.
    pub fn get_bloom(&self, k: u32, m: usize, h: u64) -> Vec<u8> {
        let inner = self.lock();
        bloom::export_keys(inner.tth_index.keys().map(|t| t.0.as_slice()), k, m, h)
    }

    pub fn add_hits(&self, hits: u64) {
        self.hits.fetch_add(hits, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    // ----- search ------------------------------------------------------

    /// Keyword search. Never fails; inconsistencies yield an empty result.
    pub fn search(
        &self,
        query: &str,
        stype: SearchType,
        size_mode: SizeMode,
        size: u64,
        max_results: usize,
    ) -> Vec<SearchResult> {
        let inner = self.lock();
        search::keyword_search(
            &inner.tree,
            &inner.bloom,
            &inner.tth_index,
            query,
            stype,
            size_mode,
            size,
            max_results,
        )
    }

    /// Structured search from wire tokens.
    pub fn search_structured(&self, params: &[String], max_results: usize) -> Vec<SearchResult> {
        let query = protocol::parse_search_tokens(params);
        let inner = self.lock();
        search::structured_search(&inner.tree, &inner.tth_index, &query, max_results)
    }

    // ----- event sink --------------------------------------------------

    /// The hasher finished a file: reflect it in the tree and all three
    /// indices before returning.
    pub fn on_hash_done(&self, real_path: &Path, tth: TthValue) {
        let size = match self.fs.metadata(real_path) {
            Ok(md) if md.is_file => md.len,
            _ => {
                debug!("hash done for vanished file {}", real_path.display());
                return;
            }
        };
        let mut inner = self.lock();
        let Some((dir, name)) = locate_owning(&inner, real_path) else {
            // Parent directories appear on the next rescan.
            debug!("hash done outside indexed tree: {}", real_path.display());
            return;
        };
        if let Some(existing) = inner.tree.find_file(dir, &name) {
            let old_size = inner.tree.file(existing).size;
            let old_tth = inner.tree.file(existing).tth;
            inner.tree.remove_file(existing);
            inner.tree.apply_size_delta(dir, -(old_size as i64));
            if inner.tth_index.get(&old_tth) == Some(&existing) {
                inner.tth_index.remove(&old_tth);
            }
        }
        let fid = inner.tree.insert_file(dir, &name, size, tth);
        inner.tree.apply_size_delta(dir, size as i64);
        if let Some(ty) = classify_name(&name) {
            inner.tree.add_type_up(dir, ty);
        }
        // The later insert wins the slot; an earlier holder stays
        // reachable by path until the next rescan reindexes.
        inner.tth_index.insert(tth, fid);
        inner.bloom.add_name(&name.to_lowercase());
        inner.listing.xml_dirty = true;
        info!("indexed {} ({} bytes)", real_path.display(), size);
    }

    /// The queue moved a file away; its hash is not known yet, so drop
    /// any stale entry and wait for the follow-up `hash_done`.
    pub fn on_file_moved(&self, real_path: &Path) {
        let mut inner = self.lock();
        let Some((dir, name)) = locate_owning(&inner, real_path) else {
            return;
        };
        let Some(fid) = inner.tree.find_file(dir, &name) else {
            return;
        };
        let size = inner.tree.file(fid).size;
        let tth = inner.tree.file(fid).tth;
        inner.tree.remove_file(fid);
        inner.tree.apply_size_delta(dir, -(size as i64));
        inner.tree.refresh_types_up(dir);
        if inner.tth_index.get(&tth) == Some(&fid) {
            inner.tth_index.remove(&tth);
        }
        inner.listing.xml_dirty = true;
        info!("dropped moved file {}", real_path.display());
    }

    /// Minute tick: schedule a rescan or a listing refresh when due.
    pub fn on_minute_tick(&self, now_secs: u64) {
        let (rescan_due, listing_due) = {
            let inner = self.lock();
            let rescan_due = match inner.last_full_scan {
                None => !inner.shares.is_empty(),
                Some(t) => now_secs >= t + self.cfg.rescan_interval_mins * 60,
            };
            let listing_due = inner.listing.xml_dirty
                && match inner.listing.last_generated {
                    None => true,
                    Some(t) => now_secs >= t + self.cfg.listing_refresh_mins * 60,
                };
            (rescan_due, listing_due)
        };
        if rescan_due && !self.is_refreshing() {
            self.refresh(true, true, false);
        } else if listing_due {
            self.refresh(false, false, false);
        }
    }

    // ----- rescan ------------------------------------------------------

    /// Schedule a rescan. `dirs` forces a tree walk, otherwise only the
    /// listing is regenerated if stale. With `block`, waits for the
    /// worker to finish the round. Requests during a running scan are
    /// absorbed into a single follow-up round.
    pub fn refresh(&self, dirs: bool, update: bool, block: bool) {
        let mut job = RefreshJob {
            dirs,
            update,
            ack: None,
        };
        let wait = if block {
            let (tx, rx) = mpsc::sync_channel(1);
            job.ack = Some(tx);
            Some(rx)
        } else {
            None
        };
        if self.refresh_tx.send(job).is_err() {
            warn!("refresh requested but the rescan worker is not running");
            return;
        }
        if let Some(rx) = wait {
            let _ = rx.recv();
        }
    }

    /// Lock-free view of the rescan state.
    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    pub fn set_dirty(&self) {
        self.lock().listing.xml_dirty = true;
    }

    pub(crate) fn begin_refresh(&self) {
        self.refreshing.store(true, Ordering::Release);
    }

    pub(crate) fn end_refresh(&self) {
        self.refreshing.store(false, Ordering::Release);
    }

    pub(crate) fn take_refresh_rx(&self) -> Option<Receiver<RefreshJob>> {
        self.refresh_rx.lock().unwrap().take()
    }

    pub(crate) fn shares_snapshot(&self) -> Vec<(PathBuf, String)> {
        self.lock()
            .shares
            .iter()
            .map(|e| (e.real.clone(), e.virtual_name.clone()))
            .collect()
    }

    /// Merge a finished shadow forest into the live tree and rebuild the
    /// hash index and bloom filter in one pass.
    pub(crate) fn apply_scan(&self, shadow: &Tree, built: &[(String, DirId)]) {
        let mut inner = self.lock();

        let stale: Vec<DirId> = inner
            .tree
            .roots()
            .iter()
            .copied()
            .filter(|r| {
                let name = &inner.tree.dir(*r).name;
                !built
                    .iter()
                    .any(|(v, _)| text::names_equal(v, name, self.cfg.case_sensitive))
            })
            .collect();
        for root in stale {
            inner.tree.remove_subtree(root);
        }

        for (vname, shadow_root) in built {
            let live = match inner.tree.find_root(vname) {
                Some(id) => id,
                None => inner.tree.add_root(vname),
            };
            inner.tree.reconcile_from(shadow, *shadow_root, live);
            inner.tree.recompute_stats(live);
        }

        rebuild_indices(&mut inner);
        inner.listing.xml_dirty = true;
        inner.last_full_scan = Some(now_secs());
        info!(
            "rescan merged {} root(s): {} files, {} bytes shared",
            built.len(),
            inner.tree.file_count(),
            inner.tree.total_size()
        );
    }

    // ----- listing -----------------------------------------------------

    /// Generate (or return the cached) full listing. `force` bypasses the
    /// refresh-interval gate.
    pub fn generate_listing(&self, force: bool) -> ShareResult<ListingInfo> {
        let mut inner = self.lock();
        if !inner.listing.xml_dirty && !force {
            if let Some(info) = inner.listing.info() {
                return Ok(info);
            }
        }
        let now = now_secs();
        if !force && !inner.listing.force_refresh {
            let gated = matches!(
                inner.listing.last_generated,
                Some(t) if now < t + self.cfg.listing_refresh_mins * 60
            );
            if gated {
                if let Some(info) = inner.listing.info() {
                    return Ok(info);
                }
            }
        }

        let doc = listing::emit_forest(&inner.tree, true, &self.cfg.cid, &self.cfg.generator, 0);
        let compressed =
            listing::compress(doc.as_bytes()).map_err(|e| ShareError::IoUnavailable {
                path: self.cfg.listing_dir.clone(),
                source: e,
            })?;
        let xml_path = self.cfg.listing_dir.join(listing::LISTING_NAME);
        let bz_path = self.cfg.listing_dir.join(listing::LISTING_BZ_NAME);
        let write = |path: &Path, data: &[u8]| {
            self.fs.write(path, data).map_err(|e| ShareError::IoUnavailable {
                path: path.to_path_buf(),
                source: e,
            })
        };
        // A failed write leaves the previously cached listing intact.
        write(&xml_path, doc.as_bytes())?;
        write(&bz_path, &compressed)?;

        let cache = &mut inner.listing;
        cache.xml_len = doc.len() as u64;
        cache.bz_len = compressed.len() as u64;
        cache.xml_root = Some(self.hasher.hash_bytes(doc.as_bytes()));
        cache.bz_root = Some(self.hasher.hash_bytes(&compressed));
        cache.bz_path = Some(bz_path);
        cache.xml_dirty = false;
        cache.force_refresh = false;
        cache.last_generated = Some(now);
        info!(
            "listing generated: {} bytes plain, {} bytes compressed",
            cache.xml_len, cache.bz_len
        );
        Ok(cache.info().expect("listing cache just published"))
    }

    /// Generate the listing if needed and return the compressed file path.
    pub fn get_own_list_file(&self) -> ShareResult<PathBuf> {
        Ok(self.generate_listing(false)?.bz_path)
    }

    /// Emit a listing rooted at one virtual directory. Never cached.
    pub fn generate_partial_list(&self, virtual_dir: &str, recurse: bool) -> ShareResult<String> {
        let inner = self.lock();
        if virtual_dir == "/" {
            return Ok(listing::emit_forest(
                &inner.tree,
                recurse,
                &self.cfg.cid,
                &self.cfg.generator,
                self.cfg.list_line_limit,
            ));
        }
        let vp = protocol::parse_virtual_path(virtual_dir)?;
        if vp.leaf.is_some() {
            return Err(ShareError::InvalidPath(virtual_dir.to_string()));
        }
        let dir = locate_dir(&inner, &vp)?;
        Ok(listing::emit_partial(
            &inner.tree,
            dir,
            recurse,
            &self.cfg.cid,
            &self.cfg.generator,
            self.cfg.list_line_limit,
        ))
    }

    // ----- settings ----------------------------------------------------

    /// Serialize the share map in insertion order.
    pub fn save_settings(&self) -> String {
        let inner = self.lock();
        let mut out = String::from("<Share>\r\n");
        for entry in &inner.shares {
            out.push_str(&format!(
                "\t<Directory Virtual=\"{}\">{}</Directory>\r\n",
                xml::escape(&entry.virtual_name),
                xml::escape(&entry.real.to_string_lossy())
            ));
        }
        out.push_str("</Share>\r\n");
        out
    }

    /// Replace the share map from a persisted document. The caller
    /// schedules the rescan that repopulates the tree.
    pub fn load_settings(&self, doc: &str) {
        let mut entries = Vec::new();
        for element in xml::elements(doc, "Directory") {
            let Some(vname) = element.attrs.get("Virtual") else {
                continue;
            };
            if element.text.is_empty() {
                continue;
            }
            entries.push(ShareEntry {
                real: PathBuf::from(&element.text),
                virtual_name: self.validate_virtual(vname),
            });
        }
        let mut inner = self.lock();
        info!("loaded {} share mapping(s)", entries.len());
        inner.shares = entries;
    }
}

// ----- free helpers ----------------------------------------------------

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Canonical string form of a real path: forward slashes, trailing
/// separator. Used for map identity and containment checks.
fn normalized_real(path: &Path) -> String {
    let mut s = path.to_string_lossy().replace('\\', "/");
    if !s.ends_with('/') {
        s.push('/');
    }
    s
}

fn rebuild_indices(inner: &mut IndexInner) {
    inner.tth_index.clear();
    inner.bloom.clear();
    let mut files = Vec::new();
    for root in inner.tree.roots().to_vec() {
        inner.tree.collect_files(root, &mut files);
    }
    for fid in files {
        let file = inner.tree.file(fid);
        let tth = file.tth;
        let folded = file.name.to_lowercase();
        inner.tth_index.insert(tth, fid);
        inner.bloom.add_name(&folded);
    }
}

fn locate_dir(inner: &IndexInner, vp: &VirtualPath) -> ShareResult<DirId> {
    let mut cur = inner
        .tree
        .find_root(&vp.root)
        .ok_or_else(|| ShareError::NotShared(format!("/{}/", vp.root)))?;
    for seg in &vp.dirs {
        cur = inner
            .tree
            .child(cur, seg)
            .ok_or_else(|| ShareError::NotShared(seg.clone()))?;
    }
    Ok(cur)
}

fn find_file_by_virtual(inner: &IndexInner, virtual_file: &str) -> ShareResult<FileId> {
    if let Some(parsed) = protocol::parse_tth_path(virtual_file) {
        let tth = parsed?;
        return inner
            .tth_index
            .get(&tth)
            .copied()
            .ok_or_else(|| ShareError::NotShared(virtual_file.to_string()));
    }
    let vp = protocol::parse_virtual_path(virtual_file)?;
    let leaf = vp
        .leaf
        .clone()
        .ok_or_else(|| ShareError::InvalidPath(virtual_file.to_string()))?;
    let dir = locate_dir(inner, &vp)?;
    inner
        .tree
        .find_file(dir, &leaf)
        .ok_or_else(|| ShareError::NotShared(virtual_file.to_string()))
}

/// Real paths of every share entry mapping to a virtual root name.
fn share_reals(inner: &IndexInner, case_sensitive: bool, root_name: &str) -> Vec<PathBuf> {
    inner
        .shares
        .iter()
        .filter(|e| text::names_equal(&e.virtual_name, root_name, case_sensitive))
        .map(|e| e.real.clone())
        .collect()
}

/// All real paths a file may live at, one per share entry of its root.
fn file_real_candidates(inner: &IndexInner, case_sensitive: bool, fid: FileId) -> Vec<PathBuf> {
    let file = inner.tree.file(fid);
    let dir = file.parent;
    let root = inner.tree.root_of(dir);
    let tail = inner.tree.tail_components(dir);
    let root_name = inner.tree.dir(root).name.clone();
    share_reals(inner, case_sensitive, &root_name)
        .into_iter()
        .map(|mut p| {
            for seg in &tail {
                p.push(seg);
            }
            p.push(&file.name);
            p
        })
        .collect()
}

/// Map a real file path to its indexed parent directory and file name.
/// `None` when the path is outside every share or crosses a directory the
/// tree has not seen yet.
fn locate_owning(inner: &IndexInner, real_path: &Path) -> Option<(DirId, String)> {
    let real_s = real_path.to_string_lossy().replace('\\', "/");
    'entries: for entry in &inner.shares {
        let root_s = normalized_real(&entry.real);
        let Some(tail) = real_s.strip_prefix(&root_s) else {
            continue;
        };
        let Some(root) = inner.tree.find_root(&entry.virtual_name) else {
            continue;
        };
        let mut components: Vec<&str> = tail.split('/').filter(|s| !s.is_empty()).collect();
        let name = components.pop()?;
        let mut cur = root;
        for seg in components {
            match inner.tree.child(cur, seg) {
                Some(child) => cur = child,
                None => continue 'entries,
            }
        }
        return Some((cur, name.to_string()));
    }
    None
}
