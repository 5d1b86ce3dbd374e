use std::io::Write as _;
use std::path::PathBuf;

use bzip2::write::BzEncoder;
use bzip2::Compression;
use models::TthValue;
use utilities::xml;

use crate::tree::{DirId, Tree};

pub const LISTING_NAME: &str = "files.xml";
pub const LISTING_BZ_NAME: &str = "files.xml.bz2";

const XML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"utf-8\" standalone=\"yes\"?>\r\n";

/// Cache state for the generated full listing.
///
/// `Fresh` is a clean flag with a published blob; `set_dirty` moves it to
/// `Dirty`; regeneration happens under the index lock and republishes.
#[derive(Debug)]
pub struct ListingCache {
    pub xml_dirty: bool,
    /// Bypass the refresh-interval gate once.
    pub force_refresh: bool,
    /// Unix seconds of the last successful generation.
    pub last_generated: Option<u64>,
    pub xml_len: u64,
    pub bz_len: u64,
    pub xml_root: Option<TthValue>,
    pub bz_root: Option<TthValue>,
    pub bz_path: Option<PathBuf>,
}

impl Default for ListingCache {
    fn default() -> Self {
        Self {
            xml_dirty: true,
            force_refresh: false,
            last_generated: None,
            xml_len: 0,
            bz_len: 0,
            xml_root: None,
            bz_root: None,
            bz_path: None,
        }
    }
}

/// Published identifiers of the cached listing.
#[derive(Debug, Clone)]
pub struct ListingInfo {
    pub xml_len: u64,
    pub bz_len: u64,
    pub xml_root: TthValue,
    pub bz_root: TthValue,
    pub bz_path: PathBuf,
}

impl ListingCache {
    pub fn info(&self) -> Option<ListingInfo> {
        Some(ListingInfo {
            xml_len: self.xml_len,
            bz_len: self.bz_len,
            xml_root: self.xml_root?,
            bz_root: self.bz_root?,
            bz_path: self.bz_path.clone()?,
        })
    }
}

/// Emit the whole share as one document rooted at `/`, roots in insertion
/// order, names in case-policy order. `line_limit` of zero is unlimited.
pub(crate) fn emit_forest(
    tree: &Tree,
    recurse: bool,
    cid: &str,
    generator: &str,
    line_limit: u64,
) -> String {
    let mut out = String::with_capacity(4096);
    out.push_str(XML_HEADER);
    out.push_str(&format!(
        "<FileListing Version=\"1\" CID=\"{}\" Base=\"/\" Generator=\"{}\">\r\n",
        xml::escape(cid),
        xml::escape(generator)
    ));
    let mut remaining = if line_limit == 0 { u64::MAX } else { line_limit };
    for root in tree.roots() {
        emit_dir(tree, *root, 1, recurse, &mut remaining, &mut out);
    }
    out.push_str("</FileListing>\r\n");
    out
}

/// Emit the contents of one virtual directory. With `recurse` off,
/// subdirectories appear as incomplete stubs. `line_limit` caps the number
/// of emitted entries (zero means unlimited).
pub(crate) fn emit_partial(
    tree: &Tree,
    dir: DirId,
    recurse: bool,
    cid: &str,
    generator: &str,
    line_limit: u64,
) -> String {
    let mut out = String::with_capacity(1024);
    out.push_str(XML_HEADER);
    out.push_str(&format!(
        "<FileListing Version=\"1\" CID=\"{}\" Base=\"{}\" Generator=\"{}\">\r\n",
        xml::escape(cid),
        xml::escape(&tree.adc_path(dir)),
        xml::escape(generator)
    ));
    let mut remaining = if line_limit == 0 { u64::MAX } else { line_limit };
    emit_children(tree, dir, 1, recurse, &mut remaining, &mut out);
    out.push_str("</FileListing>\r\n");
    out
}

fn emit_dir(
    tree: &Tree,
    dir: DirId,
    depth: usize,
    recurse: bool,
    remaining: &mut u64,
    out: &mut String,
) {
    if *remaining == 0 {
        return;
    }
    *remaining -= 1;
    let node = tree.dir(dir);
    let indent = "\t".repeat(depth);
    let empty = node.children.is_empty() && node.files.is_empty();
    if !recurse {
        out.push_str(&format!(
            "{indent}<Directory Name=\"{}\" Incomplete=\"1\"/>\r\n",
            xml::escape(&node.name)
        ));
        return;
    }
    if empty {
        out.push_str(&format!(
            "{indent}<Directory Name=\"{}\"/>\r\n",
            xml::escape(&node.name)
        ));
        return;
    }
    out.push_str(&format!(
        "{indent}<Directory Name=\"{}\">\r\n",
        xml::escape(&node.name)
    ));
    emit_children(tree, dir, depth + 1, true, remaining, out);
    out.push_str(&format!("{indent}</Directory>\r\n"));
}

fn emit_children(
    tree: &Tree,
    dir: DirId,
    depth: usize,
    recurse: bool,
    remaining: &mut u64,
    out: &mut String,
) {
    for child in tree.child_ids(dir) {
        emit_dir(tree, child, depth, recurse, remaining, out);
    }
    let indent = "\t".repeat(depth);
    for fid in tree.file_ids(dir) {
        if *remaining == 0 {
            return;
        }
        *remaining -= 1;
        let file = tree.file(*fid);
        out.push_str(&format!(
            "{indent}<File Name=\"{}\" Size=\"{}\" TTH=\"{}\"/>\r\n",
            xml::escape(&file.name),
            file.size,
            file.tth.encoded()
        ));
    }
}

pub(crate) fn compress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = BzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data)?;
    encoder.finish()
}
