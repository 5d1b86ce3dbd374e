use std::collections::{HashMap, HashSet};

use models::types::classify_name;
use models::{ResultKind, SearchQuery, SearchResult, SearchType, SizeMode, TthValue};
use utilities::text;

use crate::bloom::BloomFilter;
use crate::tree::{DirId, FileId, Tree};

/// Keyword search: whitespace tokens, all of which must occur as
/// substrings of a matching name under the case policy.
pub(crate) fn keyword_search(
    tree: &Tree,
    bloom: &BloomFilter,
    tth_index: &HashMap<TthValue, FileId>,
    query: &str,
    stype: SearchType,
    size_mode: SizeMode,
    size: u64,
    max_results: usize,
) -> Vec<SearchResult> {
    let cap = effective_cap(max_results);

    if stype == SearchType::Tth {
        let encoded = query.strip_prefix("TTH:").unwrap_or(query);
        return match encoded.parse::<TthValue>() {
            Ok(tth) => hash_lookup(tree, tth_index, &tth),
            Err(_) => Vec::new(),
        };
    }

    let tokens: Vec<String> = query
        .split_whitespace()
        .map(|t| text::fold_name(t, tree.case_sensitive()))
        .collect();
    if tokens.is_empty() {
        return Vec::new();
    }
    // Fast negative: a token absent from the filter occurs in no shared name.
    let lowered: Vec<String> = tokens.iter().map(|t| t.to_lowercase()).collect();
    if lowered.iter().any(|t| !bloom.maybe_contains(t)) {
        return Vec::new();
    }

    let mut sink = ResultSink::new(cap);
    for root in tree.roots() {
        keyword_walk(tree, *root, &tokens, stype, size_mode, size, &mut sink);
        if sink.full() {
            break;
        }
    }
    sink.results
}

fn keyword_walk(
    tree: &Tree,
    dir: DirId,
    tokens: &[String],
    stype: SearchType,
    size_mode: SizeMode,
    size: u64,
    sink: &mut ResultSink,
) {
    if sink.full() {
        return;
    }

    if stype == SearchType::Directory {
        let folded = tree.fold(&tree.dir(dir).name);
        if tokens.iter().all(|t| text::folded_contains(&folded, t))
            && size_mode.matches(tree.dir(dir).size, size)
        {
            sink.push_dir(tree, dir);
        }
    }

    for child in tree.child_ids(dir) {
        if !tree.has_type(child, stype) {
            continue;
        }
        keyword_walk(tree, child, tokens, stype, size_mode, size, sink);
        if sink.full() {
            return;
        }
    }

    if stype != SearchType::Directory {
        for fid in tree.file_ids(dir) {
            let file = tree.file(*fid);
            let folded = tree.fold(&file.name);
            if !tokens.iter().all(|t| text::folded_contains(&folded, t)) {
                continue;
            }
            if !size_mode.matches(file.size, size) {
                continue;
            }
            if stype != SearchType::Any && classify_name(&file.name) != Some(stype) {
                continue;
            }
            sink.push_file(tree, *fid);
            if sink.full() {
                return;
            }
        }
    }
}

/// Structured search with include/exclude tokens, extension sets, a size
/// range, and an optional exact hash short-circuit.
pub(crate) fn structured_search(
    tree: &Tree,
    tth_index: &HashMap<TthValue, FileId>,
    query: &SearchQuery,
    max_results: usize,
) -> Vec<SearchResult> {
    if let Some(root) = query.root {
        return hash_lookup(tree, tth_index, &root);
    }

    let cap = effective_cap(max_results);
    let folded = FoldedQuery::new(query, tree.case_sensitive());
    let mut sink = ResultSink::new(cap);
    for root in tree.roots() {
        structured_walk(tree, *root, query, &folded, &mut sink);
        if sink.full() {
            break;
        }
    }
    sink.results
}

struct FoldedQuery {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl FoldedQuery {
    fn new(query: &SearchQuery, case_sensitive: bool) -> Self {
        Self {
            include: query
                .include
                .iter()
                .map(|t| text::fold_name(t, case_sensitive))
                .collect(),
            exclude: query
                .exclude
                .iter()
                .map(|t| text::fold_name(t, case_sensitive))
                .collect(),
        }
    }

    fn name_matches(&self, folded_name: &str) -> bool {
        self.include
            .iter()
            .all(|t| text::folded_contains(folded_name, t))
            && !self
                .exclude
                .iter()
                .any(|t| text::folded_contains(folded_name, t))
    }
}

fn structured_walk(
    tree: &Tree,
    dir: DirId,
    query: &SearchQuery,
    folded: &FoldedQuery,
    sink: &mut ResultSink,
) {
    if sink.full() {
        return;
    }

    if query.is_directory {
        let name = tree.fold(&tree.dir(dir).name);
        // Directory matches ignore the file-level filters.
        if folded.name_matches(&name) {
            sink.push_dir(tree, dir);
        }
    }

    for child in tree.child_ids(dir) {
        structured_walk(tree, child, query, folded, sink);
        if sink.full() {
            return;
        }
    }

    if !query.is_directory {
        for fid in tree.file_ids(dir) {
            let file = tree.file(*fid);
            if file.size < query.gt || file.size > query.lt {
                continue;
            }
            let name = tree.fold(&file.name);
            if !folded.name_matches(&name) {
                continue;
            }
            let ext = text::extension_of(&file.name);
            if !query.ext.is_empty() {
                match &ext {
                    Some(e) if query.ext.iter().any(|q| q == e) => {}
                    _ => continue,
                }
            }
            if let Some(e) = &ext {
                if query.no_ext.iter().any(|q| q == e) {
                    continue;
                }
            }
            sink.push_file(tree, *fid);
            if sink.full() {
                return;
            }
        }
    }
}

fn hash_lookup(
    tree: &Tree,
    tth_index: &HashMap<TthValue, FileId>,
    tth: &TthValue,
) -> Vec<SearchResult> {
    match tth_index.get(tth) {
        Some(fid) => {
            let file = tree.file(*fid);
            vec![SearchResult {
                virtual_path: tree.file_adc_path(*fid),
                size: file.size,
                tth: Some(file.tth),
                kind: ResultKind::File,
            }]
        }
        None => Vec::new(),
    }
}

fn effective_cap(max_results: usize) -> usize {
    if max_results == 0 {
        usize::MAX
    } else {
        max_results
    }
}

/// Collects results in traversal order, suppressing duplicates by
/// `(virtual path, hash)` and truncating at the cap.
struct ResultSink {
    cap: usize,
    seen: HashSet<(String, Option<TthValue>)>,
    results: Vec<SearchResult>,
}

impl ResultSink {
    fn new(cap: usize) -> Self {
        Self {
            cap,
            seen: HashSet::new(),
            results: Vec::new(),
        }
    }

    fn full(&self) -> bool {
        self.results.len() >= self.cap
    }

    fn push_file(&mut self, tree: &Tree, fid: FileId) {
        let file = tree.file(fid);
        let path = tree.file_adc_path(fid);
        if self.seen.insert((path.clone(), Some(file.tth))) {
            self.results.push(SearchResult {
                virtual_path: path,
                size: file.size,
                tth: Some(file.tth),
                kind: ResultKind::File,
            });
        }
    }

    fn push_dir(&mut self, tree: &Tree, dir: DirId) {
        let path = tree.adc_path(dir);
        if self.seen.insert((path.clone(), None)) {
            self.results.push(SearchResult {
                virtual_path: path,
                size: tree.dir(dir).size,
                tth: None,
                kind: ResultKind::Directory,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tth(b: u8) -> TthValue {
        TthValue([b; 24])
    }

    fn fixture() -> (Tree, BloomFilter, HashMap<TthValue, FileId>) {
        let mut tree = Tree::new(false);
        let root = tree.add_root("Music");
        let albums = tree.alloc_dir("Albums", Some(root));
        tree.insert_file(root, "Intro Track.mp3", 1024, tth(1));
        tree.insert_file(albums, "cover.jpg", 200, tth(2));
        tree.insert_file(albums, "track two.mp3", 2048, tth(3));
        for r in tree.roots().to_vec() {
            tree.recompute_stats(r);
        }

        let mut bloom = BloomFilter::default();
        let mut index = HashMap::new();
        let mut files = Vec::new();
        for r in tree.roots() {
            tree.collect_files(*r, &mut files);
        }
        for fid in files {
            let name = tree.file(fid).name.to_lowercase();
            bloom.add_name(&name);
            index.insert(tree.file(fid).tth, fid);
        }
        (tree, bloom, index)
    }

    #[test]
    fn keyword_matches_substrings_and_types() {
        let (tree, bloom, index) = fixture();
        let hits = keyword_search(
            &tree,
            &bloom,
            &index,
            "track",
            SearchType::Audio,
            SizeMode::Any,
            0,
            10,
        );
        let paths: Vec<&str> = hits.iter().map(|r| r.virtual_path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["/Music/Albums/track two.mp3", "/Music/Intro Track.mp3"]
        );
    }

    #[test]
    fn keyword_rejects_via_bloom_without_walking() {
        let (tree, bloom, index) = fixture();
        let hits = keyword_search(
            &tree,
            &bloom,
            &index,
            "zzz",
            SearchType::Any,
            SizeMode::Any,
            0,
            10,
        );
        assert!(hits.is_empty());
    }

    #[test]
    fn keyword_applies_size_constraints() {
        let (tree, bloom, index) = fixture();
        let hits = keyword_search(
            &tree,
            &bloom,
            &index,
            "track",
            SearchType::Any,
            SizeMode::AtLeast,
            2000,
            10,
        );
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].virtual_path, "/Music/Albums/track two.mp3");
    }

    #[test]
    fn keyword_tth_mode_short_circuits() {
        let (tree, bloom, index) = fixture();
        let query = format!("TTH:{}", tth(2).encoded());
        let hits = keyword_search(
            &tree,
            &bloom,
            &index,
            &query,
            SearchType::Tth,
            SizeMode::Any,
            0,
            10,
        );
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].virtual_path, "/Music/Albums/cover.jpg");
    }

    #[test]
    fn keyword_directory_mode_matches_dir_names() {
        let (tree, bloom, index) = fixture();
        let hits = keyword_search(
            &tree,
            &bloom,
            &index,
            "albums",
            SearchType::Directory,
            SizeMode::Any,
            0,
            10,
        );
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].virtual_path, "/Music/Albums/");
        assert_eq!(hits[0].kind, ResultKind::Directory);
        assert_eq!(hits[0].size, 2248);
    }

    #[test]
    fn truncation_is_a_traversal_cutoff() {
        let (tree, bloom, index) = fixture();
        let hits = keyword_search(
            &tree,
            &bloom,
            &index,
            "r",
            SearchType::Any,
            SizeMode::Any,
            0,
            2,
        );
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].virtual_path, "/Music/Albums/cover.jpg");
        assert_eq!(hits[1].virtual_path, "/Music/Albums/track two.mp3");
    }

    #[test]
    fn structured_filters_compose() {
        let (tree, _bloom, index) = fixture();
        let query = SearchQuery {
            include: vec!["track".into()],
            exclude: vec!["two".into()],
            ext: vec!["mp3".into()],
            gt: 100,
            lt: 5000,
            ..SearchQuery::default()
        };
        let hits = structured_search(&tree, &index, &query, 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].virtual_path, "/Music/Intro Track.mp3");
    }

    #[test]
    fn structured_hash_root_short_circuits() {
        let (tree, _bloom, index) = fixture();
        let query = SearchQuery {
            root: Some(tth(3)),
            // Filters are ignored once a root is present.
            include: vec!["nomatch".into()],
            ..SearchQuery::default()
        };
        let hits = structured_search(&tree, &index, &query, 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].virtual_path, "/Music/Albums/track two.mp3");
    }

    #[test]
    fn structured_directory_mode_ignores_file_filters() {
        let (tree, _bloom, index) = fixture();
        let query = SearchQuery {
            include: vec!["alb".into()],
            ext: vec!["mp3".into()],
            is_directory: true,
            ..SearchQuery::default()
        };
        let hits = structured_search(&tree, &index, &query, 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind, ResultKind::Directory);
        assert_eq!(hits[0].virtual_path, "/Music/Albums/");
    }
}
