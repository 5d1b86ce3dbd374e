use std::collections::BTreeMap;

use models::types::classify_name;
use models::{SearchType, TthValue};
use utilities::text;

/// Handle to a directory node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirId(u32);

/// Handle to a file node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(u32);

#[derive(Debug)]
pub struct DirNode {
    pub name: String,
    pub parent: Option<DirId>,
    /// Folded child name to directory, sorted under the case policy.
    pub(crate) children: BTreeMap<String, DirId>,
    /// Sorted by folded file name, strictly ascending.
    pub(crate) files: Vec<FileId>,
    /// Cached subtree byte size.
    pub size: u64,
    /// Which type classes occur anywhere in the subtree.
    pub types: u32,
}

#[derive(Debug, Clone)]
pub struct FileNode {
    pub name: String,
    pub size: u64,
    pub tth: TthValue,
    pub parent: DirId,
}

/// Arena-backed virtualized directory tree.
///
/// Nodes are addressed by integer handles; parents are handles, so the
/// up-pointing structure cannot form cycles. Rescan shadow trees are
/// independent `Tree` values whose surviving nodes move into the live
/// arena during reconciliation.
#[derive(Debug)]
pub struct Tree {
    case_sensitive: bool,
    dirs: Vec<Option<DirNode>>,
    files: Vec<Option<FileNode>>,
    free_dirs: Vec<u32>,
    free_files: Vec<u32>,
    roots: Vec<DirId>,
}

impl Tree {
    pub fn new(case_sensitive: bool) -> Self {
        Self {
            case_sensitive,
            dirs: Vec::new(),
            files: Vec::new(),
            free_dirs: Vec::new(),
            free_files: Vec::new(),
            roots: Vec::new(),
        }
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn fold(&self, name: &str) -> String {
        text::fold_name(name, self.case_sensitive)
    }

    pub fn roots(&self) -> &[DirId] {
        &self.roots
    }

    pub fn dir(&self, id: DirId) -> &DirNode {
        self.dirs[id.0 as usize]
            .as_ref()
            .expect("stale directory handle")
    }

    pub fn dir_mut(&mut self, id: DirId) -> &mut DirNode {
        self.dirs[id.0 as usize]
            .as_mut()
            .expect("stale directory handle")
    }

    pub fn file(&self, id: FileId) -> &FileNode {
        self.files[id.0 as usize]
            .as_ref()
            .expect("stale file handle")
    }

    pub fn file_mut(&mut self, id: FileId) -> &mut FileNode {
        self.files[id.0 as usize]
            .as_mut()
            .expect("stale file handle")
    }

    fn store_dir(&mut self, node: DirNode) -> DirId {
        if let Some(slot) = self.free_dirs.pop() {
            self.dirs[slot as usize] = Some(node);
            DirId(slot)
        } else {
            self.dirs.push(Some(node));
            DirId((self.dirs.len() - 1) as u32)
        }
    }

    fn store_file(&mut self, node: FileNode) -> FileId {
        if let Some(slot) = self.free_files.pop() {
            self.files[slot as usize] = Some(node);
            FileId(slot)
        } else {
            self.files.push(Some(node));
            FileId((self.files.len() - 1) as u32)
        }
    }

    fn release_dir(&mut self, id: DirId) {
        self.dirs[id.0 as usize] = None;
        self.free_dirs.push(id.0);
    }

    fn release_file(&mut self, id: FileId) {
        self.files[id.0 as usize] = None;
        self.free_files.push(id.0);
    }

    /// Allocate a directory. With a parent, the node is linked as a child;
    /// the caller must have checked the name is free.
    pub fn alloc_dir(&mut self, name: &str, parent: Option<DirId>) -> DirId {
        let id = self.store_dir(DirNode {
            name: name.to_string(),
            parent,
            children: BTreeMap::new(),
            files: Vec::new(),
            size: 0,
            types: 0,
        });
        if let Some(p) = parent {
            let key = self.fold(name);
            self.dir_mut(p).children.insert(key, id);
        }
        id
    }

    pub fn add_root(&mut self, name: &str) -> DirId {
        let id = self.alloc_dir(name, None);
        self.roots.push(id);
        id
    }

    pub fn find_root(&self, name: &str) -> Option<DirId> {
        self.roots
            .iter()
            .copied()
            .find(|r| text::names_equal(&self.dir(*r).name, name, self.case_sensitive))
    }

    pub fn child(&self, dir: DirId, name: &str) -> Option<DirId> {
        self.dir(dir).children.get(&self.fold(name)).copied()
    }

    pub fn ensure_child(&mut self, dir: DirId, name: &str) -> DirId {
        match self.child(dir, name) {
            Some(id) => id,
            None => self.alloc_dir(name, Some(dir)),
        }
    }

    pub fn child_ids(&self, dir: DirId) -> impl Iterator<Item = DirId> + '_ {
        self.dir(dir).children.values().copied()
    }

    pub fn file_ids(&self, dir: DirId) -> &[FileId] {
        &self.dir(dir).files
    }

    pub fn find_file(&self, dir: DirId, name: &str) -> Option<FileId> {
        let files = &self.dir(dir).files;
        files
            .binary_search_by(|fid| {
                text::name_cmp(&self.file(*fid).name, name, self.case_sensitive)
            })
            .ok()
            .map(|pos| files[pos])
    }

    fn file_insert_pos(&self, dir: DirId, name: &str) -> usize {
        self.dir(dir)
            .files
            .binary_search_by(|fid| {
                text::name_cmp(&self.file(*fid).name, name, self.case_sensitive)
            })
            .unwrap_or_else(|pos| pos)
    }

    /// Insert a file, replacing any same-named entry in place. Structural
    /// only: cached sizes and type bitmaps are the caller's to maintain.
    pub fn insert_file(&mut self, dir: DirId, name: &str, size: u64, tth: TthValue) -> FileId {
        if let Some(existing) = self.find_file(dir, name) {
            let node = self.file_mut(existing);
            node.size = size;
            node.tth = tth;
            return existing;
        }
        let id = self.store_file(FileNode {
            name: name.to_string(),
            size,
            tth,
            parent: dir,
        });
        let pos = self.file_insert_pos(dir, name);
        self.dir_mut(dir).files.insert(pos, id);
        id
    }

    /// Unlink and free a file; returns its former parent. Structural only.
    pub fn remove_file(&mut self, id: FileId) -> DirId {
        let parent = self.file(id).parent;
        self.dir_mut(parent).files.retain(|f| *f != id);
        self.release_file(id);
        parent
    }

    /// Apply a size change to a directory and every ancestor.
    pub fn apply_size_delta(&mut self, dir: DirId, delta: i64) {
        let mut cur = Some(dir);
        while let Some(d) = cur {
            let node = self.dir_mut(d);
            node.size = node.size.saturating_add_signed(delta);
            cur = node.parent;
        }
    }

    /// Set a type bit on a directory and every ancestor.
    pub fn add_type_up(&mut self, dir: DirId, ty: SearchType) {
        let bit = ty.bit();
        let mut cur = Some(dir);
        while let Some(d) = cur {
            let node = self.dir_mut(d);
            node.types |= bit;
            cur = node.parent;
        }
    }

    /// Recompute the type bitmap of a directory and its ancestors from
    /// cached child masks, after a removal may have cleared a class.
    pub fn refresh_types_up(&mut self, dir: DirId) {
        let mut cur = Some(dir);
        while let Some(d) = cur {
            let mask = {
                let node = self.dir(d);
                let mut m = 0u32;
                for child in node.children.values() {
                    m |= self.dir(*child).types;
                }
                for fid in &node.files {
                    if let Some(ty) = classify_name(&self.file(*fid).name) {
                        m |= ty.bit();
                    }
                }
                m
            };
            let node = self.dir_mut(d);
            node.types = mask;
            cur = node.parent;
        }
    }

    pub fn has_type(&self, dir: DirId, ty: SearchType) -> bool {
        matches!(ty, SearchType::Any | SearchType::Directory | SearchType::Tth)
            || self.dir(dir).types & ty.bit() != 0
    }

    /// Slash-separated virtual path of a directory, with trailing slash.
    pub fn adc_path(&self, dir: DirId) -> String {
        let mut names = Vec::new();
        let mut cur = Some(dir);
        while let Some(d) = cur {
            let node = self.dir(d);
            names.push(node.name.as_str());
            cur = node.parent;
        }
        let mut out = String::new();
        for name in names.iter().rev() {
            out.push('/');
            out.push_str(name);
        }
        out.push('/');
        out
    }

    pub fn file_adc_path(&self, id: FileId) -> String {
        let node = self.file(id);
        format!("{}{}", self.adc_path(node.parent), node.name)
    }

    /// Path components from the owning root down to this directory,
    /// excluding the root's virtual name.
    pub fn tail_components(&self, dir: DirId) -> Vec<String> {
        let mut names = Vec::new();
        let mut cur = dir;
        while let Some(parent) = self.dir(cur).parent {
            names.push(self.dir(cur).name.clone());
            cur = parent;
        }
        names.reverse();
        names
    }

    pub fn root_of(&self, dir: DirId) -> DirId {
        let mut cur = dir;
        while let Some(parent) = self.dir(cur).parent {
            cur = parent;
        }
        cur
    }

    /// Recompute sizes and type bitmaps for a whole subtree.
    pub fn recompute_stats(&mut self, dir: DirId) {
        let children: Vec<DirId> = self.dir(dir).children.values().copied().collect();
        let mut size = 0u64;
        let mut types = 0u32;
        for child in children {
            self.recompute_stats(child);
            let node = self.dir(child);
            size += node.size;
            types |= node.types;
        }
        for fid in self.dir(dir).files.clone() {
            let node = self.file(fid);
            size += node.size;
            if let Some(ty) = classify_name(&node.name) {
                types |= ty.bit();
            }
        }
        let node = self.dir_mut(dir);
        node.size = size;
        node.types = types;
    }

    /// Files of a subtree in traversal order: subdirectories first (sorted
    /// under the case policy), then the directory's own files.
    pub fn collect_files(&self, dir: DirId, out: &mut Vec<FileId>) {
        for child in self.dir(dir).children.values() {
            self.collect_files(*child, out);
        }
        out.extend(self.dir(dir).files.iter().copied());
    }

    pub fn total_size(&self) -> u64 {
        self.roots.iter().map(|r| self.dir(*r).size).sum()
    }

    pub fn file_count(&self) -> usize {
        self.files.iter().filter(|f| f.is_some()).count()
    }

    /// Additive merge of two detached subtrees of this arena: children and
    /// files of `src` move under `dst`; name collisions keep `dst`'s entry
    /// and recurse into directories. `src`'s emptied shell is freed.
    /// Structural only.
    pub fn merge_into(&mut self, dst: DirId, src: DirId) {
        let src_children: Vec<(String, DirId)> = self
            .dir(src)
            .children
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        for (key, child) in src_children {
            match self.dir(dst).children.get(&key).copied() {
                Some(existing) => self.merge_into(existing, child),
                None => {
                    self.dir_mut(child).parent = Some(dst);
                    self.dir_mut(dst).children.insert(key, child);
                }
            }
        }
        let src_files: Vec<FileId> = self.dir(src).files.clone();
        for fid in src_files {
            let name = self.file(fid).name.clone();
            if self.find_file(dst, &name).is_some() {
                self.release_file(fid);
            } else {
                self.file_mut(fid).parent = dst;
                let pos = self.file_insert_pos(dst, &name);
                self.dir_mut(dst).files.insert(pos, fid);
            }
        }
        self.release_dir(src);
    }

    /// Deep-copy a subtree of another arena under `parent` here, carrying
    /// the shadow's cached stats along.
    pub fn graft_from(&mut self, other: &Tree, src: DirId, parent: DirId) -> DirId {
        let src_node = other.dir(src);
        let new_dir = self.alloc_dir(&src_node.name, Some(parent));
        for child in src_node.children.values() {
            self.graft_from(other, *child, new_dir);
        }
        for fid in &src_node.files {
            let f = other.file(*fid);
            self.insert_file(new_dir, &f.name, f.size, f.tth);
        }
        let node = self.dir_mut(new_dir);
        node.size = src_node.size;
        node.types = src_node.types;
        new_dir
    }

    /// Diff a shadow subtree against a live one: entries only in the
    /// shadow are brought over, entries only in the live tree are removed,
    /// files present in both are kept unless size or hash changed.
    /// Structural only; callers recompute stats afterwards.
    pub fn reconcile_from(&mut self, shadow: &Tree, shadow_dir: DirId, live_dir: DirId) {
        let live_children: Vec<(String, DirId)> = self
            .dir(live_dir)
            .children
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        for (key, child) in live_children {
            if !shadow.dir(shadow_dir).children.contains_key(&key) {
                self.remove_subtree(child);
            }
        }
        let shadow_children: Vec<(String, DirId)> = shadow
            .dir(shadow_dir)
            .children
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        for (key, schild) in shadow_children {
            match self.dir(live_dir).children.get(&key).copied() {
                Some(lchild) => self.reconcile_from(shadow, schild, lchild),
                None => {
                    self.graft_from(shadow, schild, live_dir);
                }
            }
        }

        let live_files: Vec<FileId> = self.dir(live_dir).files.clone();
        for fid in live_files {
            let name = self.file(fid).name.clone();
            if shadow.find_file(shadow_dir, &name).is_none() {
                self.remove_file(fid);
            }
        }
        for sfid in shadow.dir(shadow_dir).files.clone() {
            let f = shadow.file(sfid);
            // insert_file replaces a changed entry in place
            self.insert_file(live_dir, &f.name, f.size, f.tth);
        }
    }

    /// Unlink a directory from its parent (or the root list) and free the
    /// whole subtree. Structural only.
    pub fn remove_subtree(&mut self, dir: DirId) {
        match self.dir(dir).parent {
            Some(parent) => {
                let key = self.fold(&self.dir(dir).name);
                self.dir_mut(parent).children.remove(&key);
            }
            None => self.roots.retain(|r| *r != dir),
        }
        self.free_subtree(dir);
    }

    fn free_subtree(&mut self, dir: DirId) {
        let children: Vec<DirId> = self.dir(dir).children.values().copied().collect();
        for child in children {
            self.free_subtree(child);
        }
        for fid in self.dir(dir).files.clone() {
            self.release_file(fid);
        }
        self.release_dir(dir);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tth(b: u8) -> TthValue {
        TthValue([b; 24])
    }

    #[test]
    fn files_stay_sorted_and_unique_per_policy() {
        let mut tree = Tree::new(false);
        let root = tree.add_root("Share");
        tree.insert_file(root, "b.txt", 1, tth(1));
        tree.insert_file(root, "A.txt", 2, tth(2));
        tree.insert_file(root, "a.TXT", 3, tth(3)); // replaces A.txt in place

        let names: Vec<String> = tree
            .file_ids(root)
            .iter()
            .map(|f| tree.file(*f).name.clone())
            .collect();
        assert_eq!(names, vec!["A.txt", "b.txt"]);
        let a = tree.find_file(root, "a.txt").unwrap();
        assert_eq!(tree.file(a).size, 3);
        assert_eq!(tree.file(a).tth, tth(3));
    }

    #[test]
    fn case_sensitive_policy_keeps_both_spellings() {
        let mut tree = Tree::new(true);
        let root = tree.add_root("Share");
        tree.insert_file(root, "A.txt", 1, tth(1));
        tree.insert_file(root, "a.txt", 2, tth(2));
        assert_eq!(tree.file_ids(root).len(), 2);
        assert!(tree.find_file(root, "a.TXT").is_none());
    }

    #[test]
    fn adc_paths_have_leading_and_trailing_slashes() {
        let mut tree = Tree::new(false);
        let root = tree.add_root("Music");
        let sub = tree.alloc_dir("albums", Some(root));
        let fid = tree.insert_file(sub, "track.mp3", 10, tth(9));
        assert_eq!(tree.adc_path(root), "/Music/");
        assert_eq!(tree.adc_path(sub), "/Music/albums/");
        assert_eq!(tree.file_adc_path(fid), "/Music/albums/track.mp3");
        assert_eq!(tree.tail_components(sub), vec!["albums"]);
        assert_eq!(tree.root_of(sub), root);
    }

    #[test]
    fn recompute_stats_sums_sizes_and_types() {
        let mut tree = Tree::new(false);
        let root = tree.add_root("Share");
        let sub = tree.alloc_dir("music", Some(root));
        tree.insert_file(sub, "a.mp3", 100, tth(1));
        tree.insert_file(root, "doc.txt", 50, tth(2));
        tree.recompute_stats(root);

        assert_eq!(tree.dir(root).size, 150);
        assert_eq!(tree.dir(sub).size, 100);
        assert!(tree.has_type(root, SearchType::Audio));
        assert!(tree.has_type(root, SearchType::Document));
        assert!(!tree.has_type(sub, SearchType::Document));
        assert!(!tree.has_type(root, SearchType::Video));
    }

    #[test]
    fn size_delta_and_type_refresh_walk_ancestors() {
        let mut tree = Tree::new(false);
        let root = tree.add_root("Share");
        let sub = tree.alloc_dir("inner", Some(root));
        let fid = tree.insert_file(sub, "clip.avi", 500, tth(1));
        tree.apply_size_delta(sub, 500);
        tree.add_type_up(sub, SearchType::Video);
        assert_eq!(tree.dir(root).size, 500);
        assert!(tree.has_type(root, SearchType::Video));

        let parent = tree.remove_file(fid);
        tree.apply_size_delta(parent, -500);
        tree.refresh_types_up(parent);
        assert_eq!(tree.dir(root).size, 0);
        assert!(!tree.has_type(root, SearchType::Video));
    }

    #[test]
    fn merge_into_is_additive() {
        let mut tree = Tree::new(false);
        let dst = tree.add_root("Files");
        let d_sub = tree.alloc_dir("common", Some(dst));
        tree.insert_file(d_sub, "x.txt", 1, tth(1));

        let src = tree.alloc_dir("Files", None);
        let s_sub = tree.alloc_dir("Common", Some(src));
        tree.insert_file(s_sub, "y.txt", 2, tth(2));
        tree.insert_file(src, "top.txt", 3, tth(3));

        tree.merge_into(dst, src);
        tree.recompute_stats(dst);

        // "common"/"Common" collide under the insensitive policy
        assert_eq!(tree.child_ids(dst).count(), 1);
        assert!(tree.find_file(d_sub, "x.txt").is_some());
        assert!(tree.find_file(d_sub, "y.txt").is_some());
        assert!(tree.find_file(dst, "top.txt").is_some());
        assert_eq!(tree.dir(dst).size, 6);
    }

    #[test]
    fn reconcile_applies_a_diff() {
        let mut live = Tree::new(false);
        let lroot = live.add_root("Share");
        let stale_dir = live.alloc_dir("gone", Some(lroot));
        live.insert_file(stale_dir, "old.txt", 5, tth(1));
        live.insert_file(lroot, "keep.txt", 10, tth(2));
        live.insert_file(lroot, "changed.txt", 20, tth(3));
        live.recompute_stats(lroot);

        let mut shadow = Tree::new(false);
        let sroot = shadow.add_root("Share");
        let fresh = shadow.alloc_dir("new", Some(sroot));
        shadow.insert_file(fresh, "brand.mp3", 7, tth(4));
        shadow.insert_file(sroot, "keep.txt", 10, tth(2));
        shadow.insert_file(sroot, "changed.txt", 21, tth(5));
        shadow.recompute_stats(sroot);

        live.reconcile_from(&shadow, sroot, lroot);
        live.recompute_stats(lroot);

        assert!(live.child(lroot, "gone").is_none());
        let new_dir = live.child(lroot, "new").unwrap();
        assert!(live.find_file(new_dir, "brand.mp3").is_some());
        let kept = live.find_file(lroot, "keep.txt").unwrap();
        assert_eq!(live.file(kept).tth, tth(2));
        let changed = live.find_file(lroot, "changed.txt").unwrap();
        assert_eq!(live.file(changed).size, 21);
        assert_eq!(live.file(changed).tth, tth(5));
        assert_eq!(live.dir(lroot).size, 7 + 10 + 21);
        assert!(live.has_type(lroot, SearchType::Audio));
    }

    #[test]
    fn remove_subtree_unlinks_roots_and_frees_slots() {
        let mut tree = Tree::new(false);
        let root = tree.add_root("Share");
        let sub = tree.alloc_dir("sub", Some(root));
        tree.insert_file(sub, "f.bin", 1, tth(1));
        assert_eq!(tree.file_count(), 1);

        tree.remove_subtree(root);
        assert!(tree.roots().is_empty());
        assert_eq!(tree.file_count(), 0);

        // freed slots are reused
        let again = tree.add_root("Other");
        assert_eq!(tree.roots(), &[again]);
    }
}
