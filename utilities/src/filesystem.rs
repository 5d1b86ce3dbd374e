use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

#[derive(Debug, Clone)]
pub struct FsMetadata {
    pub is_file: bool,
    pub is_dir: bool,
    pub len: u64,
    pub modified: Option<SystemTime>,
    /// Dot-name convention; covers the platform-hidden notion the index
    /// filters on.
    pub hidden: bool,
}

#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub path: PathBuf,
    pub metadata: FsMetadata,
}

pub trait FileSystem: Send + Sync {
    fn metadata(&self, path: &Path) -> io::Result<FsMetadata>;
    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>>;
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()>;
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
    fn remove_file(&self, path: &Path) -> io::Result<()>;
}

fn name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.')
}

#[derive(Debug, Default, Clone)]
pub struct RealFileSystem;

impl RealFileSystem {
    pub fn new() -> Self {
        Self
    }

    fn convert(md: &std::fs::Metadata, name: &str) -> FsMetadata {
        FsMetadata {
            is_file: md.is_file(),
            is_dir: md.is_dir(),
            len: md.len(),
            modified: md.modified().ok(),
            hidden: is_hidden_name(name),
        }
    }
}

impl FileSystem for RealFileSystem {
    fn metadata(&self, path: &Path) -> io::Result<FsMetadata> {
        let md = std::fs::metadata(path)?;
        Ok(Self::convert(&md, &name_of(path)))
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let entries = std::fs::read_dir(path)?;
        let mut out = Vec::new();
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            let md = entry.metadata()?;
            out.push(DirEntry {
                metadata: Self::convert(&md, &name),
                name,
                path,
            });
        }
        Ok(out)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, data)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }
}

/// In-memory filesystem for tests and rescan simulations.
///
/// Backed by an actual tree of nodes behind one lock, so nesting,
/// missing-directory errors, and listings behave like the disk it stands
/// in for. Relative paths resolve against the root.
#[derive(Debug, Clone)]
pub struct VirtualFileSystem {
    root: Arc<Mutex<Node>>,
}

#[derive(Debug)]
enum Node {
    File {
        data: Vec<u8>,
        modified: SystemTime,
    },
    Dir {
        entries: BTreeMap<String, Node>,
        modified: SystemTime,
    },
}

impl Node {
    fn new_dir() -> Self {
        Node::Dir {
            entries: BTreeMap::new(),
            modified: SystemTime::now(),
        }
    }

    fn metadata(&self, name: &str) -> FsMetadata {
        match self {
            Node::File { data, modified } => FsMetadata {
                is_file: true,
                is_dir: false,
                len: data.len() as u64,
                modified: Some(*modified),
                hidden: is_hidden_name(name),
            },
            Node::Dir { modified, .. } => FsMetadata {
                is_file: false,
                is_dir: true,
                len: 0,
                modified: Some(*modified),
                hidden: is_hidden_name(name),
            },
        }
    }
}

/// Flatten a path into its normal components. `..` pops, `.` and root
/// markers vanish, so `/x/y/../z` and `x/z` name the same node.
fn segments(path: &Path) -> Vec<String> {
    let mut segs: Vec<String> = Vec::new();
    for comp in path.components() {
        match comp {
            Component::Normal(c) => segs.push(c.to_string_lossy().into_owned()),
            Component::ParentDir => {
                segs.pop();
            }
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }
    segs
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} not found", path.display()),
    )
}

fn not_a_directory(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::Other,
        format!("{} is not a directory", path.display()),
    )
}

/// Walk down to the node a segment list names.
fn descend<'a>(mut node: &'a Node, segs: &[String]) -> Option<&'a Node> {
    for seg in segs {
        match node {
            Node::Dir { entries, .. } => node = entries.get(seg)?,
            Node::File { .. } => return None,
        }
    }
    Some(node)
}

/// Walk down to the entry map of the directory a segment list names,
/// optionally creating missing directories along the way. A file in the
/// middle of the path is an error either way.
fn dir_entries_mut<'a>(
    node: &'a mut Node,
    segs: &[String],
    create: bool,
) -> io::Result<&'a mut BTreeMap<String, Node>> {
    let mut cur = node;
    for seg in segs {
        let Node::Dir { entries, .. } = cur else {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{seg} is under a file"),
            ));
        };
        cur = if create {
            entries.entry(seg.clone()).or_insert_with(Node::new_dir)
        } else {
            entries.get_mut(seg).ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("{seg} not found"))
            })?
        };
    }
    match cur {
        Node::Dir { entries, .. } => Ok(entries),
        Node::File { .. } => Err(io::Error::new(io::ErrorKind::Other, "not a directory")),
    }
}

impl Default for VirtualFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualFileSystem {
    pub fn new() -> Self {
        VirtualFileSystem {
            root: Arc::new(Mutex::new(Node::new_dir())),
        }
    }
}

impl FileSystem for VirtualFileSystem {
    fn metadata(&self, path: &Path) -> io::Result<FsMetadata> {
        let root = self.root.lock().unwrap();
        let segs = segments(path);
        let node = descend(&root, &segs).ok_or_else(|| not_found(path))?;
        let name = segs.last().map(String::as_str).unwrap_or("");
        Ok(node.metadata(name))
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let root = self.root.lock().unwrap();
        let segs = segments(path);
        let node = descend(&root, &segs).ok_or_else(|| not_found(path))?;
        let Node::Dir { entries, .. } = node else {
            return Err(not_a_directory(path));
        };
        let mut base = PathBuf::from("/");
        for seg in &segs {
            base.push(seg);
        }
        Ok(entries
            .iter()
            .map(|(name, child)| DirEntry {
                name: name.clone(),
                path: base.join(name),
                metadata: child.metadata(name),
            })
            .collect())
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let root = self.root.lock().unwrap();
        match descend(&root, &segments(path)) {
            Some(Node::File { data, .. }) => Ok(data.clone()),
            Some(Node::Dir { .. }) => Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} is a directory", path.display()),
            )),
            None => Err(not_found(path)),
        }
    }

    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let mut root = self.root.lock().unwrap();
        let mut segs = segments(path);
        let Some(name) = segs.pop() else {
            return Err(not_a_directory(path));
        };
        let entries = dir_entries_mut(&mut root, &segs, true)?;
        entries.insert(
            name,
            Node::File {
                data: data.to_vec(),
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut root = self.root.lock().unwrap();
        dir_entries_mut(&mut root, &segments(path), true).map(|_| ())
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        let mut root = self.root.lock().unwrap();
        let mut segs = segments(path);
        let Some(name) = segs.pop() else {
            return Err(not_found(path));
        };
        let entries = dir_entries_mut(&mut root, &segs, false).map_err(|_| not_found(path))?;
        match entries.get(&name) {
            Some(Node::File { .. }) => {
                entries.remove(&name);
                Ok(())
            }
            Some(Node::Dir { .. }) => Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} is a directory", path.display()),
            )),
            None => Err(not_found(path)),
        }
    }
}
