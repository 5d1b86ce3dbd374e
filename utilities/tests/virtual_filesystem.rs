use std::path::Path;

use utilities::{FileSystem, VirtualFileSystem};

#[test]
fn write_creates_parents_and_reads_back() {
    let fs = VirtualFileSystem::new();

    fs.write(Path::new("/a/b/c.txt"), b"hello").unwrap();

    let data = fs.read(Path::new("/a/b/c.txt")).unwrap();
    assert_eq!(data, b"hello");

    let md_dir = fs.metadata(Path::new("/a/b")).unwrap();
    assert!(md_dir.is_dir);
    assert!(!md_dir.is_file);

    let md_file = fs.metadata(Path::new("/a/b/c.txt")).unwrap();
    assert!(md_file.is_file);
    assert!(!md_file.is_dir);
    assert_eq!(md_file.len, 5);
}

#[test]
fn read_dir_lists_children_with_names() {
    let fs = VirtualFileSystem::new();

    fs.create_dir_all(Path::new("/d/e")).unwrap();
    fs.write(Path::new("/d/e/f1"), b"x").unwrap();
    fs.write(Path::new("/d/e/f2"), b"y").unwrap();

    let entries = fs.read_dir(Path::new("/d/e")).unwrap();
    let mut names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    names.sort();

    assert_eq!(names, vec!["f1", "f2"]);
    assert!(entries.iter().all(|e| e.metadata.is_file));
}

#[test]
fn dot_names_are_flagged_hidden() {
    let fs = VirtualFileSystem::new();

    fs.create_dir_all(Path::new("/h/.git")).unwrap();
    fs.write(Path::new("/h/.env"), b"secret").unwrap();
    fs.write(Path::new("/h/plain.txt"), b"ok").unwrap();

    assert!(fs.metadata(Path::new("/h/.git")).unwrap().hidden);
    assert!(fs.metadata(Path::new("/h/.env")).unwrap().hidden);
    assert!(!fs.metadata(Path::new("/h/plain.txt")).unwrap().hidden);

    let entries = fs.read_dir(Path::new("/h")).unwrap();
    let hidden: Vec<&str> = entries
        .iter()
        .filter(|e| e.metadata.hidden)
        .map(|e| e.name.as_str())
        .collect();
    assert_eq!(hidden, vec![".env", ".git"]);
}

#[test]
fn remove_file_unlinks_from_parent() {
    let fs = VirtualFileSystem::new();

    fs.write(Path::new("/r/gone.txt"), b"x").unwrap();
    fs.remove_file(Path::new("/r/gone.txt")).unwrap();

    assert!(fs.read(Path::new("/r/gone.txt")).is_err());
    assert!(fs.read_dir(Path::new("/r")).unwrap().is_empty());
    assert!(fs.remove_file(Path::new("/r/gone.txt")).is_err());
}

#[test]
fn normalizes_dot_dot_segments() {
    let fs = VirtualFileSystem::new();

    fs.write(Path::new("/x/y/../z.txt"), b"ok").unwrap();

    assert_eq!(fs.read(Path::new("/x/z.txt")).unwrap(), b"ok");
    assert!(fs.read(Path::new("/x/y/z.txt")).is_err());
}
