use models::TthValue;
use protocol::{parse_search_tokens, parse_tth_path, parse_virtual_path};

fn params(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

#[test]
fn structured_query_round_trips_through_tokens() {
    let tth = TthValue([0x5a; 24]);
    let raw = params(&[
        "ANfoo",
        "ANbar",
        "NOdraft",
        "EX.mp3",
        "EXflac",
        "GR100",
        "LE1000",
        &format!("TR{}", tth.encoded()),
        "TY1",
    ]);
    let q = parse_search_tokens(&raw);
    assert_eq!(q.include, vec!["foo", "bar"]);
    assert_eq!(q.exclude, vec!["draft"]);
    assert_eq!(q.ext, vec!["mp3", "flac"]);
    assert_eq!((q.gt, q.lt), (100, 1000));
    assert_eq!(q.root, Some(tth));
    assert!(!q.is_directory);
}

#[test]
fn foreign_tokens_never_abort_the_parse() {
    let q = parse_search_tokens(&params(&["QQfuture", "ANkeep", "TY9", "TRbogus"]));
    assert_eq!(q.include, vec!["keep"]);
    assert!(q.root.is_none());
}

#[test]
fn virtual_and_hash_addressing_agree_on_syntax() {
    let p = parse_virtual_path("/Share/dir/file.bin").unwrap();
    assert_eq!(p.root, "Share");
    assert_eq!(p.leaf.as_deref(), Some("file.bin"));

    let tth = TthValue([1u8; 24]);
    let hash_path = format!("/TTH/{}", tth.encoded());
    assert_eq!(parse_tth_path(&hash_path).unwrap().unwrap(), tth);
    // A hash path still parses as a plain virtual path rooted at "TTH".
    let as_virtual = parse_virtual_path(&hash_path).unwrap();
    assert_eq!(as_virtual.root, "TTH");
}
