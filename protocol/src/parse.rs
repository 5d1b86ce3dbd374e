use models::{SearchQuery, ShareError, ShareResult, TthValue};

/// Prefix for hash-addressed virtual paths.
pub const TTH_PATH_PREFIX: &str = "/TTH/";

/// Parse the prefixed tokens of a structured search.
///
/// Tokens may arrive in any order; unknown prefixes and malformed values
/// are skipped rather than aborting the parse, since remote clients ship
/// extensions we do not know about.
pub fn parse_search_tokens(params: &[String]) -> SearchQuery {
    let mut q = SearchQuery::default();
    for param in params {
        if param.len() < 2 {
            continue;
        }
        let (prefix, rest) = param.split_at(2);
        match prefix {
            "AN" => {
                if !rest.is_empty() {
                    q.include.push(rest.to_string());
                }
            }
            "NO" => {
                if !rest.is_empty() {
                    q.exclude.push(rest.to_string());
                }
            }
            "EX" => {
                if let Some(ext) = clean_extension(rest) {
                    q.ext.push(ext);
                }
            }
            "GR" => {
                if let Ok(v) = rest.parse::<u64>() {
                    q.gt = v;
                }
            }
            "LE" => {
                if let Ok(v) = rest.parse::<u64>() {
                    q.lt = v;
                }
            }
            "TR" => {
                q.root = rest.parse::<TthValue>().ok();
            }
            "TY" => match rest {
                "1" => q.is_directory = false,
                "2" => q.is_directory = true,
                _ => {}
            },
            _ => {}
        }
    }
    q
}

fn clean_extension(raw: &str) -> Option<String> {
    let ext = raw.trim_start_matches('.');
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

/// A virtual path split into its addressing parts. A trailing slash means
/// the path names a directory and `leaf` is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualPath {
    pub root: String,
    pub dirs: Vec<String>,
    pub leaf: Option<String>,
}

/// Split `/Root/sub1/sub2/name` on `/`. The path must be absolute and
/// name a root; empty segments are rejected.
pub fn parse_virtual_path(path: &str) -> ShareResult<VirtualPath> {
    let rest = path
        .strip_prefix('/')
        .ok_or_else(|| ShareError::InvalidPath(path.to_string()))?;
    if rest.is_empty() {
        return Err(ShareError::InvalidPath(path.to_string()));
    }

    let trailing_slash = rest.ends_with('/');
    let mut segments: Vec<&str> = rest.split('/').collect();
    if trailing_slash {
        segments.pop();
    }
    if segments.is_empty() || segments.iter().any(|s| s.is_empty()) {
        return Err(ShareError::InvalidPath(path.to_string()));
    }

    let root = segments.remove(0).to_string();
    let leaf = if trailing_slash {
        None
    } else {
        match segments.pop() {
            Some(name) => Some(name.to_string()),
            None => return Err(ShareError::InvalidPath(path.to_string())),
        }
    };
    Ok(VirtualPath {
        root,
        dirs: segments.into_iter().map(str::to_string).collect(),
        leaf,
    })
}

/// Recognize a `/TTH/<base32-root>` path. Returns `None` when the path is
/// not hash-addressed at all.
pub fn parse_tth_path(path: &str) -> Option<ShareResult<TthValue>> {
    let encoded = path.strip_prefix(TTH_PATH_PREFIX)?;
    Some(encoded.parse::<TthValue>())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_tokens_in_any_order() {
        let q = parse_search_tokens(&params(&["LE1000", "ANfoo", "GR100", "NObar", "EXmp3"]));
        assert_eq!(q.include, vec!["foo"]);
        assert_eq!(q.exclude, vec!["bar"]);
        assert_eq!(q.ext, vec!["mp3"]);
        assert_eq!(q.gt, 100);
        assert_eq!(q.lt, 1000);
        assert!(!q.is_directory);
    }

    #[test]
    fn extension_dot_and_case_are_normalized() {
        let q = parse_search_tokens(&params(&["EX.MP3"]));
        assert_eq!(q.ext, vec!["mp3"]);
    }

    #[test]
    fn unknown_and_malformed_tokens_are_skipped() {
        let q = parse_search_tokens(&params(&["ZZweird", "GRnope", "ANok", "X", ""]));
        assert_eq!(q.include, vec!["ok"]);
        assert_eq!(q.gt, 0);
    }

    #[test]
    fn directory_mode_flag() {
        assert!(parse_search_tokens(&params(&["TY2"])).is_directory);
        assert!(!parse_search_tokens(&params(&["TY1"])).is_directory);
    }

    #[test]
    fn tth_root_token_parses() {
        let tth = TthValue([7u8; 24]);
        let q = parse_search_tokens(&params(&[&format!("TR{}", tth.encoded())]));
        assert_eq!(q.root, Some(tth));
    }

    #[test]
    fn splits_file_and_directory_paths() {
        let p = parse_virtual_path("/Music/albums/x/track.mp3").unwrap();
        assert_eq!(p.root, "Music");
        assert_eq!(p.dirs, vec!["albums", "x"]);
        assert_eq!(p.leaf.as_deref(), Some("track.mp3"));

        let d = parse_virtual_path("/Music/albums/").unwrap();
        assert_eq!(d.root, "Music");
        assert_eq!(d.dirs, vec!["albums"]);
        assert!(d.leaf.is_none());

        let r = parse_virtual_path("/Music/").unwrap();
        assert_eq!(r.root, "Music");
        assert!(r.dirs.is_empty() && r.leaf.is_none());
    }

    #[test]
    fn rejects_relative_and_empty_segments() {
        assert!(parse_virtual_path("Music/a").is_err());
        assert!(parse_virtual_path("/").is_err());
        assert!(parse_virtual_path("/Music//a").is_err());
        assert!(parse_virtual_path("/Music").is_err());
    }

    #[test]
    fn recognizes_tth_paths() {
        let tth = TthValue([3u8; 24]);
        let path = format!("/TTH/{}", tth.encoded());
        assert_eq!(parse_tth_path(&path).unwrap().unwrap(), tth);
        assert!(parse_tth_path("/Music/a.mp3").is_none());
        assert!(parse_tth_path("/TTH/NOTVALID").unwrap().is_err());
    }
}
