use serde::{Deserialize, Serialize};

use crate::tth::TthValue;

/// Size constraint attached to a keyword search.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SizeMode {
    Any,
    AtLeast,
    AtMost,
    Exact,
}

impl SizeMode {
    pub fn matches(self, actual: u64, bound: u64) -> bool {
        match self {
            Self::Any => true,
            Self::AtLeast => actual >= bound,
            Self::AtMost => actual <= bound,
            Self::Exact => actual == bound,
        }
    }
}

/// A parsed structured search. Built by `protocol::parse_search_tokens`;
/// defaults describe the unconstrained query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub ext: Vec<String>,
    pub no_ext: Vec<String>,
    pub gt: u64,
    pub lt: u64,
    pub root: Option<TthValue>,
    pub is_directory: bool,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            ext: Vec::new(),
            no_ext: Vec::new(),
            gt: 0,
            lt: u64::MAX,
            root: None,
            is_directory: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ResultKind {
    File,
    Directory,
}

/// One search hit, addressed by virtual path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub virtual_path: String,
    pub size: u64,
    pub tth: Option<TthValue>,
    pub kind: ResultKind,
}
