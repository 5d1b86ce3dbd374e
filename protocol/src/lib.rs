#![allow(dead_code)]

mod parse;

pub use parse::{
    parse_search_tokens, parse_tth_path, parse_virtual_path, VirtualPath, TTH_PATH_PREFIX,
};
