#![allow(dead_code)]

pub mod config;
pub mod error;
pub mod query;
pub mod tth;
pub mod types;

pub use config::{AppConfig, SharedRoot};
pub use error::{ShareError, ShareResult};
pub use query::{ResultKind, SearchQuery, SearchResult, SizeMode};
pub use tth::TthValue;
pub use types::SearchType;
