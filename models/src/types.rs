use serde::{Deserialize, Serialize};

/// Type classes a search may ask for. The numeric values double as bit
/// positions in a directory's cached type bitmap.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SearchType {
    Any = 0,
    Audio = 1,
    Compressed = 2,
    Document = 3,
    Executable = 4,
    Picture = 5,
    Video = 6,
    Directory = 7,
    Tth = 8,
}

pub const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "mp2", "wav", "au", "aiff", "flac", "ogg", "oga", "opus", "wma", "m4a", "aac", "mid",
    "mod", "ra",
];

pub const COMPRESSED_EXTENSIONS: &[&str] = &[
    "zip", "rar", "7z", "tar", "gz", "tgz", "bz2", "xz", "zst", "arj", "lzh", "ace", "z",
];

pub const DOCUMENT_EXTENSIONS: &[&str] = &[
    "txt", "md", "doc", "docx", "rtf", "odt", "pdf", "htm", "html", "nfo", "xls", "xlsx", "ppt",
    "pptx",
];

pub const EXECUTABLE_EXTENSIONS: &[&str] = &["exe", "msi", "com", "bat", "cmd", "sh", "jar", "app"];

pub const PICTURE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "tif", "tiff", "webp", "ico", "svg", "psd", "eps", "pcx",
];

pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "m4v", "mov", "avi", "mkv", "wmv", "webm", "flv", "mpg", "mpeg", "asf", "divx", "ts",
];

impl SearchType {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Any),
            1 => Some(Self::Audio),
            2 => Some(Self::Compressed),
            3 => Some(Self::Document),
            4 => Some(Self::Executable),
            5 => Some(Self::Picture),
            6 => Some(Self::Video),
            7 => Some(Self::Directory),
            8 => Some(Self::Tth),
            _ => None,
        }
    }

    /// Bit in the directory type bitmap, for the file type classes.
    pub fn bit(self) -> u32 {
        1 << (self as u32)
    }

    fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Audio => AUDIO_EXTENSIONS,
            Self::Compressed => COMPRESSED_EXTENSIONS,
            Self::Document => DOCUMENT_EXTENSIONS,
            Self::Executable => EXECUTABLE_EXTENSIONS,
            Self::Picture => PICTURE_EXTENSIONS,
            Self::Video => VIDEO_EXTENSIONS,
            _ => &[],
        }
    }
}

/// Classifies a file name into a type class by extension.
pub fn classify_name(name: &str) -> Option<SearchType> {
    let ext = name.rsplit_once('.').map(|(_, e)| e)?;
    let ext = ext.to_ascii_lowercase();
    for ty in [
        SearchType::Audio,
        SearchType::Compressed,
        SearchType::Document,
        SearchType::Executable,
        SearchType::Picture,
        SearchType::Video,
    ] {
        if ty.extensions().contains(&ext.as_str()) {
            return Some(ty);
        }
    }
    None
}
