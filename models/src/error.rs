use std::path::PathBuf;

/// Typed failures surfaced by the share index.
///
/// A missing content hash is deliberately not represented here: a file
/// without a hash is deferred until the hasher reports it, which is part
/// of normal operation.
#[derive(Debug, thiserror::Error)]
pub enum ShareError {
    #[error("not shared: {0}")]
    NotShared(String),

    #[error("already shared: {}", .0.display())]
    DuplicateShare(PathBuf),

    #[error("directory overlaps an existing share: {}", .0.display())]
    ShareInsideShare(PathBuf),

    #[error("hidden directories may not be shared: {}", .0.display())]
    HiddenShare(PathBuf),

    #[error("cannot enumerate {}: {source}", path.display())]
    IoUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid virtual path: {0}")]
    InvalidPath(String),

    #[error("invalid TTH root: {0}")]
    InvalidTth(String),
}

pub type ShareResult<T> = std::result::Result<T, ShareError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_path() {
        let err = ShareError::DuplicateShare(PathBuf::from("/data/music"));
        assert_eq!(err.to_string(), "already shared: /data/music");

        let io = ShareError::IoUnavailable {
            path: PathBuf::from("/gone"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "nope"),
        };
        assert!(io.to_string().starts_with("cannot enumerate /gone"));
    }
}
