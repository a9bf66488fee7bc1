//! Frame files and the work items that carry them through the queue.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};

use crate::error::{BroadcastError, Result};

/// A path handed from the watcher to a worker.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct WorkItem(PathBuf);

impl WorkItem {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    pub fn into_path(self) -> PathBuf {
        self.0
    }
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WorkItem").field(&self.0.display()).finish()
    }
}

impl From<PathBuf> for WorkItem {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

/// A file dropped under `<root>/<channel>/<basename>` by the upstream
/// producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameFile {
    path: PathBuf,
    channel: String,
}

impl FrameFile {
    /// Resolve the channel from the immediate parent directory name.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let channel = channel_of(&path).ok_or_else(|| {
            BroadcastError::InvalidFrame(format!(
                "{} has no parent directory to derive a channel from",
                path.display()
            ))
        })?;
        Ok(Self { path, channel })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Lossy string form of the path, used for sampling and log fields.
    pub fn path_str(&self) -> std::borrow::Cow<'_, str> {
        self.path.to_string_lossy()
    }
}

fn channel_of(path: &Path) -> Option<String> {
    let parent = path.parent()?;
    let name = parent.file_name()?;
    Some(name.to_string_lossy().into_owned())
}

/// UTC epoch seconds for a file modification time. Times before the epoch
/// yield negative values rather than wrapping.
pub fn epoch_seconds(modified_at: SystemTime) -> i64 {
    DateTime::<Utc>::from(modified_at).timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn channel_is_parent_directory_name() {
        let frame =
            FrameFile::from_path("/srv/frames/channelA/000008.jpg").unwrap();
        assert_eq!(frame.channel(), "channelA");
        assert_eq!(frame.path(), Path::new("/srv/frames/channelA/000008.jpg"));
    }

    #[test]
    fn relative_paths_resolve_channels_too() {
        let frame = FrameFile::from_path("frames/news/thumb.jpg").unwrap();
        assert_eq!(frame.channel(), "news");
    }

    #[test]
    fn bare_file_name_is_rejected() {
        let err = FrameFile::from_path("thumb.jpg").unwrap_err();
        assert!(matches!(err, BroadcastError::InvalidFrame(_)));
    }

    #[test]
    fn epoch_seconds_truncates_subsecond_precision() {
        let at = SystemTime::UNIX_EPOCH + Duration::from_millis(1_700_000_000_999);
        assert_eq!(epoch_seconds(at), 1_700_000_000);
    }
}
