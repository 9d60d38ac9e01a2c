use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::path::{Path, PathBuf};

use jtrace_types::config::DirectoryStrategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaCategory {
    Image,
    Video,
}

impl MediaCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    /// Directory name under the upload base: `images` / `videos`.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Image => "images",
            Self::Video => "videos",
        }
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directory a new upload goes into. Pure; the caller creates it.
pub fn plan_directory(
    base: &Path,
    user_id: i64,
    category: MediaCategory,
    now: NaiveDate,
    strategy: DirectoryStrategy,
) -> PathBuf {
    let root = base.join(category.dir_name());
    let user = format!("user_{}", user_id);
    let (year, month, day) = (
        format!("{:04}", now.year()),
        format!("{:02}", now.month()),
        format!("{:02}", now.day()),
    );

    match strategy {
        DirectoryStrategy::DateUser => root.join(year).join(month).join(day).join(user),
        DirectoryStrategy::UserDate => root.join(user).join(year).join(month).join(day),
        DirectoryStrategy::Simple => root,
    }
}
