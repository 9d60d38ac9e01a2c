use chrono::{DateTime, Local, Utc};
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tokio::fs;
use tracing::info;

use jtrace_types::config::{DirectoryStrategy, UploadConfig};

use crate::planner::{MediaCategory, plan_directory};

/// Avatars are public and small.
pub const AVATAR_MAX_SIZE: usize = 2 * 1024 * 1024;
pub const AVATAR_DIR: &str = "avatars";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("File too large, maximum is {max_mb}MB")]
    TooLarge { max_mb: usize },
    #[error("Path is outside the upload directory")]
    OutsideUploadDir,
    #[error("File not found")]
    NotFound,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A file written by [`MediaStorage::save_media`].
#[derive(Debug, Clone)]
pub struct StoredFile {
    /// Path relative to the upload root, `/`-separated, starting with the
    /// base dir. This is the value persisted in the database.
    pub relative_path: String,
    pub category: MediaCategory,
    pub size: u64,
    pub original_filename: String,
}

#[derive(Debug, Clone)]
pub struct FileInfo {
    pub size: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

/// On-disk media store.
///
/// Uploads land at `{root}/{base_dir}/{category}s/...` following the
/// configured directory strategy; avatars at `{root}/{base_dir}/avatars`.
pub struct MediaStorage {
    root: PathBuf,
    base_dir: String,
    strategy: DirectoryStrategy,
    max_file_size: usize,
    image_types: Vec<String>,
    video_types: Vec<String>,
}

impl MediaStorage {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            root: config.root.clone(),
            base_dir: normalize_base_dir(&config.base_dir),
            strategy: config.directory_strategy,
            max_file_size: config.max_file_size,
            image_types: config.allowed_image_types.clone(),
            video_types: config.allowed_video_types.clone(),
        }
    }

    /// Create the base and avatar directories.
    pub async fn prepare(&self) -> Result<(), StorageError> {
        fs::create_dir_all(self.avatars_dir()).await?;
        info!("Upload directory: {}", self.root.join(&self.base_dir).display());
        Ok(())
    }

    pub fn base_dir(&self) -> &str {
        &self.base_dir
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    pub fn avatars_dir(&self) -> PathBuf {
        self.root.join(&self.base_dir).join(AVATAR_DIR)
    }

    pub fn allowed_types(&self) -> Vec<&str> {
        self.image_types
            .iter()
            .chain(self.video_types.iter())
            .map(String::as_str)
            .collect()
    }

    /// Category for an allowed content type.
    pub fn classify(&self, content_type: &str) -> Result<MediaCategory, StorageError> {
        if self.image_types.iter().any(|t| t == content_type) {
            Ok(MediaCategory::Image)
        } else if self.video_types.iter().any(|t| t == content_type) {
            Ok(MediaCategory::Video)
        } else {
            Err(StorageError::UnsupportedType(content_type.to_string()))
        }
    }

    /// Validate and write one upload for `user_id`.
    pub async fn save_media(
        &self,
        user_id: i64,
        content_type: &str,
        original_filename: &str,
        data: &[u8],
    ) -> Result<StoredFile, StorageError> {
        let category = self.classify(content_type)?;
        if data.len() > self.max_file_size {
            return Err(StorageError::TooLarge {
                max_mb: self.max_file_size / (1024 * 1024),
            });
        }

        let now = Local::now();
        let dir = plan_directory(
            Path::new(&self.base_dir),
            user_id,
            category,
            now.date_naive(),
            self.strategy,
        );
        let name = unique_filename("", original_filename, now);
        let relative = to_slash(&dir.join(&name));

        let absolute = self.root.join(&dir);
        fs::create_dir_all(&absolute).await?;
        fs::write(absolute.join(&name), data).await?;

        info!("Stored {} upload for user {} at {}", category, user_id, relative);
        Ok(StoredFile {
            relative_path: relative,
            category,
            size: data.len() as u64,
            original_filename: original_filename.to_string(),
        })
    }

    /// Write an avatar and return its file name under the avatars dir.
    pub async fn save_avatar(
        &self,
        content_type: &str,
        original_filename: &str,
        data: &[u8],
    ) -> Result<String, StorageError> {
        if !content_type.starts_with("image/") {
            return Err(StorageError::UnsupportedType(content_type.to_string()));
        }
        if data.len() > AVATAR_MAX_SIZE {
            return Err(StorageError::TooLarge {
                max_mb: AVATAR_MAX_SIZE / (1024 * 1024),
            });
        }

        let name = unique_filename("avatar_", original_filename, Local::now());
        let dir = self.avatars_dir();
        fs::create_dir_all(&dir).await?;
        fs::write(dir.join(&name), data).await?;
        Ok(name)
    }

    /// Absolute path for a stored relative path. Only plain components are
    /// accepted, the leading ones must be the base dir and a file name must
    /// follow.
    pub fn locate(&self, relative: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(relative.trim_start_matches('/'));
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::OutsideUploadDir);
        }

        let rest = relative
            .strip_prefix(&self.base_dir)
            .map_err(|_| StorageError::OutsideUploadDir)?;
        if rest.as_os_str().is_empty() {
            return Err(StorageError::OutsideUploadDir);
        }

        Ok(self.root.join(relative))
    }

    pub async fn exists(&self, relative: &str) -> bool {
        match self.locate(relative) {
            Ok(path) => fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false),
            Err(_) => false,
        }
    }

    pub async fn info(&self, relative: &str) -> Result<FileInfo, StorageError> {
        let path = self.locate(relative)?;
        let meta = fs::metadata(&path).await.map_err(not_found)?;
        if !meta.is_file() {
            return Err(StorageError::NotFound);
        }

        Ok(FileInfo {
            size: meta.len(),
            created_at: meta.created().ok().map(utc),
            modified_at: meta.modified().ok().map(utc),
        })
    }

    pub async fn delete(&self, relative: &str) -> Result<(), StorageError> {
        let path = self.locate(relative)?;
        fs::remove_file(&path).await.map_err(not_found)?;
        info!("Deleted media file {}", relative);
        Ok(())
    }
}

/// `{prefix}{YYYYmmdd_HHMMSS}_{uuid}{.ext}` with the lowercased extension of
/// the original name.
fn unique_filename(prefix: &str, original: &str, now: DateTime<Local>) -> String {
    let ext = Path::new(original)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();
    format!(
        "{}{}_{}{}",
        prefix,
        now.format("%Y%m%d_%H%M%S"),
        uuid::Uuid::new_v4(),
        ext
    )
}

/// `./data//uploads/` becomes `data/uploads`, matching the prefix of every
/// relative path `save_media` hands out.
fn normalize_base_dir(base_dir: &str) -> String {
    Path::new(base_dir)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

fn not_found(e: std::io::Error) -> StorageError {
    if e.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound
    } else {
        StorageError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(root: &Path) -> MediaStorage {
        MediaStorage::new(&UploadConfig {
            root: root.to_path_buf(),
            max_file_size: 16,
            ..UploadConfig::default()
        })
    }

    #[tokio::test]
    async fn save_read_info_delete() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = storage(tmp.path());

        let stored = storage
            .save_media(42, "image/png", "Photo.PNG", b"png-bytes")
            .await
            .unwrap();
        assert_eq!(stored.category, MediaCategory::Image);
        assert_eq!(stored.size, 9);
        assert!(stored.relative_path.starts_with("uploads/images/"));
        assert!(stored.relative_path.contains("/user_42/"));
        assert!(stored.relative_path.ends_with(".png"));

        assert!(storage.exists(&stored.relative_path).await);
        let on_disk = storage.locate(&stored.relative_path).unwrap();
        assert_eq!(fs::read(on_disk).await.unwrap(), b"png-bytes");
        assert_eq!(storage.info(&stored.relative_path).await.unwrap().size, 9);

        storage.delete(&stored.relative_path).await.unwrap();
        assert!(!storage.exists(&stored.relative_path).await);
        assert!(matches!(
            storage.delete(&stored.relative_path).await,
            Err(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn rejects_type_and_size() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = storage(tmp.path());

        assert!(matches!(
            storage.save_media(1, "application/pdf", "a.pdf", b"x").await,
            Err(StorageError::UnsupportedType(_))
        ));
        assert!(matches!(
            storage.save_media(1, "video/mp4", "a.mp4", &[0u8; 17]).await,
            Err(StorageError::TooLarge { .. })
        ));
        assert_eq!(storage.classify("video/webm").unwrap(), MediaCategory::Video);
    }

    #[tokio::test]
    async fn avatar_rules() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = storage(tmp.path());

        let name = storage.save_avatar("image/jpeg", "me.jpg", b"jpg").await.unwrap();
        assert!(name.starts_with("avatar_"));
        assert!(name.ends_with(".jpg"));
        assert!(storage.avatars_dir().join(&name).is_file());

        assert!(matches!(
            storage.save_avatar("text/plain", "me.txt", b"x").await,
            Err(StorageError::UnsupportedType(_))
        ));
        let big = vec![0u8; AVATAR_MAX_SIZE + 1];
        assert!(matches!(
            storage.save_avatar("image/png", "big.png", &big).await,
            Err(StorageError::TooLarge { max_mb: 2 })
        ));
    }

    #[test]
    fn locate_stays_inside_base_dir() {
        let storage = storage(Path::new("/srv/jtrace"));

        assert_eq!(
            storage.locate("uploads/images/a.jpg").unwrap(),
            PathBuf::from("/srv/jtrace/uploads/images/a.jpg")
        );
        assert!(storage.locate("/uploads/images/a.jpg").is_ok());
        for bad in [
            "uploads/../secret.txt",
            "uploads/images/../../etc/passwd",
            "etc/passwd",
            "../uploads/a.jpg",
            "uploads",
            "",
        ] {
            assert!(
                matches!(storage.locate(bad), Err(StorageError::OutsideUploadDir)),
                "{} should be rejected",
                bad
            );
        }
    }

    #[tokio::test]
    async fn nested_base_dir_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        for base_dir in ["data/uploads", "./data/uploads/", "/data//uploads"] {
            let storage = MediaStorage::new(&UploadConfig {
                root: tmp.path().to_path_buf(),
                base_dir: base_dir.to_string(),
                ..UploadConfig::default()
            });
            assert_eq!(storage.base_dir(), "data/uploads");

            let stored = storage
                .save_media(1, "image/png", "a.png", b"x")
                .await
                .unwrap();
            assert!(stored.relative_path.starts_with("data/uploads/images/"));
            let on_disk = storage.locate(&stored.relative_path).unwrap();
            assert_eq!(fs::read(on_disk).await.unwrap(), b"x");
            assert_eq!(storage.info(&stored.relative_path).await.unwrap().size, 1);
            storage.delete(&stored.relative_path).await.unwrap();

            for bad in ["data/../x.png", "data/x.png", "data/uploads", "uploads/a.png"] {
                assert!(
                    matches!(storage.locate(bad), Err(StorageError::OutsideUploadDir)),
                    "{} should be rejected",
                    bad
                );
            }
        }
    }

    #[test]
    fn unique_names_keep_lowercased_extension() {
        let now = Local::now();
        let a = unique_filename("", "IMG.JPEG", now);
        let b = unique_filename("", "IMG.JPEG", now);
        assert_ne!(a, b);
        assert!(a.ends_with(".jpeg"));
        assert_eq!(unique_filename("", "noext", now).matches('.').count(), 0);
    }
}
