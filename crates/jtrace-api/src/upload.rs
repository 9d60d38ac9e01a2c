use axum::{
    Extension,
    extract::{Multipart, Path, State},
};
use bytes::Bytes;
use tracing::{info, warn};

use jtrace_media::{MediaStorage, StorageError, StoredFile};
use jtrace_types::api::{FilePathQuery, RefreshUrlQuery};
use jtrace_types::models::{
    BatchUploadItem, FileInfoView, RefreshedUrl, UploadedAvatar, UploadedMedia,
};

use crate::envelope::ok;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiQuery;
use crate::middleware::CurrentUser;
use crate::state::AppState;

const MAX_BATCH_FILES: usize = 10;

/// One file part of a multipart body.
struct FilePart {
    file_name: String,
    content_type: String,
    data: Bytes,
}

#[derive(Default)]
struct UploadForm {
    files: Vec<FilePart>,
    descriptions: Vec<String>,
}

impl UploadForm {
    /// Collects `file`/`files` parts and `description`/`descriptions` texts.
    /// A part without a content type gets one guessed from its file name.
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::invalid(format!("Multipart error: {}", e.body_text())))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" | "files" => {
                    let file_name = field.file_name().unwrap_or("upload").to_string();
                    let content_type = match field.content_type() {
                        Some(ct) => ct.to_string(),
                        None => mime_guess::from_path(&file_name)
                            .first_or_octet_stream()
                            .to_string(),
                    };
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::invalid(e.body_text()))?;
                    form.files.push(FilePart {
                        file_name,
                        content_type,
                        data,
                    });
                }
                "description" | "descriptions" => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| ApiError::invalid(e.body_text()))?;
                    form.descriptions.push(text);
                }
                _ => {}
            }
        }

        Ok(form)
    }

    fn description(&self, index: usize) -> Option<String> {
        self.descriptions
            .get(index)
            .filter(|d| !d.is_empty())
            .cloned()
    }
}

fn storage_error(e: StorageError, storage: &MediaStorage) -> ApiError {
    match e {
        StorageError::UnsupportedType(ct) => ApiError::Rejected(format!(
            "Unsupported file type: {}. Allowed: {}",
            ct,
            storage.allowed_types().join(", ")
        )),
        StorageError::TooLarge { max_mb } => {
            ApiError::Rejected(format!("File too large, maximum is {}MB", max_mb))
        }
        StorageError::OutsideUploadDir | StorageError::NotFound => {
            ApiError::NotFound("File not found".into())
        }
        StorageError::Io(io) => ApiError::Internal(io.into()),
    }
}

fn uploaded(
    state: &AppState,
    stored: StoredFile,
    description: Option<String>,
    sort_order: Option<usize>,
) -> UploadedMedia {
    UploadedMedia {
        signed_url: state.signer.signed_url(&stored.relative_path, None),
        media_url: stored.relative_path.clone(),
        file_path: stored.relative_path,
        media_type: stored.category.as_str().to_string(),
        description,
        original_filename: stored.original_filename,
        size: stored.size,
        sort_order,
    }
}

/// POST /api/upload/media
pub async fn upload_media(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    multipart: Multipart,
) -> ApiResult<UploadedMedia> {
    let form = UploadForm::read(multipart).await?;
    let description = form.description(0);
    let part = form
        .files
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::invalid("Missing file field"))?;

    let stored = state
        .storage
        .save_media(user.id, &part.content_type, &part.file_name, &part.data)
        .await
        .map_err(|e| storage_error(e, &state.storage))?;

    Ok(ok(uploaded(&state, stored, description, None), "Uploaded"))
}

/// POST /api/upload/media/batch: per-file failures are reported inline.
pub async fn upload_batch(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    multipart: Multipart,
) -> ApiResult<Vec<BatchUploadItem>> {
    let form = UploadForm::read(multipart).await?;
    if form.files.is_empty() {
        return Err(ApiError::invalid("Missing files field"));
    }
    if form.files.len() > MAX_BATCH_FILES {
        return Err(ApiError::Rejected(format!(
            "At most {} files per batch",
            MAX_BATCH_FILES
        )));
    }

    let total = form.files.len();
    let mut results = Vec::with_capacity(total);
    for (i, part) in form.files.iter().enumerate() {
        let saved = state
            .storage
            .save_media(user.id, &part.content_type, &part.file_name, &part.data)
            .await;

        let item = match saved {
            Ok(stored) => {
                BatchUploadItem::Uploaded(uploaded(&state, stored, form.description(i), Some(i)))
            }
            Err(e) => {
                warn!("Batch upload of {} failed: {}", part.file_name, e);
                BatchUploadItem::Failed {
                    error: format!("Failed to upload {}: {}", part.file_name, e),
                    original_filename: part.file_name.clone(),
                }
            }
        };
        results.push(item);
    }

    Ok(ok(results, format!("Batch upload finished, {} files processed", total)))
}

/// DELETE /api/upload/media?file_path=
pub async fn delete_media(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiQuery(query): ApiQuery<FilePathQuery>,
) -> ApiResult<()> {
    match state.storage.delete(&query.file_path).await {
        Ok(()) => {
            info!("User {} deleted {}", user.id, query.file_path);
            Ok(ok((), "File deleted"))
        }
        Err(StorageError::OutsideUploadDir) => {
            Err(ApiError::Rejected("Not allowed to delete this file".into()))
        }
        Err(e) => Err(storage_error(e, &state.storage)),
    }
}

/// GET /api/upload/info/{*path}
pub async fn file_info(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> ApiResult<FileInfoView> {
    let info = state
        .storage
        .info(&path)
        .await
        .map_err(|e| storage_error(e, &state.storage))?;

    Ok(ok(
        FileInfoView {
            size: info.size,
            created_at: info.created_at.map(|t| t.to_rfc3339()),
            modified_at: info.modified_at.map(|t| t.to_rfc3339()),
            exists: true,
        },
        "",
    ))
}

/// POST /api/upload/refresh-url?file_path&expires_minutes
pub async fn refresh_url(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<RefreshUrlQuery>,
) -> ApiResult<RefreshedUrl> {
    if !state.storage.exists(&query.file_path).await {
        return Err(ApiError::NotFound("File not found".into()));
    }

    let path = query.file_path.trim_start_matches('/');
    Ok(ok(
        RefreshedUrl {
            media_url: state.signer.signed_url(path, query.expires_minutes),
            file_path: query.file_path.clone(),
        },
        "URL refreshed",
    ))
}

/// POST /api/upload/avatar: public URL, no signature.
pub async fn upload_avatar(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    multipart: Multipart,
) -> ApiResult<UploadedAvatar> {
    let form = UploadForm::read(multipart).await?;
    let part = form
        .files
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::invalid("Missing file field"))?;

    let name = match state
        .storage
        .save_avatar(&part.content_type, &part.file_name, &part.data)
        .await
    {
        Ok(name) => name,
        Err(StorageError::UnsupportedType(_)) => {
            return Err(ApiError::Rejected("Avatars must be images".into()));
        }
        Err(StorageError::TooLarge { max_mb }) => {
            return Err(ApiError::Rejected(format!(
                "Avatar too large, maximum is {}MB",
                max_mb
            )));
        }
        Err(e) => return Err(storage_error(e, &state.storage)),
    };

    info!("User {} uploaded avatar {}", user.id, name);
    Ok(ok(
        UploadedAvatar {
            media_url: format!("/avatars/{}", name),
            media_type: "image".into(),
            original_filename: part.file_name,
            size: part.data.len() as u64,
        },
        "Avatar uploaded",
    ))
}
