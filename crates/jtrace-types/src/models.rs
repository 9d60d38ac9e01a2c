//! JSON views placed in the `data` field of the response envelope.
//! Timestamps are ISO-8601 strings without timezone, as stored (UTC).

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub gender: i64,
    pub status: i64,
    pub is_admin: bool,
    pub is_active: bool,
    pub created_at: String,
    pub last_login: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub nickname: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaView {
    pub id: i64,
    /// Fresh access URL for the stored value.
    pub media_url: String,
    pub media_type: String,
    pub description: Option<String>,
    pub sort_order: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FootprintView {
    pub id: i64,
    pub user_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub name: String,
    pub lng: f64,
    pub lat: f64,
    #[serde(rename = "type")]
    pub kind: String,
    pub date: Option<String>,
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub is_public: bool,
    pub created_at: String,
    pub medias: Vec<MediaView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FootprintTypeView {
    pub id: i64,
    pub name: String,
    pub icon: Option<String>,
    pub sort_order: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FootprintSummary {
    pub id: i64,
    pub name: String,
    pub lng: f64,
    pub lat: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentImageView {
    pub id: i64,
    pub image_url: String,
    pub description: Option<String>,
    pub sort_order: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: i64,
    pub footprint_id: i64,
    pub user_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
    pub is_deleted: bool,
    pub created_at: String,
    pub updated_at: String,
    pub user: Option<UserSummary>,
    pub images: Vec<CommentImageView>,
    pub children: Vec<CommentView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footprint: Option<FootprintSummary>,
}

/// Result of a single upload. `media_url` and `file_path` carry the raw
/// relative path to store; `signed_url` is for immediate preview.
#[derive(Debug, Clone, Serialize)]
pub struct UploadedMedia {
    pub media_url: String,
    pub media_type: String,
    pub description: Option<String>,
    pub original_filename: String,
    pub size: u64,
    pub file_path: String,
    pub signed_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<usize>,
}

/// Per-file outcome of a batch upload.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BatchUploadItem {
    Uploaded(UploadedMedia),
    Failed {
        error: String,
        original_filename: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadedAvatar {
    pub media_url: String,
    pub media_type: String,
    pub original_filename: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshedUrl {
    pub media_url: String,
    pub file_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileInfoView {
    pub size: u64,
    pub created_at: Option<String>,
    pub modified_at: Option<String>,
    pub exists: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpLogView {
    pub id: i64,
    pub user_id: Option<i64>,
    pub action: String,
    pub path: String,
    pub method: String,
    pub detail: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsView {
    pub users: i64,
    pub active_users: i64,
    pub footprints: i64,
    pub public_footprints: i64,
    pub comments: i64,
    pub medias: i64,
    pub op_logs: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MapConfigView {
    pub config: String,
    pub expires_minutes: i64,
    pub encryption_enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicMapInfo {
    pub map_enabled: bool,
    pub provider: String,
    pub requires_auth: bool,
}
