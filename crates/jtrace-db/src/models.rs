//! Row types as read from and written to SQLite. The API crate turns
//! them into the JSON views of jtrace-types.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub gender: i64,
    pub status: i64,
    pub is_admin: bool,
    pub created_at: String,
    pub updated_at: String,
    pub last_login: Option<String>,
}

impl UserRow {
    pub fn is_active(&self) -> bool {
        self.status == 1
    }
}

/// Outcome of [`Database::register_user`](crate::Database::register_user).
#[derive(Debug)]
pub enum Registration {
    Created(UserRow),
    UsernameTaken,
    EmailTaken,
}

#[derive(Default)]
pub struct ProfileChanges {
    pub nickname: Option<String>,
    pub bio: Option<String>,
    pub gender: Option<i64>,
    pub avatar: Option<String>,
}

pub struct FootprintRow {
    pub id: i64,
    pub user_id: i64,
    pub username: Option<String>,
    pub name: String,
    pub lng: f64,
    pub lat: f64,
    pub kind: String,
    pub date: Option<String>,
    pub notes: Option<String>,
    pub is_public: bool,
    pub created_at: String,
    /// Tag names in insertion order.
    pub tags: Vec<String>,
    pub medias: Vec<MediaRow>,
}

pub struct MediaRow {
    pub id: i64,
    pub footprint_id: i64,
    pub media_url: String,
    pub media_type: String,
    pub description: Option<String>,
    pub sort_order: i64,
    pub created_at: String,
}

#[derive(Clone)]
pub struct NewMedia {
    pub media_url: String,
    pub media_type: String,
    pub description: Option<String>,
    pub sort_order: i64,
}

pub struct NewFootprint {
    pub user_id: i64,
    pub name: String,
    pub lng: f64,
    pub lat: f64,
    pub kind: String,
    pub date: Option<String>,
    pub notes: Option<String>,
    pub is_public: bool,
    pub tags: Vec<String>,
    pub medias: Vec<NewMedia>,
}

/// Partial update. `None` leaves a column untouched; `tags` / `medias`
/// replace the whole set when present.
#[derive(Default)]
pub struct FootprintChanges {
    pub name: Option<String>,
    pub lng: Option<f64>,
    pub lat: Option<f64>,
    pub kind: Option<String>,
    pub date: Option<Option<String>>,
    pub notes: Option<String>,
    pub is_public: Option<bool>,
    pub tags: Option<Vec<String>>,
    pub medias: Option<Vec<NewMedia>>,
}

pub struct FootprintTypeRow {
    pub id: i64,
    pub name: String,
    pub icon: Option<String>,
    pub sort_order: i64,
}

pub struct CommentRow {
    pub id: i64,
    pub footprint_id: i64,
    pub user_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
    pub is_deleted: bool,
    pub created_at: String,
    pub updated_at: String,
    pub author: Option<CommentAuthor>,
}

pub struct CommentAuthor {
    pub username: String,
    pub nickname: Option<String>,
    pub avatar: Option<String>,
}

pub struct CommentImageRow {
    pub id: i64,
    pub comment_id: i64,
    pub image_url: String,
    pub description: Option<String>,
    pub sort_order: i64,
    pub created_at: String,
}

pub struct NewCommentImage {
    pub image_url: String,
    pub description: Option<String>,
    pub sort_order: i64,
}

pub struct NewComment {
    pub footprint_id: i64,
    pub user_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
    pub images: Vec<NewCommentImage>,
}

/// A comment of the current user together with the footprint it belongs to.
pub struct UserCommentRow {
    pub comment: CommentRow,
    pub footprint_name: String,
    pub footprint_lng: f64,
    pub footprint_lat: f64,
}

pub struct OpLogRow {
    pub id: i64,
    pub user_id: Option<i64>,
    pub action: String,
    pub path: String,
    pub method: String,
    pub detail: Option<String>,
    pub created_at: String,
}

pub struct StatsRow {
    pub users: i64,
    pub active_users: i64,
    pub footprints: i64,
    pub public_footprints: i64,
    pub comments: i64,
    pub medias: i64,
    pub op_logs: i64,
}
