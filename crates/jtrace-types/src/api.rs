use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

// -- JWT Claims --

/// Access token claims. `sub` is the numeric user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 32, message = "username must be 3-32 characters"))]
    pub username: String,
    #[validate(email(message = "invalid email address"))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "password must be at least 8 characters"))]
    pub password: String,
}

/// Form-encoded login body.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginForm {
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1))]
    pub old_password: String,
    #[validate(length(min = 8, max = 128, message = "password must be at least 8 characters"))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 50))]
    pub nickname: Option<String>,
    #[validate(length(max = 500))]
    pub bio: Option<String>,
    #[validate(range(min = 0, max = 2))]
    pub gender: Option<i64>,
    #[validate(length(max = 255))]
    pub avatar: Option<String>,
}

// -- Footprints --

fn default_footprint_type() -> String {
    "other".to_string()
}

fn validate_media_type(value: &str) -> Result<(), ValidationError> {
    match value {
        "image" | "video" => Ok(()),
        _ => Err(ValidationError::new("media_type")
            .with_message("media_type must be image or video".into())),
    }
}

/// A media row attached to a footprint. `media_url` is the raw stored value
/// returned by the upload endpoint (or an external URL).
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MediaInput {
    #[validate(length(min = 1, max = 255))]
    pub media_url: String,
    #[validate(custom(function = "validate_media_type"))]
    pub media_type: String,
    #[validate(length(max = 255))]
    pub description: Option<String>,
    pub sort_order: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateFootprintRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: f64,
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    #[serde(rename = "type", default = "default_footprint_type")]
    #[validate(length(min = 1, max = 32))]
    pub kind: String,
    /// `YYYY-MM-DD`; anything else is stored as no date.
    pub date: Option<String>,
    pub tags: Option<Vec<String>>,
    pub notes: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[validate(nested)]
    pub medias: Option<Vec<MediaInput>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateFootprintRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: Option<f64>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: Option<f64>,
    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 32))]
    pub kind: Option<String>,
    pub date: Option<String>,
    pub tags: Option<Vec<String>>,
    pub notes: Option<String>,
    pub is_public: Option<bool>,
    #[validate(nested)]
    pub medias: Option<Vec<MediaInput>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct FootprintTypeRequest {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    #[validate(length(max = 255))]
    pub icon: Option<String>,
    #[serde(default)]
    pub sort_order: i64,
}

// -- Comments --

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CommentImageInput {
    #[validate(length(min = 1, max = 255))]
    pub image_url: String,
    #[validate(length(max = 255))]
    pub description: Option<String>,
    #[serde(default)]
    pub sort_order: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(length(min = 1, max = 2000))]
    pub content: String,
    pub parent_id: Option<i64>,
    #[validate(nested)]
    pub images: Option<Vec<CommentImageInput>>,
}

// -- Admin --

#[derive(Debug, Deserialize, Validate)]
pub struct UserStatusRequest {
    #[validate(range(min = 0, max = 1))]
    pub status: i64,
}

// -- Queries --

/// Offset pagination. Each endpoint picks its own default limit.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct PageQuery {
    #[serde(default)]
    pub skip: u32,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u32>,
}

impl PageQuery {
    pub fn limit_or(&self, default: u32) -> u32 {
        self.limit.unwrap_or(default)
    }
}

/// Query string of `GET /file/{*path}`.
#[derive(Debug, Deserialize, Validate)]
pub struct SignedFileQuery {
    #[validate(length(min = 1))]
    pub signature: String,
    pub expires: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct FilePathQuery {
    #[validate(length(min = 1))]
    pub file_path: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefreshUrlQuery {
    #[validate(length(min = 1))]
    pub file_path: String,
    #[validate(range(min = 1, max = 10080))]
    pub expires_minutes: Option<i64>,
}

fn default_map_expiry() -> i64 {
    60
}

#[derive(Debug, Deserialize, Validate)]
pub struct MapConfigQuery {
    #[serde(default = "default_map_expiry")]
    #[validate(range(min = 1, max = 1440))]
    pub expires_minutes: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn footprint_defaults_and_ranges() {
        let req: CreateFootprintRequest =
            serde_json::from_str(r#"{"name":"West Lake","lng":120.15,"lat":30.25}"#).unwrap();
        assert_eq!(req.kind, "other");
        assert!(!req.is_public);
        assert!(req.validate().is_ok());

        let bad: CreateFootprintRequest =
            serde_json::from_str(r#"{"name":"Nowhere","lng":200.0,"lat":30.0}"#).unwrap();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn media_type_is_restricted() {
        let req: CreateFootprintRequest = serde_json::from_str(
            r#"{"name":"Pier","lng":1.0,"lat":2.0,
                "medias":[{"media_url":"uploads/images/a.jpg","media_type":"audio"}]}"#,
        )
        .unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn register_requires_email_shape() {
        let req: RegisterRequest = serde_json::from_str(
            r#"{"username":"alice","email":"not-an-email","password":"longenough"}"#,
        )
        .unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn page_limit_bounds() {
        let page = PageQuery { skip: 0, limit: Some(0) };
        assert!(page.validate().is_err());
        let page = PageQuery::default();
        assert_eq!(page.limit_or(20), 20);
    }
}
