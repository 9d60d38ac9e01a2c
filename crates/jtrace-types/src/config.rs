use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};

/// Secrets that must never reach a running server.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

/// Process configuration. Built once at startup and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub upload: UploadConfig,
    pub maps: MapConfig,
    pub admin: AdminSeedConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            cors_origins: vec![
                "http://localhost:5173".into(),
                "http://127.0.0.1:5173".into(),
            ],
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("jtrace.db"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expires_minutes: i64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: "dev-secret-change-me".into(),
            access_token_expires_minutes: 60 * 24,
        }
    }
}

/// Layout of the upload tree below `base_dir`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectoryStrategy {
    /// `{base}/{category}s/{YYYY}/{MM}/{DD}/user_{id}`
    #[default]
    DateUser,
    /// `{base}/{category}s/user_{id}/{YYYY}/{MM}/{DD}`
    UserDate,
    /// `{base}/{category}s`
    Simple,
}

impl DirectoryStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DateUser => "date_user",
            Self::UserDate => "user_date",
            Self::Simple => "simple",
        }
    }
}

impl fmt::Display for DirectoryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DirectoryStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "date_user" => Ok(Self::DateUser),
            "user_date" => Ok(Self::UserDate),
            "simple" => Ok(Self::Simple),
            other => Err(anyhow!("unknown directory strategy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Directory that relative upload paths are resolved against.
    pub root: PathBuf,
    /// First component of every stored relative path, e.g. `uploads`.
    pub base_dir: String,
    pub directory_strategy: DirectoryStrategy,
    pub max_file_size: usize,
    pub allowed_image_types: Vec<String>,
    pub allowed_video_types: Vec<String>,
    pub access_signature: SignatureConfig,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            base_dir: "uploads".into(),
            directory_strategy: DirectoryStrategy::DateUser,
            max_file_size: 50 * 1024 * 1024,
            allowed_image_types: vec![
                "image/jpeg".into(),
                "image/png".into(),
                "image/gif".into(),
                "image/webp".into(),
            ],
            allowed_video_types: vec![
                "video/mp4".into(),
                "video/quicktime".into(),
                "video/webm".into(),
            ],
            access_signature: SignatureConfig::default(),
        }
    }
}

/// Signed file-access URLs.
#[derive(Debug, Clone)]
pub struct SignatureConfig {
    pub enabled: bool,
    pub secret_key: String,
    pub expires_minutes: i64,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            secret_key: "dev-secret-change-me".into(),
            expires_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MapConfig {
    pub amap: AmapConfig,
    pub encryption: MapEncryptionConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct AmapConfig {
    pub api_key: String,
    pub security_js_code: String,
    pub version: String,
    pub ui_version: String,
}

impl Default for AmapConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            security_js_code: String::new(),
            version: "2.0".into(),
            ui_version: "1.1".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MapEncryptionConfig {
    pub enabled: bool,
    pub secret_key: String,
}

impl Default for MapEncryptionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            secret_key: "dev-secret-change-me".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdminSeedConfig {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl Default for AdminSeedConfig {
    fn default() -> Self {
        Self {
            username: "admin".into(),
            email: "admin@jtrace.com".into(),
            password: "admin123".into(),
        }
    }
}

impl AppConfig {
    /// Read `JTRACE_*` variables, falling back to the defaults above.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let server = ServerConfig {
            host: var_or("JTRACE_HOST", &defaults.server.host),
            port: parse_var("JTRACE_PORT", defaults.server.port)?,
            cors_origins: list_var("JTRACE_CORS_ORIGINS", defaults.server.cors_origins),
        };

        let database = DatabaseConfig {
            path: var_or("JTRACE_DB_PATH", "jtrace.db").into(),
        };

        let jwt = JwtConfig {
            secret: std::env::var("JTRACE_JWT_SECRET").unwrap_or_default(),
            access_token_expires_minutes: parse_var(
                "JTRACE_TOKEN_EXPIRES_MINUTES",
                defaults.jwt.access_token_expires_minutes,
            )?,
        };

        let upload_defaults = defaults.upload;
        let upload = UploadConfig {
            root: var_or("JTRACE_UPLOAD_ROOT", ".").into(),
            base_dir: var_or("JTRACE_UPLOAD_DIR", &upload_defaults.base_dir),
            directory_strategy: parse_var(
                "JTRACE_DIRECTORY_STRATEGY",
                upload_defaults.directory_strategy,
            )?,
            max_file_size: parse_var("JTRACE_MAX_FILE_SIZE", upload_defaults.max_file_size)?,
            allowed_image_types: list_var(
                "JTRACE_ALLOWED_IMAGE_TYPES",
                upload_defaults.allowed_image_types,
            ),
            allowed_video_types: list_var(
                "JTRACE_ALLOWED_VIDEO_TYPES",
                upload_defaults.allowed_video_types,
            ),
            access_signature: SignatureConfig {
                enabled: parse_var("JTRACE_SIGNING_ENABLED", true)?,
                secret_key: std::env::var("JTRACE_SIGNING_SECRET").unwrap_or_default(),
                expires_minutes: parse_var("JTRACE_SIGNED_URL_EXPIRES_MINUTES", 60)?,
            },
        };

        let amap_defaults = AmapConfig::default();
        let maps = MapConfig {
            amap: AmapConfig {
                api_key: var_or("JTRACE_AMAP_API_KEY", ""),
                security_js_code: var_or("JTRACE_AMAP_SECURITY_JS_CODE", ""),
                version: var_or("JTRACE_AMAP_VERSION", &amap_defaults.version),
                ui_version: var_or("JTRACE_AMAP_UI_VERSION", &amap_defaults.ui_version),
            },
            encryption: MapEncryptionConfig {
                enabled: parse_var("JTRACE_MAP_ENCRYPTION_ENABLED", true)?,
                secret_key: std::env::var("JTRACE_MAP_ENCRYPTION_SECRET").unwrap_or_default(),
            },
        };

        let admin = AdminSeedConfig {
            username: var_or("JTRACE_ADMIN_USERNAME", &defaults.admin.username),
            email: var_or("JTRACE_ADMIN_EMAIL", &defaults.admin.email),
            password: var_or("JTRACE_ADMIN_PASSWORD", &defaults.admin.password),
        };

        Ok(Self {
            server,
            database,
            jwt,
            upload,
            maps,
            admin,
        })
    }

    /// Refuse to start with an empty or placeholder secret.
    pub fn check_secrets(&self) -> Result<()> {
        check_secret("JTRACE_JWT_SECRET", &self.jwt.secret)?;
        if self.upload.access_signature.enabled {
            check_secret("JTRACE_SIGNING_SECRET", &self.upload.access_signature.secret_key)?;
        }
        if self.maps.encryption.enabled {
            check_secret("JTRACE_MAP_ENCRYPTION_SECRET", &self.maps.encryption.secret_key)?;
        }
        Ok(())
    }
}

fn check_secret(name: &str, value: &str) -> Result<()> {
    if value.is_empty() || PLACEHOLDER_SECRETS.contains(&value) {
        bail!("{} is unset or still a placeholder", name);
    }
    Ok(())
}

fn var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid value for {}: {}", key, e)),
        Err(_) => Ok(default),
    }
}

fn list_var(key: &str, default: Vec<String>) -> Vec<String> {
    match std::env::var(key) {
        Ok(raw) => raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Err(_) => default,
    }
}
