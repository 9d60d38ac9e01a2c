use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tracing::error;

use jtrace_crypto::Signer;
use jtrace_crypto::map_token::MapConfigSealer;
use jtrace_db::Database;
use jtrace_media::{MediaStorage, MediaUrlResolver};
use jtrace_types::config::AppConfig;

use crate::error::ApiError;
use crate::tokens::TokenCache;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub config: AppConfig,
    pub tokens: TokenCache,
    pub signer: Signer,
    pub resolver: MediaUrlResolver,
    pub storage: MediaStorage,
    pub map_sealer: MapConfigSealer,
}

impl AppStateInner {
    pub fn new(db: Database, config: AppConfig) -> anyhow::Result<Self> {
        let signer = Signer::new(&config.upload.access_signature)?;
        let ttl_minutes = config.jwt.access_token_expires_minutes.max(0) as u64;

        Ok(Self {
            db,
            tokens: TokenCache::new(Duration::from_secs(ttl_minutes * 60)),
            resolver: MediaUrlResolver::new(signer.clone()),
            storage: MediaStorage::new(&config.upload),
            map_sealer: MapConfigSealer::new(&config.maps),
            signer,
            config,
        })
    }
}

/// Run a database closure on the blocking pool.
pub async fn run_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow!("blocking task failed"))
        })?
        .map_err(ApiError::Internal)
}
