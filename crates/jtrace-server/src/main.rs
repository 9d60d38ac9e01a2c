use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use jtrace_api::{AppState, AppStateInner, auth, build_router};
use jtrace_db::Database;
use jtrace_types::config::{AdminSeedConfig, AppConfig};

const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jtrace=debug,jtrace_api=debug,tower_http=debug".into()),
        )
        .init();

    let config = AppConfig::from_env()?;
    if let Err(e) = config.check_secrets() {
        eprintln!("FATAL: {}.", e);
        eprintln!("       Set it in your .env file and restart.");
        std::process::exit(1);
    }

    let db = Database::open(&config.database.path)?;
    seed_admin(&db, &config.admin)?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let state: AppState = Arc::new(AppStateInner::new(db, config)?);
    state.storage.prepare().await?;

    let app = build_router(state.clone());

    info!("JTrace listening on {}", addr);
    info!(
        "URL signing {}, map encryption {}",
        if state.signer.is_enabled() { "on" } else { "off" },
        if state.map_sealer.is_enabled() { "on" } else { "off" },
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Create the administrator account on first start.
fn seed_admin(db: &Database, admin: &AdminSeedConfig) -> anyhow::Result<()> {
    if db.get_user_by_username(&admin.username)?.is_some() {
        return Ok(());
    }

    let hash = auth::hash_password(&admin.password)?;
    let id = db.create_user(&admin.username, &admin.email, &hash, true)?;
    info!("Created admin user '{}' ({})", admin.username, id);
    if admin.password == DEFAULT_ADMIN_PASSWORD {
        warn!("Admin password is the default; change it after first login");
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    info!("Received Ctrl+C, shutting down...");
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_is_seeded_once() {
        let db = Database::open_in_memory().unwrap();
        let admin = AdminSeedConfig::default();

        seed_admin(&db, &admin).unwrap();
        seed_admin(&db, &admin).unwrap();

        let user = db.get_user_by_username("admin").unwrap().unwrap();
        assert!(user.is_admin);
        assert_eq!(user.email, "admin@jtrace.com");
        assert!(auth::verify_password("admin123", &user.password_hash));
        assert_eq!(db.list_users().unwrap().len(), 1);
    }
}
