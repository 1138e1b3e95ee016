mod config;

use std::sync::Arc;

use tracing::{info, warn};

use quill_api::ai::{DisabledGenerator, GeminiGenerator, TextGenerator};
use quill_api::state::{AppState, AppStateInner, AuthSettings};
use quill_api::uploads::ImageStore;
use quill_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quill=debug,quill_api=debug,quill_db=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let db = Database::open(&config.db_path)?;

    if let Some(email) = &config.admin_email {
        if db.promote_by_email(email)? {
            info!("Promoted {} to admin", email);
        } else {
            warn!("QUILL_ADMIN_EMAIL {} does not match any user yet", email);
        }
    }

    let ai: Arc<dyn TextGenerator> = match config.ai.clone() {
        Some(settings) => {
            info!("AI assist enabled with model {}", settings.model);
            Arc::new(GeminiGenerator::new(settings)?)
        }
        None => {
            warn!("QUILL_AI_API_KEY not set, AI endpoints will fail");
            Arc::new(DisabledGenerator)
        }
    };

    let state: AppState = Arc::new(AppStateInner {
        db,
        auth: AuthSettings {
            jwt_secret: config.jwt_secret.clone(),
            token_ttl: config.token_ttl,
        },
        uploads: ImageStore::new(config.upload_dir.clone(), config.max_upload_bytes).await?,
        ai,
    });

    let app = quill_api::router(state);

    info!("Quill server listening on {}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
