use std::sync::Arc;

use attach_api::auth::{AllowAllPermissions, Session, StaticSessionProvider};
use attach_api::{router, AppState};
use attach_core::{id, Config};
use attach_db::MemoryFileInfoStore;
use attach_storage::create_file_store;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// mimalloc keeps fragmentation down under many concurrent uploads,
// especially on musl-based container images.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    attach_core::config::load_dotenv();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let file_store = create_file_store(
        &config.file.storage_driver,
        &config.file.local_storage_path,
    )
    .await?;

    // The session and permission services belong to the surrounding chat
    // server. The standalone binary runs with a single dev session; set
    // DEV_SESSION_TOKEN to authenticate against it.
    let dev_token =
        std::env::var("DEV_SESSION_TOKEN").unwrap_or_else(|_| id::new_random_string(26));
    let dev_user_id = id::new_id();
    tracing::info!(user_id = %dev_user_id, "Dev session enabled; authenticate with Bearer token from DEV_SESSION_TOKEN");

    let sessions = StaticSessionProvider::new().with_session(
        &dev_token,
        Session {
            id: id::new_id(),
            user_id: dev_user_id,
        },
    );

    let state = Arc::new(AppState::new(
        config.file.clone(),
        config.site_url.clone(),
        file_store,
        Arc::new(MemoryFileInfoStore::new()),
        Arc::new(sessions),
        Arc::new(AllowAllPermissions),
    ));

    let app = router(state);

    let addr = format!("0.0.0.0:{}", config.server_port);
    tracing::info!(addr = %addr, "File service listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
