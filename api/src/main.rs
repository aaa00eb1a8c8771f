mod api_error;
mod auth;
mod payloads;
mod routes;

use routes::AppState;
use std::sync::Arc;
use study_rag::{Config, RagSystem};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize environment variables and logging
    dotenv::dotenv().ok();
    env_logger::init();

    let config = Config::from_env()?;

    // The server still comes up without an index; /health reports it.
    let system = match RagSystem::from_config(&config).await {
        Ok(system) => Some(Arc::new(system)),
        Err(e) => {
            log::warn!("Could not initialize vectorstore: {}", e);
            None
        }
    };

    if config.api_token.is_some() {
        log::info!("Bearer token required on pipeline routes");
    }

    let app = routes::router(AppState::new(&config, system), config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    log::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
