use anyhow::Result;
use std::process;
use tracing::{error, info};

use crate::analyst::Analyst;
use crate::api::rest::{create_router, state::AppState};
use crate::shared::config::AnalystConfig;

pub async fn run_rest_server(config: AnalystConfig) -> Result<()> {
    info!(
        r#"
    _                _           _
   / \   _ __   __ _| |_   _ ___| |_
  / _ \ | '_ \ / _` | | | | / __| __|
 / ___ \| | | | (_| | | |_| \__ \ |_
/_/   \_\_| |_|\__,_|_|\__, |___/\__|
                       |___/
Starting Analyst API service...
PID: {}
"#,
        process::id()
    );

    let analyst = match Analyst::from_config(&config) {
        Ok(analyst) => analyst,
        Err(e) => {
            error!("Failed to initialize analyst: {}", e);
            error!("Set ANALYST_INFERENCE_URL (or inference.url in the config file) to the completion service base URL");
            return Err(e.into());
        }
    };
    let app_state = AppState::new(analyst);

    info!("Building REST API routes...");
    let app = create_router(app_state, config.server.max_upload_bytes);

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Binding to: {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("API started successfully!");
    info!("Analyze endpoint: http://{}/api/analyze", bind_addr);
    info!("Ready to accept requests...");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Analyst API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutting down Analyst API...");
}
