//! Server mode
//!
//! This module contains the HTTP server startup logic.

use actix_web::{
    App, HttpServer,
    middleware::{Compress, DefaultHeaders},
    web,
};
use anyhow::{Context, Result};
use tracing::warn;

use crate::api::middleware::{IdentityMiddleware, RequestIdMiddleware};
use crate::api::services::shortener_routes;
use crate::config::get_config;
use crate::runtime::lifetime;

/// Run the HTTP server
///
/// Ctrl-C is handled by actix; once the server has stopped, pending
/// deletions are flushed before returning.
///
/// **Note**: Logging system must be initialized before calling this function
pub async fn run_server() -> Result<()> {
    let config = get_config();

    let startup = lifetime::startup::prepare_server_startup(&config)
        .await
        .inspect_err(|e| tracing::error!("Server startup failed: {:#}", e))?;

    let service = web::Data::from(startup.service.clone());
    let signer = startup.signer.clone();
    let identity_config = config.identity.clone();

    let workers = config.server.workers.max(1);
    warn!("Using {} workers for the server", workers);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(IdentityMiddleware::new(signer.clone(), &identity_config))
            .wrap(Compress::default())
            .wrap(RequestIdMiddleware)
            .wrap(DefaultHeaders::new().add(("Cache-Control", "no-cache, no-store")))
            .app_data(service.clone())
            .app_data(web::PayloadConfig::new(1024 * 1024))
            .app_data(web::JsonConfig::default().limit(1024 * 1024))
            .service(shortener_routes())
    })
    .keep_alive(std::time::Duration::from_secs(30))
    .workers(workers);

    let bind_address = config.server.bind_address();
    warn!("Starting server at http://{}", bind_address);
    let server = server
        .bind(&bind_address)
        .with_context(|| format!("Failed to bind {}", bind_address))?
        .run();

    server.await.context("HTTP server error")?;

    lifetime::shutdown::perform_shutdown_tasks(&startup.service).await;
    Ok(())
}
