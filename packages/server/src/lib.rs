#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the blockwatch alert service.
//!
//! Serves report intake, the moderation queue with accept/reject
//! decisions, and subscriber location/token registration. Accepting a
//! cluster publishes one alert and fans it out to nearby subscribers via
//! push. Push delivery needs a service account key (`SERVICE_ACCOUNT_KEY`
//! environment variable); without one the server runs with fan-out
//! disabled.

mod handlers;

use std::path::Path;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use blockwatch_moderation::ModerationWorkflow;
use blockwatch_notify::NotificationFanout;
use blockwatch_push::PushClient;
use blockwatch_push::credentials::{
    CredentialProvider, ServiceAccountKey, ServiceAccountTokenSource,
};
use blockwatch_push::registry::fcm_provider;
use blockwatch_store::memory::{MemoryReportStore, MemorySubscriberStore};
use blockwatch_store::{ReportStore, SubscriberStore};

/// Shared application state.
pub struct AppState {
    /// Report and alert storage.
    pub reports: Arc<dyn ReportStore>,
    /// Subscriber storage.
    pub subscribers: Arc<dyn SubscriberStore>,
    /// Moderation workflow over the report store.
    pub moderation: ModerationWorkflow,
    /// Push fan-out; `None` when no service account key is configured.
    pub fanout: Option<Arc<NotificationFanout>>,
}

/// Builds the push fan-out engine from the `SERVICE_ACCOUNT_KEY`
/// environment variable, or disables fan-out when it is unset.
fn build_fanout(subscribers: Arc<dyn SubscriberStore>) -> Option<Arc<NotificationFanout>> {
    let Ok(key_path) = std::env::var("SERVICE_ACCOUNT_KEY") else {
        log::warn!("SERVICE_ACCOUNT_KEY not set; push fan-out disabled");
        return None;
    };

    let provider = fcm_provider();
    let key = ServiceAccountKey::from_file(Path::new(&key_path))
        .expect("Failed to load service account key");
    let source = ServiceAccountTokenSource::new(key, &provider.auth)
        .expect("Failed to build token source");
    let client =
        PushClient::new(&provider, source.project_id()).expect("Failed to build push client");
    let credentials = Arc::new(CredentialProvider::new(Box::new(source)));

    Some(Arc::new(NotificationFanout::new(
        subscribers,
        credentials,
        Arc::new(client),
        &provider,
    )))
}

/// Starts the blockwatch API server.
///
/// Builds the in-memory stores, the moderation workflow, and (when a
/// service account key is configured) the push fan-out engine, then
/// starts the Actix-Web HTTP server. This is a regular async function —
/// the caller is responsible for providing the async runtime (e.g. via
/// `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind or
/// encounters a runtime error.
///
/// # Panics
///
/// Panics if a configured service account key cannot be loaded or the
/// push provider registry is unusable.
/// Installs the env-configured logger unless one is already in place.
///
/// The CLI's `serve` subcommand installs its own logger before bridging
/// into the server, so a second install must be a no-op rather than a
/// panic.
fn init_logging() {
    if pretty_env_logger::try_init_custom_env("RUST_LOG").is_err() {
        log::debug!("Logger already installed; keeping the existing one");
    }
}

#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    init_logging();

    let reports: Arc<dyn ReportStore> = Arc::new(MemoryReportStore::new());
    let subscribers: Arc<dyn SubscriberStore> = Arc::new(MemorySubscriberStore::new());

    let fanout = build_fanout(subscribers.clone());
    let moderation = ModerationWorkflow::new(reports.clone());

    let state = web::Data::new(AppState {
        reports,
        subscribers,
        moderation,
        fanout,
    });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .service(
                web::scope("/api")
                    .route("/health", web::get().to(handlers::health))
                    .route("/reports", web::post().to(handlers::submit_report))
                    .route("/moderation/queue", web::get().to(handlers::moderation_queue))
                    .route(
                        "/moderation/accept",
                        web::post().to(handlers::moderation_accept),
                    )
                    .route(
                        "/moderation/reject",
                        web::post().to(handlers::moderation_reject),
                    )
                    .route(
                        "/subscribers/{user_id}/location",
                        web::put().to(handlers::update_location),
                    )
                    .route(
                        "/subscribers/{user_id}/token",
                        web::put().to(handlers::update_token),
                    ),
            )
    })
    .bind((bind_addr, port))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logger_install_is_idempotent() {
        // The serve subcommand path installs a logger before handing off
        // to the server; the server's own install must then be a no-op.
        init_logging();
        init_logging();
    }
}
