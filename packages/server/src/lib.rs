#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web server for the geovisor application.
//!
//! Serves the upload form, takes multipart submissions of KMZ/KML or
//! Shapefile bundles, runs the conversion pipeline, and serves the
//! rendered Leaflet map documents from the static directory. Each
//! submission works in its own UUID-named directory and renders to a
//! request-scoped map filename, so concurrent requests never touch each
//! other's files.

mod handlers;
pub mod interactive;
pub mod pipeline;

use std::path::PathBuf;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::{App, HttpServer, middleware, web};

/// Shared application state.
pub struct AppState {
    /// Root directory for per-request upload working directories.
    pub upload_dir: PathBuf,
    /// Directory rendered map documents are served from.
    pub static_dir: PathBuf,
}

/// Starts the geovisor server.
///
/// Reads configuration from the environment (`BIND_ADDR`, `PORT`,
/// `UPLOAD_DIR`, `STATIC_DIR`), creates the upload and static
/// directories, and starts the Actix-Web HTTP server. This is a regular
/// async function; the caller provides the async runtime (e.g. via
/// `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if a directory cannot be created
/// or the HTTP server fails to bind or encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let upload_dir =
        PathBuf::from(std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()));
    let static_dir =
        PathBuf::from(std::env::var("STATIC_DIR").unwrap_or_else(|_| "static".to_string()));
    std::fs::create_dir_all(&upload_dir)?;
    std::fs::create_dir_all(&static_dir)?;

    let state = web::Data::new(AppState {
        upload_dir,
        static_dir: static_dir.clone(),
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
            .route("/", web::get().to(handlers::index))
            .route("/", web::post().to(handlers::upload))
            .route("/map", web::get().to(handlers::map_view))
            .route("/health", web::get().to(handlers::health))
            // Serve rendered map documents
            .service(Files::new("/static", static_dir.clone()))
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
