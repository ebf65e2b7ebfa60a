use actix_cors::Cors;
use actix_web::{web, App, HttpServer, HttpResponse, middleware, error, http::StatusCode};
use dispatch_snapshot::config::{CorsSettings, LogFormat, Settings};
use dispatch_snapshot::routes::{self, snapshot::AppState};
use dispatch_snapshot::{BackgroundRegenerator, NearestGreedyMatcher, PointGenerator, SnapshotStore};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, error};
use tracing_subscriber::EnvFilter;

/// JSON error response for malformed query strings
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST))
            .json(self)
    }
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("Query error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_query".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
    }
    .into()
}

fn build_cors(settings: &CorsSettings) -> Cors {
    if settings.allow_all_origins {
        return Cors::permissive();
    }

    settings
        .allowed_origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allowed_methods(vec!["GET"])
        .allow_any_header()
        .max_age(3600)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    // Initialize logging; RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    match settings.logging.log_format() {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Pretty => subscriber.pretty().init(),
        LogFormat::Compact => subscriber.compact().init(),
    }

    info!("Starting dispatch snapshot service...");
    info!("Snapshot settings: {:?}", settings.snapshot);

    let defaults = settings.snapshot.defaults();

    let store = Arc::new(SnapshotStore::new(
        PointGenerator::new(settings.snapshot.max_count),
        NearestGreedyMatcher::new(settings.snapshot.match_jitter),
    ));

    let shutdown = CancellationToken::new();
    let regenerator_handle = if settings.snapshot.background_refresh {
        let regenerator = BackgroundRegenerator::new(Arc::clone(&store), defaults.params());
        Some(regenerator.spawn(shutdown.clone()))
    } else {
        info!("Background refresh disabled");
        None
    };

    let app_state = AppState { store, defaults };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);
    let cors_settings = settings.cors.clone();

    info!("Starting HTTP server on {}:{}", host, port);

    let result = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .wrap(build_cors(&cors_settings))
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await;

    shutdown.cancel();
    if let Some(handle) = regenerator_handle {
        if let Err(e) = handle.await {
            error!("Background regenerator task panicked: {}", e);
        }
    }

    info!("Dispatch snapshot service stopped");
    result
}
