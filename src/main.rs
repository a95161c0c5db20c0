// HTTP bridge between the point-of-sale app and its receipt printers.

use actix_web::{middleware, web, App, HttpServer};
use std::sync::Arc;
use tracing::{error, info};

use print_bridge::config::Config;
use print_bridge::errors::AppError;
use print_bridge::routes;
use print_bridge::sdk;
use print_bridge::{BackendRegistry, DeviceProbe, Dispatcher, DriverFactory, PlatformIdentity};

const MAX_IMAGE_BYTES: usize = 8 * 1024 * 1024;

// ============================================================================
// Application State
// ============================================================================

/// Centralized application state container
#[derive(Clone)]
struct AppState {
    registry: Arc<BackendRegistry>,
    dispatcher: Arc<Dispatcher>,
}

impl AppState {
    async fn new(config: &Config) -> Self {
        info!("Initializing application state");

        // Probe runs once; nothing re-checks presence later.
        let identity = PlatformIdentity::detect(&config.device);
        let probe = DeviceProbe::from_config(&config.device).run(identity.clone());

        let bindings = sdk::bind_sdks(config.printer.use_mock);
        let registry = Arc::new(BackendRegistry::new(DriverFactory::new(bindings, &probe)));

        if config.printer.warm_up {
            info!("Warming up printer backends");
            registry.warm_up().await;
        }

        let dispatcher = Arc::new(Dispatcher::new(registry.clone(), identity));

        Self {
            registry,
            dispatcher,
        }
    }
}

// ============================================================================
// Shutdown Handling
// ============================================================================

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

async fn cleanup_resources(state: AppState) {
    info!("Beginning resource cleanup");

    // Waits on each backend lock, so in-flight jobs finish first.
    state.registry.shutdown().await;

    info!("Resource cleanup complete");
}

// ============================================================================
// Server Lifecycle
// ============================================================================

async fn run() -> Result<(), AppError> {
    let config = Config::from_env()?;
    let socket_addr = config.socket_addr()?;

    info!("Configuration loaded successfully");
    info!("Server will bind to: {}", socket_addr);
    if config.printer.use_mock {
        info!("Mock printer SDKs enabled");
    }

    let app_state = AppState::new(&config).await;

    let dispatcher = app_state.dispatcher.clone();
    let server = HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            // Raw image bodies; actix caps payloads at 256 KiB by default
            .app_data(web::PayloadConfig::new(MAX_IMAGE_BYTES))
            .app_data(web::Data::new(dispatcher.clone()))
            .service(routes::print_image)
            .service(routes::print_text)
            .service(routes::set_density)
            .service(routes::check_status)
            .service(routes::print_test_page)
            .service(routes::device_model)
    })
    .bind(socket_addr)?
    .shutdown_timeout(5)
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    info!("Print bridge started on {}", socket_addr);

    shutdown_signal().await;

    info!("Initiating graceful shutdown...");

    // Stop accepting new requests and let in-flight ones complete
    server_handle.stop(true).await;
    cleanup_resources(app_state).await;

    server_task
        .await
        .map_err(|e| AppError::Task(e.to_string()))??;

    info!("Graceful shutdown complete");
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting print bridge");

    run().await.map_err(|e| {
        error!("Print bridge failed: {}", e);
        std::io::Error::other(e.to_string())
    })
}
