use anyhow::Result;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use study_planner::{
    api::{create_router, AppState},
    config::{Config, LoggingConfig},
    llm_service::LLMService,
    log_system_event,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    // Initialize logging with optional file output
    let _guard = setup_logging(&config.logging)?;

    config.validate()?;

    log_system_event!(startup, component = "server", "Starting study planner server");

    let llm_service = LLMService::new(&config.llm, config.generation.clone())?;
    info!(
        provider = llm_service.provider_name(),
        model = llm_service.model_name(),
        "Initialized LLM service"
    );

    let state = AppState { llm_service };

    let app = create_router(state).layer(ServiceBuilder::new().layer(CorsLayer::permissive()));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn setup_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    use std::fs;
    use tracing_subscriber::fmt;

    let env_filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    // Configure console output
    let console_layer = config.console_enabled.then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(true)
            .boxed()
    });

    // Configure file output with daily rotation (no ANSI colors for files)
    let mut guard = None;
    let file_layer = if config.file_enabled {
        match fs::create_dir_all(&config.log_directory) {
            Ok(()) => {
                let file_appender = tracing_appender::rolling::daily(&config.log_directory, "study-planner.log");
                let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);
                guard = Some(file_guard);
                Some(
                    fmt::layer()
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_file(true)
                        .with_line_number(true)
                        .with_ansi(false)
                        .with_writer(non_blocking_file)
                        .boxed(),
                )
            }
            Err(e) => {
                eprintln!("Warning: Could not create log directory '{}': {}", config.log_directory, e);
                None
            }
        }
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!(
        directory = %config.log_directory,
        file_enabled = guard.is_some(),
        "Logging initialized"
    );

    Ok(guard)
}
