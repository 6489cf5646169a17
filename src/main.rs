use actix_cors::Cors;
use actix_web::{http::header, web, App, HttpServer};
use dotenv::dotenv;
use std::net::TcpListener;
use std::time::Duration;
use studio_server::cleanup::run_cleanup_loop;
use studio_server::{handlers, AppError, AppState, Settings};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// How long a submitted video may go unpolled before its job is forgotten.
const VIDEO_JOB_TTL_HOURS: i64 = 6;

fn cors(config: &Settings) -> Cors {
    if !config.cors.enabled {
        // CORS disabled - use most restrictive settings
        return Cors::default();
    }

    let cors_config = if config.cors.allow_any_origin {
        Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .expose_any_header()
    } else {
        Cors::default()
            .allowed_origin(&config.cors.frontend_url)
            .allowed_methods(vec!["GET", "POST", "DELETE"])
            .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE])
            .expose_headers(vec![header::HeaderName::from_static("cached-time")])
            .supports_credentials()
    };

    cors_config.max_age(config.cors.max_age as usize)
}

#[actix_web::main]
async fn main() -> studio_server::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    // Load configuration
    let config = Settings::new()?;
    info!("Configuration loaded for {} environment", config.environment);

    // Initialize application state
    let state = AppState::new(config.clone()).await?;

    tokio::spawn(state.video_limiter.clone().run_midnight_sweep());

    if config.cleanup.enabled {
        tokio::spawn(run_cleanup_loop(
            state.db.clone(),
            state.storage.clone(),
            config.cleanup.clone(),
        ));
        info!(
            "Retention cleanup scheduled ({} days public, {} days private)",
            config.cleanup.explore_retention_days, config.cleanup.private_retention_days
        );
    }

    let jobs = state.video_jobs.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            let pruned = jobs
                .prune_older_than(chrono::Duration::hours(VIDEO_JOB_TTL_HOURS), chrono::Utc::now())
                .await;
            if pruned > 0 {
                info!("Forgot {} abandoned video jobs", pruned);
            }
        }
    });

    // Create and bind TCP listener
    let listener = TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))?;
    info!("Starting server at {}:{}", config.server.host, config.server.port);

    let data = web::Data::new(state.clone());
    let server_config = config.clone();

    // Start HTTP server
    HttpServer::new(move || {
        App::new()
            .wrap(cors(&server_config))
            .app_data(data.clone())
            .configure(handlers::configure)
    })
    .listen(listener)?
    .workers(config.server.workers as usize)
    .run()
    .await
    .map_err(|e| AppError::InternalError(e.to_string()))?;

    state.shutdown().await?;
    info!("Server stopped");

    Ok(())
}
