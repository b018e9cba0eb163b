use std::sync::Arc;

use actix_files::Files;
use actix_governor::Governor;
use actix_web::{middleware, web, App, HttpServer};
use clap::Parser;
use diesel::r2d2::{self, ConnectionManager};
use diesel::SqliteConnection;
use diesel_migrations::MigrationHarness;
use dotenvy::dotenv;

use readlater::{
    api,
    config::AppConfig,
    hatena::{BookmarkService, HatenaClient},
    models::session::Session,
    observability::{init_logging, ObservabilityConfig},
    security, web_ui, DbPool, MIGRATIONS,
};

/// CLI options
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Delete expired sessions and exit
    #[clap(long)]
    cleanup_sessions: bool,

    /// Listen on this port instead of RL_PORT
    #[clap(long)]
    port: Option<u16>,
}

fn main() -> std::io::Result<()> {
    dotenv().ok();
    init_logging(&ObservabilityConfig::from_env());

    let args = Args::parse();
    let mut config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Configuration error: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
        }
    };
    if let Some(port) = args.port {
        config.port = port;
    }

    let db_pool = initialize_db_pool(&config.db_path)?;
    {
        let mut conn = db_pool.get().map_err(std::io::Error::other)?;
        tracing::info!("Running database migrations");
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| std::io::Error::other(e.to_string()))?;

        match Session::cleanup_expired(&mut conn) {
            Ok(removed) => tracing::info!("Removed {} expired sessions", removed),
            Err(e) => tracing::warn!("Failed to clean up sessions: {}", e),
        }
    }

    if args.cleanup_sessions {
        return Ok(());
    }

    run_server(config, db_pool)
}

#[actix_web::main]
async fn run_server(config: AppConfig, db_pool: DbPool) -> std::io::Result<()> {
    tracing::info!("Serving static files from {}", config.public_path);
    tracing::info!("Starting server at http://{}:{}", config.bind, config.port);

    let bookmarks: Arc<dyn BookmarkService> =
        Arc::new(HatenaClient::new(config.consumer(), config.scope.clone()));
    let bookmarks = web::Data::from(bookmarks);
    let bind = (config.bind.clone(), config.port);
    let config = web::Data::new(config);

    HttpServer::new(move || {
        let rate_limiter = security::create_rate_limiter();

        App::new()
            .wrap(tracing_actix_web::TracingLogger::default())
            .wrap(middleware::Compress::default())
            .wrap(middleware::NormalizePath::new(
                middleware::TrailingSlash::Trim,
            ))
            .wrap(security::SecurityHeaders)
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(bookmarks.clone())
            .app_data(config.clone())
            .service(api::health::routes()) // Health checks (no rate limiting)
            .service(Files::new("/static", &config.public_path))
            .service(
                web_ui::routes().wrap(Governor::new(&rate_limiter)),
            )
    })
    .bind(bind)?
    .run()
    .await
}

fn initialize_db_pool(db_path: &str) -> std::io::Result<DbPool> {
    let manager = ConnectionManager::<SqliteConnection>::new(db_path);
    r2d2::Pool::builder()
        .build(manager)
        .map_err(std::io::Error::other)
}
