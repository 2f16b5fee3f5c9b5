use axum::routing::get;
use axum::Router;
use dotenvy::dotenv;
use std::sync::Arc;
use std::time::Duration;
use ticketserver::bootstrap::{run_migrations, wait_for_database};
use ticketserver::config::AppConfig;
use ticketserver::issue_tracker::GithubIssueTracker;
use ticketserver::notify::SmtpNotifier;
use ticketserver::outbox::start_dispatcher;
use ticketserver::shared::state::AppState;
use ticketserver::shared::utils::create_conn;
use ticketserver::tickets::configure_ticket_routes;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

async fn health() -> &'static str {
    "ok"
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env()?;
    let database_url = config.database_url();

    wait_for_database(&database_url, 10, Duration::from_secs(2))?;
    let pool = create_conn(&database_url)?;
    {
        let mut conn = pool.get()?;
        run_migrations(&mut conn)?;
    }

    let notifier = Arc::new(SmtpNotifier::new(config.smtp.clone()));
    let tracker = Arc::new(GithubIssueTracker::new(config.github.clone()));
    let (outbox, _dispatcher) =
        start_dispatcher(pool.clone(), config.smtp.clone(), notifier, tracker);

    let state = Arc::new(AppState {
        conn: pool,
        config: config.clone(),
        outbox,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(configure_ticket_routes())
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    log::info!("listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
