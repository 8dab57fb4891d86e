use itemdesk::{
    AppState, InMemoryRepository, ItemRepoState, PostgresRepository, UserRepoState,
    config::{AppConfig, Env},
    create_router,
    tasks::{ChannelJobQueue, JobQueueState, LoggingJobHandler, spawn_worker},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Entry point: configuration, logging, storage, the job worker and the HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast on missing production secrets)
    dotenv::dotenv().ok();
    let config = AppConfig::load().expect("FATAL: invalid configuration");

    // 2. Logging: RUST_LOG wins, otherwise crate-level debug.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "itemdesk=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Storage: Postgres when DATABASE_URL is set, in-memory otherwise (local only).
    let (users, items): (UserRepoState, ItemRepoState) = match &config.db_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await
                .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .expect("FATAL: Failed to run database migrations.");

            let repo = Arc::new(PostgresRepository::new(pool));
            (repo.clone() as UserRepoState, repo as ItemRepoState)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            let repo = Arc::new(InMemoryRepository::new());
            (repo.clone() as UserRepoState, repo as ItemRepoState)
        }
    };

    // 4. Background jobs: the worker owns the receiving side of the queue.
    let (queue, receiver) = ChannelJobQueue::with_history(config.job_history_size);
    let jobs: JobQueueState = Arc::new(queue);
    spawn_worker(receiver, Arc::new(LoggingJobHandler));

    // 5. State assembly and first superuser seeding.
    let bind_addr = config.bind_addr.clone();
    let superuser_email = config.first_superuser_email.clone();
    let superuser_password = config.first_superuser_password.clone();
    let app_state = AppState::new(users, items, jobs, config);

    if let Err(e) = app_state
        .users
        .ensure_superuser(&superuser_email, &superuser_password)
        .await
    {
        tracing::error!("Failed to seed the first superuser: {}", e);
    }

    // 6. Router and server startup.
    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server error");
}
