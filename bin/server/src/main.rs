use chrono::Duration;
use ledgerbot_conversation::{
    AuthNegotiator, ConversationEngine, Dispatcher, MediaIntake, SessionStore,
};
use ledgerbot_core::{Clock, SystemClock};
use ledgerbot_integration::{HttpBlobStore, TelegramClient};
use ledgerbot_ledger::{LedgerWriter, ReportComposer};
use ledgerbot_server::{
    config::ServerConfig,
    db::{AccountRepository, BankAccountRepository, ChatSessionRepository, RecordRepository},
    webhook::{self, AppState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("failed to run migrations");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let sessions = SessionStore::new(Arc::new(ChatSessionRepository::new(db_pool.clone())))
        .with_pending_ttl(Duration::minutes(config.session.pending_ttl_minutes));

    // Sweep expired logins on startup
    match sessions.sweep_expired(clock.now()).await {
        Ok(count) if count > 0 => {
            tracing::info!(deleted_sessions = count, "Swept expired logins on startup");
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(error = %e, "Failed to sweep expired logins on startup");
        }
    }

    // Spawn periodic sweep task
    let sweep_sessions = sessions.clone();
    let sweep_clock = clock.clone();
    let cleanup_interval_secs = config.session.cleanup_interval_seconds;
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(cleanup_interval_secs));
        loop {
            interval.tick().await;
            match sweep_sessions.sweep_expired(sweep_clock.now()).await {
                Ok(count) if count > 0 => {
                    tracing::debug!(deleted_sessions = count, "Periodic login sweep");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to sweep expired logins");
                }
            }
        }
    });

    let timeout = config.http.timeout();
    let telegram = Arc::new(
        TelegramClient::new(&config.telegram, timeout).expect("failed to build Telegram client"),
    );
    let blobs = Arc::new(
        HttpBlobStore::new(config.storage, timeout).expect("failed to build blob store client"),
    );

    let accounts = Arc::new(AccountRepository::new(db_pool.clone()));
    let banks = Arc::new(BankAccountRepository::new(db_pool.clone()));
    let records = Arc::new(RecordRepository::new(db_pool));

    let writer = LedgerWriter::new(records.clone(), banks.clone())
        .with_retry_limit(config.ledger.balance_retry_limit);
    let reports = ReportComposer::new(records);
    let media = MediaIntake::new(telegram.clone(), blobs);
    let auth = AuthNegotiator::new(accounts.clone(), sessions.clone())
        .with_max_attempts(config.session.max_password_attempts);
    let engine = ConversationEngine::new(sessions.clone(), accounts, banks, writer, reports, media);
    let dispatcher = Dispatcher::new(sessions, auth, engine, telegram, clock);

    let app = webhook::router(AppState::new(dispatcher, config.telegram.webhook_secret))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.http.bind_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.http.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
