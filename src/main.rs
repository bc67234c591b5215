use axum::Router;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;

use scanpay_server::config::Config;
use scanpay_server::gateway::{CredentialProvider, MomoClient};
use scanpay_server::handlers::AppState;
use scanpay_server::routes::create_routes;
use scanpay_server::services::PaymentOrchestrator;
use scanpay_server::store::PostgresPaymentStore;

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Fails fast if any secret is unset; there are no fallback credentials.
    let config = Config::from_env().expect("Invalid configuration");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Successfully connected to database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    tracing::info!("Migrations run successfully");

    let gateway = Arc::new(MomoClient::new(config.momo).expect("Failed to build gateway client"));
    let credentials = Arc::new(CredentialProvider::new(gateway.clone()));
    let store = Arc::new(PostgresPaymentStore::new(pool));
    let orchestrator = Arc::new(PaymentOrchestrator::new(
        gateway,
        credentials,
        store.clone(),
        config.orchestrator,
    ));

    let app: Router = create_routes(AppState {
        orchestrator,
        store,
    });

    tracing::info!("🚀 Server running at http://{}", config.bind_addr);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server failed");
}
