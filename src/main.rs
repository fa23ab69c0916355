use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use storefront_recs::{
    api::{create_router, state::PageLimits, AppState},
    config::Config,
    db::{create_pool, run_migrations, PgActivityStore, PgProductStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("storefront_recs=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let pool = create_pool(&config.database_url, config.database_max_connections).await?;
    run_migrations(&pool).await?;

    // Initialize application state
    let state = AppState::new(
        Arc::new(PgActivityStore::new(pool.clone())),
        Arc::new(PgProductStore::new(pool)),
        config.recommendation_settings(),
        PageLimits {
            default_limit: config.default_page_size,
            max_limit: config.max_page_size,
        },
    );

    // Create the router with all routes
    let app = create_router(state);

    // Start the server
    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(address = %address, "Server running");
    axum::serve(listener, app).await?;

    Ok(())
}
