use std::net::SocketAddr;

use automation_gateway::config::{get_config, init_config};
use automation_gateway::database::pool::create_pool;
use automation_gateway::{routes, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let state = AppState::new(pool);
    let app = routes::router(state);

    let addr: SocketAddr = config.server_address.parse()?;
    tracing::info!("automation gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
