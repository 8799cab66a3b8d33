use dotenv::dotenv;
use kitchen_market::config::Config;
use kitchen_market::server::Server;
use kitchen_market::store::DocumentStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env()?;
    log::info!(
        "Opening {} (back paging: {:?})",
        config.database_url,
        config.back_paging
    );

    let store = DocumentStore::open(&config.database_url)?;
    let server = Server::new(store, config.back_paging);
    let server_addr = config.server_addr.clone();
    tokio::spawn(async move {
        if let Err(e) = server.run(&server_addr).await {
            log::error!("Server error: {}", e);
        }
    });

    tokio::signal::ctrl_c().await?;
    log::info!("Shutting down server...");

    Ok(())
}
