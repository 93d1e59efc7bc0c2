use waymark::config::{Config, API_KEY_VAR};
use waymark::engine::Engine;
use waymark::server::serve;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::from_env();

    if config.directions.api_key.is_none() {
        tracing::warn!("{} is not set, route requests will fail", API_KEY_VAR);
    }

    let engine = match Engine::new(&config) {
        Ok(engine) => engine,
        Err(err) => {
            tracing::error!(%err, "failed to start planner engine");
            std::process::exit(1);
        }
    };

    if let Err(err) = serve(engine, config.bind_addr).await {
        tracing::error!(%err, "server stopped");
        std::process::exit(1);
    }
}
