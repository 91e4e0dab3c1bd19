use std::{env, error::Error};

use tokio::{fs, net, task};
use tracing::{error, info};
use tracing_subscriber::{
    layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter,
};

use field_desk::{db, server, Config, Engine};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let path = env::args().nth(1).unwrap_or_else(|| "config.toml".into());
    let config = fs::read_to_string(&path).await?;
    let config = toml::from_str::<Config>(&config)?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log.filter))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let (db_client, db_connection) = db::connect(&config.db).await?;

    task::spawn(async move {
        if let Err(e) = db_connection.await {
            error!("database connection failed: {e}");
        }
    });

    let engine = Engine::new(db_client);
    let app = server::router(engine, &config.http, &config.jwt)?;

    let listener = net::TcpListener::bind(config.http.server.addr).await?;
    info!("listening on {}", config.http.server.addr);
    axum::serve(listener, app).await?;

    Ok(())
}
