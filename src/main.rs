use anyhow::Result;
use bisiparis::{api::create_router, init_tracing, AppState, Config};
use clap::Parser;
use std::net::SocketAddr;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load_or_default(&args.config)?;

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.workers.max(1))
        .enable_all()
        .build()?
        .block_on(serve(args, config))
}

async fn serve(args: Args, config: Config) -> Result<()> {
    std::env::set_var("RUST_LOG", &args.log_level);
    init_tracing().await;

    let addr = config.server.socket_addr()?;
    info!("Starting Bi-Siparis server with config: {:?}", config.server);

    let state = AppState::new(config).await?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
