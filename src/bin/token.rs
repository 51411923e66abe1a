use anyhow::Result;
use bisiparis::services::documents::{document_url, DocumentKind, TokenSigner};
use bisiparis::{init_tracing, Config};
use chrono::Utc;
use clap::Parser;
use tracing::info;

/// Mints a signed invoice or warranty link without going through the HTTP API.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[arg(short, long, default_value = "warn")]
    log_level: String,

    #[arg(short, long, default_value = "invoice")]
    kind: String,

    #[arg(short, long)]
    order_id: u64,

    #[arg(short, long)]
    email: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    std::env::set_var("RUST_LOG", &args.log_level);
    init_tracing().await;

    let config = Config::load_or_default(&args.config)?;
    let kind: DocumentKind = args
        .kind
        .parse()
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    let documents = &config.documents;
    let signer = TokenSigner::new(kind, &documents.secure_auth_key, documents.token_ttl_hours);
    let token = signer.issue(args.order_id, &args.email, Utc::now())?;

    info!(order_id = args.order_id, kind = kind.as_str(), "Issued document token");
    println!("token: {}", token);
    println!("url:   {}", document_url(&documents.site_url, kind, &token));

    Ok(())
}
