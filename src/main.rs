use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use dotenv::dotenv;
use log::info;
use reality_check::{api, commands::food_cmd, AppState, Config};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Serve the HTTP API.
    #[arg(long)]
    api: bool,

    #[arg(long, default_value = "8000")]
    port: u16,

    /// Overrides DATABASE_PATH.
    #[arg(long)]
    database: Option<PathBuf>,

    /// Analyze a single barcode and print the result.
    #[arg(long)]
    ean: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = Config::from_env()?;
    if let Some(path) = &args.database {
        config.database_path = path.clone();
    }

    let state = AppState::from_config(&config).await?;

    if args.api {
        run_api_server(state, args.port).await
    } else {
        run_cli_mode(state, &args).await
    }
}

async fn run_cli_mode(state: AppState, args: &Args) -> Result<()> {
    let Some(ean) = &args.ean else {
        bail!("Nothing to do: pass --api to serve or --ean <barcode> to analyze a product");
    };

    match food_cmd::analyze_ean(&state, ean).await {
        Ok(report) => {
            println!("{}", report);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", format!("{:#}", e).red());
            Err(e)
        }
    }
}

async fn run_api_server(state: AppState, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = api::create_api(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
