use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;

use argo_chat::agents::{study::clean_reply, Agents, SharedSnapshot};
use argo_chat::analysis::PlotStore;
use argo_chat::ingest::{self, IngestOptions};
use argo_chat::{config::Config, create_router, db, utils, AppState};

#[derive(Parser)]
#[command(name = "argo-chat", about = "Chat assistant for ARGO ocean float data")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Serve,
    /// Run the agent graph once and print the reply
    Ask {
        /// The question to answer
        message: String,
    },
    /// Download ARGO profiles and load them into the database
    Ingest {
        /// Only parse files already in ARGO_DIR
        #[arg(long)]
        skip_download: bool,
        /// Also write cleaned observations to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

fn build_agents(config: &Config, plots: PlotStore, snapshot: SharedSnapshot) -> anyhow::Result<Agents> {
    let readonly = db::create_readonly_pool(&config.database)?;
    Ok(Agents::from_config(config, readonly, plots, snapshot)?)
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let pool = db::create_pool(&config.database).await?;
    info!("Running database migrations...");
    db::run_migrations(&pool).await?;
    info!("Database migrations completed");

    let plots = PlotStore::new(&config.server.plot_dir);
    let snapshot = SharedSnapshot::default();
    let agents = build_agents(&config, plots.clone(), snapshot.clone())?;

    let state = AppState::new(pool, config.clone(), agents, snapshot, plots);
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.server.host, config.server.port))?;
    info!("Server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down");
        })
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}

async fn ask(config: Config, message: String) -> anyhow::Result<()> {
    let pool = db::create_pool(&config.database).await?;
    db::run_migrations(&pool).await?;

    let plots = PlotStore::new(&config.server.plot_dir);
    let agents = build_agents(&config, plots, SharedSnapshot::default())?;
    let run = agents.graph.invoke(vec![message]).await?;

    for log in &run.tool_logs {
        info!(action = %log.action, query = %log.query, "Tool used");
    }
    println!("{}", clean_reply(&run.response));
    Ok(())
}

async fn run_ingest(config: Config, skip_download: bool, csv: Option<PathBuf>) -> anyhow::Result<()> {
    let pool = db::create_pool(&config.database).await?;
    db::run_migrations(&pool).await?;

    let summary = ingest::run(&config, &pool, IngestOptions { skip_download, csv }).await?;
    println!(
        "Processed {} files: {} profiles, {} observations, {} failed",
        summary.files, summary.profiles, summary.observations, summary.failed
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env()?;
    let _log_guard = utils::init_logger(config.server.log_dir.as_deref());
    info!("Configuration loaded: {:?}", config.server);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Ask { message } => ask(config, message).await,
        Commands::Ingest { skip_download, csv } => run_ingest(config, skip_download, csv).await,
    }
}
