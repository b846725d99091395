//! devgridd — the devgrid node daemon.
//!
//! Single binary that assembles a node's slot coordination:
//! - Agent (one slot actor per configured device)
//! - Device registry (in-process cluster coordinator view)
//! - Execution host loop (acts on kill signals)
//! - REST API for reading and toggling slots
//!
//! # Usage
//!
//! ```text
//! devgridd run --config /etc/devgrid/devgrid.toml --port 8090
//! devgridd scaffold --agent-id agent-1 --gpus 4 > devgrid.toml
//! ```

mod daemon;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use devgrid_core::DevgridConfig;

#[derive(Parser)]
#[command(name = "devgridd", about = "devgrid node daemon")]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run the agent's slots and the API server.
    Run {
        /// Path to devgrid.toml.
        #[arg(long, default_value = "/etc/devgrid/devgrid.toml")]
        config: PathBuf,

        /// Port to listen on (overrides `api.port`).
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print a starter config.
    Scaffold {
        #[arg(long)]
        agent_id: String,

        /// Number of GPU devices to declare.
        #[arg(long, default_value = "1")]
        gpus: u32,
    },
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(
            "info,devgridd=debug,devgrid_agent=debug,devgrid_scheduler=debug",
        )
    });

    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Run { config, port } => {
            let config = DevgridConfig::from_file(&config)?;
            let port = port.unwrap_or_else(|| config.api_port());
            daemon::run(config, port).await
        }
        Command::Scaffold { agent_id, gpus } => {
            let config = DevgridConfig::scaffold(&agent_id, gpus);
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}
