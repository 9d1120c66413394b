//! Beacon server — runs the dispatch gateway.

use beacon_core::config::BeaconConfig;
use beacon_core::context::AppContext;
use beacon_core::gateway;
use beacon_core::types::Role;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Beacon: incident lifecycle and real-time responder dispatch.
#[derive(Parser, Debug)]
#[command(name = "beacon-server", version, about, long_about = None)]
struct Cli {
    /// Configuration file path (defaults to ./beacon.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port
    #[arg(long)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Mint a bearer token for a subject (operator tooling; the login system
    /// is external)
    MintToken {
        /// Subject id (random when omitted)
        #[arg(long)]
        subject: Option<Uuid>,

        /// Role: civilian, responder, or admin
        #[arg(long, default_value = "civilian")]
        role: String,

        /// Token lifetime in seconds
        #[arg(long, default_value_t = 86_400)]
        ttl_secs: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let mut config = BeaconConfig::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let ctx = AppContext::from_config(config)?;

    match cli.command {
        Some(Commands::MintToken {
            subject,
            role,
            ttl_secs,
        }) => {
            let role = Role::parse(&role)
                .ok_or_else(|| anyhow::anyhow!("unknown role: {role}"))?;
            let subject = subject.unwrap_or_else(Uuid::new_v4);
            let token = ctx
                .auth
                .issue(subject, role, chrono::Duration::seconds(ttl_secs));
            println!("subject: {subject}");
            println!("token: {token}");
            Ok(())
        }
        None => {
            gateway::run(ctx).await?;
            Ok(())
        }
    }
}
