mod bridge;
mod config_commands;

use std::{io::Read, path::PathBuf, time::Duration};

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    keeperlink_config::KeeperlinkConfig,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use crate::bridge::{Bridge, MessageRef, TaskRequest};

#[derive(Parser)]
#[command(name = "keeperlink", about = "keeperlink: Slack messages into Keeper tasks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery of ./keeperlink.* and the user config dir).
    #[arg(long, global = true, env = "KEEPERLINK_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert Slack message markup to plain text.
    Normalize {
        /// Message text. Read from stdin when omitted.
        #[arg(long)]
        text: Option<String>,
    },
    /// Search the Keeper client directory.
    Clients {
        #[arg(short, long)]
        query: Option<String>,
        /// Ask the server to search instead of fetching the full directory.
        #[arg(long, default_value_t = false)]
        remote: bool,
    },
    /// List Keeper users (task assignees).
    Users,
    /// Create a Keeper task from a Slack message.
    CreateTask {
        #[arg(long)]
        client_id: String,
        #[arg(long)]
        assignee_id: Option<String>,
        #[arg(long)]
        title: Option<String>,
        /// Raw Slack message text used as the description.
        #[arg(long)]
        description: Option<String>,
        /// Due date, passed through as given (YYYY-MM-DD).
        #[arg(long)]
        due_date: Option<String>,
        /// Channel of the source message; with --message-ts adds its permalink.
        #[arg(long, requires = "message_ts")]
        channel: Option<String>,
        #[arg(long, requires = "channel")]
        message_ts: Option<String>,
    },
    /// Keep the client cache warm and answer queries read from stdin, one
    /// per line.
    Watch,
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so command output on stdout stays machine-readable.
    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<KeeperlinkConfig> {
    match &cli.config {
        Some(path) => {
            let mut config = keeperlink_config::load_config(path)?;
            keeperlink_config::apply_env_overrides(&mut config);
            Ok(config)
        },
        None => Ok(keeperlink_config::discover_and_load()),
    }
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "keeperlink starting");

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Config { action } => config_commands::handle_config(action, &config),
        Commands::Normalize { text } => {
            let text = match text {
                Some(text) => text,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("failed to read message text from stdin")?;
                    buf
                },
            };
            let bridge = Bridge::from_config(&config)?;
            println!("{}", bridge.normalize(&text).await);
            Ok(())
        },
        Commands::Clients { query, remote } => {
            let bridge = Bridge::from_config(&config)?;
            let clients = if remote {
                bridge
                    .directory()
                    .search_clients(query.as_deref().unwrap_or_default())
                    .await?
            } else {
                bridge.list_entities(query.as_deref()).await
            };
            print_json(&clients)
        },
        Commands::Users => {
            let bridge = Bridge::from_config(&config)?;
            print_json(&bridge.list_users().await?)
        },
        Commands::CreateTask {
            client_id,
            assignee_id,
            title,
            description,
            due_date,
            channel,
            message_ts,
        } => {
            let bridge = Bridge::from_config(&config)?;
            let source = channel
                .zip(message_ts)
                .map(|(channel, ts)| MessageRef { channel, ts });
            let task = bridge
                .create_task(TaskRequest {
                    client_id,
                    assignee_id,
                    title,
                    description,
                    due_date,
                    source,
                })
                .await?;
            print_json(&task)
        },
        Commands::Watch => watch(&config).await,
    }
}

async fn watch(config: &KeeperlinkConfig) -> anyhow::Result<()> {
    let bridge = Bridge::from_config(config)?;
    let period = Duration::from_secs(config.directory.refresh_interval_secs.max(1));
    let refresher = bridge.cache().spawn_refresh_loop(period);
    info!(interval_secs = period.as_secs(), "client cache refresh loop started");

    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        line.clear();
        let read = tokio::task::block_in_place(|| stdin.read_line(&mut line))?;
        if read == 0 {
            break;
        }
        let query = line.trim();
        print_json(&bridge.list_entities(Some(query)).await)?;
    }

    refresher.abort();
    Ok(())
}
