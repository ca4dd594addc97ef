use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::json;
use uuid::Uuid;

mod api;
mod cache;
mod commands;
mod state;
mod store;

use api::ApiClient;
use state::AckState;

#[derive(Parser)]
#[command(
    name = "vitalis",
    version,
    about = "Vitalis CLI — daily body metrics, acknowledgment, and the cached personal plan"
)]
struct Cli {
    /// API base URL
    #[arg(long, env = "VITALIS_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    /// User ID (temporary, will be replaced by auth)
    #[arg(long, env = "VITALIS_USER_ID")]
    user_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check API health
    Health,
    /// Daily metrics operations
    Metrics {
        #[command(subcommand)]
        command: MetricsCommands,
    },
    /// Personal plan operations
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
}

#[derive(Subcommand)]
enum MetricsCommands {
    /// Show today's snapshot with acknowledgment status
    Today,
    /// Acknowledge today's snapshot (idempotent)
    Ack,
}

#[derive(Subcommand)]
enum PlanCommands {
    /// Show the current plan, refreshing the cache when needed
    Show {
        /// Bypass the cache and recompute today's metrics server-side
        #[arg(long)]
        force: bool,
        /// Cache file location (defaults to the user config dir)
        #[arg(long)]
        cache_path: Option<PathBuf>,
        /// Cache TTL override in seconds
        #[arg(long)]
        ttl_seconds: Option<i64>,
    },
}

fn exit_error(message: &str, docs_hint: Option<&str>) -> ! {
    let mut err = json!({
        "error": "cli_error",
        "message": message
    });
    if let Some(hint) = docs_hint {
        err["docs_hint"] = json!(hint);
    }
    eprintln!("{}", serde_json::to_string_pretty(&err).unwrap());
    std::process::exit(4);
}

fn require_user_id(user_id: Option<String>) -> Uuid {
    let raw = user_id.unwrap_or_else(|| {
        exit_error(
            "user_id is required for this command",
            Some("Set --user-id or the VITALIS_USER_ID env var"),
        )
    });
    Uuid::parse_str(&raw)
        .unwrap_or_else(|_| exit_error("user_id must be a valid UUID", None))
}

fn client_for(api_url: &str, user_id: Uuid) -> ApiClient {
    ApiClient::new(api_url, user_id)
        .unwrap_or_else(|err| exit_error(&format!("failed to build HTTP client: {err}"), None))
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vitalis_cli=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Health => {
            let client = client_for(&cli.api_url, Uuid::nil());
            match client.health().await {
                Ok(body) => {
                    println!("{}", serde_json::to_string_pretty(&body).unwrap());
                    0
                }
                Err(err) => commands::report_error(&err),
            }
        }
        Commands::Metrics { command } => {
            let user_id = require_user_id(cli.user_id);
            let client = client_for(&cli.api_url, user_id);
            let ack_state = AckState::new();
            match command {
                MetricsCommands::Today => commands::metrics::today(&client, &ack_state).await,
                MetricsCommands::Ack => commands::metrics::ack(&client, &ack_state).await,
            }
        }
        Commands::Plan { command } => {
            let user_id = require_user_id(cli.user_id);
            let client = client_for(&cli.api_url, user_id);
            match command {
                PlanCommands::Show {
                    force,
                    cache_path,
                    ttl_seconds,
                } => {
                    commands::plan::show(
                        client,
                        commands::plan::ShowArgs {
                            force,
                            cache_path,
                            ttl_seconds,
                        },
                    )
                    .await
                }
            }
        }
    };

    std::process::exit(code);
}
