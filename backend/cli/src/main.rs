use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use confab_agent::{ChatProfile, ConsoleRelay, ExchangeOutcome, ProfileContext, ProfileKind, SessionDriver, SessionState};
use confab_cli::analysis::{analyze, Analysis, EMPTY_SUMMARY_MESSAGE};
use confab_cli::api::{build_router, AppState};
use confab_cli::terminal_output::{note_error, note_info, note_success, note_warn, render_table, supports_color};
use confab_config::{redact, AppConfig};
use confab_core::{SessionPhase, TranscriptWriter};
use confab_logging::init_logger;

#[derive(Parser)]
#[command(name = "confab")]
#[command(about = "Confab: multi-agent LLM chats relayed to a web page or terminal")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web shell
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
        /// Profile to host; repeat for several (default: multitools and coder)
        #[arg(long = "profile")]
        profiles: Vec<ProfileKind>,
    },
    /// Run one exchange in the terminal
    Ask {
        #[arg(short, long, default_value = "multitools")]
        profile: ProfileKind,
        /// Opening message
        #[arg(required = true)]
        message: Vec<String>,
    },
    /// Analyze the group chat summary file
    Analyze {
        #[arg(long)]
        summary: Option<PathBuf>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List the available profiles
    Profiles,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load().await?;

    init_logger(config.logging.dir.as_deref().map(Path::new), &config.logging.level);
    info!(config = %redact(&serde_json::to_value(&config)?), "Configuration loaded");

    match cli.command {
        Commands::Serve { port, profiles } => {
            let mut config = config;
            if let Some(port) = port {
                config.server.port = port;
            }
            let profiles = if profiles.is_empty() {
                vec![ProfileKind::Multitools, ProfileKind::Coder]
            } else {
                profiles
            };
            run_server(config, &profiles).await?;
        }
        Commands::Ask { profile, message } => ask(config, profile, &message.join(" ")).await?,
        Commands::Analyze { summary, out } => {
            let ctx = ProfileContext::from_config(config)?;
            let summary = summary.unwrap_or_else(|| PathBuf::from(&ctx.config.session.summary_path));
            let out = out.unwrap_or_else(|| PathBuf::from(&ctx.config.session.analysis_path));
            match analyze(ctx.provider.as_ref(), &ctx.config.llm, &summary, &out).await? {
                Analysis::NoChatData => {
                    note_error(EMPTY_SUMMARY_MESSAGE);
                    std::process::exit(1);
                }
                Analysis::Written { markdown, path } => {
                    println!("{markdown}");
                    note_success(&format!("Analysis written to {}", path.display()));
                }
            }
        }
        Commands::Profiles => {
            let rows: Vec<Vec<String>> = ProfileKind::ALL
                .iter()
                .map(|k| vec![k.to_string(), k.title().to_string()])
                .collect();
            print!("{}", render_table(&["Profile", "Title"], &rows));
        }
    }

    Ok(())
}

async fn ask(config: AppConfig, kind: ProfileKind, message: &str) -> Result<()> {
    let summary_path = config.session.summary_path.clone();
    let ctx = ProfileContext::from_config(config)?;
    let profile = ChatProfile::build(kind, &ctx);
    let writes_summary = profile.writes_summary();

    let mut driver = SessionDriver::new(Arc::new(profile), Arc::new(ConsoleRelay::new(supports_color())));
    if writes_summary {
        driver = driver.with_summary(TranscriptWriter::new(summary_path));
    }

    note_info(&format!("{} ({})", kind.title(), driver.profile().agent_names().join(", ")));
    let (_, outcome) = driver.submit(SessionState::default(), message).await;
    match outcome {
        ExchangeOutcome::Completed { result } => {
            note_success(&format!(
                "Finished ({}), {} messages, {} tokens",
                SessionPhase::from(result.stop_reason),
                result.chat_history.len(),
                result.tokens_used
            ));
            Ok(())
        }
        // The relay has already printed the notice.
        ExchangeOutcome::Faulted { .. } => std::process::exit(1),
        ExchangeOutcome::Rejected { reason } => {
            note_warn(&reason);
            Ok(())
        }
    }
}

async fn run_server(config: AppConfig, profiles: &[ProfileKind]) -> Result<()> {
    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    info!(addr = %addr, profiles = ?profiles, "Starting Confab shell");

    let ctx = ProfileContext::from_config(config)?;
    let state = Arc::new(AppState::new(&ctx, profiles));

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, "HTTP API listening");

    axum::serve(listener, app).await?;
    Ok(())
}
