use std::net::SocketAddr;
use std::sync::Arc;

use approval_relay::cli::{self, ApprovalCommands, Commands, StatusCommands};
use approval_relay::config::{self, Config};
use approval_relay::errors::AppError;
use approval_relay::ledger::DecisionRequest;
use approval_relay::{api, AppState};
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();
    init_tracing();
    let cfg = config::load()?;

    let result = match args.command {
        Some(Commands::Serve { port }) => run_server(cfg, port).await,
        Some(Commands::Status { command }) => handle_status_command(&cfg, command).await,
        Some(Commands::Approvals { command }) => handle_approval_command(&cfg, command).await,
        None => run_server(cfg, None).await,
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "approval_relay=debug,tower_http=debug".into()),
    );
    let registry = tracing_subscriber::registry().with(filter);
    let json = std::env::var("RELAY_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run_server(cfg: Config, port: Option<u16>) -> anyhow::Result<()> {
    let port = port.unwrap_or(cfg.port);
    let state = Arc::new(AppState::from_config(&cfg).await?);
    tracing::info!(
        approvers = state.ledger.approvers().len(),
        "Approval ledger ready"
    );

    let app = api::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Approval relay listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn handle_status_command(cfg: &Config, cmd: StatusCommands) -> anyhow::Result<()> {
    cfg.require_shared_store()?;
    let state = AppState::from_config(cfg).await?;
    match cmd {
        StatusCommands::Show => match state.relay.get_latest_snapshot().await {
            Ok(raw) => {
                if let Ok(at) = state.relay.last_sync().await {
                    println!("Last sync: {}", at);
                }
                println!("{}", raw);
            }
            Err(AppError::NotFound(msg)) => println!("{}", msg),
            Err(e) => return Err(e.into()),
        },
    }
    Ok(())
}

async fn handle_approval_command(cfg: &Config, cmd: ApprovalCommands) -> anyhow::Result<()> {
    cfg.require_shared_store()?;
    let state = AppState::from_config(cfg).await?;
    match cmd {
        ApprovalCommands::List { history } => {
            let ledger_state = state.ledger.list_state().await?;

            if ledger_state.pending.is_empty() {
                println!("No pending approvals.");
            } else {
                println!("{:<24} DETAILS", "ID");
                for item in &ledger_state.pending {
                    let details = serde_json::to_string(&item.fields)?;
                    let details = if details.len() > 50 {
                        format!("{}...", details.chars().take(47).collect::<String>())
                    } else {
                        details
                    };
                    println!("{:<24} {}", item.id, details);
                }
            }

            if !ledger_state.history.is_empty() {
                println!();
                println!("{:<24} {:<8} {:<28} AT", "ID", "ACTION", "BY");
                for d in ledger_state.history.iter().take(history) {
                    println!("{:<24} {:<8} {:<28} {}", d.id, d.action, d.by, d.at);
                }
            }
        }
        ApprovalCommands::Decide {
            id,
            action,
            by,
            note,
        } => {
            let req = DecisionRequest {
                id: Some(id),
                action: Some(action),
                note,
            };
            let recorded = state.ledger.record_decision(req, &by, Utc::now()).await?;
            let d = &recorded.decision;
            if recorded.persisted {
                println!("{} {} by {} at {}.", d.id, d.action, d.by, d.at);
            } else {
                println!("{} {} by {} (NOT persisted: store unavailable).", d.id, d.action, d.by);
            }
        }
    }
    Ok(())
}
