// Command handlers for workspace operations

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use mws_orchestrator::{ProvisionerConfig, Workspace, WorkspaceOrchestrator};

use crate::cli::{Args, Command};

/// What the CLI prints for a workspace. Unlike the create body it includes
/// the server-managed fields.
#[derive(Debug, Serialize)]
struct WorkspaceView<'a> {
    account_id: &'a str,
    workspace_id: Option<u64>,
    workspace_name: &'a str,
    deployment_name: &'a str,
    workspace_url: &'a str,
    workspace_status: String,
    #[serde(skip_serializing_if = "str::is_empty")]
    workspace_status_message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
}

impl<'a> From<&'a Workspace> for WorkspaceView<'a> {
    fn from(ws: &'a Workspace) -> Self {
        Self {
            account_id: &ws.account_id,
            workspace_id: ws.workspace_id,
            workspace_name: &ws.workspace_name,
            deployment_name: &ws.deployment_name,
            workspace_url: &ws.workspace_url,
            workspace_status: ws.workspace_status.to_string(),
            workspace_status_message: &ws.workspace_status_message,
            created_at: ws.created_at(),
        }
    }
}

/// Apply command line overrides on top of the environment configuration.
fn resolve_config(args: &Args) -> ProvisionerConfig {
    let mut config = ProvisionerConfig::from_env();
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(account_id) = &args.account_id {
        config.account_id = Some(account_id.clone());
    }
    if let Some(cloud) = &args.cloud {
        config.cloud = cloud.clone();
    }
    if args.skip_probe {
        config.skip_probe = true;
    }
    config
}

fn require_account(config: &ProvisionerConfig) -> Result<&str> {
    match config.account_id.as_deref() {
        Some(account_id) => Ok(account_id),
        None => bail!("No account id given. Pass --account-id or set MWS_ACCOUNT_ID"),
    }
}

/// Load a workspace definition, filling the account id from the configuration.
fn load_workspace(path: &Path, config: &ProvisionerConfig) -> Result<Workspace> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read workspace file {}", path.display()))?;
    let mut ws: Workspace = serde_json::from_str(&text)
        .with_context(|| format!("Invalid workspace definition in {}", path.display()))?;
    if ws.account_id.is_empty() {
        ws.account_id = require_account(config)?.to_string();
    }
    Ok(ws)
}

fn print_workspace(ws: &Workspace) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&WorkspaceView::from(ws))?);
    Ok(())
}

fn timeout_or(secs: Option<u64>, default: Duration) -> Duration {
    secs.map(Duration::from_secs).unwrap_or(default)
}

/// Main command dispatcher
#[must_use = "command execution results should be handled"]
pub async fn execute_command(args: Args, cancel: CancellationToken) -> Result<()> {
    let config = resolve_config(&args);
    let orchestrator = WorkspaceOrchestrator::from_config(&config)
        .context("Failed to set up the account API client")?
        .with_cancellation(cancel);
    let provision_timeout = orchestrator.provision_timeout();

    match args.command {
        Command::Create { file, timeout } => {
            debug!("Handling create command");
            let mut ws = load_workspace(&file, &config)?;
            orchestrator
                .create(&mut ws, timeout_or(timeout, provision_timeout))
                .await?;
            info!(
                "Workspace {} is running at {}",
                ws.display_name(),
                ws.workspace_url
            );
            print_workspace(&ws)
        }
        Command::Get { id, wait, timeout } => {
            debug!("Handling get command");
            let account_id = require_account(&config)?;
            let ws = if wait {
                orchestrator
                    .refresh(account_id, id, timeout_or(timeout, provision_timeout))
                    .await?
            } else {
                orchestrator.read(account_id, id).await?
            };
            print_workspace(&ws)
        }
        Command::Update { file, timeout } => {
            debug!("Handling update command");
            let ws = load_workspace(&file, &config)?;
            if ws.workspace_id.is_none() {
                bail!("{} has no workspace_id to update", file.display());
            }
            let running = orchestrator
                .update_running(&ws, timeout_or(timeout, provision_timeout))
                .await?;
            print_workspace(&running)
        }
        Command::Delete { id } => {
            debug!("Handling delete command");
            let account_id = require_account(&config)?;
            orchestrator.delete(account_id, id).await?;
            println!("Workspace {account_id}/{id} deleted");
            Ok(())
        }
        Command::List => {
            debug!("Handling list command");
            let account_id = require_account(&config)?;
            let workspaces = orchestrator.list(account_id).await?;
            print!("{}", format_table(&workspaces));
            Ok(())
        }
    }
}

fn format_table(workspaces: &[Workspace]) -> String {
    let mut out = format!(
        "{:<12} {:<16} {:<24} {:<20} {}\n",
        "ID", "STATUS", "DEPLOYMENT", "CREATED", "URL"
    );
    for ws in workspaces {
        let id = ws.workspace_id.map(|id| id.to_string()).unwrap_or_default();
        let created = ws
            .created_at()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{:<12} {:<16} {:<24} {:<20} {}\n",
            id,
            ws.workspace_status.to_string(),
            ws.deployment_name,
            created,
            ws.workspace_url
        ));
    }
    out
}
