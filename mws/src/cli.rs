// CLI argument parsing and definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "mws")]
#[command(about = "Provision and manage the workspaces of a cloud account")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Account console host (e.g. https://accounts.cloud.databricks.com)
    #[arg(long, global = true, env = "MWS_HOST")]
    pub host: Option<String>,

    /// Account that owns the workspaces
    #[arg(short, long, global = true, env = "MWS_ACCOUNT_ID")]
    pub account_id: Option<String>,

    /// Cloud of the account console: aws, gcp or azure
    #[arg(long, global = true, env = "MWS_CLOUD")]
    pub cloud: Option<String>,

    /// Do not wait for the workspace endpoint to answer after provisioning
    #[arg(long, global = true)]
    pub skip_probe: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub debug: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Create a workspace from a JSON definition and wait until it is running
    Create {
        /// Workspace definition
        #[arg(short, long)]
        file: PathBuf,

        /// Seconds to wait for provisioning (defaults to MWS_PROVISION_TIMEOUT_SECS)
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Show a workspace
    Get {
        /// Workspace id
        id: u64,

        /// Wait until the workspace is running and reachable
        #[arg(long)]
        wait: bool,

        /// Seconds to wait with --wait
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Apply credential, network or storage key changes to a running workspace
    Update {
        /// Workspace definition including workspace_id
        #[arg(short, long)]
        file: PathBuf,

        /// Seconds to wait for the workspace to settle
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Delete a workspace and wait until it is gone
    Delete {
        /// Workspace id
        id: u64,
    },
    /// List the workspaces of the account
    List,
}
