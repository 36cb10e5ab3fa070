use clap::{Parser, Subcommand};

/// Backup approval relay — status snapshots in, human decisions out
#[derive(Parser)]
#[command(name = "approval-relay", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind (overrides RELAY_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Inspect the stored status snapshot
    Status {
        #[command(subcommand)]
        command: StatusCommands,
    },

    /// Inspect and decide pending approvals
    Approvals {
        #[command(subcommand)]
        command: ApprovalCommands,
    },
}

#[derive(Subcommand)]
pub enum StatusCommands {
    /// Print the latest snapshot and when it arrived
    Show,
}

#[derive(Subcommand)]
pub enum ApprovalCommands {
    /// List pending items and recent decisions
    List {
        /// Number of history entries to print
        #[arg(long, default_value = "10")]
        history: usize,
    },
    /// Record a decision on behalf of an allow-listed approver
    Decide {
        #[arg(long)]
        id: String,
        /// approve | reject
        #[arg(long)]
        action: String,
        /// Approver email; must be in RELAY_APPROVERS
        #[arg(long)]
        by: String,
        #[arg(long)]
        note: Option<String>,
    },
}
