/// Command-line interface definition
///
/// Owners can be named by id or by handle wherever a command takes
/// `<OWNER>`.

use clap::{Parser, Subcommand};
use uuid::Uuid;

/// Moji admin - operate the Moji data store
#[derive(Parser, Debug)]
#[command(name = "moji-admin")]
#[command(about = "Moji admin - operate the Moji data store")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "MOJI_LOG_JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Apply pending database migrations
    Migrate,

    /// Show database health, pool usage and migration state
    Status,

    /// Register a new owner
    CreateOwner {
        #[arg(long)]
        handle: String,

        #[arg(long)]
        email: String,

        /// Defaults to the handle
        #[arg(long)]
        display_name: Option<String>,

        /// Seed starter workspaces and content right away
        #[arg(long)]
        seed: bool,
    },

    /// Show an owner with their license and effective limits
    ShowOwner { owner: String },

    /// Deactivate an owner (soft delete)
    DeactivateOwner { owner: String },

    /// Reactivate a deactivated owner
    ReactivateOwner { owner: String },

    /// Permanently delete an owner and everything they hold
    DeleteOwner {
        owner: String,

        /// Confirm the purge
        #[arg(long)]
        yes: bool,
    },

    /// Create a license tier
    CreateLicense {
        #[arg(long)]
        name: String,

        #[arg(long)]
        description: Option<String>,

        /// Price in cents
        #[arg(long, default_value = "0")]
        price: i64,

        #[arg(long)]
        max_projects: u32,

        #[arg(long)]
        max_notes: u32,

        #[arg(long)]
        max_todos: u32,

        /// Create the license without offering it for assignment
        #[arg(long)]
        inactive: bool,
    },

    /// List licenses available for assignment
    ListLicenses,

    /// Assign a license to an owner
    AssignLicense {
        owner: String,

        /// License id; omit together with --clear to remove the license
        #[arg(long, conflicts_with = "clear", required_unless_present = "clear")]
        license: Option<Uuid>,

        /// Remove the owner's license
        #[arg(long)]
        clear: bool,
    },

    /// Seed starter workspaces and content for an owner
    Seed { owner: String },

    /// List an owner's workspaces
    ListWorkspaces { owner: String },

    /// Show capacity usage for one workspace
    Capacity {
        owner: String,

        #[arg(long)]
        workspace: Uuid,
    },

    /// Issue an invite link for an owner
    CreateInvite { owner: String },

    /// Redeem an invite link on behalf of an owner
    RedeemInvite {
        link: String,

        #[arg(long)]
        owner: String,
    },
}

impl Command {
    /// Whether the command needs the migration tooling rather than the
    /// record store alone
    pub fn is_maintenance(&self) -> bool {
        matches!(self, Command::Migrate | Command::Status)
    }
}
