use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint};

#[derive(Debug, Parser)]
#[command(name = "leadbook")]
#[command(about = "Buyer lead book")]
pub struct Cli {
    /// Database file. Overrides LEADBOOK_DB_PATH.
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub db: Option<PathBuf>,

    /// Acting user id. Falls back to LEADBOOK_USER.
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Acting user's email, for display only.
    #[arg(long, global = true)]
    pub email: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print a fresh user id.
    NewUser,
    /// Create one lead from a JSON object. Use '-' to read stdin.
    Create {
        #[arg(value_hint = ValueHint::FilePath)]
        input: String,
    },
    /// Apply a JSON object of field changes to a lead. Use '-' to read stdin.
    Update {
        id: String,
        /// Last-seen updatedAt token (`<millis>.<counter>`).
        #[arg(long)]
        token: Option<String>,
        #[arg(value_hint = ValueHint::FilePath)]
        input: String,
    },
    /// Delete a lead and its history.
    Delete { id: String },
    /// Show one lead with its recent history.
    Show {
        id: String,
        /// Number of history entries to include.
        #[arg(long)]
        history: Option<u32>,
    },
    /// List one page of leads.
    List(ListArgs),
    /// Import leads from a CSV file. Use '-' to read stdin.
    Import {
        #[arg(value_hint = ValueHint::FilePath)]
        file: String,
    },
    /// Export matching leads to CSV.
    Export {
        #[command(flatten)]
        filter: FilterArgs,
        /// Output file; '-' for stdout. Defaults to leads-<date>.csv.
        #[arg(long, value_hint = ValueHint::FilePath)]
        out: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct FilterArgs {
    /// Substring of name, phone or email.
    #[arg(long)]
    pub search: Option<String>,
    #[arg(long)]
    pub city: Option<String>,
    #[arg(long)]
    pub property_type: Option<String>,
    #[arg(long)]
    pub status: Option<String>,
    #[arg(long)]
    pub timeline: Option<String>,
    /// Column to sort by, e.g. fullName or updatedAt.
    #[arg(long)]
    pub sort_by: Option<String>,
    /// asc or desc.
    #[arg(long)]
    pub sort_order: Option<String>,
}

impl FilterArgs {
    /// Recognized query parameters, keyed the way the engine expects them.
    pub fn params(&self) -> Vec<(&'static str, &str)> {
        [
            ("search", &self.search),
            ("city", &self.city),
            ("propertyType", &self.property_type),
            ("status", &self.status),
            ("timeline", &self.timeline),
            ("sortBy", &self.sort_by),
            ("sortOrder", &self.sort_order),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_deref().map(|v| (key, v)))
        .collect()
    }
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub filter: FilterArgs,
    #[arg(long)]
    pub page: Option<String>,
}
