use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};
use khidma_core::ReportFormat;
use khidma_core::models::{NoteTarget, RetreatInput, Role, ServantUpdate, ServanteeInput};

/// Top-level CLI entrypoint.
#[derive(Parser, Debug, Clone)]
#[command(name = "khidma", version, about, long_about = None)]
pub struct Cli {
    /// Backend base URL (overrides config.toml and KHIDMA_API_URL).
    #[arg(long, global = true, value_name = "URL", value_hint = ValueHint::Url)]
    pub api_url: Option<String>,

    /// Also write diagnostic logs to stderr.
    #[arg(short, long, global = true, action = ArgAction::SetTrue)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Sign in and remember the session.
    Login(LoginArgs),
    /// End the session and forget stored credentials.
    Logout,
    /// Show the signed-in user.
    Whoami,
    #[command(subcommand)]
    Servantees(ServanteeCommand),
    #[command(subcommand)]
    Retreats(RetreatCommand),
    #[command(subcommand)]
    Servants(ServantCommand),
    #[command(subcommand)]
    Notes(NoteCommand),
    /// Servantees by attendance over a range of retreats.
    Search(SearchArgs),
    /// Overview figures.
    Dashboard,
    #[command(subcommand)]
    Report(ReportCommand),
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Clone, Args)]
pub struct LoginArgs {
    pub email: String,

    /// Prompted for when omitted.
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct ListArgs {
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub page: u32,

    /// Rows per page (defaults to config value).
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=100))]
    pub limit: Option<u32>,

    #[arg(short, long)]
    pub search: Option<String>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum ServanteeCommand {
    List(ListArgs),
    /// Details plus retreat count and last retreat.
    Show {
        id: String,
    },
    /// Every retreat the servantee attended.
    History {
        id: String,
    },
    #[command(alias = "create")]
    Add(ServanteeAddArgs),
    #[command(alias = "update")]
    Edit(ServanteeEditArgs),
    #[command(alias = "remove")]
    Delete {
        id: String,
    },
}

#[derive(Debug, Clone, Args, Default)]
pub struct ServanteeDetails {
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub church: Option<String>,
    #[arg(long)]
    pub education: Option<String>,
    #[arg(long)]
    pub year: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct ServanteeAddArgs {
    pub name: String,
    #[command(flatten)]
    pub details: ServanteeDetails,
}

#[derive(Debug, Clone, Args)]
pub struct ServanteeEditArgs {
    pub id: String,
    #[arg(long)]
    pub name: Option<String>,
    #[command(flatten)]
    pub details: ServanteeDetails,
}

impl ServanteeDetails {
    fn into_input(self, name: Option<String>) -> ServanteeInput {
        ServanteeInput {
            name,
            phone: self.phone,
            church: self.church,
            education: self.education,
            year: self.year,
        }
    }
}

impl ServanteeAddArgs {
    pub fn to_input(&self) -> ServanteeInput {
        self.details.clone().into_input(Some(self.name.clone()))
    }
}

impl ServanteeEditArgs {
    pub fn to_input(&self) -> ServanteeInput {
        self.details.clone().into_input(self.name.clone())
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum RetreatCommand {
    List(ListArgs),
    Show {
        id: String,
    },
    #[command(alias = "create")]
    Add(RetreatAddArgs),
    #[command(alias = "update")]
    Edit(RetreatEditArgs),
    #[command(alias = "remove")]
    Delete {
        id: String,
    },
    /// Register a servantee for a retreat.
    Attend {
        retreat: String,
        servantee: String,
    },
    /// Remove a servantee from a retreat.
    Unattend {
        retreat: String,
        servantee: String,
    },
}

#[derive(Debug, Clone, Args)]
pub struct RetreatAddArgs {
    pub name: String,

    /// Start date (YYYY-MM-DD or RFC 3339).
    #[arg(long, value_parser = parse_date)]
    pub start: Option<DateTime<Utc>>,

    /// End date (YYYY-MM-DD or RFC 3339).
    #[arg(long, value_parser = parse_date)]
    pub end: Option<DateTime<Utc>>,

    #[arg(long)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct RetreatEditArgs {
    pub id: String,

    #[arg(long)]
    pub name: Option<String>,

    /// Start date (YYYY-MM-DD or RFC 3339).
    #[arg(long, value_parser = parse_date)]
    pub start: Option<DateTime<Utc>>,

    /// End date (YYYY-MM-DD or RFC 3339).
    #[arg(long, value_parser = parse_date)]
    pub end: Option<DateTime<Utc>>,

    #[arg(long)]
    pub location: Option<String>,
}

impl RetreatEditArgs {
    pub fn to_input(&self) -> RetreatInput {
        RetreatInput {
            name: self.name.clone(),
            start_date: self.start,
            end_date: self.end,
            location: self.location.clone(),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum ServantCommand {
    List(ListArgs),
    #[command(alias = "create")]
    Add(ServantAddArgs),
    #[command(alias = "update")]
    Edit(ServantEditArgs),
    #[command(alias = "remove")]
    Delete {
        id: String,
    },
}

#[derive(Debug, Clone, Args)]
pub struct ServantAddArgs {
    pub name: String,
    pub email: String,

    /// Prompted for when omitted.
    #[arg(long)]
    pub password: Option<String>,

    /// Grant the admin role.
    #[arg(long, action = ArgAction::SetTrue)]
    pub admin: bool,
}

impl ServantAddArgs {
    pub fn role(&self) -> Role {
        if self.admin { Role::Admin } else { Role::Servant }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    Admin,
    Servant,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Admin => Role::Admin,
            RoleArg::Servant => Role::Servant,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct ServantEditArgs {
    pub id: String,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub email: Option<String>,

    /// Set a new password (prompted for when given without a value).
    #[arg(long, num_args = 0..=1, value_name = "PASSWORD")]
    pub password: Option<Option<String>>,

    #[arg(long, value_enum)]
    pub role: Option<RoleArg>,
}

impl ServantEditArgs {
    /// The requested changes; the password is filled in separately.
    pub fn to_update(&self) -> ServantUpdate {
        ServantUpdate {
            name: self.name.clone(),
            email: self.email.clone(),
            password: self.password.clone().flatten(),
            role: self.role.map(Role::from),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NoteOwner {
    Servantee,
    Retreat,
}

impl From<NoteOwner> for NoteTarget {
    fn from(owner: NoteOwner) -> Self {
        match owner {
            NoteOwner::Servantee => NoteTarget::Servantee,
            NoteOwner::Retreat => NoteTarget::Retreat,
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum NoteCommand {
    List {
        #[arg(value_enum)]
        owner: NoteOwner,
        id: String,
    },
    #[command(alias = "create")]
    Add {
        #[arg(value_enum)]
        owner: NoteOwner,
        id: String,
        content: String,
    },
    #[command(alias = "update")]
    Edit {
        note: String,
        content: String,
    },
    #[command(alias = "remove")]
    Delete {
        note: String,
    },
}

#[derive(Debug, Clone, Args)]
pub struct SearchArgs {
    /// First retreat of the range (id).
    #[arg(long)]
    pub from: String,

    /// Last retreat of the range (id).
    #[arg(long)]
    pub to: String,

    /// List servantees that attended none of the retreats instead.
    #[arg(long, action = ArgAction::SetTrue)]
    pub not_attended: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum ReportCommand {
    /// Everyone registered for a retreat.
    Attendees(ReportArgs),
    /// Servantees not registered for a retreat.
    Missing(ReportArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum FormatArg {
    #[default]
    Text,
    Json,
}

impl From<FormatArg> for ReportFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Text => ReportFormat::Text,
            FormatArg::Json => ReportFormat::Json,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct ReportArgs {
    /// Retreat id.
    pub retreat: String,

    #[arg(long, value_enum, default_value_t = FormatArg::Text)]
    pub format: FormatArg,

    /// Write to a file in DIR (the configured export directory when DIR is omitted)
    /// instead of printing.
    #[arg(long, num_args = 0..=1, value_name = "DIR", value_hint = ValueHint::DirPath)]
    pub out: Option<Option<PathBuf>>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration.
    Show,
    /// Print the path of config.toml.
    Path,
    /// Write a default config.toml if none exists.
    Init,
}

/// Accepts a calendar date (midnight UTC) or a full RFC 3339 timestamp.
pub fn parse_date(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN).and_utc());
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| format!("'{raw}' is not a date (expected YYYY-MM-DD or RFC 3339)"))
}
