use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use sgc_core::models::{EmployeeRole, GraveKind, UserRole};

#[derive(Parser)]
#[command(name = "sgc")]
#[command(about = "Cemetery records with offline-first remote sync")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// CLI profile name for remote configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,

    /// Never contact the remote; every change is queued
    #[arg(long, global = true)]
    pub offline: bool,

    /// Username performing the command
    #[arg(long, global = true, value_name = "USERNAME", default_value = "admin")]
    pub user: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show connectivity, sync state and queue size
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Publish queued changes, then refresh local data from the remote
    Sync {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Keep probing the remote and sync on every reconnect
    Watch,
    /// Inspect the pending-operations queue
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
    /// Manage graves and burials
    Grave {
        #[command(subcommand)]
        command: GraveCommands,
    },
    /// Manage cemeteries
    Cemetery {
        #[command(subcommand)]
        command: CemeteryCommands,
    },
    /// Manage employees
    Employee {
        #[command(subcommand)]
        command: EmployeeCommands,
    },
    /// Manage system users
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Internal messages
    Message {
        #[command(subcommand)]
        command: MessageCommands,
    },
    /// Show the audit trail, newest first
    Logs {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum QueueCommands {
    /// List pending operations in replay order
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List operations the remote refused
    DeadLetters {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Move dead letters back to the queue
    Requeue {
        /// Dead letter index (all when omitted)
        index: Option<usize>,
    },
}

/// Location of a grave inside a cemetery
#[derive(Args, Clone, Debug)]
pub struct LocationArgs {
    /// Cemetery id
    #[arg(long)]
    pub cemetery: i64,
    /// Block (quadra)
    #[arg(long)]
    pub block: String,
    /// Lot (lote)
    #[arg(long)]
    pub lot: String,
    /// Grave (sepultura)
    #[arg(long)]
    pub plot: String,
}

#[derive(Subcommand)]
pub enum GraveCommands {
    /// Register a grave, or one grave per drawer
    Add {
        /// Cemetery id
        #[arg(long)]
        cemetery: i64,
        /// Block (quadra)
        #[arg(long)]
        block: String,
        /// Lot (lote)
        #[arg(long)]
        lot: String,
        /// Grave name; defaults to S1
        #[arg(long)]
        plot: Option<String>,
        /// Construction type
        #[arg(long, value_enum, default_value_t = GraveKindArg::Tomb)]
        kind: GraveKindArg,
        /// Number of drawers; more than one creates G1..Gn
        #[arg(long, default_value = "1")]
        drawers: u32,
        /// Family name
        #[arg(long)]
        family: Option<String>,
        /// Latitude (decimal point or comma)
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<String>,
        /// Longitude (decimal point or comma)
        #[arg(long, allow_hyphen_values = true)]
        lng: Option<String>,
    },
    /// List graves
    List {
        /// Only graves of this cemetery
        #[arg(long)]
        cemetery: Option<i64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record a burial (or edit the existing one as ADMIN)
    Burial(Box<BurialArgs>),
    /// Clear the burial recorded in a grave (ADMIN)
    RemoveBurial {
        #[command(flatten)]
        location: LocationArgs,
    },
}

#[derive(Args, Clone, Debug)]
pub struct BurialArgs {
    #[command(flatten)]
    pub location: LocationArgs,
    /// Name of the deceased
    #[arg(long)]
    pub deceased: String,
    #[arg(long, default_value = "")]
    pub birth_date: String,
    #[arg(long, default_value = "")]
    pub death_date: String,
    #[arg(long, default_value = "")]
    pub cause: String,
    /// Death certificate number
    #[arg(long, default_value = "")]
    pub certificate: String,
    #[arg(long, default_value = "")]
    pub issuing_body: String,
    /// Responsible party's name
    #[arg(long, default_value = "")]
    pub responsible: String,
    #[arg(long, default_value = "")]
    pub document: String,
    #[arg(long, default_value = "")]
    pub phone: String,
    #[arg(long, default_value = "")]
    pub address: String,
    /// Employee id of the gravedigger
    #[arg(long, default_value = "0")]
    pub gravedigger: i64,
    /// Burial authorization number
    #[arg(long)]
    pub authorization: String,
}

#[derive(Subcommand)]
pub enum CemeteryCommands {
    /// Register a cemetery
    Add {
        /// Cemetery name
        name: String,
        #[arg(long, default_value = "")]
        address: String,
        #[arg(long)]
        postal_code: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long, default_value = "", allow_hyphen_values = true)]
        lat: String,
        #[arg(long, default_value = "", allow_hyphen_values = true)]
        lng: String,
        /// Name of the cemetery manager
        #[arg(long, default_value = "")]
        manager: String,
    },
    /// List cemeteries
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum EmployeeCommands {
    /// Register an employee
    Add {
        /// Employee name
        name: String,
        #[arg(long, value_enum)]
        role: EmployeeRoleArg,
        /// Registration number
        #[arg(long, default_value = "")]
        registration: String,
    },
    /// List employees
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create a user (ADMIN)
    Add {
        username: String,
        /// Display name; defaults to the username
        #[arg(long)]
        name: Option<String>,
        #[arg(long, value_enum, default_value_t = UserRoleArg::Standard)]
        role: UserRoleArg,
        /// At least 6 letters or digits
        #[arg(long)]
        password: String,
    },
    /// Edit a user (ADMIN, or the user themselves)
    Update {
        /// User id
        id: i64,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, value_enum)]
        role: Option<UserRoleArg>,
        /// Profile photo URL
        #[arg(long)]
        photo: Option<String>,
        /// New password
        #[arg(long)]
        password: Option<String>,
    },
    /// Remove a user (ADMIN)
    Delete {
        /// User id
        id: i64,
    },
    /// List users
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum MessageCommands {
    /// Send a message to another user
    Send {
        /// Receiver username
        to: String,
        /// Message text
        content: Vec<String>,
    },
    /// List messages exchanged with the acting user
    List {
        /// Only the conversation with this username
        #[arg(long)]
        with: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Remote (PostgREST) project URL
        #[arg(long, value_name = "URL")]
        remote_url: Option<String>,
        /// Remote anon/public key
        #[arg(long, value_name = "KEY")]
        anon_key: Option<String>,
        /// Local database file for this profile
        #[arg(long, value_name = "PATH")]
        db: Option<PathBuf>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Show the resolved profile
    Show,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum GraveKindArg {
    Tomb,
    Chapel,
    Vault,
    Earth,
    Ossuary,
}

impl From<GraveKindArg> for GraveKind {
    fn from(value: GraveKindArg) -> Self {
        match value {
            GraveKindArg::Tomb => Self::Tomb,
            GraveKindArg::Chapel => Self::Chapel,
            GraveKindArg::Vault => Self::Vault,
            GraveKindArg::Earth => Self::EarthGrave,
            GraveKindArg::Ossuary => Self::Ossuary,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum EmployeeRoleArg {
    Gravedigger,
    GeneralServices,
    Administrative,
    Watchman,
}

impl From<EmployeeRoleArg> for EmployeeRole {
    fn from(value: EmployeeRoleArg) -> Self {
        match value {
            EmployeeRoleArg::Gravedigger => Self::Gravedigger,
            EmployeeRoleArg::GeneralServices => Self::GeneralServices,
            EmployeeRoleArg::Administrative => Self::Administrative,
            EmployeeRoleArg::Watchman => Self::Watchman,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum UserRoleArg {
    Admin,
    Standard,
}

impl From<UserRoleArg> for UserRole {
    fn from(value: UserRoleArg) -> Self {
        match value {
            UserRoleArg::Admin => Self::Admin,
            UserRoleArg::Standard => Self::Standard,
        }
    }
}
