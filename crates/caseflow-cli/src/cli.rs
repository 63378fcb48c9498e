use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "caseflow")]
#[command(about = "Track maintenance cases offline and sync them when the service is reachable")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Base URL of the case service
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Bearer token for the case service
    #[arg(long, global = true, value_name = "TOKEN")]
    pub token: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create, edit and inspect cases
    Case {
        #[command(subcommand)]
        command: CaseCommands,
    },
    /// Add notes to a case
    Note {
        #[command(subcommand)]
        command: NoteCommands,
    },
    /// Attach a file to a case
    Attach {
        /// Case id (server id or local id)
        case: String,
        /// File to attach
        file: PathBuf,
        /// Override the MIME type guessed from the file name
        #[arg(long, value_name = "TYPE")]
        mime: Option<String>,
    },
    /// Record a scanned QR code
    Scan {
        /// Decoded QR payload, e.g. '{"caseId": 42, "title": "Laptop"}'
        payload: String,
        /// Queue the scan without trying the service
        #[arg(long)]
        offline: bool,
    },
    /// Push local changes to the case service
    Sync,
    /// Show sync status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show recent sync passes
    History {
        /// Number of entries to show
        #[arg(short, long)]
        limit: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List sync queue items
    Queue {
        /// Only items of this status
        #[arg(long, value_enum)]
        status: Option<QueueStatusArg>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List every record still waiting to be synced
    Pending {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Drop failed queue items and reset the sync status
    ClearErrors,
    /// Watch connectivity and sync whenever the service comes back
    Watch {
        /// Seconds between connectivity probes
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },
    /// Manage the CLI config file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum CaseCommands {
    /// Create a case
    Add(CaseFields),
    /// Change fields of an existing case
    Update {
        /// Case id (server id or local id)
        id: String,
        #[command(flatten)]
        fields: CaseUpdateFields,
    },
    /// List cases
    List {
        /// Number of cases to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Only cases with this status
        #[arg(long)]
        status: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a case with its notes and attachments
    Show {
        /// Case id (server id or local id)
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
pub struct CaseFields {
    /// Short title
    #[arg(long)]
    pub title: String,
    #[arg(long, default_value = "")]
    pub client_name: String,
    #[arg(long, default_value = "")]
    pub client_phone: String,
    #[arg(long, default_value = "")]
    pub device_type: String,
    #[arg(long, default_value = "")]
    pub device_model: String,
    #[arg(long)]
    pub serial_number: Option<String>,
    /// Initial status (defaults to "new")
    #[arg(long)]
    pub status: Option<String>,
    #[arg(long)]
    pub priority: Option<String>,
    /// What is wrong with the device
    #[arg(long, default_value = "")]
    pub issue: String,
    #[arg(long)]
    pub case_number: Option<String>,
    #[arg(long)]
    pub technician: Option<String>,
}

#[derive(Args)]
pub struct CaseUpdateFields {
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub client_name: Option<String>,
    #[arg(long)]
    pub client_phone: Option<String>,
    #[arg(long)]
    pub device_type: Option<String>,
    #[arg(long)]
    pub device_model: Option<String>,
    #[arg(long)]
    pub serial_number: Option<String>,
    #[arg(long)]
    pub status: Option<String>,
    #[arg(long)]
    pub priority: Option<String>,
    #[arg(long)]
    pub issue: Option<String>,
    #[arg(long)]
    pub diagnosis: Option<String>,
    #[arg(long)]
    pub solution: Option<String>,
    #[arg(long)]
    pub technician: Option<String>,
}

#[derive(Subcommand)]
pub enum NoteCommands {
    /// Add a note to a case
    Add {
        /// Case id (server id or local id)
        case: String,
        /// Note text
        text: Vec<String>,
        /// Author shown with the note
        #[arg(long, default_value = "technician")]
        author: String,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum QueueStatusArg {
    Pending,
    Processing,
    Error,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Create or update the config file
    Init {
        /// Base URL of the case service
        #[arg(long, value_name = "URL")]
        api_url: Option<String>,
        /// Bearer token for the case service
        #[arg(long, value_name = "TOKEN")]
        token: Option<String>,
        /// Request timeout in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
        /// Attempts before a failed QR scan stops being retried
        #[arg(long, value_name = "N")]
        max_retries: Option<u32>,
    },
    /// Print the effective configuration
    Show,
}
