use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "nexora-queue")]
#[command(about = "Durable offline operation queue for the Nexora POS")]
#[command(long_about = "nexora-queue - offline operation queue for the Nexora POS

Write operations that cannot reach the backend are persisted locally and
replayed once connectivity returns, with exponential backoff and a bounded
number of attempts.

QUICK START:
  nexora-queue send quote-creation --payload '{\"total\": 1200}'
  nexora-queue status                  Show pending operations per type
  nexora-queue drain --all             Replay everything now
  nexora-queue worker                  Run the background coordinator

QUEUE TYPES:
  quote-creation, evidence-upload, approval-confirmation,
  forgot-password, password-reset, document-retrieval

OUTPUT FORMATS:
  --output pretty    Human-readable colored output (default)
  --output json      Machine-readable JSON for scripting")]
#[command(version, propagate_version = true)]
pub struct Cli {
    /// Output format for command results
    ///
    /// Defaults to `general.default_output` from the config file.
    #[arg(short, long, value_enum, global = true)]
    pub output: Option<OutputFormat>,

    /// Path to the queue database
    #[arg(long, global = true, env = "NEXORA_DB")]
    pub db: Option<PathBuf>,

    /// Path to the config file
    #[arg(long, global = true, env = "NEXORA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Backend origin, overriding `network.base_url`
    #[arg(long, global = true, env = "NEXORA_BASE_URL")]
    pub base_url: Option<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for command results.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable colored output.
    #[default]
    Pretty,
    /// Machine-readable JSON output.
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Queue an operation for later delivery
    ///
    /// The operation is persisted immediately and replayed by the next drain.
    ///
    /// # Examples
    ///
    ///   nexora-queue enqueue forgot-password --payload '{"email":"ana@taller.mx"}'
    Enqueue {
        /// Queue type
        queue_type: String,

        /// Request body as JSON
        #[arg(long, short = 'p', default_value = "{}")]
        payload: String,
    },

    /// Show pending operations of one type
    Peek {
        /// Queue type
        queue_type: String,
    },

    /// Show pending operation counts per type
    Status,

    /// Replay pending operations now
    ///
    /// # Examples
    ///
    ///   nexora-queue drain evidence-upload
    ///   nexora-queue drain --all
    Drain {
        /// Queue type to drain
        #[arg(required_unless_present = "all")]
        queue_type: Option<String>,

        /// Drain every queue type
        #[arg(long, conflicts_with = "queue_type")]
        all: bool,
    },

    /// Send an operation, queueing it if the backend is unreachable
    Send {
        /// Queue type
        queue_type: String,

        /// Request body as JSON
        #[arg(long, short = 'p', default_value = "{}")]
        payload: String,

        /// Skip the direct attempt and queue straight away
        #[arg(long)]
        offline: bool,
    },

    /// Deliver a background sync event (tag `sync-<type>`)
    Trigger {
        /// Sync tag
        tag: String,
    },

    /// Deliver a push notification body
    Push {
        /// Raw JSON body, e.g. '{"type":"quote-creation"}'
        body: String,
    },

    /// Remove every queued operation
    Clear {
        /// Confirm removal
        #[arg(long)]
        force: bool,
    },

    /// Run the background coordinator
    ///
    /// Reads JSON triggers from stdin, one per line, until EOF:
    ///
    ///   {"kind":"sync","tag":"sync-quote-creation"}
    ///   {"kind":"message","queue":"evidence-upload"}
    ///   {"kind":"push","body":"{\"type\":\"password-reset\"}"}
    ///   {"kind":"drain_all"}
    ///
    /// Unless disabled, the backend health endpoint is polled and every
    /// queue is drained whenever it becomes reachable.
    Worker {
        /// Do not poll the health endpoint
        #[arg(long)]
        no_watch: bool,
    },

    /// Generate shell completions
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}
