//! Command-line interface for the `talkdata` binary.
//!
//! Every setting can also come from the environment (or a `.env` file).

use crate::HttpConfig;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::time::Duration;
use talkdata_core::logging::LogFormat;
use talkdata_core::{DateAnchor, GuardPolicy, PipelineConfig, TranslatorConfig};

#[derive(Debug, Parser)]
#[command(name = "talkdata")]
#[command(about = "Ask questions about a banking database in plain language")]
#[command(version)]
#[command(long_about = "
Talk-to-Your-Data - natural-language questions over a SQLite banking database

Questions are translated into a single SQL statement, checked by the
statement guard, executed, and answered with the SQL, a short reason and
the result rows.

SAFETY:
- Multi-statement input is never executed
- Writes are refused unless --allow-mutations is given
- Accepted questions are written to audit_logs (disable with --no-audit)

EXAMPLES:
  talkdata serve --port 4000
  talkdata ask \"What was my biggest transaction last month?\"
  talkdata schema
  talkdata --database-url sqlite://./db/banking.db test
")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(flatten)]
    pub database: DatabaseArgs,

    #[command(flatten)]
    pub pipeline: PipelineArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the HTTP API
    Serve(ServeArgs),
    /// Answer one question and print the response as JSON
    Ask(AskArgs),
    /// Print the schema catalog as JSON
    Schema,
    /// Test the database connection
    Test,
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long, env = "TALKDATA_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "TALKDATA_PORT", default_value_t = 4000)]
    pub port: u16,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub request_timeout_secs: u64,
}

impl ServeArgs {
    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            host: self.host.clone(),
            port: self.port,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

#[derive(Debug, Args)]
pub struct AskArgs {
    /// The question to answer
    #[arg(required = true)]
    pub question: Vec<String>,

    /// Print compact JSON instead of pretty-printed JSON
    #[arg(long)]
    pub compact: bool,
}

impl AskArgs {
    pub fn question(&self) -> String {
        self.question.join(" ")
    }
}

#[derive(Debug, Args)]
pub struct DatabaseArgs {
    /// Database connection URL
    #[arg(
        long,
        global = true,
        env = "DATABASE_URL",
        default_value = "sqlite://./db/banking.db",
        help = "Database connection string (credentials will be sanitized in logs)"
    )]
    pub database_url: String,

    /// Create the database file if it does not exist
    #[arg(long, global = true)]
    pub create_if_missing: bool,
}

#[derive(Debug, Args)]
pub struct PipelineArgs {
    /// Row cap for listing questions (1-200)
    #[arg(long, global = true, env = "TALKDATA_ROW_CAP", default_value_t = 200)]
    pub row_cap: u32,

    /// Timeout for slow translation handlers, in milliseconds
    #[arg(
        long,
        global = true,
        env = "TALKDATA_TRANSLATOR_TIMEOUT_MS",
        default_value_t = 5000
    )]
    pub translator_timeout_ms: u64,

    /// Fixed "today" for relative periods (YYYY-MM-DD); defaults to the current date
    #[arg(long, global = true, env = "TALKDATA_REFERENCE_DATE")]
    pub reference_date: Option<NaiveDate>,

    /// Allow statements that modify data
    #[arg(long, global = true, env = "TALKDATA_ALLOW_MUTATIONS")]
    pub allow_mutations: bool,

    /// Do not write accepted questions to audit_logs
    #[arg(long, global = true, env = "TALKDATA_NO_AUDIT")]
    pub no_audit: bool,

    /// Keep the schema catalog between requests
    #[arg(long, global = true, env = "TALKDATA_CACHE_SCHEMA")]
    pub cache_schema: bool,
}

impl PipelineArgs {
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            translator: TranslatorConfig {
                row_cap: self.row_cap,
                anchor: self
                    .reference_date
                    .map_or(DateAnchor::Now, DateAnchor::Fixed),
                handler_timeout: Duration::from_millis(self.translator_timeout_ms),
            },
            guard: GuardPolicy {
                allow_mutations: self.allow_mutations,
            },
            audit: !self.no_audit,
            await_audit: false,
            cache_schema: self.cache_schema,
        }
    }
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all output except errors")]
    pub quiet: bool,

    /// Log line format
    #[arg(long, global = true, default_value = "text", help = "Log format: text or json")]
    pub log_format: LogFormat,
}
