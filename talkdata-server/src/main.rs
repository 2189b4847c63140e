//! Talk-to-Your-Data server and command-line client.
//!
//! Opens the configured SQLite database once, assembles the query pipeline
//! around that handle and either serves the HTTP API or answers from the
//! command line. The pool is closed on exit.

use anyhow::Context;
use clap::Parser;
use talkdata_core::error::redact_database_url;
use talkdata_core::logging::init_logging;
use talkdata_core::{ConnectionConfig, PipelineConfig, QueryPipeline, Storage};
use talkdata_server::cli::{AskArgs, Cli, Command};
use talkdata_server::{AppState, serve};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(cli.global.verbose, cli.global.quiet, cli.global.log_format)?;

    let storage = open_storage(&cli).await?;
    let result = run(&cli, storage.clone()).await;
    storage.close().await;
    result
}

async fn open_storage(cli: &Cli) -> anyhow::Result<Storage> {
    let url = &cli.database.database_url;
    let config =
        ConnectionConfig::default().with_create_if_missing(cli.database.create_if_missing);

    Storage::connect(url, config)
        .await
        .with_context(|| format!("Failed to open database {}", redact_database_url(url)))
}

async fn run(cli: &Cli, storage: Storage) -> anyhow::Result<()> {
    match &cli.command {
        Command::Test => test_connection(&storage).await,
        Command::Schema => print_schema(cli, storage).await,
        Command::Ask(args) => ask(cli, storage, args).await,
        Command::Serve(args) => {
            let pipeline = build_pipeline(storage, &cli.pipeline.pipeline_config())?;
            let http = args.http_config();
            info!("Starting HTTP server on {}", http.bind_address());
            serve(AppState::new(pipeline), &http, shutdown_signal())
                .await
                .context("HTTP server failed")?;
            info!("Server stopped");
            Ok(())
        }
    }
}

fn build_pipeline(storage: Storage, config: &PipelineConfig) -> anyhow::Result<QueryPipeline> {
    #[cfg(feature = "llm")]
    {
        use talkdata_core::translator::{
            BoundedHandler, CompletionConfig, CompletionHandler, SqliteRecipientDirectory,
            Translator,
        };
        use std::sync::Arc;

        if let Some(completion) = CompletionConfig::from_env() {
            info!("Model-backed translation enabled ({})", completion.model);
            let directory = Arc::new(SqliteRecipientDirectory::new(storage.clone()));
            let translator = Translator::standard(&config.translator, directory).with_handler(
                BoundedHandler::new(
                    CompletionHandler::new(completion),
                    config.translator.handler_timeout,
                ),
            );
            return Ok(QueryPipeline::with_translator(storage, config, translator)?);
        }
    }

    Ok(QueryPipeline::new(storage, config)?)
}

/// Tests database connection and schema access
async fn test_connection(storage: &Storage) -> anyhow::Result<()> {
    info!("Testing database connection...");

    storage.test_connection().await.map_err(|e| {
        error!("Connection test failed: {}", e);
        e
    })?;

    info!("✓ Connection test successful");
    println!("Connection to SQLite database successful");
    Ok(())
}

async fn print_schema(cli: &Cli, storage: Storage) -> anyhow::Result<()> {
    let pipeline = build_pipeline(storage, &cli.pipeline.pipeline_config())?;
    let schema = pipeline.schema().await?;
    println!("{}", serde_json::to_string_pretty(schema.as_ref())?);
    Ok(())
}

async fn ask(cli: &Cli, storage: Storage, args: &AskArgs) -> anyhow::Result<()> {
    // The pool closes as soon as this returns
    let config = PipelineConfig {
        await_audit: true,
        ..cli.pipeline.pipeline_config()
    };
    let pipeline = build_pipeline(storage, &config)?;
    let response = pipeline.answer(&args.question()).await?;

    let output = if args.compact {
        serde_json::to_string(&response)?
    } else {
        serde_json::to_string_pretty(&response)?
    };
    println!("{}", output);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
