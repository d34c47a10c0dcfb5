//! Separator CLI - Main entry point

use clap::Parser;
use separator_cli::{commands, Cli, Commands, SchemaCommand};
use separator_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Database settings may live in a .env file next to the working directory
    dotenvy::dotenv().ok();

    // Initialize logging based on verbose flag and environment
    let log_config = if cli.verbose {
        LogConfig::builder()
            .level(LogLevel::Debug)
            .output(LogOutput::Console)
            .log_file_prefix("separator-cli".to_string())
            .build()
    } else {
        LogConfig::builder()
            .level(LogLevel::Warn)
            .output(LogOutput::Console)
            .log_file_prefix("separator-cli".to_string())
            .filter_directives("sqlx=error".to_string())
            .build()
    };

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // The CLI keeps working without logging; the guard flushes file output on exit
    let _guard = init_logging(&log_config).ok();

    let result = execute_command(&cli).await;

    if let Err(e) = result {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Execute the CLI command
async fn execute_command(cli: &Cli) -> separator_cli::Result<()> {
    match &cli.command {
        Commands::Validate { file } => commands::validate::run(file).await,
        Commands::Import { file, save, json } => commands::import::run(file, *save, *json).await,
        Commands::Fetch {
            from,
            to,
            id,
            order,
            separator,
            analysis_only,
            recent,
            json,
            read_only,
        } => {
            let options = commands::fetch::FetchOptions {
                from: *from,
                to: *to,
                id: id.clone(),
                order: order.clone(),
                separator: separator.clone(),
                analysis_only: *analysis_only,
                recent: *recent,
                json: *json,
                read_only: *read_only,
            };
            commands::fetch::run(options).await
        },
        Commands::Update {
            id,
            order,
            separator,
            date,
            clear_date,
            analysis,
        } => {
            let fields = commands::update::UpdateFields {
                order: order.clone(),
                separator: separator.clone(),
                date: date.clone(),
                clear_date: *clear_date,
                analysis: *analysis,
            };
            commands::update::run(*id, fields).await
        },
        Commands::Delete { id } => commands::delete::run(*id).await,
        Commands::Schema { command } => match command {
            SchemaCommand::Check => commands::schema::check().await,
            SchemaCommand::Init => commands::schema::init().await,
        },
    }
}
