//! sheetlink CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use sheetlink_cli::cli::{Cli, Command, ConfigAction};
use sheetlink_cli::commands;
use sheetlink_cli::config::ClientConfig;
use sheetlink_cli::error::{ClientError, ClientResult};
use sheetlink_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config = match cli.config {
        Some(ref path) => ClientConfig::load_from(path).map_err(ClientError::Config)?,
        None => ClientConfig::load().map_err(ClientError::Config)?,
    };

    let tracing_config = if cli.debug || config.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::cli()
    }
    .with_format(config.log_format);
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("warning: {}", e);
    }

    let format = cli.format;
    let access_token = cli.access_token;

    match cli.command {
        Command::Auth { force } => commands::auth::run(&config, access_token, force).await,
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config),
            ConfigAction::Validate => commands::config::validate(&config, access_token),
            ConfigAction::Path => commands::config::path(),
        },
        Command::Read {
            spreadsheet_id,
            range,
        } => {
            let client = commands::values::connect(&config, access_token).await?;
            commands::values::read(&client, &spreadsheet_id, &range, format).await
        }
        Command::ReadSheet {
            spreadsheet_id,
            index,
            cells,
        } => {
            let client = commands::values::connect(&config, access_token).await?;
            commands::values::read_sheet(&client, &spreadsheet_id, index, &cells, format).await
        }
        Command::Append {
            spreadsheet_id,
            range,
            values,
        } => {
            let client = commands::values::connect(&config, access_token).await?;
            commands::values::append(&client, &spreadsheet_id, &range, &values).await
        }
        Command::Update {
            spreadsheet_id,
            range,
            values,
        } => {
            let client = commands::values::connect(&config, access_token).await?;
            commands::values::update(&client, &spreadsheet_id, &range, &values).await
        }
    }
}
