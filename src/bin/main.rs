use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use inspection_report::cache::InMemoryStore;
use inspection_report::client::{ReportApi, get_configured_client};
use inspection_report::commands::CommandError;
use inspection_report::commands::download::DownloadCommand;
use inspection_report::commands::list::ListCommand;
use inspection_report::parameters::Commands;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "inspection-report-cli")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<(), Box<dyn Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli_command = Cli::parse();

    info!("connecting to the inspection API");
    let mut client = get_configured_client(Arc::new(InMemoryStore::new())).inspect_err(|e| {
        error!("building the API client: {e}");
    })?;

    let result = run(&client, cli_command.command);
    client.close();

    result.inspect_err(|e| error!("{e}")).map_err(Into::into)
}

fn run<R: ReportApi>(api: &R, command: Commands) -> Result<(), CommandError> {
    match command {
        Commands::List { filters } => {
            let listing = ListCommand::new(api).list(&filters.to_query())?;
            println!("{listing}");
        }
        Commands::Download {
            filters,
            file_type,
            output_dir,
        } => {
            let query = filters.to_query().with_file_type(file_type.into());
            let destination = output_dir.unwrap_or_else(std::env::temp_dir);
            let outcome = DownloadCommand::new(api).download(&query, &destination)?;
            println!("{outcome}");
        }
    }
    Ok(())
}
