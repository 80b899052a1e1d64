use crate::report::{run_check, run_reconcile, ReconcileArgs, SourceArgs};
use crate::server;
use catalog_recon::error::AppError;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "catalog-recon",
    about = "Reconcile products with their categories from CSV exports",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every product with its categories (default command)
    Reconcile(ReconcileArgs),
    /// Load the CSV inputs and check they carry the required columns
    Check(SourceArgs),
    /// Start the HTTP service
    Serve(ServeArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Reconcile(ReconcileArgs::default()));

    match command {
        Command::Reconcile(args) => run_reconcile(args),
        Command::Check(args) => run_check(args),
        Command::Serve(args) => server::run(args).await,
    }
}
