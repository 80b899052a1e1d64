mod cli;
mod infra;
mod report;
mod routes;
mod server;

use catalog_recon::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
