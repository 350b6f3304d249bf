mod cli;
mod demo;
mod infra;
mod routes;
mod server;
mod worker;

use idv_proofing::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
