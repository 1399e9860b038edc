// src/main.rs

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    armlink::cli::run().await
}
