use clap::Parser;
use khidma_cli::cli_args::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = khidma_cli::dispatch(cli).await {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
