use clap::Parser;
use kafkaprobe::cli::commands::{Cli, Commands};
use kafkaprobe::cli::handlers::{handle_check_command, handle_env_command};
use kafkaprobe::cli::utils::{init_logging, print_info};
use std::process;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.log_format);

    // Execute command
    let result = match cli.command {
        Commands::Check(args) => handle_check_command(args).await,

        Commands::Env => handle_env_command().await,

        Commands::Info => {
            print_info();
            Ok(0)
        }
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("💥 Unexpected error: {:#}", e);
            process::exit(1);
        }
    }
}
