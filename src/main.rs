mod audit;
mod batch;
mod cli;
mod destination;
mod error;
mod fmt;
mod loader;
mod models;
mod normalize;
mod pipeline;
mod reference;
mod settings;
mod transformer;
mod validator;
mod verifier;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{fmt as log_fmt, prelude::*, EnvFilter};

use cli::migrate::MigrateArgs;
use cli::{Cli, Commands};

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(log_fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = cli.settings().and_then(|settings| match &cli.command {
        Commands::Migrate {
            csv,
            user_id,
            yes,
            dry_run,
            tolerant,
        } => cli::migrate::run(
            &settings,
            &MigrateArgs {
                csv,
                user_id,
                yes: *yes,
                dry_run: *dry_run,
                tolerant: *tolerant,
            },
        ),
        Commands::Init => cli::init::run(&settings, &cli.settings_file()),
        Commands::Status { user_id } => cli::status::run(&settings, user_id.as_deref()),
    });

    if let Err(e) = result {
        eprintln!("{} {e}", "Error:".red().bold());
        std::process::exit(1);
    }
}
