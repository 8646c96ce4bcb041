use clap::{Parser, Subcommand};
use geolens::GeolensConfig;
use tracing::Level;

mod commands;

use commands::config::ConfigArgs;
use commands::lookup::LookupArgs;
use commands::update::UpdateArgs;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.geolens/geolens.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long)]
    debug: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up one or more IP addresses in the configured editions.
    Lookup(LookupArgs),

    /// Download the latest snapshot of each edition.
    Update(UpdateArgs),

    /// Show configuration and dataset file status.
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = match GeolensConfig::new(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ERROR: {e}");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Lookup(args) => commands::lookup::run(&config, args).await,
        Commands::Update(args) => commands::update::run(&config, args).await,
        Commands::Config(args) => commands::config::run(&config, args),
    };

    if let Err(e) = result {
        eprintln!("ERROR: {e:#}");
        std::process::exit(1);
    }
}
