//! Lighthouse CLI tool.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "lighthouse")]
#[command(about = "Keeps watched repositories built and running", long_about = None)]
struct Cli {
    /// System configuration file
    #[arg(long, env = "LIGHTHOUSE_CONFIG", default_value = "lighthouse.kdl")]
    config: PathBuf,

    /// Override the download area
    #[arg(long, env = "LIGHTHOUSE_DOWNLOAD_DIR")]
    download_dir: Option<PathBuf>,

    /// Override the staging area
    #[arg(long, env = "LIGHTHOUSE_STAGING_DIR")]
    staging_dir: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, rebuild and restart a watched repository
    Build {
        /// Display or container name
        name: String,
    },
    /// Start a container, or every watched one with `all`
    Start { name: String },
    /// Stop a container, or every watched one with `all`
    Stop { name: String },
    /// Restart a container
    Restart { name: String },
    /// Show whether a container is running
    Status { name: String },
    /// List containers
    Ps {
        /// Include stopped containers
        #[arg(short, long)]
        all: bool,
    },
    /// Start every watched container that is not running
    Init,
    /// Manage the watch list
    Repos {
        #[command(subcommand)]
        command: RepoCommands,
    },
    /// Empty the download and staging areas
    Clean,
}

#[derive(Subcommand)]
enum RepoCommands {
    /// List watched repositories
    List,
    /// Watch a GitHub repository
    Add {
        /// Name shown in listings
        display_name: String,
        /// https://github.com/<owner>/<repo>
        url: String,
    },
    /// Stop watching a repository
    Remove { display_name: String },
    /// Change a repository's display name
    Rename { current: String, new_name: String },
    /// Point a repository at a different GitHub URL
    SetUrl { display_name: String, url: String },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let config = commands::load_config(&cli.config, cli.download_dir, cli.staging_dir)?;

    match cli.command {
        Commands::Build { name } => commands::build::build(&config, &name).await?,
        Commands::Start { name } => commands::containers::start(&config, &name).await?,
        Commands::Stop { name } => commands::containers::stop(&config, &name).await?,
        Commands::Restart { name } => commands::containers::restart(&config, &name).await?,
        Commands::Status { name } => commands::containers::status(&config, &name).await?,
        Commands::Ps { all } => commands::containers::ps(all).await?,
        Commands::Init => commands::containers::init(&config).await?,
        Commands::Repos { command } => match command {
            RepoCommands::List => commands::repos::list(&config)?,
            RepoCommands::Add { display_name, url } => {
                commands::repos::add(&config, &display_name, &url)?
            }
            RepoCommands::Remove { display_name } => {
                commands::repos::remove(&config, &display_name)?
            }
            RepoCommands::Rename { current, new_name } => {
                commands::repos::rename(&config, &current, &new_name)?
            }
            RepoCommands::SetUrl { display_name, url } => {
                commands::repos::set_url(&config, &display_name, &url)?
            }
        },
        Commands::Clean => commands::build::clean(&config).await?,
    }

    Ok(())
}
