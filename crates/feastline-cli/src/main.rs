use anyhow::Result;
use clap::{Parser, Subcommand};
use feastline_core::session::Role;
use feastline_infrastructure::FeastlinePaths;
use std::path::PathBuf;

mod commands;
mod logging;
mod toast;

#[derive(Parser)]
#[command(name = "feastline")]
#[command(about = "Feastline - live order, product and wallet updates in your terminal", long_about = None)]
struct Cli {
    /// Log filter, e.g. `debug` or `feastline_interaction=trace` (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Also write logs to a daily file under the log directory
    #[arg(long, global = true)]
    log_file: bool,

    /// Root directory for config and data (defaults to the platform dirs)
    #[arg(long, global = true, env = "FEASTLINE_HOME")]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect as a user and print notifications until Ctrl-C
    Listen {
        #[arg(long)]
        user_id: String,

        #[arg(long, default_value = "customer", value_parser = parse_role)]
        role: Role,

        /// Event service URL (overrides config and FEASTLINE_SOCKET_URL)
        #[arg(long)]
        url: Option<String>,

        #[arg(long, default_value = "default")]
        profile: String,

        /// Erase cached notifications on exit, as a logout does
        #[arg(long)]
        logout: bool,
    },
    /// Inspect or erase cached notifications
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Print cached notifications and the unread counter
    Show {
        #[arg(long, default_value = "default")]
        profile: String,
    },
    /// Erase cached notifications
    Clear {
        #[arg(long, default_value = "default")]
        profile: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn parse_role(value: &str) -> std::result::Result<Role, String> {
    value
        .parse::<Role>()
        .map_err(|_| format!("unknown role '{}' (customer, admin, super-admin)", value))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let paths = FeastlinePaths::new(cli.home);

    let log_dir = if cli.log_file {
        Some(paths.logs_dir()?)
    } else {
        None
    };
    let _guard = logging::init(cli.log_level.as_deref(), log_dir)?;

    match cli.command {
        Commands::Listen {
            user_id,
            role,
            url,
            profile,
            logout,
        } => {
            commands::listen::run(
                &paths,
                commands::listen::ListenArgs {
                    user_id,
                    role,
                    url,
                    profile,
                    logout,
                },
            )
            .await?
        }
        Commands::Cache { action } => match action {
            CacheAction::Show { profile } => commands::cache::show(&paths, &profile)?,
            CacheAction::Clear { profile } => commands::cache::clear(&paths, &profile)?,
        },
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show(&paths)?,
            ConfigAction::Init { force } => commands::config::init(&paths, force)?,
        },
    }

    Ok(())
}
