mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    config::ConfigSubcommand, diagram::DiagramSubcommand, profile::ProfileSubcommand,
    run::RunArgs, tickets::TicketsSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "reqgenie",
    about = "Turn a one-line requirement into a refined requirements document, tests, code, diagrams and tickets",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .reqgenie/ or .git/)
    #[arg(long, global = true, env = "REQGENIE_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .reqgenie/ with a default config
    Init,

    /// Elaborate a requirement and generate the enabled artifacts
    Run(RunArgs),

    /// Validate or render diagrams source
    Diagram {
        #[command(subcommand)]
        subcommand: DiagramSubcommand,
    },

    /// Publish a ticket plan to Jira
    Tickets {
        #[command(subcommand)]
        subcommand: TicketsSubcommand,
    },

    /// Fetch and manage personality profiles
    Profile {
        #[command(subcommand)]
        subcommand: ProfileSubcommand,
    },

    /// Get communication advice for a message to a profiled person
    Advise {
        /// Profile name or file stem (e.g. "Ada Lovelace" or Ada_Lovelace)
        profile: String,
        /// The message or situation to get advice on
        message: String,
    },

    /// Show or validate the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Run(_) => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Run(args) => cmd::run::run(&root, args, cli.json),
        Commands::Diagram { subcommand } => cmd::diagram::run(&root, subcommand, cli.json),
        Commands::Tickets { subcommand } => cmd::tickets::run(&root, subcommand, cli.json),
        Commands::Profile { subcommand } => cmd::profile::run(&root, subcommand, cli.json),
        Commands::Advise { profile, message } => {
            cmd::advise::run(&root, &profile, &message, cli.json)
        }
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
