use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use wabot::app::{select_adapter, App};
use wabot::infrastructure::config::Config;
use wabot::BotError;

#[derive(Parser)]
#[command(name = "wabot")]
#[command(about = "A plugin-based WhatsApp command bot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, env = "BOT_CONFIG", default_value = "config.yaml", global = true)]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot
    Run {
        /// Owner phone number or JID (overrides config)
        #[arg(short, long)]
        owner: Option<String>,
    },
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { owner } => run_bot(&cli.config, owner),
        Commands::Version => {
            println!("wabot v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::InitConfig => init_config(&cli.config),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run_bot(config_path: &Path, owner_override: Option<String>) -> Result<(), BotError> {
    let mut config = Config::load_or_default(config_path)?;
    if let Some(owner) = owner_override {
        config.bot.owner = owner;
        config.validate()?;
    }

    tracing::info!("Starting {} (owner {})", config.bot.name, config.owner_jid()?);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let bot = select_adapter(&config)?;
        let app = App::build(&config, bot, wabot::plugins::builtin()).await?;
        app.run().await
    })
}

fn init_config(path: &Path) -> Result<(), BotError> {
    if path.exists() {
        println!("Config file already exists at {}", path.display());
        return Ok(());
    }

    Config::default().save(path)?;
    println!("Created default config at {}", path.display());
    println!("Set bot.owner to your phone number before running.");
    Ok(())
}
