use anyhow::Result;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;

use lib::agent::AgentOrchestrator;
use lib::catalog::CatalogClient;
use lib::channels::{InboundMessage, OutboundSender};
use lib::debounce::MessageDebouncer;
use lib::history::MemoryHistoryStore;
use lib::llm::OpenAiClient;
use lib::router::ConversationRouter;
use lib::service::BotService;
use lib::state::MemoryConfigStore;
use lib::tools::default_registry;

#[derive(Parser)]
#[command(name = "tiendita")]
#[command(about = "Tiendita sales bot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config file.
    Init {
        /// Config file path (default: TIENDITA_CONFIG_PATH or ~/.tiendita/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Chat with the bot through a local stdin/stdout transport. Runs the
    /// full pipeline (debouncer, router, agent) with in-memory stores.
    Chat {
        /// Config file path (default: TIENDITA_CONFIG_PATH or ~/.tiendita/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Sender id to impersonate (use an authorized number to try admin commands)
        #[arg(long, default_value = "local-user")]
        sender: String,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("tiendita {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Chat { config, sender }) => {
            if let Err(e) = run_chat(config, sender).await {
                log::error!("chat failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

/// Prints replies as they arrive (they may lag a prompt by the quiet period).
struct StdoutSender;

#[async_trait]
impl OutboundSender for StdoutSender {
    async fn send(&self, _sender_id: &str, text: &str) -> Result<(), String> {
        println!("< {}", text);
        Ok(())
    }
}

async fn run_chat(config_path: Option<std::path::PathBuf>, sender: String) -> Result<()> {
    use std::io::{self, BufRead, Write};

    let (config, path) = lib::config::load_config(config_path)?;
    log::info!("using config from {}", path.display());

    let environment = lib::config::resolve_environment(&config);
    let catalog = Arc::new(CatalogClient::new(
        config.api.base_url.clone(),
        Duration::from_secs(config.api.timeout_secs),
    ));
    let backend = OpenAiClient::new(
        Some(config.llm.base_url.clone()),
        lib::config::resolve_llm_api_key(&config),
        Duration::from_secs(config.llm.timeout_secs),
    );
    let history = Arc::new(MemoryHistoryStore::new());
    let agent = AgentOrchestrator::new(
        backend,
        config.llm.model.clone(),
        catalog.clone(),
        default_registry(catalog),
        history,
    );

    let debouncer = MessageDebouncer::new(Duration::from_millis(config.bot.debounce_ms));
    let state_store = Arc::new(MemoryConfigStore::new());
    let router = Arc::new(
        ConversationRouter::load(
            state_store,
            environment,
            &config.bot.authorized_numbers,
            agent,
            debouncer.clone(),
        )
        .await,
    );
    let service = BotService::start(debouncer, router, Arc::new(StdoutSender));

    println!("Chat as {} ('/exit' to quit; replies follow the quiet period)", sender);
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
            break;
        }
        service
            .handle_inbound(InboundMessage::text(sender.clone(), input))
            .await;
    }

    Ok(())
}
