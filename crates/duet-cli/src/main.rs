use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::DuetConfig;
use duet_core::{
    ChatService, CohereGenerator, ConversationStore, GeminiGenerator, InMemoryConversationStore,
    KeywordPredicate, Providers, ResponseOrchestrator, WikipediaLookup,
};
use duet_gateway::{GatewayServer, IdentityResolver};
use duet_store::SqliteConversationStore;

#[derive(Parser)]
#[command(name = "duet")]
#[command(version)]
#[command(about = "duet - a two-model chat backend")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config directory and default config
    Init,

    /// Show current configuration
    Config,

    /// Serve the chat gateway until Ctrl+C
    Serve,

    /// Answer a single prompt and print the reply
    Ask {
        /// The prompt to send
        prompt: String,

        /// Also print which fallback step produced the reply
        #[arg(long)]
        trace: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over the flag
    let filter = if cli.debug { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Commands::Init => cmd_init().await,
        Commands::Config => cmd_config(&cli.config).await,
        Commands::Serve => cmd_serve(&cli.config).await,
        Commands::Ask { prompt, trace } => cmd_ask(&cli.config, &prompt, trace).await,
    }
}

async fn cmd_init() -> Result<()> {
    let config_dir = config::config_dir();
    tokio::fs::create_dir_all(&config_dir)
        .await
        .with_context(|| format!("Failed to create config dir: {}", config_dir.display()))?;

    let config_path = config_dir.join("config.toml");
    if config_path.exists() {
        warn!("Config already exists at {}", config_path.display());
    } else {
        let default_config = include_str!("../../../config/default.toml");
        tokio::fs::write(&config_path, default_config).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&config_path, std::fs::Permissions::from_mode(0o600))
                .await
                .context("Failed to restrict config permissions")?;
        }
        info!("Created default config at {}", config_path.display());
    }

    println!("duet initialized at {}", config_dir.display());
    println!(
        "Set GEMINI_API_KEY, COHERE_API_KEY and DUET_GATEWAY_TOKEN, or edit {}.",
        config_path.display()
    );
    Ok(())
}

async fn cmd_config(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = DuetConfig::load(config_path)?;
    println!("{:#?}", cfg);
    Ok(())
}

fn build_orchestrator(cfg: &DuetConfig) -> ResponseOrchestrator {
    let primary = GeminiGenerator::new(cfg.providers.gemini.api_key.clone())
        .with_base_url(&cfg.providers.gemini.base_url);
    let secondary = CohereGenerator::new(cfg.providers.cohere.api_key.clone())
        .with_base_url(&cfg.providers.cohere.base_url);
    let reference = WikipediaLookup::new().with_base_url(&cfg.reference.base_url);
    let code_request =
        KeywordPredicate::code_request().extend(cfg.orchestrator.extra_code_keywords.iter());

    info!(
        "Code-request keywords: {}",
        code_request.keywords().join(", ")
    );

    let providers = Providers::new(Arc::new(primary), Arc::new(secondary), Arc::new(reference))
        .with_code_predicate(Arc::new(code_request));
    ResponseOrchestrator::new(providers)
}

async fn cmd_serve(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = DuetConfig::load(config_path)?;
    info!("Starting duet gateway...");

    let db_path = config::expand_home(&cfg.storage.db_path);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let store: Arc<dyn ConversationStore> = Arc::new(
        SqliteConversationStore::new(&db_path).context("Failed to open conversation store")?,
    );

    let orchestrator = Arc::new(build_orchestrator(&cfg));
    info!("Fallback ladder: {}", orchestrator.ladder_names().join(" -> "));
    let chat = Arc::new(ChatService::new(store, orchestrator));

    let identity = IdentityResolver::new(cfg.gateway.credentials());
    if identity.user_count() == 0 {
        warn!("No gateway users configured; every chat request will be rejected");
    }

    let bind: SocketAddr = format!("{}:{}", cfg.gateway.bind, cfg.gateway.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid gateway address {}:{}",
                cfg.gateway.bind, cfg.gateway.port
            )
        })?;

    let cancel = CancellationToken::new();
    let mut server = GatewayServer::new(bind, chat, identity).spawn(cancel.clone());

    tokio::select! {
        res = signal::ctrl_c() => {
            res?;
            info!("Received Ctrl+C, shutting down...");
            cancel.cancel();
            server.await.context("Gateway task panicked")??;
        }
        res = &mut server => {
            // The gateway exited on its own, usually a bind failure
            res.context("Gateway task panicked")??;
        }
    }

    println!("duet stopped.");
    Ok(())
}

async fn cmd_ask(config_path: &Option<PathBuf>, prompt: &str, trace: bool) -> Result<()> {
    let cfg = DuetConfig::load(config_path)?;

    let orchestrator = Arc::new(build_orchestrator(&cfg));
    let chat = ChatService::new(Arc::new(InMemoryConversationStore::new()), orchestrator);

    let owner = std::env::var("USER").unwrap_or_else(|_| "local".to_string());
    let conversation = chat.create(&owner, "duet ask").await?;
    let (reply, strategy) = chat.send_detailed(&owner, &conversation.id, prompt).await?;

    if trace {
        println!("[{}]", strategy);
    }
    println!("{}", reply.content);
    Ok(())
}
