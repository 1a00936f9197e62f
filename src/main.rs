mod api;
mod commands;
mod gateway;
mod stickers;

use clap::{Parser, Subcommand};
use commands::CommandRegistry;
use gateway::{ConnectionControl, Gateway, GatewaySettings};
use std::sync::Arc;
use std::time::{Duration, Instant};
use stickers::StickerCache;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use yamato_channels::{
    credentials::CredentialStore,
    whatsapp::{ConnectionManager, ManagerSettings, WhatsAppConnector},
};
use yamato_core::{config, traits::Provider};
use yamato_memory::Store;
use yamato_plugins::{install_bundled_commands, spawn_watcher};
use yamato_providers::{OpenAiProvider, Persona};

#[derive(Parser)]
#[command(
    name = "yamato",
    version,
    about = "Yamato — WhatsApp persona bot with self-healing connection management"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to WhatsApp and start answering messages.
    Start,
    /// Show configuration, credential and command status.
    Status,
    /// List loaded commands and their aliases.
    Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut cfg = config::load(&cli.config)?;
    cfg.apply_env();

    match cli.command {
        Commands::Start => {
            let _guard = init_logging(&cfg, true)?;
            start(cfg).await?;
        }
        Commands::Status => {
            let _guard = init_logging(&cfg, false)?;
            print_status(&cli.config, &cfg);
        }
        Commands::Commands => {
            let _guard = init_logging(&cfg, false)?;
            print_commands(&cfg)?;
        }
    }

    Ok(())
}

/// Stdout logging, plus a daily rolling file under `{data_dir}/logs` when
/// `with_file` is set. `RUST_LOG` wins over the configured level.
fn init_logging(
    cfg: &config::Config,
    with_file: bool,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.bot.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout = tracing_subscriber::fmt::layer();

    if !with_file {
        tracing_subscriber::registry().with(filter).with(stdout).init();
        return Ok(None);
    }

    let logs_dir = cfg.logs_dir();
    std::fs::create_dir_all(&logs_dir)?;
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&logs_dir, "yamato.log"));
    tracing_subscriber::registry()
        .with(filter)
        .with(stdout)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer),
        )
        .init();
    Ok(Some(guard))
}

async fn start(cfg: config::Config) -> anyhow::Result<()> {
    println!("⚔️  {} — starting...", cfg.bot.name);
    let started = Instant::now();

    // AI provider (optional).
    let provider: Option<Arc<dyn Provider>> = if cfg.provider.api_key.trim().is_empty() {
        warn!("GROQ_API_KEY not set, replies will come from the fallback list");
        None
    } else {
        Some(Arc::new(OpenAiProvider::from_config(&cfg.provider)?))
    };
    let persona = Persona::new(
        cfg.persona.clone(),
        provider,
        Persona::retry_policy(&cfg.provider),
    );

    // Persistent data.
    let store = Arc::new(Store::open(&cfg.store_path().to_string_lossy()).await?);
    let stickers = Arc::new(StickerCache::load(&cfg.stickers_dir())?);

    // Commands.
    let commands_dir = cfg.commands_dir();
    install_bundled_commands(&commands_dir);
    let registry = Arc::new(CommandRegistry::new(commands_dir.clone()));
    if let Err(e) = registry.load() {
        error!("initial command load failed: {e}");
    }
    let _watcher = if cfg.commands.watch {
        let (tx, mut rx) = mpsc::channel::<()>(4);
        let stop = spawn_watcher(
            commands_dir,
            Duration::from_millis(cfg.commands.reload_debounce_ms),
            tx,
        );
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            while rx.recv().await.is_some() {
                info!("command files changed, reloading");
                if let Err(e) = registry.load() {
                    error!("command reload failed, keeping previous commands: {e}");
                }
            }
        });
        Some(stop)
    } else {
        None
    };

    // Connection.
    let credentials = CredentialStore::new(cfg.auth_dir());
    credentials.ensure()?;
    let (manager, handle, batches) = ConnectionManager::new(
        Arc::new(WhatsAppConnector::new()),
        credentials,
        ManagerSettings::from_config(&cfg.connection),
    );
    let manager_task = tokio::spawn(manager.run());
    let connection: Arc<dyn ConnectionControl> = Arc::new(handle.clone());

    // HTTP status surface.
    if cfg.api.enabled {
        let state = api::ApiState::new(cfg.bot.name.clone(), Arc::clone(&connection), started);
        tokio::spawn(api::serve(cfg.api.clone(), state));
    }

    // Gateway.
    let gateway = Arc::new(Gateway::new(
        GatewaySettings {
            bot_name: cfg.bot.name.clone(),
            prefix: cfg.commands.prefix.clone(),
            admin: cfg.admin.clone(),
            max_retries: cfg.connection.max_retries,
        },
        persona,
        Arc::clone(&store),
        stickers,
        registry,
        connection,
    ));
    let mut gateway_task = tokio::spawn(gateway.run(batches));

    tokio::select! {
        _ = shutdown_signal() => info!("received shutdown signal"),
        _ = &mut gateway_task => warn!("gateway stopped unexpectedly"),
    }

    // Graceful shutdown.
    handle.shutdown().await;
    if tokio::time::timeout(Duration::from_secs(10), manager_task)
        .await
        .is_err()
    {
        warn!("connection manager did not stop in time");
    }
    if let Err(e) = store.flush().await {
        error!("failed to flush store on shutdown: {e}");
    }
    gateway_task.abort();
    info!("shutdown complete");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

fn print_status(config_path: &str, cfg: &config::Config) {
    let credentials = CredentialStore::new(cfg.auth_dir());
    println!("⚔️  {} — Status\n", cfg.bot.name);
    println!("Config:       {config_path}");
    println!("Data dir:     {}", config::shellexpand(&cfg.bot.data_dir));
    println!(
        "Session:      {}",
        if credentials.exists() {
            "paired (credentials present)"
        } else {
            "not paired (QR scan needed on start)"
        }
    );
    println!(
        "AI provider:  {} ({})",
        cfg.provider.model,
        if cfg.provider.api_key.trim().is_empty() {
            "no API key, fallback replies only"
        } else {
            "configured"
        }
    );
    println!(
        "Admins:       {}",
        if cfg.admin.numbers.is_empty() {
            "none".to_string()
        } else {
            cfg.admin.numbers.join(", ")
        }
    );
    println!(
        "HTTP status:  {}",
        if cfg.api.enabled {
            format!("{}:{}", cfg.api.host, cfg.api.port)
        } else {
            "disabled".to_string()
        }
    );

    let commands_dir = cfg.commands_dir();
    match yamato_plugins::load_manifests(&commands_dir) {
        Ok(report) => println!(
            "Commands:     {} manifests in {} ({} rejected)",
            report.manifests.len(),
            commands_dir.display(),
            report.rejected.len()
        ),
        Err(_) => println!(
            "Commands:     {} missing (created on start)",
            commands_dir.display()
        ),
    }
    match StickerCache::read(&cfg.stickers_dir()) {
        Ok(cache) if cache.is_empty() => println!("Stickers:     none"),
        Ok(cache) => println!("Stickers:     {}", cache.len()),
        Err(e) => println!("Stickers:     unreadable ({e})"),
    }
}

fn print_commands(cfg: &config::Config) -> anyhow::Result<()> {
    let registry = CommandRegistry::new(cfg.commands_dir());
    registry.load()?;
    let table = registry.snapshot();
    if table.is_empty() {
        println!("No commands loaded from {}", registry.dir().display());
        return Ok(());
    }
    for (category, commands) in table.by_category() {
        println!("{}:", category.to_uppercase());
        for cmd in commands {
            let m = &cmd.manifest;
            let aliases = if m.aliases.is_empty() {
                String::new()
            } else {
                format!(" (aliases: {})", m.aliases.join(", "))
            };
            println!(
                "  {}{}{aliases} — {}",
                cfg.commands.prefix, m.name, m.description
            );
        }
    }
    Ok(())
}
