// Bandstand console - drive one guild's session from stdin
// The simulated engine stands in for a real voice node, so everything but the sound is real

use anyhow::Result;
use bandstand::{
    config::{Config, LoggingConfig},
    console::Console,
    engine::{ChannelId, SessionKey, SimulatedEngine},
    resolver::LibraryResolver,
    session::SessionRegistry,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "bandstand")]
#[command(about = "Voice-channel music sessions, driven from the terminal")]
struct Args {
    /// Config file to use instead of the one in the user config directory
    #[arg(long)]
    config: Option<PathBuf>,

    /// Guild the session belongs to
    #[arg(long, default_value_t = 1)]
    guild: u64,

    /// Voice channel you are "sitting in"
    #[arg(long, default_value_t = 1)]
    channel: u64,

    /// Enable developer logging (stderr + debug output)
    #[arg(long)]
    dev: bool,
}

fn init_logging(settings: &LoggingConfig, dev: bool) -> Result<()> {
    std::fs::create_dir_all(&settings.directory)?;

    // Daily rotating file appender
    let file_appender = tracing_appender::rolling::daily(&settings.directory, &settings.file_prefix);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let base_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.default_filter));

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_target(true)
        .with_level(true)
        .with_ansi(false);

    // Dev mode mirrors everything to stderr as well
    let stderr_layer = dev.then(|| fmt::layer().with_writer(std::io::stderr).with_target(true));

    tracing_subscriber::registry()
        .with(base_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()?;

    if dev {
        eprintln!("🔧 Dev mode: Debug output enabled to stderr + file");
    }

    // The writer thread has to outlive main
    std::mem::forget(guard);

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    init_logging(&config.logging, args.dev)?;
    info!("🎵 Bandstand console starting up");

    let resolver = LibraryResolver::from_path(&config.library.catalog_path, config.library.min_score)?;

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let engine = SimulatedEngine::new(event_tx);
    let registry = SessionRegistry::new(Arc::new(engine), Arc::new(resolver), config.session.clone());
    let router = registry.route_engine_events(event_rx);

    println!("🎵 Bandstand");
    println!("============");
    println!("Guild {} - channel {}. Type 'help' for commands.", args.guild, args.channel);

    let console = Console::new(registry, SessionKey(args.guild), ChannelId(args.channel));
    console.run(BufReader::new(tokio::io::stdin())).await?;

    router.abort();
    info!("👋 Bandstand console shutting down");
    Ok(())
}
