use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::panic::PanicHookInfo;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use eyre::Result;
use led_board_core::config::{BoardConfig, Viewport};
use led_board_core::source::{HttpFetcher, Suggestions};
use led_board_core::BoardController;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::filter::FilterFn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod page;
mod routes;

#[derive(Parser, Debug)]
#[command(
    name = "led-board",
    author,
    version,
    about = "Public transit departure board rendered as an LED dot-matrix display",
    long_about = "Resolves a stop against the transport.rest APIs, refreshes its upcoming \
                  departures periodically and serves them as an HTML page of LED-style SVG rows.\n\n\
                  Settings come from an optional TOML file; command line flags override it."
)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop to display, overriding `stop_query` from the config file
    #[arg(short, long)]
    stop: Option<String>,

    /// Address to serve the board on
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    /// Initial board width in pixels
    #[arg(long)]
    width: Option<f64>,

    /// Initial board height in pixels
    #[arg(long)]
    height: Option<f64>,

    /// Verbose output (show debug messages)
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn board_config(&self) -> Result<BoardConfig> {
        let mut config = match &self.config {
            Some(path) => BoardConfig::load(path)?,
            None => BoardConfig::default(),
        };

        if let Some(stop) = &self.stop {
            config.stop_query = Some(stop.clone());
        }
        config.viewport = Viewport {
            width: self.width.unwrap_or(config.viewport.width),
            height: self.height.unwrap_or(config.viewport.height),
        };

        config.validate()?;
        Ok(config)
    }
}

fn setup_logging(verbose: bool) {
    let max_level = if verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
    let filter = FilterFn::new(move |metadata| {
        metadata.module_path().unwrap_or_default().starts_with("led_board") && *metadata.level() <= max_level
    });
    let layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry().with(layer).with(filter).init();
    std::panic::set_hook(Box::new(panic_hook));
}

fn panic_hook(info: &PanicHookInfo) {
    error!("{info}")
}

/// Refreshes the board at the configured cadence. The first tick fires
/// immediately; ticks missed while a refresh runs are skipped.
fn spawn_refresh_loop(board: Arc<BoardController>) -> JoinHandle<()> {
    let period = board.config().refresh_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            board.refresh().await;
        }
    })
}

async fn shutdown_signal() {
    shutdown_on(tokio::signal::ctrl_c()).await
}

/// Resolves once `signal` fires. A signal that cannot be installed also
/// shuts down, after logging why.
async fn shutdown_on(signal: impl Future<Output = io::Result<()>>) {
    match signal.await {
        Ok(()) => info!("shutting down"),
        Err(err) => error!(%err, "cannot listen for ctrl-c, shutting down"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose);

    let config = args.board_config()?;
    let fetcher = Arc::new(HttpFetcher::from_config(&config)?);
    let board = Arc::new(BoardController::new(config, fetcher));
    let suggestions = Arc::new(Suggestions::from_config(board.config(), Arc::clone(board.source())));

    let stop = board.stop_query().await;
    info!(
        stop = stop.as_deref().unwrap_or("<none>"),
        endpoints = board.config().endpoints.len(),
        "starting departure board"
    );
    let refresh = spawn_refresh_loop(Arc::clone(&board));

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    info!(addr = %listener.local_addr()?, "serving board");

    let app = routes::create_router(routes::AppState { board, suggestions });
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    refresh.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::try_parse_from([
            "led-board",
            "--stop",
            "Alexanderplatz",
            "--width",
            "800",
            "--bind",
            "0.0.0.0:9000",
        ])
        .unwrap();

        let config = args.board_config().unwrap();
        assert_eq!(config.stop_query.as_deref(), Some("Alexanderplatz"));
        assert_eq!(config.viewport, Viewport { width: 800.0, height: 480.0 });
        assert_eq!(args.bind.port(), 9000);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let args = Args::try_parse_from(["led-board", "--height", "0"]).unwrap();
        assert!(args.board_config().is_err());
    }

    #[test]
    fn test_example_config_is_valid() {
        let config = BoardConfig::from_toml_str(include_str!("../board.example.toml")).unwrap();
        assert_eq!(config.initial_stop_query().as_deref(), Some("S+U Alexanderplatz"));
        assert_eq!(config.endpoints.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_signal_still_shuts_down() {
        shutdown_on(async { Err(io::Error::other("signal driver unavailable")) }).await;
        shutdown_on(async { Ok(()) }).await;
    }

    #[test]
    fn test_missing_config_file() {
        let args = Args::try_parse_from(["led-board", "--config", "/nonexistent/board.toml"]).unwrap();
        assert!(args.board_config().is_err());
    }
}
