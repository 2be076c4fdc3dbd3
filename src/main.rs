use anyhow::{Context, bail};
use api_client::{
    ApiClient, AuthStatus, BitfinexClient, ChannelUpdate, Connection, LiveConnector, SubscribeRequest,
};
use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::{Table, presets::UTF8_FULL};
use configuration::{LogFormat, Settings, init_tracing, load_config, load_config_from};
use core_types::Ticker;
use events::Envelope;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::time::Duration;

/// How long `close` may wait for the server to finish the close handshake.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// The main entry point for the streaming client.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file, if there is one.
    dotenvy::dotenv().ok();

    // Parse command-line arguments
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    if let Some(format) = cli.log_format {
        settings.logging.format = format;
    }
    let _log_guard = init_tracing(&settings.logging)?;

    // Execute the appropriate command
    match cli.command {
        Commands::Stream(args) => handle_stream(args, &settings).await,
        Commands::Tickers(args) => handle_tickers(args, &settings).await,
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// A streaming client for the Bitfinex v2 websocket and REST APIs.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file (defaults to ./config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides `logging.format` from the configuration.
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Subscribe to a public channel and print every event and update.
    Stream(StreamArgs),
    /// Print a ticker snapshot from the REST API.
    Tickers(TickersArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum ChannelArg {
    Ticker,
    Trades,
    Book,
}

#[derive(Parser)]
struct StreamArgs {
    /// The channel to subscribe to.
    #[arg(long, value_enum, default_value = "ticker")]
    channel: ChannelArg,

    /// Symbols to subscribe to (e.g., "tBTCUSD").
    #[arg(long = "symbol", required = true)]
    symbols: Vec<String>,

    /// Authenticate with the configured credentials before subscribing.
    #[arg(long)]
    auth: bool,

    /// Send a ping every N seconds.
    #[arg(long)]
    ping_interval: Option<u64>,
}

#[derive(Parser)]
struct TickersArgs {
    /// Symbols to fetch; fetches every symbol when omitted.
    symbols: Vec<String>,
}

// ==============================================================================
// Stream Command Logic
// ==============================================================================

async fn handle_stream(args: StreamArgs, settings: &Settings) -> anyhow::Result<()> {
    let connector = LiveConnector::from_settings(settings)?;
    let (connection, mut inbound) = connector.connect().await?;

    let info = connection.wait_ready().await?;
    tracing::info!(version = info.version, "Server ready.");

    if args.auth {
        authenticate(&connection, settings).await?;
    }

    for symbol in &args.symbols {
        let request = match args.channel {
            ChannelArg::Ticker => SubscribeRequest::ticker(symbol.as_str()),
            ChannelArg::Trades => SubscribeRequest::trades(symbol.as_str()),
            ChannelArg::Book => SubscribeRequest::book(symbol.as_str(), "P0", "F0", 25),
        };
        let token = connection.subscribe(request).await?;
        tracing::info!(%symbol, %token, "Subscribe request sent.");
    }

    let mut ping_timer = args
        .ping_interval
        .map(|secs| tokio::time::interval(Duration::from_secs(secs.max(1))));
    let mut next_cid: i64 = 1;

    loop {
        tokio::select! {
            envelope = inbound.events.recv() => match envelope {
                Some(envelope) => print_envelope(&envelope)?,
                None => break,
            },
            update = inbound.updates.recv() => match update {
                Some(update) => print_update(&update),
                None => break,
            },
            _ = tick(&mut ping_timer) => {
                if let Err(e) = connection.ping(next_cid).await {
                    tracing::error!(error = %e, "Failed to send ping; closing connection.");
                    break;
                }
                next_cid += 1;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted; closing connection.");
                break;
            }
        }
    }

    if tokio::time::timeout(CLOSE_TIMEOUT, connection.close()).await.is_err() {
        tracing::warn!("Server did not complete the close handshake in time.");
    }
    Ok(())
}

async fn authenticate(connection: &Connection, settings: &Settings) -> anyhow::Result<()> {
    let credentials = &settings.credentials;
    if !credentials.is_configured() {
        bail!("--auth requires credentials.api_key and credentials.api_secret");
    }
    match connection
        .authenticate(&credentials.api_key, &credentials.api_secret)
        .await?
    {
        AuthStatus::Authenticated => {
            tracing::info!("Authenticated.");
            Ok(())
        }
        status => bail!("authentication failed: {:?}", status),
    }
}

/// Resolves on the next tick, or never when pinging is disabled.
async fn tick(timer: &mut Option<tokio::time::Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn print_envelope(envelope: &Envelope) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(envelope).context("failed to render event")?);
    Ok(())
}

fn print_update(update: &ChannelUpdate) {
    let data = serde_json::Value::Array(update.data.clone());
    println!("[{} {}] {}", update.chan_id, update.token.as_deref().unwrap_or("-"), data);
}

// ==============================================================================
// Tickers Command Logic
// ==============================================================================

async fn handle_tickers(args: TickersArgs, settings: &Settings) -> anyhow::Result<()> {
    let client = BitfinexClient::from_settings(settings)?;
    let snapshot = client.fetch_tickers(&args.symbols).await?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Symbol", "Bid", "Ask", "Last", "Daily %", "Volume", "High", "Low",
    ]);
    for ticker in &snapshot.tickers {
        table.add_row(ticker_row(ticker));
    }
    println!("{table}");
    Ok(())
}

fn ticker_row(ticker: &Ticker) -> Vec<String> {
    vec![
        ticker.symbol.clone(),
        ticker.bid.to_string(),
        ticker.ask.to_string(),
        ticker.last_price.to_string(),
        (ticker.daily_change_relative * Decimal::ONE_HUNDRED).round_dp(2).to_string(),
        ticker.volume.to_string(),
        ticker.high.to_string(),
        ticker.low.to_string(),
    ]
}
