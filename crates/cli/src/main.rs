use std::sync::Arc;

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    tokio::sync::mpsc,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    warelay_driver::BridgeDriver, warelay_http::AppState, warelay_session::SessionGateway,
};

#[derive(Parser)]
#[command(name = "warelay", about = "warelay — WhatsApp send gateway")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway service.
    Serve {
        /// Bind address (overrides config).
        #[arg(long)]
        bind: Option<String>,
        /// Listen port (overrides config).
        #[arg(long)]
        port: Option<u16>,
    },
    /// Send one message through a running gateway.
    Send {
        /// Recipient phone number.
        #[arg(long)]
        to: String,
        #[arg(short, long)]
        message: String,
        /// Base URL of the running gateway.
        #[arg(long, default_value = "http://127.0.0.1:3000", env = "WARELAY_URL")]
        gateway_url: String,
    },
    /// Print the session status of a running gateway.
    Status {
        /// Base URL of the running gateway.
        #[arg(long, default_value = "http://127.0.0.1:3000", env = "WARELAY_URL")]
        gateway_url: String,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    match cli.command {
        Commands::Serve { bind, port } => serve(bind, port).await,
        Commands::Send {
            to,
            message,
            gateway_url,
        } => send(&gateway_url, &to, &message).await,
        Commands::Status { gateway_url } => status(&gateway_url).await,
    }
}

async fn serve(bind: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let config = warelay_config::discover_and_load();
    let bind = bind.unwrap_or_else(|| config.gateway.bind.clone());
    let port = port.unwrap_or(config.gateway.port);

    info!(version = env!("CARGO_PKG_VERSION"), "warelay starting");

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let driver = Arc::new(BridgeDriver::new(config.bridge.url.clone(), events_tx));
    let gateway = SessionGateway::new(driver, events_rx);
    gateway
        .initialize()
        .await
        .with_context(|| format!("starting platform driver at {}", config.bridge.url))?;

    let state = AppState::new(gateway, &config.session.address_suffix);
    warelay_http::serve(state, &bind, port).await
}

async fn send(base: &str, to: &str, message: &str) -> anyhow::Result<()> {
    let response = reqwest::Client::new()
        .post(format!("{base}/send"))
        .json(&serde_json::json!({ "phone_number": to, "message": message }))
        .send()
        .await
        .with_context(|| format!("gateway unreachable at {base}"))?;

    let status = response.status();
    let body: serde_json::Value = response
        .json()
        .await
        .context("malformed gateway response")?;
    if status.is_success() {
        println!("{}", body["message"].as_str().unwrap_or("sent"));
        return Ok(());
    }
    anyhow::bail!(
        "send failed ({status}): {}",
        body["error"].as_str().unwrap_or("unknown error")
    )
}

async fn status(base: &str) -> anyhow::Result<()> {
    let body: serde_json::Value = reqwest::Client::new()
        .get(format!("{base}/status"))
        .send()
        .await
        .with_context(|| format!("gateway unreachable at {base}"))?
        .json()
        .await
        .context("malformed gateway response")?;

    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
