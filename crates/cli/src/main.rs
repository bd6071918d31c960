use clap::{Parser, Subcommand};

const DEFAULT_TEST_MESSAGE: &str = "API send test: the bot is working.";

#[derive(Parser)]
#[command(name = "relay")]
#[command(about = "WhatsApp webhook relay answered by an LLM", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Run the webhook relay (GET/POST /webhook, POST /, GET /health, GET /).
    Serve {
        /// Config file path (default: RELAY_CONFIG_PATH or ~/.relay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from PORT env, config, or 5000)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Send a one-off WhatsApp text message with the configured credentials.
    Send {
        /// Config file path (default: RELAY_CONFIG_PATH or ~/.relay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Recipient number with country code (e.g. 5519999999999)
        number: String,

        /// Message text (default: a short test message)
        message: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    // .env first so RUST_LOG from it applies
    let dotenv = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Ok(path) = dotenv {
        log::debug!("loaded environment from {}", path.display());
    }

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("relay {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("relay failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Send {
            config,
            number,
            message,
        }) => match run_send(config, number, message).await {
            Ok(true) => {}
            Ok(false) => std::process::exit(1),
            Err(e) => {
                log::error!("send failed: {:#}", e);
                std::process::exit(1);
            }
        },
        None => {
            println!("Run with --help for usage");
        }
    }
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, path) = relay::config::load_config(config_path)?;
    log::debug!("config path: {}", path.display());
    if let Some(p) = port {
        config.gateway.port = p;
    }
    log::info!("starting relay on {}:{}", config.gateway.bind, config.gateway.port);
    relay::gateway::run_gateway(config).await
}

/// Returns whether the provider accepted the message.
async fn run_send(
    config_path: Option<std::path::PathBuf>,
    number: String,
    message: Option<String>,
) -> anyhow::Result<bool> {
    let (config, _) = relay::config::load_config(config_path)?;
    let message = message
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| DEFAULT_TEST_MESSAGE.to_string());
    let number = number.trim().to_string();
    if number.is_empty() {
        anyhow::bail!("recipient number not provided");
    }

    let channel = relay::channels::WhatsAppChannel::new(&config.whatsapp)?;
    println!(
        "from: {} -> to: {}",
        config.whatsapp.phone_number_id.as_deref().unwrap_or("(unset)"),
        number
    );
    println!("message: {}", message);

    let outcome = channel.send_message(&number, &message).await?;
    println!("status: {}", outcome.status);
    println!(
        "response: {}",
        serde_json::to_string_pretty(&outcome.response)?
    );
    if outcome.delivered() {
        println!("sent");
        if let Some(id) = &outcome.message_id {
            println!("message id: {}", id);
        }
    } else {
        eprintln!("provider rejected the message");
    }
    Ok(outcome.delivered())
}
