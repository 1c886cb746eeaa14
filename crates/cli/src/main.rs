use clap::{Parser, Subcommand};
use futures_util::{SinkExt, StreamExt};
use relay::conversation::{ConversationRequest, ConversationResponse};
use relay::gateway::{Envelope, CONVERSATION_RESPONSE};
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser)]
#[command(name = "scene-relay")]
#[command(about = "Scene relay CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Run the relay (HTTP health probe + WebSocket envelope endpoint).
    Serve {
        /// Config file path (default: RELAY_CONFIG_PATH or ~/.scene-relay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// WebSocket and HTTP port (default from RELAY_PORT, config, or 8000)
        #[arg(long, short)]
        port: Option<u16>,

        /// Bind address (default from config or 0.0.0.0)
        #[arg(long, short)]
        bind: Option<String>,
    },

    /// Talk to a running relay (interactive). Sends an init request first, then one request per line.
    Chat {
        /// Config file path, used to derive the relay URL when --url is not given.
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// WebSocket URL (e.g. ws://127.0.0.1:8000/ws)
        #[arg(long, value_name = "URL")]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("scene-relay {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Serve { config, port, bind }) => {
            if let Err(e) = run_serve(config, port, bind).await {
                log::error!("relay failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Chat { config, url }) => {
            if let Err(e) = run_chat(config, url).await {
                log::error!("chat failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
    bind: Option<String>,
) -> anyhow::Result<()> {
    let (mut config, path) = relay::config::load_config(config_path)?;
    log::debug!("using config {}", path.display());
    if let Some(p) = port {
        config.server.port = p;
    }
    if let Some(b) = bind {
        config.server.bind = b;
    }
    log::info!("starting relay on {}:{}", config.server.bind, config.server.port);
    relay::gateway::run_gateway(config).await
}

/// Relay URL from config: a wildcard bind is reached via loopback.
fn relay_url(config: &relay::config::Config) -> String {
    let bind = config.server.bind.trim();
    let host = match bind {
        "" | "0.0.0.0" => "127.0.0.1",
        "::" => "[::1]",
        other => other,
    };
    let path = config.server.path.trim_start_matches('/');
    format!("ws://{}:{}/{}", host, config.server.port, path)
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn run_chat(
    config_path: Option<std::path::PathBuf>,
    url: Option<String>,
) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let url = match url {
        Some(u) => u,
        None => {
            let (config, _) = relay::config::load_config(config_path)?;
            relay_url(&config)
        }
    };
    let (mut ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .map_err(|e| anyhow::anyhow!("connecting to {}: {}", url, e))?;
    log::debug!("connected to {}", url);

    let greeting = converse(&mut ws, ConversationRequest::init("")).await?;
    print_reply(&greeting);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
            break;
        }

        let resp = converse(&mut ws, ConversationRequest::new(input)).await?;
        print_reply(&resp);
    }

    let _ = ws.close(None).await;
    Ok(())
}

/// Send one conversation request and wait for the next conversationResponse envelope.
async fn converse(ws: &mut WsStream, req: ConversationRequest) -> anyhow::Result<ConversationResponse> {
    let text = Envelope::conversation_request(req).encode()?;
    ws.send(Message::Text(text)).await?;

    while let Some(msg) = ws.next().await {
        let Message::Text(text) = msg? else { continue };
        let env = match Envelope::decode(&text) {
            Ok(env) => env,
            Err(e) => {
                log::debug!("ignoring frame: {}", e);
                continue;
            }
        };
        if env.name != CONVERSATION_RESPONSE {
            continue;
        }
        return Ok(env.into_body()?);
    }

    anyhow::bail!("relay closed the connection")
}

fn print_reply(resp: &ConversationResponse) {
    println!("< {}", resp.output.text.trim());
    for (id, card) in &resp.variables {
        println!("  [{} card: {}]", card.component(), id);
    }
    if resp.fallback {
        println!("  (fallback)");
    }
}
