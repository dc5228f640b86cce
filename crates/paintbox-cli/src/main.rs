use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use paintbox_bridge::{Bridge, CommandRegistry, PeerState, start_peer};
use paintbox_core::config::{Config, LoggingConfig};
use paintbox_core::protocol::Envelope;

#[derive(Parser)]
#[command(
    name = "paintbox",
    about = "Voice and drawing bridge: canvas commands and audio over one WebSocket",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect the bridge to a peer and serve it until the connection closes
    Connect {
        /// Peer URL (default: ws://127.0.0.1:8080/ws)
        #[arg(long)]
        url: Option<String>,
    },

    /// Run a peer endpoint with an interactive console
    Peer {
        /// Port to listen on (default: 8080)
        #[arg(long)]
        port: Option<u16>,
    },

    /// List every invocable command name
    Commands,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Get a specific config value by dotted path
    Get { key: String },
    /// Check the configuration for problems
    Validate,
    /// Write a default config file if none exists
    Init,
}

fn init_logging(logging: Option<&LoggingConfig>, verbose: bool) {
    let default_level = if verbose {
        "debug".to_string()
    } else {
        logging
            .and_then(|l| l.level.clone())
            .unwrap_or_else(|| "info".to_string())
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut directives = vec![default_level];
        if let Some(l) = logging {
            directives.extend(l.filters.iter().cloned());
        }
        EnvFilter::new(directives.join(","))
    });

    let json = logging.is_some_and(|l| l.format == "json");
    let stdout = logging.is_some_and(|l| l.output == "stdout");

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match (json, stdout) {
        (true, true) => builder.json().with_writer(std::io::stdout).init(),
        (true, false) => builder.json().with_writer(std::io::stderr).init(),
        (false, true) => builder.with_writer(std::io::stdout).init(),
        (false, false) => builder.with_writer(std::io::stderr).init(),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(Config::config_path);

    let config = Config::load(&config_path)?;
    init_logging(config.logging.as_ref(), cli.verbose);
    debug!(path = %config_path.display(), "Config loaded");

    match cli.command {
        Commands::Connect { url } => {
            let url = url.unwrap_or_else(|| config.bridge_url());
            let mut bridge = Bridge::from_config(&config);
            let shutdown = bridge.shutdown_token();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        info!("Shutdown signal received");
                        shutdown.cancel();
                    }
                    Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
                }
            });
            bridge.run(&url).await?;
        }
        Commands::Peer { port } => {
            let port = port.unwrap_or_else(|| config.peer_port());
            run_peer_console(config.peer_bind(), port).await?;
        }
        Commands::Commands => {
            for name in CommandRegistry::new().names() {
                println!("{name}");
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let json = serde_json::to_string_pretty(&config)?;
                println!("{json}");
            }
            ConfigAction::Get { key } => match config.get_path(&key) {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => anyhow::bail!("No config value at '{key}'"),
            },
            ConfigAction::Validate => {
                let (warnings, errors) = config.validate();
                for w in &warnings {
                    println!("warning: {w}");
                }
                for e in &errors {
                    println!("error: {e}");
                }
                if !errors.is_empty() {
                    anyhow::bail!("{} config error(s)", errors.len());
                }
                println!("Config OK: {}", config_path.display());
            }
            ConfigAction::Init => {
                if config_path.exists() {
                    anyhow::bail!("Config already exists at {}", config_path.display());
                }
                if let Some(parent) = config_path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                Config::default().save(&config_path)?;
                println!("Wrote {}", config_path.display());
            }
        },
    }

    Ok(())
}

/// Accept one bridge and drive it from stdin, one `<name> [json-args]` per
/// line. Results are printed as they arrive.
async fn run_peer_console(bind: String, port: u16) -> anyhow::Result<()> {
    let (state, mut sessions) = PeerState::new();
    tokio::spawn(async move {
        if let Err(e) = start_peer(state, &bind, port).await {
            error!(error = %e, "Peer endpoint failed");
        }
    });

    println!("Waiting for a bridge on port {port} ...");
    let Some(mut session) = sessions.recv().await else {
        anyhow::bail!("Peer endpoint stopped before a bridge connected");
    };
    println!("Bridge {} connected. Type `<command> [json-args]`.", session.conn_id());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut seq: u64 = 0;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let (name, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
                let args = if rest.trim().is_empty() {
                    Value::Object(Default::default())
                } else {
                    match serde_json::from_str::<Value>(rest) {
                        Ok(args) => args,
                        Err(e) => {
                            println!("invalid JSON args: {e}");
                            continue;
                        }
                    }
                };
                seq += 1;
                session.invoke(format!("call-{seq}"), name, &args)?;
            }
            envelope = session.recv() => match envelope {
                Some(Envelope::CommandResult(result)) => {
                    let call_id = result.call_id.unwrap_or(Value::Null);
                    println!("{call_id} {} -> {}", result.name, result.output);
                }
                Some(Envelope::Audio(payload)) => {
                    debug!(bytes = payload.audio.len(), "Audio from bridge");
                }
                Some(Envelope::CommandInvoke(_)) => {}
                None => {
                    warn!("Bridge disconnected");
                    break;
                }
            },
        }
    }

    Ok(())
}
