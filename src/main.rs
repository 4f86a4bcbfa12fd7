use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use ghost_chat::chat;
use ghost_chat::config::{ClientConfig, ServerConfig};
use ghost_chat::constants::{DEFAULT_CAST_SIZE, DEFAULT_PORT, GHOST_CHAT_SERVER_URL, REQUEST_TIMEOUT_SECS};
use ghost_chat::locale::Locale;
use ghost_chat::personas::PersonaRegistry;
use ghost_chat::web_server;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the ghost-chat web server.
    Serve {
        #[arg(long, default_value_t = DEFAULT_PORT, help = "Port for the web server.")]
        port: u16,
    },
    /// Watch a ghost conversation in the terminal.
    Chat {
        #[arg(long, help = "The scene the ghosts should talk about.")]
        situation: String,
        #[arg(long, default_value_t = DEFAULT_CAST_SIZE, help = "How many random personas take the stage.")]
        count: usize,
        #[arg(long, value_delimiter = ',', help = "Comma-separated persona ids, overrides --count.")]
        personas: Vec<String>,
        #[arg(long, value_enum, default_value_t = Locale::Ja)]
        locale: Locale,
        #[arg(long, env = "GHOST_CHAT_SERVER_URL", default_value_t = GHOST_CHAT_SERVER_URL.clone())]
        server_url: String,
        #[arg(long, default_value_t = REQUEST_TIMEOUT_SECS, help = "Bound on the whole request, in seconds.")]
        timeout_secs: u64,
        #[arg(long, help = "Show every line immediately, without pacing or animation.")]
        reduced_motion: bool,
    },
    /// List the available personas.
    Personas,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for OPENAI_API_KEY and friends)
    dotenvy::dotenv().ok();

    // Reads log level from RUST_LOG (e.g. RUST_LOG=info,ghost_chat=debug)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("ghost-chat starting with command: {:?}", cli.command);

    let personas = Arc::new(PersonaRegistry::builtin());

    match cli.command {
        Commands::Serve { port } => {
            let config = ServerConfig::from_env(port);
            let mut web_server_handle = tokio::spawn(async move {
                if let Err(e) = web_server::start_web_server(config, personas).await {
                    error!("Web server failed: {:?}", e);
                }
            });

            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);

            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Ctrl-C received, shutting down...");
                }
                res = &mut web_server_handle => {
                    match res {
                        Ok(_) => info!("Web server task completed unexpectedly."),
                        Err(e) if e.is_panic() => error!("Web server task panicked: {:?}", e),
                        Err(e) => error!("Web server task failed: {:?}", e),
                    }
                }
            }

            if !web_server_handle.is_finished() {
                web_server_handle.abort();
            }
            info!("Shutdown complete.");
        }
        Commands::Chat {
            situation,
            count,
            personas: requested,
            locale,
            server_url,
            timeout_secs,
            reduced_motion,
        } => {
            let mut config = ClientConfig::new(server_url, locale).with_reduced_motion(reduced_motion);
            config.request_timeout = Duration::from_secs(timeout_secs);

            let outcome = chat::run_chat_session(
                &config,
                &personas,
                &situation,
                &requested,
                count,
                std::io::stdout(),
            )
            .await
            .context("Chat session failed")?;

            if let Some(message) = outcome.error {
                anyhow::bail!(message);
            }
            info!(shown = outcome.shown, "Chat session finished.");
        }
        Commands::Personas => {
            for persona in personas.all() {
                println!(
                    "{} {:<10} {} - {}",
                    persona.visual_style.icon, persona.id, persona.name, persona.description
                );
            }
        }
    }

    Ok(())
}
