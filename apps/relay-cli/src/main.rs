//! Terminal client for the design relay.
//!
//! Run with: cargo run -p relay-cli -- --url http://localhost:3001
//!
//! Type a request and press enter. `/history` reprints the conversation,
//! `/context` shows the context that goes with the next request, `/quit`
//! exits.

use clap::Parser;
use design_relay_core::render::render_all;
use design_relay_transport::client::{Conversation, HttpRelayClient};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Chat with the design agent through the relay")]
struct Args {
    /// Base URL of the relay.
    #[arg(long, default_value = "http://localhost:3001")]
    url: String,

    /// Resume an existing session instead of starting a new one.
    #[arg(long)]
    session_id: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let args = Args::parse();
    let transport = HttpRelayClient::new(&args.url);
    let mut convo = match args.session_id {
        Some(id) => Conversation::with_session_id(transport, id),
        None => Conversation::new(transport),
    };

    println!("session {}", convo.session_id());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        match input {
            "" => continue,
            "/quit" => break,
            "/history" => {
                for line in render_all(convo.history()) {
                    println!("{line}");
                }
            }
            "/context" => println!("{}", pretty_context(convo.context())),
            _ => match convo.send(input).await {
                Ok(new) => {
                    for line in render_all(new) {
                        println!("{line}");
                    }
                }
                Err(e) => {
                    tracing::debug!("Turn failed: {e:?}");
                    eprintln!("error: {e} (nothing was changed, try again)");
                }
            },
        }
    }

    Ok(())
}

fn pretty_context(context: &design_relay_core::SessionContext) -> String {
    serde_json::to_string_pretty(context).unwrap_or_else(|e| format!("<unprintable: {e}>"))
}
