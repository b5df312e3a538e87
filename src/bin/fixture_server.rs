use clap::Parser;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;
use tracing::info;
use view_tail::common::model::{DEFAULT_HOST, DEFAULT_PORT};
use view_tail::fixture::{Ending, FixtureServer};

/// Serve a file of batches, one per line, on the view stream endpoint.
#[derive(Parser, Debug)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Pause before each batch, in milliseconds
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,

    /// Keep connections open after the last batch
    #[arg(long)]
    hold_open: bool,

    /// Drop connections after the last batch without a close frame
    #[arg(long, conflicts_with = "hold_open")]
    abort: bool,

    /// File with one batch per line
    batches: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let args = Args::parse();
    let contents = tokio::fs::read_to_string(&args.batches).await?;
    let batches: Vec<Message> = contents
        .lines()
        .map(|line| Message::Text(line.to_string()))
        .collect();

    let ending = if args.hold_open {
        Ending::HoldOpen
    } else if args.abort {
        Ending::Abort
    } else {
        Ending::Close
    };

    let server = FixtureServer::bind((args.host.as_str(), args.port), batches)
        .await?
        .with_delay(Duration::from_millis(args.delay_ms))
        .ending(ending);

    info!("serving view streams addr={}", server.local_addr()?);
    server.serve().await;

    Ok(())
}
