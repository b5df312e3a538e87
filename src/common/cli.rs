use crate::common::model::{ConnectionParams, DEFAULT_HOST, DEFAULT_PORT};
use clap::Parser;

/// Continuously print the batches of a view, as presented by the web server.
#[derive(Parser, Debug)]
#[command(name = "stream_view")]
pub struct StreamArgs {
    /// Web server hostname
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    /// Web server port number
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Name of the view to stream
    pub view: String,
}

impl From<StreamArgs> for ConnectionParams {
    fn from(args: StreamArgs) -> Self {
        ConnectionParams::new(&args.host, args.port, &args.view)
    }
}
