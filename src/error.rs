use std::io;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Exit status of a process stopped by SIGINT.
const INTERRUPTED_EXIT_CODE: u8 = 130;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("failed to connect to {uri}: {source}")]
    Connect {
        uri: String,
        #[source]
        source: tungstenite::Error,
    },

    #[error("failed to receive websocket message: {0}")]
    Receive(#[source] tungstenite::Error),

    #[error("connection closed by server (code={code:?}, reason={reason:?})")]
    Closed { code: Option<u16>, reason: String },

    #[error("failed to write batch: {0}")]
    Output(#[from] io::Error),

    #[error("interrupted")]
    Interrupted,
}

impl StreamError {
    pub fn exit_code(&self) -> u8 {
        match self {
            StreamError::Interrupted => INTERRUPTED_EXIT_CODE,
            _ => 1,
        }
    }
}

pub type StreamResult<T> = Result<T, StreamError>;
