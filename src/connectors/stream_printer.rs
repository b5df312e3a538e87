use crate::common::model::ConnectionParams;
use crate::error::{StreamError, StreamResult};
use futures::StreamExt;
use std::convert::Infallible;
use std::future::{pending, Future};
use std::io::Write;
use tokio_tungstenite::{
    connect_async,
    tungstenite::protocol::{frame::coding::CloseCode, CloseFrame},
    tungstenite::Message,
};
use tracing::{debug, error, info};

/// Prints every batch of a view stream to `out`, one batch per line, in
/// the order the server sends them.
pub struct StreamPrinter<W: Write> {
    params: ConnectionParams,
    out: W,
}

impl<W: Write> StreamPrinter<W> {
    pub fn new(params: ConnectionParams, out: W) -> Self {
        Self { params, out }
    }

    /// Streams until the connection fails. There is no reconnection, so
    /// this only ever returns an error.
    pub async fn run(&mut self) -> StreamResult<Infallible> {
        self.run_until(pending()).await
    }

    /// Same as [`run`](Self::run), but closes the websocket and returns
    /// [`StreamError::Interrupted`] once `shutdown` completes.
    pub async fn run_until<F>(&mut self, shutdown: F) -> StreamResult<Infallible>
    where
        F: Future<Output = ()>,
    {
        let uri = self.params.stream_uri();
        info!("subscribing to view stream uri={}", &uri);

        let (mut stream, _) = connect_async(uri.as_str())
            .await
            .map_err(|err| StreamError::Connect {
                uri: uri.clone(),
                source: err,
            })?;

        tokio::pin!(shutdown);
        let mut close_frame: Option<CloseFrame<'static>> = None;

        loop {
            let rcv = tokio::select! {
                rcv = stream.next() => rcv,
                _ = &mut shutdown => {
                    info!("interrupted, closing websocket uri={}", &uri);
                    if let Err(err) = stream
                        .close(Some(CloseFrame {
                            code: CloseCode::Normal,
                            reason: "Client requested connection close.".into(),
                        }))
                        .await
                    {
                        error!("can't close websocket err={:?}", err);
                    };
                    return Err(StreamError::Interrupted);
                }
            };

            let raw_msg = match rcv {
                Some(Ok(val)) => val,
                Some(Err(err)) if close_frame.is_none() => {
                    return Err(StreamError::Receive(err));
                }
                Some(Err(err)) => {
                    debug!("error after close frame err={:?}", err);
                    return Err(closed(close_frame));
                }
                None => return Err(closed(close_frame)),
            };

            match raw_msg {
                Message::Text(batch) => self.print_batch(batch.as_bytes())?,
                Message::Binary(batch) => self.print_batch(&batch)?,
                Message::Close(frame) => {
                    info!("server closed the stream frame={:?}", &frame);
                    // keep reading so the close reply gets flushed
                    close_frame = frame;
                }
                other => debug!("skipping control message={:?}", other),
            }
        }
    }

    fn print_batch(&mut self, batch: &[u8]) -> StreamResult<()> {
        self.out.write_all(batch)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}

fn closed(frame: Option<CloseFrame<'static>>) -> StreamError {
    match frame {
        Some(frame) => StreamError::Closed {
            code: Some(frame.code.into()),
            reason: frame.reason.into_owned(),
        },
        None => StreamError::Closed {
            code: None,
            reason: String::new(),
        },
    }
}
