//! A stand-in for the web server's view streaming endpoint. It replays a
//! fixed list of batches to every subscriber.

use crate::common::model::STREAM_PATH;
use futures::{SinkExt, StreamExt};
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info};

#[derive(Debug, Default)]
struct Log {
    paths: Vec<String>,
    closes: usize,
    disconnects: usize,
}

/// What a [`FixtureServer`] saw from its subscribers: handshake paths in
/// arrival order, close frames received, and connections released.
#[derive(Debug, Clone, Default)]
pub struct RequestLog(Arc<Mutex<Log>>);

impl RequestLog {
    fn with_log<T>(&self, f: impl FnOnce(&mut Log) -> T) -> T {
        f(&mut self.0.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn record(&self, path: &str) {
        self.with_log(|log| log.paths.push(path.to_string()));
    }

    fn record_close(&self) {
        self.with_log(|log| log.closes += 1);
    }

    fn record_disconnect(&self) {
        self.with_log(|log| log.disconnects += 1);
    }

    pub fn paths(&self) -> Vec<String> {
        self.with_log(|log| log.paths.clone())
    }

    /// Close frames sent by subscribers.
    pub fn closes(&self) -> usize {
        self.with_log(|log| log.closes)
    }

    /// Websocket connections the server has dropped.
    pub fn disconnects(&self) -> usize {
        self.with_log(|log| log.disconnects)
    }
}

/// How a subscriber connection ends once every batch is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ending {
    /// Send a close frame and finish the handshake.
    Close,
    /// Wait for the subscriber to close.
    HoldOpen,
    /// Drop the socket without a close frame.
    Abort,
}

#[derive(Debug, Clone)]
struct Script {
    batches: Arc<Vec<Message>>,
    delay: Duration,
    ending: Ending,
}

pub struct FixtureServer {
    listener: TcpListener,
    script: Script,
    requests: RequestLog,
}

impl FixtureServer {
    pub async fn bind<A: ToSocketAddrs>(addr: A, batches: Vec<Message>) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            script: Script {
                batches: Arc::new(batches),
                delay: Duration::from_millis(0),
                ending: Ending::Close,
            },
            requests: RequestLog::default(),
        })
    }

    /// Pause before every batch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.script.delay = delay;
        self
    }

    pub fn ending(mut self, ending: Ending) -> Self {
        self.script.ending = ending;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn requests(&self) -> RequestLog {
        self.requests.clone()
    }

    pub async fn serve(self) {
        loop {
            let (socket, peer) = match self.listener.accept().await {
                Ok(val) => val,
                Err(err) => {
                    error!("failed to accept connection. err={:?}", err);
                    continue;
                }
            };

            info!("new stream subscriber peer={}", peer);
            let script = self.script.clone();
            let requests = self.requests.clone();
            tokio::spawn(async move {
                if let Err(err) = serve_subscriber(socket, script, requests).await {
                    error!("subscriber failed peer={} err={:?}", peer, err);
                }
            });
        }
    }
}

fn is_stream_path(path: &str) -> bool {
    match path.strip_prefix(STREAM_PATH) {
        Some(rest) => rest.len() > 1 && rest.starts_with('/'),
        None => false,
    }
}

async fn serve_subscriber(
    socket: TcpStream,
    script: Script,
    requests: RequestLog,
) -> Result<(), tungstenite::Error> {
    let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let path = request.uri().path();
        requests.record(path);
        if !is_stream_path(path) {
            info!("rejecting unknown path={}", path);
            let mut rejection = ErrorResponse::new(Some(format!("no stream at {}", path)));
            *rejection.status_mut() = StatusCode::NOT_FOUND;
            return Err(rejection);
        }
        info!("streaming path={}", path);
        Ok(response)
    };
    let mut ws = accept_hdr_async(socket, callback).await?;

    let result = replay(&mut ws, &script, &requests).await;
    drop(ws);
    requests.record_disconnect();
    result
}

async fn replay(
    ws: &mut WebSocketStream<TcpStream>,
    script: &Script,
    requests: &RequestLog,
) -> Result<(), tungstenite::Error> {
    for batch in script.batches.iter() {
        if !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }
        ws.send(batch.clone()).await?;
    }

    match script.ending {
        Ending::Close => ws.close(None).await?,
        Ending::HoldOpen => {}
        Ending::Abort => {
            info!("dropping subscriber without close frame");
            return Ok(());
        }
    }

    // drain until the client finishes the close handshake
    while let Some(msg) = ws.next().await {
        let msg = msg?;
        if let Message::Close(frame) = &msg {
            info!("subscriber closed frame={:?}", frame);
            requests.record_close();
        }
        debug!("subscriber sent message={:?}", msg);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{is_stream_path, Ending, FixtureServer};
    use futures::StreamExt;
    use std::time::Duration;
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::Message;

    #[test]
    fn stream_paths() {
        assert!(is_stream_path("/api/v1/stream/orders"));
        assert!(is_stream_path("/api/v1/stream/a/b"));
        assert!(!is_stream_path("/api/v1/stream/"));
        assert!(!is_stream_path("/api/v1/stream"));
        assert!(!is_stream_path("/api/v1/streams/orders"));
        assert!(!is_stream_path("/"));
    }

    #[tokio::test]
    async fn replays_batches_then_closes() {
        let server = FixtureServer::bind(
            "127.0.0.1:0",
            vec![Message::Text("a".into()), Message::Binary(vec![1, 2])],
        )
        .await
        .unwrap();
        let addr = server.local_addr().unwrap();
        let requests = server.requests();
        tokio::spawn(server.serve());

        let uri = format!("ws://{}/api/v1/stream/orders", addr);
        let (mut ws, _) = connect_async(uri.as_str()).await.unwrap();

        assert_eq!(ws.next().await.unwrap().unwrap(), Message::Text("a".into()));
        assert_eq!(ws.next().await.unwrap().unwrap(), Message::Binary(vec![1, 2]));
        assert!(matches!(ws.next().await, Some(Ok(Message::Close(_)))));
        assert!(ws.next().await.is_none());

        assert_eq!(requests.paths(), vec!["/api/v1/stream/orders".to_string()]);
    }

    #[tokio::test]
    async fn rejects_unknown_paths() {
        let server = FixtureServer::bind("127.0.0.1:0", vec![]).await.unwrap();
        let addr = server.local_addr().unwrap();
        let requests = server.requests();
        tokio::spawn(server.serve());

        let uri = format!("ws://{}/api/v1/tail/orders", addr);
        assert!(connect_async(uri.as_str()).await.is_err());
        assert_eq!(requests.paths(), vec!["/api/v1/tail/orders".to_string()]);
    }

    #[tokio::test]
    async fn held_open_until_subscriber_closes() {
        let server = FixtureServer::bind("127.0.0.1:0", vec![Message::Text("a".into())])
            .await
            .unwrap()
            .ending(Ending::HoldOpen);
        let addr = server.local_addr().unwrap();
        let requests = server.requests();
        tokio::spawn(server.serve());

        let uri = format!("ws://{}/api/v1/stream/orders", addr);
        let (mut ws, _) = connect_async(uri.as_str()).await.unwrap();
        assert_eq!(ws.next().await.unwrap().unwrap(), Message::Text("a".into()));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(requests.closes(), 0);
        assert_eq!(requests.disconnects(), 0);

        ws.close(None).await.unwrap();
        while let Some(Ok(_)) = ws.next().await {}

        tokio::time::timeout(Duration::from_secs(5), async {
            while requests.disconnects() == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(requests.closes(), 1);
    }

    #[tokio::test]
    async fn abort_skips_close_frame() {
        let server = FixtureServer::bind("127.0.0.1:0", vec![Message::Text("a".into())])
            .await
            .unwrap()
            .ending(Ending::Abort);
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.serve());

        let uri = format!("ws://{}/api/v1/stream/orders", addr);
        let (mut ws, _) = connect_async(uri.as_str()).await.unwrap();

        assert_eq!(ws.next().await.unwrap().unwrap(), Message::Text("a".into()));
        assert!(matches!(ws.next().await, Some(Err(_))));
    }
}
