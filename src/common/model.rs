pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 6875;
pub const STREAM_PATH: &str = "/api/v1/stream";

/// Where to find the streaming endpoint of a view. Nothing here is
/// validated, a bad value surfaces as a connection error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub view: String,
}

impl ConnectionParams {
    pub fn new(host: &str, port: u16, view: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            view: view.to_string(),
        }
    }

    pub fn stream_uri(&self) -> String {
        format!(
            "ws://{}:{}{}/{}",
            self.host, self.port, STREAM_PATH, self.view
        )
    }
}
