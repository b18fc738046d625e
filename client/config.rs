// Client configuration
use exl_transport::TlsOptions;

pub const DEFAULT_PORT: u16 = 8000;
/// Largest JSON document accepted from the server.
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Tls(TlsOptions),
    /// Plain TCP, for test servers and debugging.
    Tcp,
}

impl Default for TransportKind {
    fn default() -> Self {
        TransportKind::Tls(TlsOptions::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Print every outgoing and incoming message to stdout.
    pub debug: bool,
    pub transport: TransportKind,
    pub max_message_len: usize,
}

impl ClientConfig {
    pub fn new(host: &str, port: u16) -> Self {
        ClientConfig {
            host: host.to_string(),
            port,
            debug: false,
            transport: TransportKind::default(),
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_max_message_len(mut self, max_message_len: usize) -> Self {
        self.max_message_len = max_message_len;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_unverified_tls() {
        let config = ClientConfig::new("172.17.128.162", DEFAULT_PORT);
        assert_eq!(config.transport, TransportKind::Tls(TlsOptions { accept_invalid_certs: true }));
        assert!(!config.debug);
        assert_eq!(config.max_message_len, DEFAULT_MAX_MESSAGE_LEN);
    }
}
