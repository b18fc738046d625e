// Command line options shared by the exl-* binaries
use crate::config::{ClientConfig, TransportKind, DEFAULT_PORT};
use clap::Args;
use exl_transport::TlsOptions;
use tracing_subscriber::EnvFilter;

/// Where and how to reach the EXL server.
#[derive(Args, Debug, Clone)]
pub struct ConnectArgs {
    /// EXL server host name or address
    #[arg(short = 'H', long, env = "EXL_HOST")]
    pub host: String,

    /// EXL server port
    #[arg(short, long, env = "EXL_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Login name
    #[arg(short, long, env = "EXL_USERNAME")]
    pub username: String,

    /// Login password
    #[arg(long, env = "EXL_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Verify the server certificate against the Mozilla root store
    #[arg(long)]
    pub verify_certs: bool,

    /// Use plain TCP instead of TLS
    #[arg(long, conflicts_with = "verify_certs")]
    pub plain: bool,

    /// Print every message sent and received
    #[arg(short, long, env = "EXL_DEBUG")]
    pub debug: bool,
}

impl ConnectArgs {
    pub fn transport(&self) -> TransportKind {
        if self.plain {
            TransportKind::Tcp
        } else if self.verify_certs {
            TransportKind::Tls(TlsOptions::verified())
        } else {
            TransportKind::Tls(TlsOptions::default())
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(&self.host, self.port)
            .with_debug(self.debug)
            .with_transport(self.transport())
    }
}

/// Log to stderr, filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
