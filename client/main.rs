// exl-receive: log in, join channels and append every notification to a log file
use anyhow::{bail, Context, Result};
use clap::Parser;
use exl_client::cli::{init_tracing, ConnectArgs};
use exl_client::{
    Channel, ChannelSelection, ClientError, ExlClient, NotificationLog, Response, DEFAULT_LOG_FILE,
};
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "exl-receive")]
#[command(about = "Receive EXL notifications and append them to a log file", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    connect: ConnectArgs,

    /// Channels to join
    #[arg(short, long = "channel", value_delimiter = ',', default_values_t = [Channel::Measurements, Channel::Solution])]
    channels: Vec<Channel>,

    /// File notifications are appended to
    #[arg(short, long, env = "EXL_LOG_FILE", default_value = DEFAULT_LOG_FILE)]
    log_file: PathBuf,
}

fn report(what: &str, response: &Response) {
    match response {
        Response::Error { code, desc, .. } => println!("{}: error {} ({})", what, code, desc),
        other => println!("{}: {}", what, serde_json::to_string(other).unwrap_or_default()),
    }
}

fn receive(client: &mut ExlClient, log: &mut NotificationLog) {
    loop {
        match client.drain_notification(log) {
            Ok(notification) => {
                println!(
                    "{} [{}] {}",
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                    notification.channel(),
                    notification.summary()
                );
            }
            Err(e @ (ClientError::Validation(_) | ClientError::Protocol(_) | ClientError::MessageTooLarge { .. })) => {
                warn!(error = %e, "skipping notification");
            }
            Err(e) => {
                error!(error = %e, fatal = e.is_fatal(), "notification stream ended");
                break;
            }
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let channels = ChannelSelection::new(cli.channels.clone()).context("no channel selected")?;
    let mut log = NotificationLog::open(&cli.log_file)
        .with_context(|| format!("cannot open {}", cli.log_file.display()))?;

    let mut client = ExlClient::new(cli.connect.client_config());
    client
        .connect()
        .with_context(|| format!("cannot connect to {}:{}", cli.connect.host, cli.connect.port))?;

    let login = client.login(&cli.connect.username, &cli.connect.password)?;
    report("login", &login);
    if !login.is_ack() {
        client.disconnect();
        bail!("login as {} was refused", cli.connect.username);
    }

    for response in client.channel_join(&channels)? {
        report("join", &response);
    }
    report("channels", &client.channel_list()?);

    info!(file = %log.path().display(), "receiving notifications");
    receive(&mut client, &mut log);
    info!(written = log.written(), "notifications logged");

    // Best effort; the session may already be gone
    if let Ok(responses) = client.channel_leave(&channels) {
        for response in responses {
            report("leave", &response);
        }
    }
    if let Ok(response) = client.logout() {
        report("logout", &response);
    }
    client.disconnect();
    Ok(())
}
