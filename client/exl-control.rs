// exl-control: one-shot administration requests against an EXL server
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use exl_client::cli::{init_tracing, ConnectArgs};
use exl_client::{ClientState, ExlClient, NewUser, Role, UserUpdate};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "exl-control")]
#[command(about = "Send administration requests to an EXL server", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    connect: ConnectArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the server answers
    Ping,

    /// List user accounts
    Users,

    /// Show one user account
    UserGet {
        #[arg(value_name = "LOGIN")]
        login: String,
    },

    /// Create a user account
    UserCreate {
        #[arg(value_name = "LOGIN")]
        login: String,
        #[arg(value_name = "PASSWORD")]
        password: String,
        /// Role to grant; repeat for several
        #[arg(long = "role")]
        roles: Vec<Role>,
        #[arg(long)]
        desc: Option<String>,
    },

    /// Change a user account
    UserUpdate {
        #[arg(value_name = "LOGIN")]
        login: String,
        #[arg(long)]
        new_login: Option<String>,
        #[arg(long)]
        new_password: Option<String>,
        /// Replacement role set; repeat for several
        #[arg(long = "new-role")]
        new_roles: Vec<Role>,
        #[arg(long)]
        new_desc: Option<String>,
    },

    /// Delete a user account
    UserRemove {
        #[arg(value_name = "LOGIN")]
        login: String,
    },

    /// List channels joined by this session
    Channels,

    /// List cells
    Cells,

    /// List base stations
    Stations,

    /// List tags
    Tags,
}

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(client: &mut ExlClient, command: Commands) -> Result<()> {
    match command {
        Commands::Ping => print(&client.ping()?),
        Commands::Users => print(&client.user_list()?),
        Commands::UserGet { login } => print(&client.user_get(&login)?),
        Commands::UserCreate {
            login,
            password,
            roles,
            desc,
        } => {
            let mut user = NewUser::new(&login, &password).with_roles(roles);
            if let Some(desc) = desc {
                user = user.with_desc(&desc);
            }
            print(&client.user_create(user)?)
        }
        Commands::UserUpdate {
            login,
            new_login,
            new_password,
            new_roles,
            new_desc,
        } => {
            let mut update = UserUpdate::new(&login);
            if let Some(new_login) = new_login {
                update = update.with_login(&new_login);
            }
            if let Some(new_password) = new_password {
                update = update.with_password(&new_password);
            }
            if !new_roles.is_empty() {
                update = update.with_roles(new_roles);
            }
            if let Some(new_desc) = new_desc {
                update = update.with_desc(&new_desc);
            }
            print(&client.user_update(update)?)
        }
        Commands::UserRemove { login } => print(&client.user_remove(&login)?),
        Commands::Channels => print(&client.channel_list()?),
        Commands::Cells => print(&client.cell_list()?),
        Commands::Stations => print(&client.bs_list()?),
        Commands::Tags => print(&client.tag_list()?),
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut client = ExlClient::new(cli.connect.client_config());
    client
        .connect()
        .with_context(|| format!("cannot connect to {}:{}", cli.connect.host, cli.connect.port))?;

    let login = client.login(&cli.connect.username, &cli.connect.password)?;
    if !login.is_ack() {
        print(&login)?;
        client.disconnect();
        bail!("login as {} was refused", cli.connect.username);
    }

    let result = run(&mut client, cli.command);
    if client.state() == ClientState::Authenticated {
        let _ = client.logout();
    }
    client.disconnect();
    result
}
