use anyhow::Result;
use clap::Parser;
use evreg::commands::{self, Config};
use evreg::http::error_message;
use evreg::types::CreateEventRequest;
use log::debug;
use std::path::PathBuf;
use std::process::ExitCode;

/// evreg - event registration client
///
/// Sign up, sign in, and browse or join events from the command line.
///
/// Credentials are kept in the state directory (~/.evreg by default) and are
/// refreshed automatically when the server reports that they expired.
///
/// Examples:
///   evreg login --email you@example.com
///   evreg events list
///   evreg events join <EVENT_ID>
#[derive(Parser, Debug)]
#[command(author, version = env!("EVREG_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// State directory for stored credentials (also via EVREG_HOME)
    #[arg(long = "home", env = "EVREG_HOME", value_name = "PATH", global = true)]
    pub state_dir: Option<PathBuf>,

    /// API base URL (overrides EVREG_API_BASE_URL)
    #[arg(long = "api-url", value_name = "URL", global = true)]
    pub api_url: Option<String>,

    /// Fail on the first error instead of retrying with backoff
    #[arg(long = "no-retry", global = true)]
    pub no_retry: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Create a new account
    Signup(SignupArgs),

    /// Sign in and store the session
    Login(LoginArgs),

    /// Forget the stored session
    Logout,

    /// Show whether a session is stored
    Status,

    /// Show the signed-in user
    Whoami,

    /// Browse, create and join events
    #[command(subcommand)]
    Events(EventsCommand),
}

#[derive(clap::Args, Debug)]
pub struct SignupArgs {
    #[arg(long)]
    pub first_name: String,

    #[arg(long)]
    pub last_name: String,

    #[arg(long)]
    pub email: String,

    /// Account password (also via EVREG_PASSWORD)
    #[arg(long, env = "EVREG_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(clap::Args, Debug)]
pub struct LoginArgs {
    #[arg(long)]
    pub email: String,

    /// Account password (also via EVREG_PASSWORD)
    #[arg(long, env = "EVREG_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(clap::Subcommand, Debug)]
enum EventsCommand {
    /// List all events
    List,

    /// Show one event
    Show {
        #[arg(value_name = "EVENT_ID")]
        id: String,
    },

    /// Create an event
    Create(CreateEventArgs),

    /// Register the signed-in user for an event
    Join {
        #[arg(value_name = "EVENT_ID")]
        id: String,
    },
}

#[derive(clap::Args, Debug)]
pub struct CreateEventArgs {
    /// Event category, e.g. "meetup"
    #[arg(long = "type")]
    pub event_type: String,

    #[arg(long)]
    pub title: String,

    #[arg(long, default_value = "")]
    pub description: String,

    /// Event date (ISO 8601)
    #[arg(long)]
    pub date: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            debug!("{:?}", e);
            eprintln!("Error: {}", error_message(&e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::new(evreg::runtime::RealRuntime, cli.state_dir, cli.api_url)?
        .with_retries(!cli.no_retry);

    match cli.command {
        Commands::Signup(args) => {
            commands::auth::signup(
                &config,
                &args.first_name,
                &args.last_name,
                &args.email,
                &args.password,
            )
            .await?
        }
        Commands::Login(args) => commands::auth::login(&config, &args.email, &args.password).await?,
        Commands::Logout => commands::auth::logout(&config)?,
        Commands::Status => commands::auth::status(&config)?,
        Commands::Whoami => commands::auth::whoami(&config).await?,
        Commands::Events(command) => match command {
            EventsCommand::List => commands::events::list(&config).await?,
            EventsCommand::Show { id } => commands::events::show(&config, &id).await?,
            EventsCommand::Create(args) => {
                let request = CreateEventRequest {
                    event_type: args.event_type,
                    event_title: args.title,
                    description: args.description,
                    date: args.date,
                };
                commands::events::create(&config, request).await?
            }
            EventsCommand::Join { id } => commands::events::join(&config, &id).await?,
        },
    }
    Ok(())
}
