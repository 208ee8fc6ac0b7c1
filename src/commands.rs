use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use bs_auth::{
    Credentials, EnvSecretProvider, FileTokenStore, SessionMachine, SessionState, SupabaseGateway,
};
use bs_books::{BookClient, Catalog};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::navigation::{AuthIntent, Navigator, Route};

#[derive(Parser)]
#[command(name = "bookshelf")]
#[command(about = "Browse books and manage your bookshelf session", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register a new account
    Signup(CredentialArgs),

    /// Sign in to an existing account
    Login(CredentialArgs),

    /// Sign out and forget the stored session
    Logout,

    /// Check for a stored session and renew it
    Status,

    /// List catalog titles, optionally filtered
    Books {
        /// Case-insensitive title filter
        query: Option<String>,
    },

    /// Look up a book's metadata on Open Library
    Book {
        /// Book title
        title: String,
    },
}

#[derive(Args)]
pub struct CredentialArgs {
    #[arg(short, long)]
    pub email: String,

    /// Read from stdin when omitted
    #[arg(short, long)]
    pub password: Option<String>,
}

impl CredentialArgs {
    fn into_credentials(self) -> Result<Credentials> {
        let password = match self.password {
            Some(password) => password,
            None => {
                let mut line = String::new();
                std::io::stdin()
                    .lock()
                    .read_line(&mut line)
                    .context("Failed to read password from stdin")?;
                line.trim_end_matches(['\r', '\n']).to_string()
            }
        };
        Ok(Credentials::new(self.email, password))
    }
}

/// Renders transitions the way the auth screen would
fn print_transition(state: &SessionState) {
    match state {
        SessionState::Idle => {}
        SessionState::Loading => eprintln!("Working..."),
        SessionState::Success(message) => println!("{}", message),
        SessionState::Error(message) => eprintln!("Error: {}", message),
    }
}

async fn build_machine(config: &AppConfig) -> Result<SessionMachine> {
    let gateway = SupabaseGateway::new(config.supabase_config()?)
        .context("Failed to create Supabase client")?;

    let storage_dir = match &config.storage.dir {
        Some(dir) => dir.clone(),
        None => FileTokenStore::default_storage_dir()?,
    };
    let secrets = Arc::new(EnvSecretProvider::new(&config.storage.passphrase_env));
    let store = FileTokenStore::with_key_source(&storage_dir, secrets, config.key_source())
        .await
        .with_context(|| format!("Failed to open token store at {}", storage_dir.display()))?;

    let machine = SessionMachine::new(Arc::new(gateway), Arc::new(store));
    machine.observe(Arc::new(print_transition));
    Ok(machine)
}

fn exit_code(state: &SessionState) -> ExitCode {
    match state {
        SessionState::Error(_) => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    }
}

async fn authenticate(config: &AppConfig, args: CredentialArgs, intent: AuthIntent) -> Result<ExitCode> {
    let credentials = args.into_credentials()?;
    let machine = build_machine(config).await?;

    let navigator = Arc::new(Navigator::new(Route::Auth));
    machine.observe(navigator.clone());
    navigator.arm(intent);

    let terminal = match intent {
        AuthIntent::SignUp => machine.sign_up(&credentials).await?,
        AuthIntent::Login => machine.login(&credentials).await?,
    };

    debug!(history = ?navigator.history(), "Navigation after authentication");
    if navigator.current() == Some(Route::BookList) {
        print_books(&Catalog::default(), "");
    }
    Ok(exit_code(&terminal))
}

fn print_books(catalog: &Catalog, query: &str) {
    for title in catalog.filter(query) {
        println!("{}", title);
    }
}

pub async fn run(cli: Cli, config: AppConfig) -> Result<ExitCode> {
    match cli.command {
        Commands::Signup(args) => authenticate(&config, args, AuthIntent::SignUp).await,
        Commands::Login(args) => authenticate(&config, args, AuthIntent::Login).await,
        Commands::Logout => {
            let machine = build_machine(&config).await?;
            let terminal = machine.logout().await?;
            Ok(exit_code(&terminal))
        }
        Commands::Status => {
            let machine = build_machine(&config).await?;
            let terminal = machine.restore_session().await?;
            Ok(exit_code(&terminal))
        }
        Commands::Books { query } => {
            print_books(&Catalog::default(), query.as_deref().unwrap_or_default());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Book { title } => {
            let client = BookClient::new(config.book_client_config()?)?;
            info!("Looking up {:?}", title);
            let description = client
                .describe(&title)
                .await
                .with_context(|| format!("Failed to look up {:?}", title))?;
            println!("{}\n\n{}", title, description);
            Ok(ExitCode::SUCCESS)
        }
    }
}
