//! Band setlist server.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use setlist::api::{AppState, create_router};
use setlist::config::{AppConfig, DEFAULT_VOTE_THRESHOLD, UserDeletePolicy};
use setlist::db::{DbConfig, DbPool, NewUser, SettingsStore, UserRepository, run_migrations};
use setlist::identity::{DatabaseIdentityGate, IdentityGate};
use setlist::models::User;
use setlist::setlist::SetlistOrdering;

/// Song proposals, voting and setlist server for a band.
#[derive(Parser)]
#[command(name = "setlist")]
#[command(about = "Collect song proposals, vote on them and keep the setlist in order")]
struct Cli {
    /// Database file path
    #[arg(short, long, env = "DATABASE_URL", default_value = "setlist.db")]
    database: String,

    /// Server port
    #[arg(short, long, env = "PORT", default_value = "3000")]
    port: u16,

    /// Vote threshold used until an admin stores one
    #[arg(long, env = "VOTE_THRESHOLD", default_value_t = DEFAULT_VOTE_THRESHOLD,
          value_parser = clap::value_parser!(i32).range(1..))]
    vote_threshold: i32,

    /// Comma-separated admin emails, used while the stored allowlist is empty
    #[arg(long, env = "ADMIN_ALLOWLIST", value_delimiter = ',')]
    admin_allowlist: Vec<String>,

    /// Comma-separated non-admin emails allowed to sign in
    #[arg(long, env = "USER_ALLOWLIST", value_delimiter = ',')]
    user_allowlist: Vec<String>,

    /// What deleting a user with proposals or votes does
    #[arg(long, env = "USER_DELETE_POLICY", value_enum, default_value_t = UserDeletePolicy::Cascade)]
    user_delete_policy: UserDeletePolicy,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl Cli {
    fn app_config(&self) -> AppConfig {
        AppConfig {
            default_vote_threshold: self.vote_threshold,
            admin_allowlist: self.admin_allowlist.clone(),
            user_allowlist: self.user_allowlist.clone(),
            user_delete_policy: self.user_delete_policy,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create a user directly, bypassing the allowlists
    CreateUser {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        name: Option<String>,

        /// Create as admin user
        #[arg(short, long)]
        admin: bool,
    },

    /// Sign a user in through the allowlists and print their API key
    Admit {
        /// Verified email address
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Generate an API key for a user
    GenerateApiKey {
        /// Email of the user to generate API key for
        #[arg(short, long)]
        email: String,
    },

    /// Revoke (delete) an API key for a user
    RevokeApiKey {
        /// Email of the user to revoke API key for
        #[arg(short, long)]
        email: String,
    },

    /// Give approved proposals without a setlist position one at the end
    BackfillOrder,

    /// Start the server (default)
    Serve,
}

fn setup_database(database_url: &str) -> DbPool {
    let config = DbConfig::new(database_url);
    let pool = config.build_pool().expect("Failed to create database pool");

    // Run migrations
    let mut conn = pool.get().expect("Failed to get database connection");
    run_migrations(&mut conn).expect("Failed to run migrations");

    pool
}

fn exit_with(message: impl std::fmt::Display) -> ! {
    eprintln!("{}", message);
    std::process::exit(1);
}

fn find_user(repo: &UserRepository, email: &str) -> User {
    match repo.find_by_email(email) {
        Ok(Some(user)) => user,
        Ok(None) => exit_with(format!("User '{}' not found", email)),
        Err(e) => exit_with(format!("Database error: {}", e)),
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "setlist=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = cli.app_config();
    let pool = setup_database(&cli.database);

    match cli.command {
        Some(Commands::CreateUser { email, name, admin }) => {
            let repo = UserRepository::new(pool.clone());
            let new_user = if admin {
                NewUser::admin(&email)
            } else {
                NewUser::regular(&email)
            }
            .with_name(name.as_deref());

            match repo.create(&new_user) {
                Ok(user) => println!(
                    "Created user '{}' (id: {}, admin: {})",
                    user.email, user.id, user.is_admin
                ),
                Err(e) => exit_with(format!("Failed to create user: {}", e)),
            }
        }
        Some(Commands::Admit { email, name }) => {
            let settings = SettingsStore::new(pool.clone(), config.settings_defaults());
            let gate = DatabaseIdentityGate::new(UserRepository::new(pool.clone()), settings, &config);

            match gate.admit(&email, name.as_deref(), None) {
                Ok(sign_in) => {
                    let verb = if sign_in.created { "Created" } else { "Signed in" };
                    println!(
                        "{} user '{}' (id: {}, admin: {})",
                        verb, sign_in.user.email, sign_in.user.id, sign_in.user.is_admin
                    );
                    println!("{}", sign_in.api_key);
                }
                Err(e) => exit_with(format!("Sign-in refused: {}", e)),
            }
        }
        Some(Commands::GenerateApiKey { email }) => {
            let repo = UserRepository::new(pool.clone());
            let user = find_user(&repo, &email);
            match repo.generate_api_key(user.id) {
                Ok(api_key) => {
                    println!("Generated API key for user '{}':", user.email);
                    println!("{}", api_key);
                }
                Err(e) => exit_with(format!("Failed to generate API key: {}", e)),
            }
        }
        Some(Commands::RevokeApiKey { email }) => {
            let repo = UserRepository::new(pool.clone());
            let user = find_user(&repo, &email);
            match repo.revoke_api_key(user.id) {
                Ok(true) => println!("Revoked API key for user '{}'", user.email),
                Ok(false) => exit_with(format!("User '{}' not found", email)),
                Err(e) => exit_with(format!("Failed to revoke API key: {}", e)),
            }
        }
        Some(Commands::BackfillOrder) => {
            let ordering = SetlistOrdering::new(pool.clone(), Default::default());
            match ordering.backfill() {
                Ok(0) => println!("Every approved proposal already has a setlist position"),
                Ok(n) => println!("Assigned setlist positions to {} proposals", n),
                Err(e) => exit_with(format!("Backfill failed: {}", e)),
            }
        }
        Some(Commands::Serve) | None => {
            run_server(pool, cli.port, config).await;
        }
    }
}

async fn run_server(pool: DbPool, port: u16, config: AppConfig) {
    // Check if there are any users
    let repo = UserRepository::new(pool.clone());
    if !repo.has_users().unwrap_or(false) {
        tracing::warn!("No users found in database. Create one with:");
        tracing::warn!("  setlist create-user --email you@example.com --admin");
    }
    if config.admin_allowlist.is_empty() {
        tracing::warn!("ADMIN_ALLOWLIST is empty; only stored settings can grant admin on sign-in");
    }

    let app = create_router(AppState::new(pool, config));

    let addr = format!("0.0.0.0:{}", port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            tracing::error!("Is another process already using port {}?", port);
            std::process::exit(1);
        }
    };
    tracing::info!(
        "Setlist server listening on {}",
        listener
            .local_addr()
            .expect("listener should have local addr")
    );

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
