//! Emporium CLI - database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply storefront database migrations
//! emporium migrate
//!
//! # Create the first admin (password from --password or EMPORIUM_USER_PASSWORD)
//! emporium user create -e admin@example.com -n "Admin Name" -r admin
//!
//! # Load the sample catalog, owned by an existing admin
//! emporium seed products --owner-email admin@example.com
//! ```
//!
//! All commands read `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "emporium")]
#[command(author, version, about = "Emporium CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply database migrations
    Migrate,
    /// Insert sample data
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Manage user accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Insert the sample product catalog (existing names are skipped)
    Products {
        /// Email of the admin who will own the products
        #[arg(long)]
        owner_email: String,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new account
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Role (`admin` or `user`)
        #[arg(short, long, default_value = "admin")]
        role: String,

        /// Password; must satisfy the sign-up strength rules
        #[arg(long, env = "EMPORIUM_USER_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Products { owner_email } => {
                commands::seed::products(&owner_email).await?;
            }
        },
        Commands::User { action } => match action {
            UserAction::Create {
                email,
                name,
                role,
                password,
            } => {
                commands::user::create(&email, &name, &role, &password).await?;
            }
        },
    }
    Ok(())
}
