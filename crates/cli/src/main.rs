//! Shoplane CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! shoplane-cli migrate
//!
//! # Promote a customer to administrator
//! shoplane-cli user set-role -e admin@example.com -r admin
//! ```
//!
//! Every command reads `DATABASE_URL` from the environment or `.env`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "shoplane-cli")]
#[command(author, version, about = "Shoplane CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage customer accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Change an account's role
    SetRole {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Role (`user` or `admin`)
        #[arg(short, long)]
        role: String,
    },
    /// Allow an account to log in again
    Activate {
        #[arg(short, long)]
        email: String,
    },
    /// Block an account from logging in
    Deactivate {
        #[arg(short, long)]
        email: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::User { action } => match action {
            UserAction::SetRole { email, role } => commands::user::set_role(&email, &role).await?,
            UserAction::Activate { email } => commands::user::set_active(&email, true).await?,
            UserAction::Deactivate { email } => commands::user::set_active(&email, false).await?,
        },
    }
    Ok(())
}
