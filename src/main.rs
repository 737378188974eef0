//! walletctl - command-line client for the wallet backend

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

use wallet_dashboard::api::validation::TransferForm;
use wallet_dashboard::cli::commands;
use wallet_dashboard::config::Config;

/// walletctl - wallets, transfers and dashboard from the terminal
#[derive(Parser)]
#[command(name = "walletctl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "walletctl.toml")]
    config: String,

    /// Emit JSON log lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and remember the session
    Login {
        #[arg(short, long)]
        username: String,

        /// Password (prompted when omitted)
        #[arg(long, env = "WALLETCTL_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Forget the stored session
    Logout,

    /// Create a new account
    Signup {
        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        #[arg(short, long)]
        username: String,

        #[arg(long)]
        email: String,

        #[arg(long)]
        phone_number: String,

        /// Password (prompted when omitted)
        #[arg(long, env = "WALLETCTL_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Show the logged-in user
    Whoami,

    /// List your wallets and balances
    Wallets,

    /// Show transaction history
    Transactions {
        /// Page number, starting at 0
        #[arg(short, long, default_value = "0")]
        page: u32,

        /// Entries per page (default from config)
        #[arg(short, long)]
        size: Option<u32>,
    },

    /// Send money to another wallet
    Transfer {
        /// Amount to send
        amount: String,

        /// IBAN of your sending wallet
        #[arg(long)]
        from: String,

        /// IBAN of the receiving wallet
        #[arg(long)]
        to: String,

        #[arg(short, long)]
        description: String,

        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Show wallet count, total assets and weekly/monthly totals
    Dashboard,

    /// Show current configuration (secrets masked)
    Config,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("wallet_dashboard=info".parse().expect("valid directive"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    init_tracing(cli.log_json || config.logging.json);

    let result = match cli.command {
        Commands::Login { username, password } => commands::login(&config, &username, password).await,
        Commands::Logout => commands::logout(&config).await,
        Commands::Signup {
            first_name,
            last_name,
            username,
            email,
            phone_number,
            password,
        } => {
            commands::signup(
                &config,
                &first_name,
                &last_name,
                &username,
                &email,
                &phone_number,
                password,
            )
            .await
        }
        Commands::Whoami => commands::whoami(&config).await,
        Commands::Wallets => commands::wallets(&config).await,
        Commands::Transactions { page, size } => commands::transactions(&config, page, size).await,
        Commands::Transfer {
            amount,
            from,
            to,
            description,
            force,
        } => {
            let form = TransferForm {
                amount,
                from_wallet_iban: from,
                to_wallet_iban: to,
                description,
            };
            commands::transfer(&config, form, force).await
        }
        Commands::Dashboard => commands::dashboard(&config).await,
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
