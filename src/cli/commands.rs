//! CLI command implementations

use anyhow::Result;
use chrono::Local;
use dialoguer::{Confirm, Password};
use tracing::{info, warn};

use crate::api::client::BackendClient;
use crate::api::types::{LoginRequest, PageRequest, SignupRequest};
use crate::api::validation::TransferForm;
use crate::config::Config;
use crate::error::Error;
use crate::ledger::aggregator::{direction, resolve_party, Direction, ResolvedParty};
use crate::ledger::dashboard::Dashboard;
use crate::ledger::types::{decode_transaction_page, decode_wallets, Party};
use crate::session::guard::{authorize, Access};
use crate::session::store::{FileSessionStore, SessionStore};
use crate::session::types::UserIdentity;

/// Roles allowed to use the wallet commands
const WALLET_ROLES: &[&str] = &["ROLE_USER", "ROLE_ADMIN"];

fn session_store(config: &Config) -> FileSessionStore {
    FileSessionStore::new(config.session.path.clone())
}

/// Client carrying the stored session's token, if any
fn backend(config: &Config, store: &dyn SessionStore) -> Result<BackendClient> {
    let session = store.get().unwrap_or_else(|e| {
        warn!(error = %e, "Stored session unreadable, continuing without it");
        None
    });
    Ok(BackendClient::new(&config.api)?.with_session(session.as_ref()))
}

/// Identity of the logged-in user, checked against the wallet roles
fn require_login(store: &dyn SessionStore) -> Result<UserIdentity> {
    let identity = store.current_identity();
    match authorize(identity.as_ref(), WALLET_ROLES) {
        Access::Granted => identity.ok_or_else(|| anyhow::anyhow!("Not logged in")),
        Access::Unauthenticated => anyhow::bail!("Not logged in. Run `walletctl login` first."),
        Access::Forbidden => anyhow::bail!(
            "Access denied: requires one of the roles {}",
            WALLET_ROLES.join(", ")
        ),
    }
}

/// Turn a library error into something the user can act on.
///
/// A rejected session is dropped from the store so the next command asks
/// for a fresh login.
fn explain(store: &dyn SessionStore, error: Error) -> anyhow::Error {
    if matches!(error, Error::Unauthorized) {
        if let Err(e) = store.clear() {
            warn!(error = %e, "Failed to clear rejected session");
        }
        return anyhow::anyhow!("Session expired. Run `walletctl login` to log in again.");
    }

    for message in error.user_messages() {
        println!("  ! {}", message);
    }
    anyhow::Error::new(error)
}

fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() > max {
        let head: String = value.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        value.to_string()
    }
}

fn party_label(party: Option<&Party>, viewer: &UserIdentity) -> String {
    match resolve_party(party, viewer) {
        ResolvedParty::Named(name) => name.to_string(),
        ResolvedParty::Unknown => "unknown".to_string(),
    }
}

/// Log in and store the session
pub async fn login(config: &Config, username: &str, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => Password::new().with_prompt("Password").interact()?,
    };

    let store = session_store(config);
    let client = BackendClient::new(&config.api)?;

    let request = LoginRequest {
        username: username.to_string(),
        password,
    };
    let session = client
        .login(&request)
        .await
        .map_err(|e| explain(&store, e))?;

    store.set(&session)?;

    println!("\nLogged in as {} (ID: {})", session.username, session.id);
    Ok(())
}

/// Forget the stored session
pub async fn logout(config: &Config) -> Result<()> {
    let store = session_store(config);
    let had_session = store.current_identity().is_some();
    store.clear()?;

    if had_session {
        info!("Logged out");
        println!("Logged out.");
    } else {
        println!("No active session.");
    }
    Ok(())
}

/// Register a new user
pub async fn signup(
    config: &Config,
    first_name: &str,
    last_name: &str,
    username: &str,
    email: &str,
    phone_number: &str,
    password: Option<String>,
) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => Password::new()
            .with_prompt("Password")
            .with_confirmation("Confirm password", "Passwords do not match")
            .interact()?,
    };

    let request = SignupRequest::new(first_name, last_name, username, email, password, phone_number);

    let store = session_store(config);
    let client = BackendClient::new(&config.api)?;
    client
        .signup(&request)
        .await
        .map_err(|e| explain(&store, e))?;

    println!("\nAccount created for {}. Run `walletctl login --username {}` to continue.", username, username);
    Ok(())
}

/// Show the logged-in user
pub async fn whoami(config: &Config) -> Result<()> {
    let store = session_store(config);
    match store.get()? {
        Some(session) => {
            println!("\n=== CURRENT SESSION ===\n");
            println!("Username: {}", session.username);
            println!("User ID:  {}", session.id);
            if let Some(email) = &session.email {
                println!("Email:    {}", email);
            }
            println!("Roles:    {}", session.roles.join(", "));
            println!("Session:  {}", store.path().display());
            println!();
        }
        None => println!("Not logged in."),
    }
    Ok(())
}

/// List the viewer's wallets
pub async fn wallets(config: &Config) -> Result<()> {
    let store = session_store(config);
    let viewer = require_login(&store)?;
    let client = backend(config, &store)?;

    let payload = client
        .wallets_by_user(viewer.id)
        .await
        .map_err(|e| explain(&store, e))?;
    let wallets = decode_wallets(Some(&payload)).map_err(|e| anyhow::anyhow!("{}", e))?;

    println!("\n=== WALLETS ===\n");
    if wallets.is_empty() {
        println!("No wallets found.");
        println!();
        return Ok(());
    }

    println!("{:<8} {:<20} {:<36} {:>14}", "ID", "NAME", "IBAN", "BALANCE");
    println!("{}", "-".repeat(80));

    for wallet in &wallets {
        let balance = match wallet.balance() {
            Ok(balance) => balance.round_dp(2).to_string(),
            Err(e) => {
                warn!(wallet_id = ?wallet.id, error = %e, "Unusable wallet balance");
                "n/a".to_string()
            }
        };
        println!(
            "{:<8} {:<20} {:<36} {:>14}",
            wallet.id.map(|id| id.to_string()).unwrap_or_default(),
            truncate(wallet.name.as_deref().unwrap_or(""), 20),
            wallet.iban.as_deref().unwrap_or(""),
            balance
        );
    }

    println!();
    Ok(())
}

/// Show one page of the viewer's transaction history
pub async fn transactions(config: &Config, page: u32, size: Option<u32>) -> Result<()> {
    let store = session_store(config);
    let viewer = require_login(&store)?;
    let client = backend(config, &store)?;

    let request = PageRequest::new(page, size.unwrap_or(config.transactions.page_size));
    let payload = client
        .transactions_by_user(viewer.id, request)
        .await
        .map_err(|e| explain(&store, e))?;
    let history = decode_transaction_page(Some(&payload)).map_err(|e| anyhow::anyhow!("{}", e))?;

    println!("\n=== TRANSACTION HISTORY ===\n");
    if history.content.is_empty() {
        println!("No transactions found.");
        println!();
        return Ok(());
    }

    println!(
        "{:<17} {:>12} {:<14} {:<14} {:<10} {}",
        "DATE", "AMOUNT", "FROM", "TO", "STATUS", "DESCRIPTION"
    );
    println!("{}", "-".repeat(90));

    for tx in &history.content {
        let date = tx
            .created_at_in(&Local)
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());

        let amount = match tx.amount() {
            Ok(amount) => match direction(tx, &viewer) {
                Direction::Outgoing => format!("-{}", amount),
                Direction::Incoming => format!("+{}", amount),
                Direction::SelfTransfer | Direction::Unrelated => amount.to_string(),
            },
            Err(_) => "n/a".to_string(),
        };

        println!(
            "{:<17} {:>12} {:<14} {:<14} {:<10} {}",
            date,
            amount,
            truncate(&party_label(tx.from_wallet.as_ref(), &viewer), 14),
            truncate(&party_label(tx.to_wallet.as_ref(), &viewer), 14),
            tx.status.as_deref().unwrap_or("-"),
            truncate(tx.description.as_deref().unwrap_or(""), 30)
        );
    }

    match (history.number, history.total_pages, history.total_elements) {
        (Some(number), Some(pages), Some(total)) => {
            println!("\nPage {} of {} ({} transactions)", number + 1, pages, total)
        }
        _ => println!("\nPage {}", page + 1),
    }
    if history.skipped > 0 {
        println!("{} malformed entries skipped", history.skipped);
    }

    println!();
    Ok(())
}

/// Send money from one of the viewer's wallets to another IBAN
pub async fn transfer(config: &Config, form: TransferForm, force: bool) -> Result<()> {
    let store = session_store(config);
    let viewer = require_login(&store)?;

    let request = match form.validate() {
        Ok(request) => request,
        Err(errors) => {
            for violation in errors.iter() {
                println!("  ! {}", violation);
            }
            anyhow::bail!("Transfer not sent: {} invalid field(s)", errors.len());
        }
    };

    let client = backend(config, &store)?;

    // Sender must be one of the viewer's own wallets
    let payload = client
        .wallets_by_user(viewer.id)
        .await
        .map_err(|e| explain(&store, e))?;
    let own_wallets = decode_wallets(Some(&payload)).map_err(|e| anyhow::anyhow!("{}", e))?;
    if !own_wallets
        .iter()
        .any(|w| w.iban.as_deref() == Some(request.from_wallet_iban.as_str()))
    {
        anyhow::bail!("{} is not one of your wallets", request.from_wallet_iban);
    }

    let receiver = match client.wallet_by_iban(&request.to_wallet_iban).await {
        Ok(wallet) => wallet,
        Err(Error::NotFound(_)) => anyhow::bail!("Receiver IBAN not found."),
        Err(e) => return Err(explain(&store, e)),
    };

    let owner = receiver.user.clone().unwrap_or_default();
    let receiver_id = owner.id.or(receiver.user_id);
    println!(
        "\nReceiver: {} (ID: {})",
        owner.display_name(),
        receiver_id.map(|id| id.to_string()).unwrap_or_else(|| "?".to_string())
    );
    println!("Amount:   {}", request.amount);
    println!("From:     {}", request.from_wallet_iban);
    println!("To:       {}", request.to_wallet_iban);
    println!("Note:     {}", request.description);

    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Send {} to {}? This cannot be undone.",
                request.amount, request.to_wallet_iban
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            info!("Transfer cancelled by user");
            return Ok(());
        }
    }

    client
        .transfer(&request)
        .await
        .map_err(|e| explain(&store, e))?;

    println!("\nTransfer completed.");
    Ok(())
}

/// Show wallet count, total assets and weekly/monthly net amounts
pub async fn dashboard(config: &Config) -> Result<()> {
    let store = session_store(config);
    require_login(&store)?;
    let client = backend(config, &store)?;
    let dashboard = Dashboard::new(&client, config.dashboard.clone());

    let summary = tokio::select! {
        summary = dashboard.load(&store, Local::now()) => summary.map_err(|e| explain(&store, e))?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Dashboard cancelled");
            return Ok(());
        }
    };

    if summary.session_expired {
        if let Err(e) = store.clear() {
            warn!(error = %e, "Failed to clear rejected session");
        }
        println!("Session expired. Run `walletctl login` to log in again.");
    }

    println!("\n=== DASHBOARD ===\n");
    println!("{:<28} {:>14}", "Wallets", summary.wallet_count);
    println!("{:<28} {:>14}", "Total assets", summary.total_assets.round_dp(2));
    println!(
        "{:<28} {:>14}",
        format!("This week ({})", summary.weekly.label),
        summary.weekly.net.total.round_dp(2)
    );
    println!(
        "{:<28} {:>14}",
        format!("This month ({})", summary.monthly.label),
        summary.monthly.net.total.round_dp(2)
    );

    let invalid = summary.weekly.net.stats.invalid_amounts.max(summary.monthly.net.stats.invalid_amounts);
    if invalid > 0 {
        println!("\n{} transaction(s) with unusable amounts counted as zero", invalid);
    }
    if summary.history_truncated {
        println!(
            "\nOnly the latest {} transactions were counted; raise dashboard.history_page_size for complete totals",
            config.dashboard.history_page_size
        );
    }

    println!();
    Ok(())
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}
