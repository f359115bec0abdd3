//! Console Presenter - Line-oriented Front End
//!
//! Reads commands from stdin and drives the presenter action surface
//! (`connect`, `address <value>`, `balance [address]`, `status`,
//! `quit`). Renders the session on every change.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::domain::session::SessionView;
use crate::ports::provider::ProviderGateway;
use crate::usecases::connection::{ConnectOutcome, ConnectionStateMachine};

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Request account access.
    Connect,
    /// Set the input address.
    Address(String),
    /// Fetch the balance of the given address, or of the input address.
    Balance(Option<String>),
    /// Print the session.
    Status,
    /// Exit the application.
    Quit,
}

impl Command {
    /// Parse one input line.
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut parts = line.split_whitespace();
        let Some(verb) = parts.next() else {
            return Err("empty command".to_string());
        };
        let arg = parts.next().map(str::to_string);
        if parts.next().is_some() {
            return Err(format!("too many arguments for {verb}"));
        }

        match (verb.to_ascii_lowercase().as_str(), arg) {
            ("connect", None) => Ok(Self::Connect),
            ("address", Some(value)) => Ok(Self::Address(value)),
            ("address", None) => Ok(Self::Address(String::new())),
            ("balance", arg) => Ok(Self::Balance(arg)),
            ("status", None) => Ok(Self::Status),
            ("quit" | "exit", None) => Ok(Self::Quit),
            (other, _) => Err(format!(
                "unknown command {other:?} (connect | address <addr> | balance [addr] | status | quit)"
            )),
        }
    }
}

/// Spawn a task forwarding parsed stdin commands into `tx`.
pub fn spawn_stdin_reader(tx: mpsc::Sender<Command>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match Command::parse(&line) {
                    Ok(command) => {
                        if tx.send(command).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => println!("{e}"),
                },
                Ok(None) => {
                    debug!("stdin closed");
                    let _ = tx.send(Command::Quit).await;
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read stdin");
                    return;
                }
            }
        }
    })
}

/// Run a user command against the session.
///
/// `Quit` is handled by the caller.
pub async fn execute<G: ProviderGateway>(machine: &ConnectionStateMachine<G>, command: Command) {
    match command {
        Command::Connect => match machine.connect_wallet().await {
            Ok(ConnectOutcome::Connected(account)) => {
                println!("Connected {account}");
                machine.wait_for_refresh().await;
                println!("Balance: {}", machine.view().await.balance_label());
            }
            Ok(ConnectOutcome::NoAccounts) => println!("No accounts exposed"),
            Ok(ConnectOutcome::Rejected) => println!("User rejected the connection request."),
            Ok(ConnectOutcome::Superseded) => println!("Account changed meanwhile, ignored"),
            Err(e) => println!("Connection failed: {e}"),
        },
        Command::Address(value) => machine.set_input_address(value).await,
        Command::Balance(Some(address)) => {
            machine.set_input_address(address).await;
            report_balance(machine.fetch_input_balance().await);
        }
        Command::Balance(None) => report_balance(machine.fetch_input_balance().await),
        Command::Status => println!("{}", render(&machine.view().await)),
        Command::Quit => {}
    }
}

fn report_balance(result: Result<rust_decimal::Decimal, crate::domain::error::WalletError>) {
    match result {
        Ok(balance) => println!("Balance: {balance}"),
        Err(e) => println!("Error fetching balance: {e}"),
    }
}

/// Render a session snapshot.
pub fn render(view: &SessionView) -> String {
    let mut out = format!("[{}] {}", view.connect_label(), view.status_line());
    if view.is_connected && !view.input_address.is_empty() {
        out.push_str(&format!(" | Address: {}", view.input_address));
    }
    if let Some(error) = &view.last_error {
        out.push_str(&format!(" | Error: {error}"));
    }
    out
}

/// Print the session every time it changes, until the sender is dropped.
pub fn spawn_renderer(mut views: watch::Receiver<SessionView>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while views.changed().await.is_ok() {
            let view = views.borrow_and_update().clone();
            println!("{}", render(&view));
        }
    })
}

/// Shared handle used by `main` to run commands without blocking input.
pub fn spawn_execute<G: ProviderGateway>(
    machine: Arc<ConnectionStateMachine<G>>,
    command: Command,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move { execute(&machine, command).await })
}
