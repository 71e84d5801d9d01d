use std::sync::Arc;

use gatekeep_application::{AdminDirectoryView, SessionController, SessionState};
use gatekeep_core::{AppError, AppResult, UserIdentity};
use gatekeep_infrastructure::StaticIdentityProvider;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::commands::{ConsoleCommand, HELP_TEXT};

/// Line-oriented front end over one session.
pub struct SessionConsole {
    session: Arc<SessionController>,
    admin_view: Arc<AdminDirectoryView>,
    identity_provider: Arc<StaticIdentityProvider>,
}

impl SessionConsole {
    pub fn new(
        session: Arc<SessionController>,
        admin_view: Arc<AdminDirectoryView>,
        identity_provider: Arc<StaticIdentityProvider>,
    ) -> Self {
        Self {
            session,
            admin_view,
            identity_provider,
        }
    }

    pub async fn run(&self) -> AppResult<()> {
        println!("{HELP_TEXT}");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|error| AppError::Internal(format!("failed to read stdin: {error}")))?
        {
            if line.trim().is_empty() {
                continue;
            }

            match line.parse::<ConsoleCommand>() {
                Ok(ConsoleCommand::Quit) => break,
                Ok(command) => self.execute(command).await,
                Err(error) => println!("{error}\n{HELP_TEXT}"),
            }
        }

        self.session.sign_out().await;
        Ok(())
    }

    async fn execute(&self, command: ConsoleCommand) {
        debug!(?command, "console command");

        match command {
            ConsoleCommand::SignIn => {
                if let Err(AppError::Conflict(reason)) = self.session.sign_in().await {
                    println!("{reason}");
                }
                self.print_status().await;
            }
            ConsoleCommand::SignOut => {
                self.session.sign_out().await;
                self.print_status().await;
            }
            ConsoleCommand::SwitchProfile { subject, email } => {
                let display_name = subject.clone();
                self.identity_provider
                    .switch_profile(Some(UserIdentity::new(subject, display_name, email, None)))
                    .await;
                println!("next sign-in uses the new profile");
            }
            ConsoleCommand::Status => self.print_status().await,
            ConsoleCommand::Refresh => {
                if self.admin_command_allowed().await {
                    if let Err(error) = self.admin_view.refresh().await {
                        debug!(%error, "directory refresh failed");
                    }
                    self.print_listing().await;
                }
            }
            ConsoleCommand::List => {
                if self.admin_command_allowed().await {
                    self.print_listing().await;
                }
            }
            ConsoleCommand::Toggle(account_id) => {
                if self.admin_command_allowed().await {
                    match self.admin_view.toggle(&account_id).await {
                        Ok(active) => println!(
                            "{account_id} is now {}",
                            if active { "active" } else { "inactive" }
                        ),
                        Err(AppError::Conflict(reason)) => println!("{reason}"),
                        Err(error) => debug!(%error, "toggle failed"),
                    }
                    self.print_listing().await;
                }
            }
            ConsoleCommand::Help => println!("{HELP_TEXT}"),
            ConsoleCommand::Quit => {}
        }

        if let Some(message) = self.session.last_error().await {
            println!("error: {message}");
        }
    }

    async fn admin_command_allowed(&self) -> bool {
        let available = self.admin_view.is_available().await;
        if !available {
            println!("the account directory is only available to administrators");
        }
        available
    }

    async fn print_status(&self) {
        match self.session.state().await {
            SessionState::SignedOut => println!("signed out"),
            SessionState::Authenticating => println!("signing in..."),
            SessionState::Rejected(reason) => println!("sign-in rejected: {reason:?}"),
            SessionState::Authenticated(session) => {
                let identity = session.identity();
                println!(
                    "signed in as {} <{}> role={} since {}",
                    identity.display_name(),
                    identity.email().unwrap_or("no email"),
                    session.role(),
                    session.established_at().to_rfc3339()
                );
                if let Some(avatar_url) = identity.avatar_url() {
                    println!("avatar: {avatar_url}");
                }
            }
        }
    }

    async fn print_listing(&self) {
        let listing = self.admin_view.listing().await;
        if listing.is_empty() {
            println!("(no accounts loaded)");
            return;
        }

        println!("{:<32} {:<32} {:<6} status", "id", "email", "role");
        for record in listing {
            println!(
                "{:<32} {:<32} {:<6} {}",
                record.id(),
                record.email().unwrap_or("-"),
                record.role(),
                if record.is_active() { "active" } else { "inactive" }
            );
        }
    }
}
