use std::str::FromStr;

use gatekeep_core::AppError;
use gatekeep_domain::SubjectId;

pub const HELP_TEXT: &str = "\
commands:
  sign-in                  sign in with the development provider
  sign-out                 end the current session
  as <subject> [email]     change the profile returned by the next sign-in
  status                   show session state and the current error
  refresh                  reload the account directory (admin only)
  list                     show the last loaded account directory (admin only)
  toggle <account-id>      activate or deactivate an account (admin only)
  help                     show this help
  quit                     sign out and exit";

/// A single line of console input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    SignIn,
    SignOut,
    SwitchProfile {
        subject: String,
        email: Option<String>,
    },
    Status,
    Refresh,
    List,
    Toggle(SubjectId),
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = AppError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Err(AppError::Validation("empty command".to_owned()));
        };
        let arguments: Vec<&str> = words.collect();

        let command = match (name, arguments.as_slice()) {
            ("sign-in" | "login", []) => Self::SignIn,
            ("sign-out" | "logout", []) => Self::SignOut,
            ("as", [subject]) => Self::SwitchProfile {
                subject: (*subject).to_owned(),
                email: None,
            },
            ("as", [subject, email]) => Self::SwitchProfile {
                subject: (*subject).to_owned(),
                email: Some((*email).to_owned()),
            },
            ("status", []) => Self::Status,
            ("refresh", []) => Self::Refresh,
            ("list", []) => Self::List,
            ("toggle", [account_id]) => Self::Toggle(SubjectId::new(*account_id)?),
            ("help" | "?", []) => Self::Help,
            ("quit" | "exit", []) => Self::Quit,
            _ => {
                return Err(AppError::Validation(format!(
                    "unrecognized command '{}'",
                    line.trim()
                )));
            }
        };

        Ok(command)
    }
}
