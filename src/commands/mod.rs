/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

It exposes four top-level command modules:

- `whoami` - Ask the backend for the current session
- `login`  - Submit credentials
- `logout` - End the session
- `guard`  - Run a guard, answering the login prompt in the terminal

Every handler builds its own [`AuthCoordinator`] from the configuration;
the terminal stands in for the login form and a [`MemoryNavigator`] for the
application's router.
*/

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;

use crate::config::Config;
use crate::error::{is_cancellation, Result};
use crate::security::{
    AuthCoordinator, ChannelLoginUi, Credentials, LoginPromptEvent, MemoryNavigator, RetryReason,
};

/// Location the CLI pretends to be at while a guard runs.
const PROTECTED_PATH: &str = "/protected";

/// Everything a command handler needs to drive the coordinator.
struct Session {
    coordinator: Arc<AuthCoordinator>,
    navigator: Arc<MemoryNavigator>,
    prompts: UnboundedReceiver<LoginPromptEvent>,
}

fn connect(config: &Config, initial_path: &str) -> Result<Session> {
    let (ui, prompts) = ChannelLoginUi::new();
    let navigator = Arc::new(MemoryNavigator::new(initial_path));
    let coordinator = AuthCoordinator::from_config(config, Arc::new(ui), navigator.clone())?;
    Ok(Session {
        coordinator,
        navigator,
        prompts,
    })
}

// Terminal credential prompt
pub mod prompt {
    //! Reads credentials from the terminal.
    //!
    //! Readline is blocking, so every read happens on a blocking task.

    use super::*;
    use std::borrow::Cow;

    use rustyline::config::Configurer;
    use rustyline::error::ReadlineError;
    use rustyline::highlight::Highlighter;
    use rustyline::history::DefaultHistory;
    use rustyline::{ColorMode, DefaultEditor, Editor};
    use rustyline::{Completer, Helper, Hinter, Validator};

    /// Line helper that renders every typed character as `*`.
    #[derive(Completer, Helper, Hinter, Validator)]
    struct MaskedInput;

    impl Highlighter for MaskedInput {
        fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
            Cow::Owned("*".repeat(line.chars().count()))
        }

        fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
            true
        }
    }

    /// Prints the banner for a login prompt.
    pub fn print_banner(reason: Option<RetryReason>) {
        println!();
        match reason {
            Some(reason) => println!("{}", reason.message()),
            None => println!("Please log in."),
        }
        println!("(leave the e-mail empty to cancel)");
    }

    /// Reads one line with `label` as the prompt.
    ///
    /// Returns `None` on an empty line, Ctrl-C, or Ctrl-D.
    pub async fn read_line(label: &'static str) -> Result<Option<String>> {
        let line = tokio::task::spawn_blocking(move || -> Result<Option<String>> {
            let mut rl = DefaultEditor::new()?;
            finish_line(rl.readline(label))
        })
        .await??;
        Ok(line)
    }

    /// Reads one line without echoing it or adding it to the history.
    ///
    /// Returns `None` on an empty line, Ctrl-C, or Ctrl-D.
    pub async fn read_secret(label: &'static str) -> Result<Option<String>> {
        let line = tokio::task::spawn_blocking(move || -> Result<Option<String>> {
            let mut rl = Editor::<MaskedInput, DefaultHistory>::new()?;
            rl.set_helper(Some(MaskedInput));
            rl.set_color_mode(ColorMode::Forced);
            rl.set_auto_add_history(false);
            finish_line(rl.readline(label))
        })
        .await??;
        Ok(line)
    }

    fn finish_line(read: std::result::Result<String, ReadlineError>) -> Result<Option<String>> {
        match read {
            Ok(line) => {
                let trimmed = line.trim().to_string();
                Ok((!trimmed.is_empty()).then_some(trimmed))
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Reads an e-mail address and password.
    ///
    /// Returns `None` when the user leaves either one empty.
    pub async fn read_credentials() -> Result<Option<Credentials>> {
        let Some(email) = read_line("E-mail: ").await? else {
            return Ok(None);
        };
        let Some(password) = read_secret("Password: ").await? else {
            return Ok(None);
        };
        Ok(Some(Credentials::new(email, password)))
    }

    /// Answers one login flow: prompts until the login succeeds or the user
    /// gives up, in which case the flow is cancelled.
    pub async fn answer_login(
        coordinator: &AuthCoordinator,
        reason: Option<RetryReason>,
    ) -> Result<()> {
        print_banner(reason);
        loop {
            let Some(credentials) = read_credentials().await? else {
                coordinator.cancel_login();
                return Ok(());
            };

            match coordinator.login(&credentials).await {
                Ok(true) => return Ok(()),
                Ok(false) => {
                    println!("Login failed. Please check your credentials and try again.")
                }
                Err(e) => println!("There was a problem with authenticating: {}", e),
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_masked_input_hides_every_character() {
            assert_eq!(MaskedInput.highlight("hunter2", 7), "*******");
            assert_eq!(MaskedInput.highlight("pässwörd", 0), "********");
            assert!(MaskedInput.highlight_char("h", 1, false));
        }

        #[test]
        fn test_finish_line_treats_blank_and_interrupt_as_none() {
            assert_eq!(
                finish_line(Ok("  jo@example.com \n".to_string())).unwrap(),
                Some("jo@example.com".to_string())
            );
            assert_eq!(finish_line(Ok("   ".to_string())).unwrap(), None);
            assert_eq!(finish_line(Err(ReadlineError::Interrupted)).unwrap(), None);
            assert_eq!(finish_line(Err(ReadlineError::Eof)).unwrap(), None);
        }
    }
}

// Session lookup
pub mod whoami {
    use super::*;

    /// Prints the user the backend reports for the current session.
    pub async fn run_whoami(config: Config) -> Result<()> {
        let session = connect(&config, "/")?;
        let state = session.coordinator.request_current_user().await?;
        match state.identity() {
            Some(identity) => {
                println!("{}", serde_json::to_string_pretty(identity)?);
                if state.is_admin() {
                    println!("(administrator)");
                }
            }
            None => println!("Not logged in"),
        }
        Ok(())
    }
}

// Login command
pub mod login {
    use super::*;

    /// Logs in, prompting for the password when it was not given.
    pub async fn run_login(config: Config, email: String, password: Option<String>) -> Result<()> {
        let session = connect(&config, "/")?;
        let password = match password {
            Some(password) => password,
            None => match prompt::read_secret("Password: ").await? {
                Some(password) => password,
                None => {
                    println!("Login cancelled");
                    return Ok(());
                }
            },
        };

        let credentials = Credentials::new(email, password);
        if session.coordinator.login(&credentials).await? {
            let name = session
                .coordinator
                .current_user()
                .map(|identity| identity.display_name())
                .unwrap_or_default();
            println!("Logged in as {}", name);
        } else {
            println!("Login failed. Please check your credentials and try again.");
        }
        Ok(())
    }
}

// Logout command
pub mod logout {
    use super::*;

    /// Logs out and reports where the application ended up.
    pub async fn run_logout(config: Config, redirect: Option<String>) -> Result<()> {
        let session = connect(&config, PROTECTED_PATH)?;
        session.coordinator.logout(redirect.as_deref()).await?;
        println!("Logged out; now at {}", session.navigator.current());
        Ok(())
    }
}

// Guard command
pub mod guard {
    use super::*;

    /// Runs a guard and answers any login prompt it raises.
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    /// * `admin` - Require an administrator rather than any logged-in user
    pub async fn run_guard(config: Config, admin: bool) -> Result<()> {
        let Session {
            coordinator,
            navigator,
            mut prompts,
        } = connect(&config, PROTECTED_PATH)?;

        coordinator.restore_session().await;

        let mut guard = if admin {
            coordinator.require_admin_user()
        } else {
            coordinator.require_authenticated_user()
        };

        let outcome = loop {
            tokio::select! {
                outcome = &mut guard => break outcome,
                Some(event) = prompts.recv() => match event {
                    LoginPromptEvent::Show { flow_id, reason } => {
                        tracing::debug!(flow_id, "Answering login prompt");
                        prompt::answer_login(&coordinator, reason).await?;
                    }
                    LoginPromptEvent::Dismiss { flow_id, outcome } => {
                        tracing::debug!(flow_id, ?outcome, "Login prompt dismissed");
                    }
                },
            }
        };

        match outcome {
            Ok(()) => {
                let name = coordinator
                    .current_user()
                    .map(|identity| identity.display_name())
                    .unwrap_or_default();
                println!("Access granted to {} for {}", name, navigator.current());
                Ok(())
            }
            Err(e) if is_cancellation(&e) => {
                println!("Access not granted; now at {}", navigator.current());
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
