//! Password gate for the exit hotkey.
//!
//! Aucune dépendance graphique — ce module est purement logique.
//!
//! The host shell feeds it characters while it is open and acts on the
//! [`PromptOutcome`] returned by [`ExitPrompt::submit`].

use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptOutcome {
    Accepted,
    Rejected,
    Cancelled,
}

/// State of the exit password prompt.
pub struct ExitPrompt {
    password: String,
    input: String,
    open: bool,
    failed_attempts: u32,
}

// Hand-written so the password never ends up in logs.
impl std::fmt::Debug for ExitPrompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExitPrompt")
            .field("open", &self.open)
            .field("input_len", &self.input.chars().count())
            .field("failed_attempts", &self.failed_attempts)
            .finish()
    }
}

impl ExitPrompt {
    /// An empty `password` disables the hotkey exit: nothing is ever accepted.
    pub fn new(password: impl Into<String>) -> Self {
        let password = password.into();
        if password.is_empty() {
            warn!("No exit password configured, the exit hotkey cannot close the kiosk");
        }
        Self {
            password,
            input: String::new(),
            open: false,
            failed_attempts: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    /// Number of characters typed so far (for a masked display).
    pub fn input_len(&self) -> usize {
        self.input.chars().count()
    }

    pub fn open(&mut self) {
        self.input.clear();
        self.open = true;
    }

    pub fn push_char(&mut self, c: char) {
        if self.open && !c.is_control() {
            self.input.push(c);
        }
    }

    pub fn backspace(&mut self) {
        self.input.pop();
    }

    pub fn cancel(&mut self) -> PromptOutcome {
        self.input.clear();
        self.open = false;
        PromptOutcome::Cancelled
    }

    /// Checks the typed password. A rejected attempt clears the input and
    /// leaves the prompt open.
    pub fn submit(&mut self) -> PromptOutcome {
        if !self.open {
            return PromptOutcome::Cancelled;
        }
        let accepted = !self.password.is_empty()
            && constant_time_eq(self.input.as_bytes(), self.password.as_bytes());
        self.input.clear();

        if accepted {
            self.open = false;
            info!("Exit password accepted");
            PromptOutcome::Accepted
        } else {
            self.failed_attempts += 1;
            warn!(attempts = self.failed_attempts, "Exit password rejected");
            PromptOutcome::Rejected
        }
    }
}

/// Compares without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
