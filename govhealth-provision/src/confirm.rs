//! Operator confirmation gates for destructive actions.
//!
//! The gate is a capability injected into the services so teardown logic can
//! be exercised without a terminal attached.

use std::io::{self, BufRead, Write};

/// Human-in-the-loop gate consulted before destructive actions.
pub trait Confirmation {
    /// Ask a yes/no question; only an explicit "yes" affirms.
    fn confirm(&self, prompt: &str) -> bool;

    /// Ask the operator to type an exact phrase. Reserved for the most
    /// destructive gates.
    fn confirm_phrase(&self, prompt: &str, phrase: &str) -> bool;
}

/// Reads answers from the terminal. Refuses everything when stdin is not a
/// TTY so scripted runs never hang on a prompt.
pub struct TerminalConfirmation;

impl TerminalConfirmation {
    fn read_answer(prompt: &str) -> Option<String> {
        if !atty::is(atty::Stream::Stdin) {
            log::warn!("stdin is not a terminal; refusing: {prompt}");
            return None;
        }
        print!("{prompt} ");
        io::stdout().flush().ok()?;
        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer).ok()?;
        Some(answer.trim().to_string())
    }
}

impl Confirmation for TerminalConfirmation {
    fn confirm(&self, prompt: &str) -> bool {
        Self::read_answer(&format!("{prompt} (yes/no):"))
            .is_some_and(|answer| answer.eq_ignore_ascii_case("yes"))
    }

    fn confirm_phrase(&self, prompt: &str, phrase: &str) -> bool {
        Self::read_answer(&format!("{prompt} Type '{phrase}' to confirm:"))
            .is_some_and(|answer| answer == phrase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    struct ScriptedConfirmation {
        answers: RefCell<VecDeque<bool>>,
    }

    impl Confirmation for ScriptedConfirmation {
        fn confirm(&self, _prompt: &str) -> bool {
            self.answers.borrow_mut().pop_front().unwrap_or(false)
        }

        fn confirm_phrase(&self, prompt: &str, _phrase: &str) -> bool {
            self.confirm(prompt)
        }
    }

    #[test]
    fn test_gate_is_usable_as_trait_object() {
        let scripted = ScriptedConfirmation {
            answers: RefCell::new(VecDeque::from([true, false])),
        };
        let gate: &dyn Confirmation = &scripted;
        assert!(gate.confirm("first"));
        assert!(!gate.confirm("second"));
        assert!(!gate.confirm_phrase("exhausted", "DELETE"));
    }
}
