use histscrub_core::Result;

/// Operator approval taken before any repository data is touched
pub trait ConfirmationGate {
    /// Show `summary` and return whether the operator approved the run
    fn confirm(&mut self, summary: &str) -> Result<bool>;
}

/// Only a literal `yes` approves; surrounding whitespace is ignored
pub fn is_affirmative(answer: &str) -> bool {
    answer.trim() == "yes"
}

/// Gate with a canned answer
#[derive(Debug, Clone)]
pub struct ScriptedGate {
    answer: String,
    shown: Option<String>,
}

impl ScriptedGate {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            shown: None,
        }
    }

    pub fn approve() -> Self {
        Self::new("yes")
    }

    /// Summary presented by the last `confirm` call
    pub fn shown(&self) -> Option<&str> {
        self.shown.as_deref()
    }
}

impl ConfirmationGate for ScriptedGate {
    fn confirm(&mut self, summary: &str) -> Result<bool> {
        self.shown = Some(summary.to_string());
        Ok(is_affirmative(&self.answer))
    }
}
