//! Confirmation gate ahead of destructive steps.

/// Literal the user must type before any resource is dropped.
/// Comparison is exact and case-sensitive.
pub const CONFIRMATION_TOKEN: &str = "DELETE";

/// Injected capability for asking the operator a question.
///
/// The CLI backs this with stdin; tests supply a canned response so no
/// interactive I/O is needed.
pub trait ConfirmationPrompt: Send + Sync {
    fn ask(&self, message: &str) -> String;
}

/// Prompt returning a fixed response. Test/automation helper.
pub struct StaticPrompt(pub String);

impl ConfirmationPrompt for StaticPrompt {
    fn ask(&self, _message: &str) -> String {
        self.0.clone()
    }
}

/// Decide whether destruction may proceed.
///
/// With `require == false` the gate is bypassed unconditionally. That is an
/// escape hatch for non-interactive runs and is dangerous: nothing else
/// stands between the caller and the drop calls.
pub fn confirm_destruction(require: bool, prompt: &dyn ConfirmationPrompt) -> bool {
    if !require {
        return true;
    }
    let message = format!(
        "This will DELETE all existing fleet resources and recreate them.\n\
         All existing data will be PERMANENTLY LOST.\n\
         Type '{CONFIRMATION_TOKEN}' to confirm: "
    );
    prompt.ask(&message).trim() == CONFIRMATION_TOKEN
}
