//! Outbound reply text.

use crate::session::{DraftEntry, MenuState};
use crate::transition::Notice;
use ledgerbot_integration::ReplyMarkup;
use ledgerbot_ledger::CommitOutcome;

pub const NOT_CONNECTED: &str = "You are not connected. Send /start to connect your account.";
pub const GENERIC_FAILURE: &str = "Something went wrong on our side. Please try again.";
pub const EVICTED: &str =
    "Your account was connected from another chat, so this chat was disconnected. \
     Send /start to connect here again.";

/// A message to send back to the chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub markup: Option<ReplyMarkup>,
}

impl Reply {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markup: None,
        }
    }

    #[must_use]
    pub fn with_markup(mut self, markup: ReplyMarkup) -> Self {
        self.markup = Some(markup);
        self
    }

    /// Puts `line` above the existing text.
    #[must_use]
    pub fn prefixed(mut self, line: &str) -> Self {
        self.text = format!("{line}\n\n{}", self.text);
        self
    }
}

#[must_use]
pub fn notice_text(notice: Notice) -> &'static str {
    match notice {
        Notice::UnknownChoice => "Please pick one of the menu options.",
        Notice::InvalidAmount => "That is not a valid amount. Use digits like 500 or 12.50.",
        Notice::UnknownBank => "No bank account with that name.",
        Notice::ExpectDescription => "Please send the description as text.",
        Notice::ExpectImage => "Please send a photo of the receipt, or press Skip.",
        Notice::ExpectYesNo => "Please answer with one of the buttons.",
        Notice::EntryDiscarded => "Entry discarded.",
        Notice::StayedConnected => "You are still connected.",
    }
}

/// Prompt text for a menu step. The keyboard is chosen by the engine.
#[must_use]
pub fn prompt_text(state: &MenuState) -> String {
    match state {
        MenuState::Idle => "Choose an action.".to_string(),
        MenuState::AwaitAmount { kind } => {
            format!("{}: how much? Send the amount, e.g. 250 or 12.50.", kind.label())
        }
        MenuState::AwaitPayment { kind, amount } => {
            format!("{} of {amount}. How was it paid?", kind.label())
        }
        MenuState::AwaitDescription { .. } => {
            "Add a short description, or press Skip.".to_string()
        }
        MenuState::AwaitImage { .. } => {
            "Send a photo of the receipt, or press Skip.".to_string()
        }
        MenuState::ConfirmDisconnect => {
            "Disconnect this chat from your account?".to_string()
        }
    }
}

/// Confirmation or failure summary after a commit attempt.
#[must_use]
pub fn commit_summary<E: std::fmt::Display>(
    entry: &DraftEntry,
    outcome: &Result<CommitOutcome, E>,
    image_attached: bool,
) -> String {
    let headline = match outcome {
        Ok(CommitOutcome::Recorded { .. }) => format!("{} recorded.", entry.kind.label()),
        Ok(CommitOutcome::BalanceStale { .. }) => format!(
            "{} recorded, but the balance of {} could not be updated.",
            entry.kind.label(),
            entry.payment.label()
        ),
        Err(_) => format!(
            "Could not record the {}. Nothing was saved.",
            entry.kind.label().to_lowercase()
        ),
    };
    let mut lines = vec![
        headline,
        format!("Amount: {}", entry.amount),
        format!("Paid with: {}", entry.payment.label()),
        format!(
            "Description: {}",
            entry.description.as_deref().unwrap_or("none")
        ),
        format!("Receipt: {}", if image_attached { "attached" } else { "none" }),
    ];
    if let Ok(CommitOutcome::Recorded {
        balance: Some(change),
        ..
    }) = outcome
    {
        lines.push(format!("New balance: {:.2}", change.after));
    }
    lines.join("\n")
}
