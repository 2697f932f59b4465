//! Classification of inbound messages and the keyboards that produce them.

use ledgerbot_integration::{IncomingMessage, ReplyMarkup};
use ledgerbot_ledger::{BankAccount, RecordKind};

pub const START_COMMAND: &str = "/start";
pub const CANCEL_COMMAND: &str = "/cancel";

pub const INCOME_LABEL: &str = "Income";
pub const EXPENSE_LABEL: &str = "Expense";
pub const LOAN_TAKE_LABEL: &str = "Take loan";
pub const LOAN_GIVE_LABEL: &str = "Give loan";
pub const REPORT_LABEL: &str = "Report";
pub const STATUS_LABEL: &str = "Status";
pub const DISCONNECT_LABEL: &str = "Disconnect";
pub const CASH_LABEL: &str = "Cash";
pub const SKIP_LABEL: &str = "Skip";
pub const BACK_LABEL: &str = "Back to menu";
pub const YES_LABEL: &str = "Yes, disconnect";
pub const NO_LABEL: &str = "No, stay connected";

/// A main-menu button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Record(RecordKind),
    Report,
    Status,
    Disconnect,
}

impl MenuChoice {
    fn label(self) -> &'static str {
        match self {
            Self::Record(kind) => record_label(kind),
            Self::Report => REPORT_LABEL,
            Self::Status => STATUS_LABEL,
            Self::Disconnect => DISCONNECT_LABEL,
        }
    }
}

fn record_label(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Income => INCOME_LABEL,
        RecordKind::Expense => EXPENSE_LABEL,
        RecordKind::LoanTake => LOAN_TAKE_LABEL,
        RecordKind::LoanGive => LOAN_GIVE_LABEL,
    }
}

/// What a user message means, independent of the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Start,
    Cancel,
    Menu(MenuChoice),
    Cash,
    Skip,
    Back,
    Yes,
    No,
    /// A photo; carries the platform file reference of the largest size.
    Photo(String),
    Text(String),
}

impl Input {
    /// Classifies a message. Photos win over captions.
    #[must_use]
    pub fn classify(message: &IncomingMessage) -> Self {
        if let Some(file_ref) = message.largest_photo() {
            return Self::Photo(file_ref.to_string());
        }
        Self::from_text(message.text.as_deref().unwrap_or_default())
    }

    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let text = text.trim();
        let command = text.split_whitespace().next().unwrap_or_default();
        // Group chats address commands as /start@botname.
        let command = command.split('@').next().unwrap_or_default();
        match command {
            START_COMMAND => return Self::Start,
            CANCEL_COMMAND => return Self::Cancel,
            _ => {}
        }
        match text {
            INCOME_LABEL => Self::Menu(MenuChoice::Record(RecordKind::Income)),
            EXPENSE_LABEL => Self::Menu(MenuChoice::Record(RecordKind::Expense)),
            LOAN_TAKE_LABEL => Self::Menu(MenuChoice::Record(RecordKind::LoanTake)),
            LOAN_GIVE_LABEL => Self::Menu(MenuChoice::Record(RecordKind::LoanGive)),
            REPORT_LABEL => Self::Menu(MenuChoice::Report),
            STATUS_LABEL => Self::Menu(MenuChoice::Status),
            DISCONNECT_LABEL => Self::Menu(MenuChoice::Disconnect),
            CASH_LABEL => Self::Cash,
            SKIP_LABEL => Self::Skip,
            BACK_LABEL => Self::Back,
            YES_LABEL => Self::Yes,
            NO_LABEL => Self::No,
            other => Self::Text(other.to_string()),
        }
    }

    /// The text the user sent, for steps that accept free text.
    ///
    /// Button presses yield their label, so a bank account or description
    /// that happens to match a button still goes through.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Menu(choice) => Some(choice.label()),
            Self::Cash => Some(CASH_LABEL),
            Self::Skip => Some(SKIP_LABEL),
            Self::Back => Some(BACK_LABEL),
            Self::Yes => Some(YES_LABEL),
            Self::No => Some(NO_LABEL),
            Self::Start | Self::Cancel | Self::Photo(_) => None,
        }
    }

    /// True for inputs that abandon a draft.
    #[must_use]
    pub fn is_back(&self) -> bool {
        matches!(self, Self::Back | Self::Cancel)
    }
}

/// Keyboard shown at the idle menu.
#[must_use]
pub fn main_menu() -> ReplyMarkup {
    ReplyMarkup::keyboard([
        vec![INCOME_LABEL, EXPENSE_LABEL],
        vec![LOAN_TAKE_LABEL, LOAN_GIVE_LABEL],
        vec![REPORT_LABEL, STATUS_LABEL],
        vec![DISCONNECT_LABEL],
    ])
}

#[must_use]
pub fn back_only() -> ReplyMarkup {
    ReplyMarkup::keyboard([[BACK_LABEL]])
}

/// Cash first, then one button per bank account.
#[must_use]
pub fn payment_menu(banks: &[BankAccount]) -> ReplyMarkup {
    let mut rows = vec![vec![CASH_LABEL.to_string()]];
    rows.extend(
        banks
            .chunks(2)
            .map(|pair| pair.iter().map(|bank| bank.name.clone()).collect()),
    );
    rows.push(vec![BACK_LABEL.to_string()]);
    ReplyMarkup::Keyboard(rows)
}

#[must_use]
pub fn skip_or_back() -> ReplyMarkup {
    ReplyMarkup::keyboard([[SKIP_LABEL], [BACK_LABEL]])
}

#[must_use]
pub fn yes_no() -> ReplyMarkup {
    ReplyMarkup::keyboard([[YES_LABEL, NO_LABEL]])
}
