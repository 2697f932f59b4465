//! The menu flow as an explicit `(state, input) -> command` table.
//!
//! Transitions are pure. Anything that needs a collaborator (bank lookup,
//! ledger commit, report) is returned as a command for the engine to carry
//! out.

use crate::input::{Input, MenuChoice};
use crate::session::{DraftEntry, MenuState, PaymentMethod};
use ledgerbot_ledger::{Amount, RecordKind};

/// Why an input was rejected or a flow was interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    UnknownChoice,
    InvalidAmount,
    UnknownBank,
    ExpectDescription,
    ExpectImage,
    ExpectYesNo,
    EntryDiscarded,
    StayedConnected,
}

/// What the engine must do for one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Keep the state and ask again.
    Reprompt(Notice),
    /// Persist `next` and show its prompt.
    Goto {
        next: MenuState,
        notice: Option<Notice>,
    },
    /// Match `selection` against the user's bank accounts by exact name.
    ResolvePayment {
        kind: RecordKind,
        amount: Amount,
        selection: String,
    },
    /// Upload the image if any, commit, and return to idle.
    Finalize {
        entry: DraftEntry,
        photo: Option<String>,
    },
    Disconnect,
    Report,
    Status,
}

fn goto(next: MenuState) -> Command {
    Command::Goto { next, notice: None }
}

fn discard() -> Command {
    Command::Goto {
        next: MenuState::Idle,
        notice: Some(Notice::EntryDiscarded),
    }
}

/// Decides what an input means in a state.
#[must_use]
pub fn transition(state: &MenuState, input: &Input) -> Command {
    match state {
        MenuState::Idle => match input {
            Input::Menu(MenuChoice::Record(kind)) => goto(MenuState::AwaitAmount { kind: *kind }),
            Input::Menu(MenuChoice::Report) => Command::Report,
            Input::Menu(MenuChoice::Status) => Command::Status,
            Input::Menu(MenuChoice::Disconnect) => goto(MenuState::ConfirmDisconnect),
            Input::Back | Input::Cancel => goto(MenuState::Idle),
            _ => Command::Reprompt(Notice::UnknownChoice),
        },

        MenuState::AwaitAmount { kind } => {
            if input.is_back() {
                return discard();
            }
            match input.text().and_then(Amount::parse) {
                Some(amount) => goto(MenuState::AwaitPayment {
                    kind: *kind,
                    amount,
                }),
                None => Command::Reprompt(Notice::InvalidAmount),
            }
        }

        MenuState::AwaitPayment { kind, amount } => match input {
            _ if input.is_back() => discard(),
            Input::Cash => goto(MenuState::AwaitDescription {
                kind: *kind,
                amount: *amount,
                payment: PaymentMethod::Cash,
            }),
            _ => match input.text() {
                Some(selection) => Command::ResolvePayment {
                    kind: *kind,
                    amount: *amount,
                    selection: selection.to_string(),
                },
                None => Command::Reprompt(Notice::UnknownBank),
            },
        },

        MenuState::AwaitDescription {
            kind,
            amount,
            payment,
        } => {
            if input.is_back() {
                return discard();
            }
            let description = match input {
                Input::Skip => None,
                _ => match input.text() {
                    Some(text) if !text.is_empty() => Some(text.to_string()),
                    Some(_) => None,
                    None => return Command::Reprompt(Notice::ExpectDescription),
                },
            };
            goto(MenuState::AwaitImage {
                entry: DraftEntry {
                    kind: *kind,
                    amount: *amount,
                    payment: payment.clone(),
                    description,
                },
            })
        }

        MenuState::AwaitImage { entry } => match input {
            _ if input.is_back() => discard(),
            Input::Skip => Command::Finalize {
                entry: entry.clone(),
                photo: None,
            },
            Input::Photo(file_ref) => Command::Finalize {
                entry: entry.clone(),
                photo: Some(file_ref.clone()),
            },
            _ => Command::Reprompt(Notice::ExpectImage),
        },

        MenuState::ConfirmDisconnect => match input {
            Input::Yes => Command::Disconnect,
            Input::No => Command::Goto {
                next: MenuState::Idle,
                notice: Some(Notice::StayedConnected),
            },
            _ => Command::Reprompt(Notice::ExpectYesNo),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerbot_core::BankAccountId;

    fn amount(s: &str) -> Amount {
        Amount::parse(s).expect("valid amount")
    }

    fn draft() -> DraftEntry {
        DraftEntry {
            kind: RecordKind::Expense,
            amount: amount("40"),
            payment: PaymentMethod::Cash,
            description: None,
        }
    }

    #[test]
    fn idle_menu_buttons() {
        assert_eq!(
            transition(
                &MenuState::Idle,
                &Input::Menu(MenuChoice::Record(RecordKind::Income))
            ),
            goto(MenuState::AwaitAmount {
                kind: RecordKind::Income
            })
        );
        assert_eq!(
            transition(&MenuState::Idle, &Input::Menu(MenuChoice::Report)),
            Command::Report
        );
        assert_eq!(
            transition(&MenuState::Idle, &Input::Menu(MenuChoice::Disconnect)),
            goto(MenuState::ConfirmDisconnect)
        );
    }

    #[test]
    fn idle_rejects_free_text() {
        assert_eq!(
            transition(&MenuState::Idle, &Input::Text("hello".to_string())),
            Command::Reprompt(Notice::UnknownChoice)
        );
    }

    #[test]
    fn amount_validation() {
        let state = MenuState::AwaitAmount {
            kind: RecordKind::Income,
        };
        assert_eq!(
            transition(&state, &Input::Text("500".to_string())),
            goto(MenuState::AwaitPayment {
                kind: RecordKind::Income,
                amount: amount("500"),
            })
        );
        for bad in ["abc", "0", "-5", ""] {
            assert_eq!(
                transition(&state, &Input::Text(bad.to_string())),
                Command::Reprompt(Notice::InvalidAmount),
                "accepted {bad:?}"
            );
        }
        assert_eq!(
            transition(&state, &Input::Photo("f".to_string())),
            Command::Reprompt(Notice::InvalidAmount)
        );
    }

    #[test]
    fn back_discards_from_every_draft_step() {
        let states = [
            MenuState::AwaitAmount {
                kind: RecordKind::Expense,
            },
            MenuState::AwaitPayment {
                kind: RecordKind::Expense,
                amount: amount("1"),
            },
            MenuState::AwaitDescription {
                kind: RecordKind::Expense,
                amount: amount("1"),
                payment: PaymentMethod::Cash,
            },
            MenuState::AwaitImage { entry: draft() },
        ];
        for state in &states {
            assert_eq!(transition(state, &Input::Back), discard(), "{state:?}");
            assert_eq!(transition(state, &Input::Cancel), discard(), "{state:?}");
        }
    }

    #[test]
    fn payment_cash_or_named_bank() {
        let state = MenuState::AwaitPayment {
            kind: RecordKind::Expense,
            amount: amount("40"),
        };
        assert_eq!(
            transition(&state, &Input::Cash),
            goto(MenuState::AwaitDescription {
                kind: RecordKind::Expense,
                amount: amount("40"),
                payment: PaymentMethod::Cash,
            })
        );
        assert_eq!(
            transition(&state, &Input::Text("Main".to_string())),
            Command::ResolvePayment {
                kind: RecordKind::Expense,
                amount: amount("40"),
                selection: "Main".to_string(),
            }
        );
    }

    #[test]
    fn description_skip_leaves_it_empty() {
        let payment = PaymentMethod::Bank {
            bank_account_id: BankAccountId::new(),
            name: "Main".to_string(),
        };
        let state = MenuState::AwaitDescription {
            kind: RecordKind::Income,
            amount: amount("10"),
            payment: payment.clone(),
        };
        let Command::Goto {
            next: MenuState::AwaitImage { entry },
            ..
        } = transition(&state, &Input::Skip)
        else {
            panic!("expected image step");
        };
        assert_eq!(entry.description, None);
        assert_eq!(entry.payment, payment);

        let Command::Goto {
            next: MenuState::AwaitImage { entry },
            ..
        } = transition(&state, &Input::Text("salary".to_string()))
        else {
            panic!("expected image step");
        };
        assert_eq!(entry.description.as_deref(), Some("salary"));
    }

    #[test]
    fn image_step_accepts_photo_or_skip_only() {
        let state = MenuState::AwaitImage { entry: draft() };
        assert_eq!(
            transition(&state, &Input::Skip),
            Command::Finalize {
                entry: draft(),
                photo: None
            }
        );
        assert_eq!(
            transition(&state, &Input::Photo("file-1".to_string())),
            Command::Finalize {
                entry: draft(),
                photo: Some("file-1".to_string())
            }
        );
        assert_eq!(
            transition(&state, &Input::Text("here".to_string())),
            Command::Reprompt(Notice::ExpectImage)
        );
    }

    #[test]
    fn disconnect_confirmation_is_strict() {
        let state = MenuState::ConfirmDisconnect;
        assert_eq!(transition(&state, &Input::Yes), Command::Disconnect);
        assert_eq!(
            transition(&state, &Input::No),
            Command::Goto {
                next: MenuState::Idle,
                notice: Some(Notice::StayedConnected),
            }
        );
        assert_eq!(
            transition(&state, &Input::Text("yes".to_string())),
            Command::Reprompt(Notice::ExpectYesNo)
        );
        assert_eq!(
            transition(&state, &Input::Back),
            Command::Reprompt(Notice::ExpectYesNo)
        );
    }
}
