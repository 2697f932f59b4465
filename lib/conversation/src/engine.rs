//! The menu flow of a verified chat.
//!
//! `transition` decides; the engine carries out the resulting command
//! against the ledger, the session store, and media intake, and builds the
//! reply with the keyboard of the state the chat ends up in.

use crate::error::ConversationError;
use crate::input::{self, Input};
use crate::media::MediaIntake;
use crate::reply::{self, Reply};
use crate::session::{ChatSession, DraftEntry, MenuState, PaymentMethod, SessionStore};
use crate::transition::{Command, Notice, transition};
use ledgerbot_core::{AccountId, ChatId, Result};
use ledgerbot_integration::ReplyMarkup;
use ledgerbot_ledger::{
    BankAccount, BankAccountStore, CommitOutcome, LedgerWriter, NewEntry, ReportComposer,
};
use ledgerbot_platform_access::AccountStore;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Drives a verified chat through the menu.
#[derive(Clone)]
pub struct ConversationEngine {
    sessions: SessionStore,
    accounts: Arc<dyn AccountStore>,
    banks: Arc<dyn BankAccountStore>,
    writer: LedgerWriter,
    reports: ReportComposer,
    media: MediaIntake,
}

impl ConversationEngine {
    #[must_use]
    pub fn new(
        sessions: SessionStore,
        accounts: Arc<dyn AccountStore>,
        banks: Arc<dyn BankAccountStore>,
        writer: LedgerWriter,
        reports: ReportComposer,
        media: MediaIntake,
    ) -> Self {
        Self {
            sessions,
            accounts,
            banks,
            writer,
            reports,
            media,
        }
    }

    /// Handles one input for a chat bound to `account_id`.
    #[instrument(skip(self, menu, input), fields(%chat_id, %account_id))]
    pub async fn advance(
        &self,
        chat_id: ChatId,
        account_id: AccountId,
        menu: &MenuState,
        input: &Input,
    ) -> Result<Reply, ConversationError> {
        match transition(menu, input) {
            Command::Reprompt(notice) => Ok(self
                .prompt(chat_id, account_id, menu)
                .await?
                .prefixed(reply::notice_text(notice))),
            Command::Goto { next, notice } => {
                let prompt = self.prompt(chat_id, account_id, &next).await?;
                self.save(chat_id, account_id, next).await?;
                Ok(match notice {
                    Some(notice) => prompt.prefixed(reply::notice_text(notice)),
                    None => prompt,
                })
            }
            Command::ResolvePayment {
                kind,
                amount,
                selection,
            } => {
                let banks = self.owned_banks(chat_id, account_id).await?;
                let Some(bank) = banks.iter().find(|bank| bank.name == selection) else {
                    return Ok(Reply::text(reply::prompt_text(menu))
                        .with_markup(input::payment_menu(&banks))
                        .prefixed(reply::notice_text(Notice::UnknownBank)));
                };
                let next = MenuState::AwaitDescription {
                    kind,
                    amount,
                    payment: PaymentMethod::Bank {
                        bank_account_id: bank.id,
                        name: bank.name.clone(),
                    },
                };
                let prompt = self.prompt(chat_id, account_id, &next).await?;
                self.save(chat_id, account_id, next).await?;
                Ok(prompt)
            }
            Command::Finalize { entry, photo } => {
                self.finalize(chat_id, account_id, entry, photo).await
            }
            Command::Disconnect => {
                self.sessions
                    .clear(chat_id)
                    .await
                    .map_err(ConversationError::persistence(chat_id))?;
                info!("chat disconnected");
                Ok(
                    Reply::text("Disconnected. Send /start to connect again.")
                        .with_markup(ReplyMarkup::Remove),
                )
            }
            Command::Report => {
                let report = self
                    .reports
                    .compose(account_id)
                    .await
                    .map_err(ConversationError::collaborator(chat_id))?;
                Ok(Reply::text(report.to_string()).with_markup(input::main_menu()))
            }
            Command::Status => self.status(chat_id, account_id).await,
        }
    }

    /// The single commit point of an entry. The chat returns to the idle
    /// menu whatever the ledger says.
    async fn finalize(
        &self,
        chat_id: ChatId,
        account_id: AccountId,
        entry: DraftEntry,
        photo: Option<String>,
    ) -> Result<Reply, ConversationError> {
        let image_url = match &photo {
            Some(file_ref) => self.media.capture(account_id, file_ref).await,
            None => None,
        };
        let image_attached = image_url.is_some();

        let outcome = self
            .writer
            .commit(NewEntry {
                account_id,
                kind: entry.kind,
                amount: entry.amount,
                bank_account_id: entry.payment.bank_account_id(),
                description: entry.description.clone(),
                image_url,
            })
            .await;
        match &outcome {
            Ok(CommitOutcome::Recorded { record, .. }) => {
                info!(?record, kind = ?entry.kind, "entry recorded");
            }
            Ok(CommitOutcome::BalanceStale { record, reason, .. }) => {
                warn!(?record, %reason, "entry recorded with stale balance");
            }
            Err(e) => error!(error = %e, "entry could not be recorded"),
        }

        self.save(chat_id, account_id, MenuState::Idle).await?;
        Ok(
            Reply::text(reply::commit_summary(&entry, &outcome, image_attached))
                .with_markup(input::main_menu()),
        )
    }

    async fn status(
        &self,
        chat_id: ChatId,
        account_id: AccountId,
    ) -> Result<Reply, ConversationError> {
        let account = self
            .accounts
            .find_by_id(account_id)
            .await
            .map_err(ConversationError::collaborator(chat_id))?;
        let banks = self.owned_banks(chat_id, account_id).await?;

        let mut lines = vec![match account {
            Some(account) => format!("Connected as {}.", account.email()),
            None => "Connected.".to_string(),
        }];
        if banks.is_empty() {
            lines.push("No bank accounts yet.".to_string());
        } else {
            lines.push("Bank accounts:".to_string());
            lines.extend(
                banks
                    .iter()
                    .map(|bank| format!("  {}: {:.2}", bank.name, bank.current_balance)),
            );
        }
        Ok(Reply::text(lines.join("\n")).with_markup(input::main_menu()))
    }

    /// Prompt and keyboard for `state`.
    async fn prompt(
        &self,
        chat_id: ChatId,
        account_id: AccountId,
        state: &MenuState,
    ) -> Result<Reply, ConversationError> {
        let markup = match state {
            MenuState::Idle => input::main_menu(),
            MenuState::AwaitAmount { .. } => input::back_only(),
            MenuState::AwaitPayment { .. } => {
                input::payment_menu(&self.owned_banks(chat_id, account_id).await?)
            }
            MenuState::AwaitDescription { .. } | MenuState::AwaitImage { .. } => {
                input::skip_or_back()
            }
            MenuState::ConfirmDisconnect => input::yes_no(),
        };
        Ok(Reply::text(reply::prompt_text(state)).with_markup(markup))
    }

    async fn owned_banks(
        &self,
        chat_id: ChatId,
        account_id: AccountId,
    ) -> Result<Vec<BankAccount>, ConversationError> {
        Ok(self
            .banks
            .list_by_owner(account_id)
            .await
            .map_err(ConversationError::collaborator(chat_id))?)
    }

    async fn save(
        &self,
        chat_id: ChatId,
        account_id: AccountId,
        next: MenuState,
    ) -> Result<(), ConversationError> {
        self.sessions
            .set(&ChatSession::verified(chat_id, account_id, next))
            .await
            .map_err(ConversationError::persistence(chat_id))?;
        Ok(())
    }
}
